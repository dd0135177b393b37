//! HTTP-facing error type

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::discovery::fetchers::ToolError;
use crate::download::manager::DownloadError;
use crate::models::models::ErrorBody;

pub const INFO_FAILED: &str = "Failed to fetch video information";
pub const DOWNLOAD_FAILED: &str = "Failed to download video";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("URL is required")]
    MissingUrl,

    /// Anything that went wrong after the request was accepted. The
    /// caller sees yt-dlp's own reason when there is one, else `fallback`.
    #[error("{fallback}: {source}")]
    Failed {
        fallback: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn info(source: impl Into<anyhow::Error>) -> Self {
        AppError::Failed {
            fallback: INFO_FAILED,
            source: source.into(),
        }
    }

    pub fn download(source: impl Into<anyhow::Error>) -> Self {
        AppError::Failed {
            fallback: DOWNLOAD_FAILED,
            source: source.into(),
        }
    }
}

/// Looks through the chain for a yt-dlp failure that printed an `ERROR:` line.
fn tool_reason(source: &anyhow::Error) -> Option<String> {
    source.chain().find_map(|cause| {
        if let Some(tool) = cause.downcast_ref::<ToolError>() {
            return tool.reason();
        }
        match cause.downcast_ref::<DownloadError>() {
            Some(DownloadError::Tool(tool)) => tool.reason(),
            _ => None,
        }
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::MissingUrl => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "URL is required".to_string(),
                    details: None,
                },
            ),
            AppError::Failed { fallback, source } => {
                error!("{fallback}: {source:#}");
                let message = tool_reason(&source).unwrap_or_else(|| fallback.to_string());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: message,
                        details: Some(format!("{source:#}")),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn failed(stderr: &str) -> ToolError {
        ToolError::Failed {
            status: ExitStatus::from_raw(256),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn reason_found_through_download_error() {
        let err = anyhow::Error::from(DownloadError::Tool(failed("ERROR: Private video")));
        assert_eq!(tool_reason(&err).as_deref(), Some("Private video"));
    }

    #[test]
    fn no_reason_without_error_line() {
        let err = anyhow::Error::from(failed("killed"));
        assert_eq!(tool_reason(&err), None);
        let err = anyhow::Error::from(DownloadError::FileNotFound);
        assert_eq!(tool_reason(&err), None);
    }

    #[test]
    fn failures_map_to_server_error() {
        let response = AppError::download(DownloadError::FileNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = AppError::MissingUrl.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
