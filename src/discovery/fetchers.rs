use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::discovery::models::RawMediaInfo;
use crate::discovery::parsers::extract_error_reason;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("yt-dlp not found at {0}")]
    NotInstalled(PathBuf),

    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("yt-dlp exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("yt-dlp did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("yt-dlp returned unreadable metadata: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

impl ToolError {
    /// The `ERROR:` reason yt-dlp printed, if this is a process failure.
    pub fn reason(&self) -> Option<String> {
        match self {
            ToolError::Failed { stderr, .. } => extract_error_reason(stderr),
            _ => None,
        }
    }
}

/// The external media tool this service delegates to.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Reads metadata for `url` without downloading anything.
    async fn fetch_info(&self, url: &str) -> Result<RawMediaInfo, ToolError>;

    /// Downloads `url` to `output_template` (a path containing `%(ext)s`).
    async fn download(
        &self,
        url: &str,
        output_template: &Path,
        format: Option<&str>,
    ) -> Result<(), ToolError>;
}

/// `MediaTool` backed by the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(&self, args: Vec<OsString>) -> Result<Output, ToolError> {
        debug!("Running {} {:?}", self.binary.display(), args);

        let mut command = Command::new(&self.binary);
        command.args(args).kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| ToolError::TimedOut(limit))?,
            None => command.output().await,
        }
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ToolError::NotInstalled(self.binary.clone())
            } else {
                ToolError::Spawn(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("yt-dlp failed ({}): {}", output.status, stderr);
            return Err(ToolError::Failed {
                status: output.status,
                stderr,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaTool for YtDlp {
    async fn fetch_info(&self, url: &str) -> Result<RawMediaInfo, ToolError> {
        let output = self.run(info_args(url)).await?;
        let info: RawMediaInfo = serde_json::from_slice(&output.stdout)?;
        Ok(info)
    }

    async fn download(
        &self,
        url: &str,
        output_template: &Path,
        format: Option<&str>,
    ) -> Result<(), ToolError> {
        info!("Downloading {url} to {}", output_template.display());
        self.run(download_args(url, output_template, format)).await?;
        Ok(())
    }
}

/// `yt-dlp --dump-json --no-playlist -- <url>`
pub fn info_args(url: &str) -> Vec<OsString> {
    vec![
        "--dump-json".into(),
        "--no-playlist".into(),
        "--".into(),
        url.into(),
    ]
}

/// `yt-dlp --no-mtime -o <template> [-f <selector>] -- <url>`
pub fn download_args(url: &str, output_template: &Path, format: Option<&str>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--no-mtime".into(),
        "-o".into(),
        output_template.as_os_str().to_owned(),
    ];
    if let Some(selector) = format_selector(format) {
        args.push("-f".into());
        args.push(selector.into());
    }
    args.push("--".into());
    args.push(url.into());
    args
}

/// An explicit format falls back to the best video+audio pair, then to
/// the best single file. `"best"` needs no selector at all.
pub fn format_selector(format: Option<&str>) -> Option<String> {
    let format = format.map(str::trim).filter(|f| !f.is_empty())?;
    if format == "best" {
        return None;
    }
    Some(format!("{format}/bestvideo+bestaudio/best"))
}

/// Resolves the yt-dlp executable: explicit path, then `PATH`, then the bare name.
pub fn find_ytdlp(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    match which::which("yt-dlp") {
        Ok(path) => {
            info!("Using yt-dlp at {}", path.display());
            path
        }
        Err(_) => {
            tracing::warn!("yt-dlp not found on PATH, requests will fail until it is installed");
            PathBuf::from("yt-dlp")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_and_blank_formats_need_no_selector() {
        assert_eq!(format_selector(None), None);
        assert_eq!(format_selector(Some("best")), None);
        assert_eq!(format_selector(Some("  ")), None);
    }

    #[test]
    fn explicit_format_falls_back() {
        assert_eq!(
            format_selector(Some("137")).as_deref(),
            Some("137/bestvideo+bestaudio/best")
        );
    }

    #[test]
    fn download_args_keep_url_after_separator() {
        let args = download_args("-weird", Path::new("/tmp/video_1.%(ext)s"), Some("22"));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "--no-mtime",
                "-o",
                "/tmp/video_1.%(ext)s",
                "-f",
                "22/bestvideo+bestaudio/best",
                "--",
                "-weird"
            ]
        );
    }

    #[test]
    fn info_args_do_not_download() {
        let args = info_args("https://example.com/v");
        assert_eq!(args[0], "--dump-json");
        assert_eq!(args.last().unwrap(), "https://example.com/v");
    }

    #[test]
    fn reason_only_for_process_failures() {
        let err = ToolError::TimedOut(Duration::from_secs(1));
        assert_eq!(err.reason(), None);
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let tool = YtDlp::new("/definitely/not/here/yt-dlp");
        let err = tool.fetch_info("https://example.com").await.unwrap_err();
        assert!(matches!(err, ToolError::NotInstalled(_)));
    }
}
