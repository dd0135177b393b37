use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,

    /// yt-dlp format selector; `"best"` or absent means "let yt-dlp pick"
    #[serde(default)]
    pub format: Option<String>,
}

/// Metadata returned by `POST /api/info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Length in seconds
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub formats: Vec<FormatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatEntry {
    pub format_id: String,
    pub ext: Option<String>,
    /// e.g. "1920x1080", or "audio only"
    pub resolution: String,
    pub filesize: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub format_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub download_url: String,
    pub filename: String,
    pub message: String,
}

impl DownloadResponse {
    pub fn completed(download_url: String, filename: String) -> Self {
        Self {
            success: true,
            download_url,
            filename,
            message: "Download completed successfully".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Treats a missing, null or blank string as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
