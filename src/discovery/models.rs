use serde::Deserialize;

/// The subset of `yt-dlp --dump-json` output this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMediaInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: String,
    pub ext: Option<String>,
    pub resolution: Option<String>,
    pub filesize: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub format_note: Option<String>,
}

impl RawFormat {
    /// yt-dlp marks a missing stream with the literal codec `"none"`.
    /// A format without codec fields at all is kept.
    pub fn has_media(&self) -> bool {
        self.vcodec.as_deref() != Some("none") || self.acodec.as_deref() != Some("none")
    }
}
