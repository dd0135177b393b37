use once_cell::sync::Lazy;
use regex::Regex;

use crate::discovery::models::{RawFormat, RawMediaInfo};
use crate::models::models::{FormatEntry, MediaInfo};

/// yt-dlp reports fatal problems on stderr as `ERROR: <message>`.
static ERROR_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ERROR: (.+)").unwrap());

/// Pulls the human readable reason out of yt-dlp's stderr.
/// Only the first `ERROR:` line counts.
pub fn extract_error_reason(stderr: &str) -> Option<String> {
    let caps = ERROR_LINE.captures(stderr)?;
    let reason = caps.get(1)?.as_str().trim_end();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}

/// Shapes the raw dump into the response record, keeping at most
/// `max_formats` entries that carry audio or video.
pub fn to_media_info(raw: RawMediaInfo, max_formats: usize) -> MediaInfo {
    let formats = raw
        .formats
        .into_iter()
        .filter(RawFormat::has_media)
        .map(to_format_entry)
        .take(max_formats)
        .collect();

    MediaInfo {
        title: raw.title,
        thumbnail: raw.thumbnail,
        duration: raw.duration,
        uploader: raw.uploader,
        formats,
    }
}

fn to_format_entry(format: RawFormat) -> FormatEntry {
    FormatEntry {
        format_id: format.format_id,
        ext: format.ext,
        resolution: format
            .resolution
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "audio only".to_string()),
        filesize: format.filesize,
        vcodec: format.vcodec,
        acodec: format.acodec,
        format_note: format.format_note,
    }
}
