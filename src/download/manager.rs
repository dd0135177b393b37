use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::discovery::fetchers::{MediaTool, ToolError};

/// Public URL prefix the download directory is served under.
pub const PUBLIC_PREFIX: &str = "/downloads";

const FILE_PREFIX: &str = "video_";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not prepare download directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Download completed but file not found")]
    FileNotFound,

    #[error("could not scan download directory: {0}")]
    Scan(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub filename: String,
    pub path: PathBuf,
}

impl DownloadedFile {
    pub fn public_url(&self) -> String {
        format!("{PUBLIC_PREFIX}/{}", self.filename)
    }
}

/// Owns the shared download directory: naming, stale-file sweeps and
/// locating whatever yt-dlp wrote.
#[derive(Debug)]
pub struct DownloadManager {
    dir: PathBuf,
    max_age: Duration,
    /// Prefixes of downloads that are still running. The sweep leaves them alone.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl DownloadManager {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Periodic sweep so stale files go away even without traffic.
    /// The first pass happens one `interval` from now.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = sweep_ticker(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.ensure_dir().await {
                warn!("Skipping sweep: {e}");
                continue;
            }
            let removed = self.sweep_expired().await;
            if removed > 0 {
                info!("Removed {removed} expired download(s)");
            }
        }
    }

    /// The full download flow for one request.
    pub async fn download(
        &self,
        tool: &dyn MediaTool,
        url: &str,
        format: Option<&str>,
    ) -> Result<DownloadedFile, DownloadError> {
        self.ensure_dir().await?;
        self.sweep_expired().await;

        let slot = self.reserve();
        tool.download(url, &slot.output_template(&self.dir), format)
            .await?;

        let file = self.locate(&slot).await?;
        debug!("Download for {url} stored as {}", file.path.display());
        Ok(file)
    }

    pub async fn ensure_dir(&self) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| DownloadError::Directory {
                path: self.dir.clone(),
                source,
            })
    }

    /// Deletes files older than `max_age`. Best effort: problems with a
    /// single entry are logged and skipped. Returns how many files went.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Could not open {} for cleanup: {e}", self.dir.display());
                }
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Could not iterate {} for cleanup: {e}", self.dir.display());
                    break;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_in_flight(&name) {
                continue;
            }

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Could not stat {}: {e}", path.display());
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("No modification time for {}: {e}", path.display());
                    continue;
                }
            };
            // Future mtimes (clock skew) count as brand new.
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= self.max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed expired download {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {e}", path.display()),
            }
        }

        removed
    }

    /// Claims a fresh `video_<millis>` prefix. Two requests in the same
    /// millisecond get consecutive values.
    pub fn reserve(&self) -> DownloadSlot {
        let mut millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let mut in_flight = self.in_flight.lock();
        let prefix = loop {
            let candidate = format!("{FILE_PREFIX}{millis}");
            if in_flight.insert(candidate.clone()) {
                break candidate;
            }
            millis += 1;
        };

        DownloadSlot {
            prefix,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Finds the finished file written for `slot`, ignoring yt-dlp's
    /// temporary and per-stream artifacts.
    pub async fn locate(&self, slot: &DownloadSlot) -> Result<DownloadedFile, DownloadError> {
        let stem = format!("{}.", slot.prefix);
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(DownloadError::Scan)?;

        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(DownloadError::Scan)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&stem) && !is_partial_artifact(&name[stem.len()..]) {
                candidates.push(name);
            }
        }

        candidates.sort();
        let filename = candidates
            .into_iter()
            .next()
            .ok_or(DownloadError::FileNotFound)?;

        Ok(DownloadedFile {
            path: self.dir.join(&filename),
            filename,
        })
    }

    fn is_in_flight(&self, name: &str) -> bool {
        let in_flight = self.in_flight.lock();
        in_flight.iter().any(|prefix| {
            name.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

fn sweep_ticker(interval: Duration) -> tokio::time::Interval {
    tokio::time::interval_at(tokio::time::Instant::now() + interval, interval)
}

/// A reserved output prefix. Dropping it releases the reservation.
#[derive(Debug)]
pub struct DownloadSlot {
    prefix: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl DownloadSlot {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn output_template(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.%(ext)s", self.prefix))
    }
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.prefix);
    }
}

/// `rest` is what follows `video_<millis>.`, e.g. `mp4`, `mp4.part`, `f137.mp4`.
fn is_partial_artifact(rest: &str) -> bool {
    let first = rest.split('.').next().unwrap_or_default();
    if first.is_empty() || first == "temp" {
        return true;
    }
    if [".part", ".ytdl", ".temp"].iter().any(|s| rest.ends_with(s)) {
        return true;
    }
    // `f137.mp4`, `f251-drc.webm`: single streams before merging
    rest.contains('.') && is_stream_fragment(first)
}

fn is_stream_fragment(segment: &str) -> bool {
    let Some(id) = segment.strip_prefix('f') else {
        return false;
    };
    !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && id.chars().any(|c| c.is_ascii_digit())
}
