use std::sync::Arc;

use crate::discovery::fetchers::{find_ytdlp, MediaTool, YtDlp};
use crate::download::manager::DownloadManager;
use crate::service::config::Config;

#[derive(Clone)]
pub struct AppState {
    /// The collaborator process every request shells out to
    pub tool: Arc<dyn MediaTool>,

    /// Shared download directory
    pub downloads: Arc<DownloadManager>,

    pub max_formats: usize,
}

impl AppState {
    pub fn new(tool: Arc<dyn MediaTool>, downloads: DownloadManager, max_formats: usize) -> Self {
        Self {
            tool,
            downloads: Arc::new(downloads),
            max_formats,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let tool = YtDlp::new(find_ytdlp(config.ytdlp.as_deref()))
            .with_timeout(config.ytdlp_timeout());
        let downloads = DownloadManager::new(&config.downloads_dir, config.max_file_age());

        Self::new(Arc::new(tool), downloads, config.max_formats)
    }
}
