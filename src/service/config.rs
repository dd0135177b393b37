use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command line / environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "vidgrab", about = "Web front-end for fetching media with yt-dlp")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "APP_ADDR", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Where downloaded files are written and served from
    #[arg(long, env = "DOWNLOADS_DIR", default_value = "public/downloads")]
    pub downloads_dir: PathBuf,

    /// yt-dlp executable; looked up on PATH when omitted
    #[arg(long, env = "YTDLP_PATH")]
    pub ytdlp: Option<PathBuf>,

    /// Files older than this are deleted by the cleanup sweep
    #[arg(long, env = "MAX_FILE_AGE_SECS", default_value_t = 3600)]
    pub max_file_age_secs: u64,

    /// Background sweep period, 0 disables it
    #[arg(long, env = "CLEANUP_INTERVAL_SECS", default_value_t = 600)]
    pub cleanup_interval_secs: u64,

    /// Kill yt-dlp after this many seconds
    #[arg(long, env = "YTDLP_TIMEOUT_SECS")]
    pub ytdlp_timeout_secs: Option<u64>,

    /// Upper bound on formats listed by /api/info
    #[arg(long, env = "MAX_FORMATS", default_value_t = 20)]
    pub max_formats: usize,

    /// Origins allowed to call the API cross-site
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn max_file_age(&self) -> Duration {
        Duration::from_secs(self.max_file_age_secs)
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }

    pub fn ytdlp_timeout(&self) -> Option<Duration> {
        self.ytdlp_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["vidgrab"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.max_file_age(), Duration::from_secs(3600));
        assert_eq!(config.max_formats, 20);
        assert_eq!(config.ytdlp_timeout(), None);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn zero_interval_disables_sweeper() {
        let config = Config::try_parse_from([
            "vidgrab",
            "--cleanup-interval-secs",
            "0",
            "--allowed-origins",
            "http://a.test,http://b.test",
        ])
        .unwrap();
        assert_eq!(config.cleanup_interval(), None);
        assert_eq!(config.allowed_origins, ["http://a.test", "http://b.test"]);
    }
}
