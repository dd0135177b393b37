use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,tower_http=info";

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// `RUST_LOG` wins; otherwise [`DEFAULT_FILTER`].
pub fn init_logger_once() {
    INIT_LOGGER.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    });
}
