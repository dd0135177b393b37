use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderValue, Method, Request},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};
use uuid::Uuid;

use crate::download::manager::PUBLIC_PREFIX;
use crate::handlers::handlers::{download, health, index, media_info, serve_download};
use crate::service::config::Config;
use crate::service::state::AppState;

/// All routes, without CORS.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/info", post(media_info))
        .route("/api/download", post(download))
        .route(&format!("{PUBLIC_PREFIX}/{{filename}}"), get(serve_download))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        id = %Uuid::new_v4(),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Cross-origin access is only opened up for explicitly listed origins.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid origin {o:?}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
    )
}

/// Builds state from `config`, starts the background sweeper and serves
/// until Ctrl-C.
pub async fn start_axum_server(config: Config) -> Result<()> {
    let state = AppState::from_config(&config);

    state
        .downloads
        .ensure_dir()
        .await
        .context("preparing download directory")?;
    let removed = state.downloads.sweep_expired().await;
    if removed > 0 {
        info!("Removed {removed} expired download(s) at start-up");
    }

    if let Some(interval) = config.cleanup_interval() {
        let downloads = Arc::clone(&state.downloads);
        tokio::spawn(async move {
            downloads.run(interval).await;
        });
    }

    let mut app = build_router(state);
    if let Some(cors) = cors_layer(&config.allowed_origins) {
        app = app.layer(cors);
    }

    let handle = axum_server::Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });

    info!("Listening on http://{}", config.bind);
    axum_server::bind(config.bind)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("HTTP server failed")?;

    Ok(())
}
