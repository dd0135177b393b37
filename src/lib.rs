//! HTTP front-end for downloading media through yt-dlp.

#![allow(clippy::module_inception)]

pub mod discovery;
pub mod download;
pub mod handlers;
pub mod models;
pub mod service;
pub mod utils;

pub use discovery::fetchers::{MediaTool, ToolError, YtDlp};
pub use download::manager::DownloadManager;
pub use service::config::Config;
pub use service::main_axum::{build_router, start_axum_server};
pub use service::state::AppState;
