pub mod config;
pub mod main_axum;
pub mod state;
