use clap::Parser;

use vidgrab::utils::log::init_logger_once;
use vidgrab::{start_axum_server, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger_once();

    let config = Config::parse();
    start_axum_server(config).await
}
