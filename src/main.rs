//! MQ FTP Server - Entry Point
//!
//! Loads `config.toml` (optional) with `MQFTP_*` overrides and serves until
//! Ctrl-C.

use log::{error, info};
use mq_ftp_server::{Server, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // RUST_LOG overrides the default filter
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Launching FTP server...");

    let config = ServerConfig::load("config")?;

    std::fs::create_dir_all(&config.root_directory).map_err(|source| {
        ServerError::RootDirectory {
            path: config.root_directory.display().to_string(),
            source,
        }
    })?;

    let server = Server::with_config(config);
    server.start().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down...");
    server.stop().await;
    Ok(())
}
