use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use config::Config;
use tokio::{net::TcpListener, signal};

mod catalog;
mod config;
mod handlers;
mod protocol;
mod registration;
mod server;
mod session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // connect tracing to stdout
    tracing_subscriber::fmt::init();

    let config = Config::parse();

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    tracing::info!("Server listening on: {}", listener.local_addr()?);

    let registry = Arc::new(config.registry());
    server::run(listener, registry, config.limits(), signal::ctrl_c()).await;

    Ok(())
}
