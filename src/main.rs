use dotenvy::dotenv;
use std::net::SocketAddr;
use tracing::{info, warn};

use hackmate::config::AppConfig;
use hackmate::database;
use hackmate::services::ArbitrationEngine;
use hackmate::web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    info!(database_url = %config.database_url, "connecting to database");
    let pool = database::connect(&config.database_url, config.max_connections).await?;

    info!(
        leave_policy = ?config.settings.leave_policy,
        payment_window_minutes = config.settings.payment_window.num_minutes(),
        "arbitration settings loaded"
    );
    let engine = ArbitrationEngine::new(pool, config.settings.clone());
    let app = web::router(engine);

    // Bind, falling back to the next port when the configured one is taken.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback: SocketAddr =
                format!("{}:{}", config.host, config.port.saturating_add(1)).parse()?;
            warn!("could not bind {}: {}; trying {}", addr, e, fallback);
            tokio::net::TcpListener::bind(fallback).await?
        }
    };

    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
