mod config;
mod errors;
mod models;
mod routes;
mod state;
mod vincere;
mod webhook;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, WebhookMode};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RChilli webhook v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Mode: {}, envelope: {:?}, decode attachments: {}, ack upstream failures: {}",
        config.mode.as_str(),
        config.envelope,
        config.decode_attachments,
        config.ack_upstream_failures
    );

    if config.session_secret.is_none() {
        warn!("SESSION_SECRET is not set");
    }
    if config.mode == WebhookMode::Forward {
        info!("Forwarding candidates to {}", config.vincere.base_url());
    }

    let state = AppState::new(config.clone())?;

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
