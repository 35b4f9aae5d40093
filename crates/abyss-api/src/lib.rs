//! Abyss API /v1: the `sys` commands over HTTP
pub mod handlers;
pub mod metrics;
pub mod middleware;

use std::sync::Arc;

use abyss_commands::SystemCommands;
use abyss_core::{Color, EvalConfig, Identity};
use axum::{
    routing::{get, post},
    Router,
};

use crate::metrics::Metrics;

/// Listen address used when `ABYSS_ADDR` is unset
pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";

pub struct AppState {
    pub commands: SystemCommands,
    pub metrics: Metrics,
    /// Identity the host replies as
    pub bot: Identity,
    pub accent: Option<Color>,
}

impl AppState {
    pub fn new(config: EvalConfig) -> anyhow::Result<Self> {
        Ok(Self {
            commands: SystemCommands::new(config),
            metrics: Metrics::new()?,
            bot: Identity::new(0, "abyss"),
            accent: Some(Color::DEFAULT),
        })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/sys/eval", post(handlers::eval))
        .route("/v1/sys/inspect", post(handlers::inspect))
        .route("/v1/sys/hb", post(handlers::hb))
        .route("/v1/sys/throwex", post(handlers::throwex))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::trace())
        .layer(middleware::cors())
        .with_state(state)
}

pub async fn run(addr: &str, config: EvalConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config)?);
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Abyss API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
