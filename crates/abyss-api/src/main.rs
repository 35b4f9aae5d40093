//! Binary entrypoint for the Abyss API server.
use abyss_api::{run, DEFAULT_ADDR};
use abyss_core::EvalConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EvalConfig::from_env()?;
    // Default listen address can be overridden with ABYSS_ADDR
    let addr = std::env::var("ABYSS_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    run(&addr, config).await
}
