//! `agent-twin` service entry point.
//!
//! Configuration comes from the environment (see `TwinConfig::from_env`); `RUST_LOG`
//! controls log verbosity.

use agent_twin::server::{serve, AppState};
use agent_twin::TwinConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    agent_twin::init_logger();

    let config = TwinConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    log::info!(
        "starting @{} ({}) with model {}",
        config.agent_username,
        config.agent_name,
        config.model
    );

    let state = AppState::from_config(config)?;

    log::info!("fetching agents from registry {}", state.directory.registry_url());
    if let Err(err) = state.directory.refresh().await {
        log::warn!("starting without registry agents: {}", err);
    }

    serve(state, &bind_addr).await
}
