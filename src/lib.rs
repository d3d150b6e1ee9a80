//! # agent-twin
//!
//! agent-twin is a personal agent twin service: an LLM-backed agent that answers direct
//! questions, forwards `@mention`-addressed messages to peer agents found through a central
//! registry, and picks the best peer for a free-text query.
//!
//! The crate is layered leaf-first:
//!
//! * **Directory**: [`directory::Directory`] keeps the id -> endpoint map of peer agents,
//!   refreshed from a registry over HTTP and editable at runtime.
//! * **Mentions**: [`mention::parse`] splits a raw message into its `@target` and the text
//!   to deliver.
//! * **Forwarding**: [`forwarder::Forwarder`] resolves a target and asks the peer's
//!   `/query` endpoint, failing with a typed [`forwarder::ForwardError`].
//! * **Selection**: [`selector::AgentSelector`] chooses a catalog entry for a query, asking
//!   a language model first and falling back to keyword matching.
//! * **Routing**: [`handler::A2aHandler`] runs the `/a2a` pipeline and writes every step
//!   to the [`audit::AuditLog`].
//! * **Serving**: `server::router` (feature `server`, on by default) exposes all of the
//!   above over axum.
//!
//! Language models sit behind the [`ClientWrapper`] trait; an OpenAI-compatible client
//! ships in [`clients::openai`].
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use agent_twin::server::{serve, AppState};
//! use agent_twin::TwinConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     agent_twin::init_logger();
//!
//!     let config = TwinConfig::from_env();
//!     let addr = config.bind_addr.clone();
//!     let state = AppState::from_config(config)?;
//!     let _ = state.directory.refresh().await;
//!
//!     serve(state, &addr).await
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// ```rust
/// agent_twin::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

pub mod agent_twin;

// Re-exporting key items for easier external access.
pub use agent_twin::agent::Agent;
pub use agent_twin::agent_facts;
pub use agent_twin::audit;
pub use agent_twin::audit::{AuditEvent, AuditLog};
pub use agent_twin::catalog;
pub use agent_twin::catalog::{AgentCatalogEntry, CatalogClient};
pub use agent_twin::client_wrapper;
pub use agent_twin::client_wrapper::{ClientWrapper, Message, Role, SamplingOptions};
pub use agent_twin::clients;
pub use agent_twin::config;
pub use agent_twin::config::TwinConfig;
pub use agent_twin::directory;
pub use agent_twin::directory::{AgentDescriptor, Directory, DirectoryError};
pub use agent_twin::envelope;
pub use agent_twin::forwarder;
pub use agent_twin::forwarder::{ForwardError, Forwarder};
pub use agent_twin::handler;
pub use agent_twin::handler::{A2aHandler, HandlerError};
pub use agent_twin::http_client_pool;
pub use agent_twin::mention;
pub use agent_twin::mention::RoutingDecision;
pub use agent_twin::selector;
pub use agent_twin::selector::AgentSelector;
#[cfg(feature = "server")]
pub use agent_twin::server;
