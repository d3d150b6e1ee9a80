//! Configuration for the agent twin.
//!
//! Provides the [`TwinConfig`] struct: the local agent's public identity, the registry and
//! catalog URLs, the audit log location, LLM credentials, and the timeouts applied to
//! outbound calls. Users construct it manually or load it from the process environment
//! with [`TwinConfig::from_env`]; no config-file parsing dependencies are involved.
//!
//! # Example
//!
//! ```rust
//! use agent_twin::TwinConfig;
//! use std::time::Duration;
//!
//! let config = TwinConfig {
//!     agent_username: "mimo".to_string(),
//!     forward_timeout: Duration::from_secs(5),
//!     ..TwinConfig::default()
//! };
//! assert_eq!(config.caller_identity(), "agent-mimo");
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default registry of peer agents.
pub const DEFAULT_REGISTRY_URL: &str = "https://nest.projectnanda.org/api/agents";
/// Default catalog of agent facts used by `/search`.
pub const DEFAULT_AGENTFACTS_DB_URL: &str = "https://v0-agent-facts-database.vercel.app/api/agentfacts";

/// Runtime configuration of one agent twin process.
#[derive(Clone, Debug)]
pub struct TwinConfig {
    /// Unique username; doubles as the agent id peers address with `@username`.
    pub agent_username: String,
    /// Human-readable name.
    pub agent_name: String,
    pub agent_description: String,
    /// Tone folded into the `/query` system prompt.
    pub agent_personality: Option<String>,
    /// Free-form background folded into the `/query` system prompt.
    pub agent_backstory: Option<String>,
    pub agent_version: String,
    pub provider_name: String,
    pub provider_url: String,
    pub jurisdiction: String,
    /// Stable id for the agent-facts document. A random one is generated when unset.
    pub agent_uuid: Option<String>,
    /// Public base URL (e.g. `https://twin.example.app`), used in agent facts.
    pub public_url: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    pub registry_url: String,
    pub agentfacts_db_url: String,
    /// Append-only audit log. `None` keeps audit records in the `log` facade only.
    pub audit_log_path: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: String,
    /// Bound on registry and catalog fetches.
    pub registry_timeout: Duration,
    /// Bound on a single peer forward.
    pub forward_timeout: Duration,
    /// Bound on a single LLM completion.
    pub llm_timeout: Duration,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            agent_username: "agent-twin".to_string(),
            agent_name: "Agent Twin".to_string(),
            agent_description: "A personal agent twin reachable over A2A".to_string(),
            agent_personality: None,
            agent_backstory: None,
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            provider_name: "unknown".to_string(),
            provider_url: "http://localhost:8000".to_string(),
            jurisdiction: "USA".to_string(),
            agent_uuid: None,
            public_url: None,
            bind_addr: "0.0.0.0:8000".to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            agentfacts_db_url: DEFAULT_AGENTFACTS_DB_URL.to_string(),
            audit_log_path: Some(PathBuf::from("logs/a2a_messages.log")),
            openai_api_key: None,
            openai_base_url: None,
            model: "gpt-4o-mini".to_string(),
            registry_timeout: Duration::from_secs(10),
            forward_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(60),
        }
    }
}

impl TwinConfig {
    /// Build a config from the defaults overlaid with environment variables.
    ///
    /// `PUBLIC_URL` falls back to `RAILWAY_PUBLIC_DOMAIN`; a bare host gets `https://`.
    /// An empty `A2A_LOG_PATH` disables the audit file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from an arbitrary lookup, which keeps
    /// tests away from process-global state.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = TwinConfig::default();

        if let Some(v) = get("MY_AGENT_USERNAME") {
            config.agent_username = v;
        }
        if let Some(v) = get("MY_AGENT_NAME") {
            config.agent_name = v;
        }
        if let Some(v) = get("MY_AGENT_DESCRIPTION") {
            config.agent_description = v;
        }
        config.agent_personality = get("MY_AGENT_PERSONALITY");
        config.agent_backstory = get("MY_AGENT_BACKSTORY");
        if let Some(v) = get("MY_AGENT_PROVIDER") {
            config.provider_name = v;
        }
        if let Some(v) = get("MY_AGENT_PROVIDER_URL") {
            config.provider_url = v;
        }
        config.agent_uuid = get("AGENT_UUID");
        config.public_url = get("PUBLIC_URL")
            .or_else(|| get("RAILWAY_PUBLIC_DOMAIN"))
            .map(|url| {
                if url.starts_with("http") {
                    url
                } else {
                    format!("https://{}", url)
                }
            });
        if let Some(port) = get("PORT") {
            config.bind_addr = format!("0.0.0.0:{}", port.trim());
        }
        if let Some(v) = get("REGISTRY_URL") {
            config.registry_url = v;
        }
        if let Some(v) = get("AGENTFACTS_DB_URL") {
            config.agentfacts_db_url = v;
        }
        if let Some(raw) = lookup("A2A_LOG_PATH") {
            config.audit_log_path = if raw.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(raw))
            };
        }
        config.openai_api_key = get("OPENAI_API_KEY");
        config.openai_base_url = get("OPENAI_BASE_URL");
        if let Some(v) = get("OPENAI_MODEL") {
            config.model = v;
        }
        config
    }

    /// Identity tag sent as `user_id` on every forwarded query.
    pub fn caller_identity(&self) -> String {
        format!("agent-{}", self.agent_username)
    }

    /// Base URL advertised to peers.
    pub fn base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string()
    }
}
