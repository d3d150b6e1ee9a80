//! HTTP Client Pool for maintaining persistent connections.
//!
//! The twin talks to a handful of long-lived hosts (the registry, the agent-facts catalog,
//! the LLM provider) and to peers it forwards messages to. Each origin gets its own
//! configured `reqwest::Client` so DNS lookups and TLS sessions are reused across requests.
//!
//! Clients carry no overall request timeout: callers set one per request with
//! `RequestBuilder::timeout`, since a registry fetch and a peer forward have very
//! different budgets.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use reqwest::Url;
use std::time::Duration;

/// Global cache of HTTP clients indexed by origin (`scheme://host:port`).
static CLIENT_POOL: Lazy<DashMap<String, reqwest::Client>> = Lazy::new(DashMap::new);

/// Creates or retrieves a shared HTTP client for the origin of `url`.
///
/// Unparseable URLs share a single fallback entry; the request itself will then fail
/// with a proper error at send time.
pub fn get_or_create_client(url: &str) -> reqwest::Client {
    CLIENT_POOL
        .entry(origin_key(url))
        .or_insert_with(create_pooled_client)
        .clone()
}

fn origin_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => "invalid".to_string(),
    }
}

/// Creates a new reqwest client with connection pooling settings.
///
/// - `pool_max_idle_per_host(32)`: idle connections kept per host
/// - `pool_idle_timeout(90s)`: how long idle connections survive
/// - `tcp_keepalive(60s)`: keepalive probe interval
/// - `connect_timeout(10s)`: upper bound on establishing a connection
fn create_pooled_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(32)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|err| {
            log::warn!(
                "http_client_pool: failed to build tuned client ({}), using defaults",
                err
            );
            reqwest::Client::new()
        })
}
