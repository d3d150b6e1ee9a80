//! Directory of known peer agents.
//!
//! The [`Directory`] maps agent ids to [`AgentDescriptor`]s. It is filled from a central
//! registry ([`Directory::refresh`]) and by explicit registration, and is shared between
//! request handlers behind an `Arc`.
//!
//! # Registry payloads
//!
//! Registries in the wild answer with either a bare array or an object wrapping the array
//! under `agents`. Entries carry their id under `agent_id` (newer) or `username` (older)
//! and their URL under `endpoint` or `url`:
//!
//! ```json
//! [{"agent_id": "alice", "endpoint": "http://alice.example/a2a"}]
//! {"agents": [{"username": "bob", "url": "http://bob.example"}]}
//! ```
//!
//! Both shapes normalise into the same descriptor. URLs are stored with an `/a2a` suffix.
//!
//! # Consistency
//!
//! A refresh inserts entries one key at a time. Readers running concurrently may observe a
//! partially refreshed directory; they never observe a torn entry. When a payload lists the
//! same id twice, the later entry wins.

use dashmap::DashMap;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::agent_twin::http_client_pool::get_or_create_client;

/// Path suffix every stored endpoint carries.
pub const A2A_SUFFIX: &str = "/a2a";

/// One known peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub id: String,
    /// A2A endpoint URL, always ending in `/a2a`.
    pub endpoint: String,
    pub capabilities: BTreeSet<String>,
    pub label: Option<String>,
    pub description: Option<String>,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: normalize_endpoint(&endpoint.into()),
            capabilities: BTreeSet::new(),
            label: None,
            description: None,
        }
    }
}

/// Append `/a2a` to endpoints that do not already end with it.
pub fn normalize_endpoint(url: &str) -> String {
    if url.ends_with(A2A_SUFFIX) {
        url.to_string()
    } else {
        format!("{}{}", url.trim_end_matches('/'), A2A_SUFFIX)
    }
}

/// Failure of a registry fetch. The directory is left untouched when one is returned.
#[derive(Debug)]
pub enum DirectoryError {
    /// The registry could not be reached or the request timed out.
    Http(String),
    /// The registry answered with a non-success status.
    Status(u16),
    /// The body matched none of the accepted shapes.
    Malformed(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Http(msg) => write!(f, "Registry unreachable: {}", msg),
            DirectoryError::Status(status) => write!(f, "Registry returned status {}", status),
            DirectoryError::Malformed(msg) => write!(f, "Malformed registry payload: {}", msg),
        }
    }
}

impl Error for DirectoryError {}

/// Explicit registration failures.
#[derive(Debug, PartialEq, Eq)]
pub enum RegistrationError {
    EmptyId,
    EmptyUrl,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::EmptyId => write!(f, "agent_id must not be empty"),
            RegistrationError::EmptyUrl => write!(f, "agent_url must not be empty"),
        }
    }
}

impl Error for RegistrationError {}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegistryPayload {
    List(Vec<serde_json::Value>),
    Wrapped { agents: Vec<serde_json::Value> },
}

impl RegistryPayload {
    fn into_entries(self) -> Vec<serde_json::Value> {
        match self {
            RegistryPayload::List(entries) => entries,
            RegistryPayload::Wrapped { agents } => agents,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryEntry {
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Trimmed value, or `None` when blank.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a registry body into descriptors, skipping unusable entries and `self_id`.
///
/// Entries are returned in payload order, duplicates included.
pub fn parse_registry_payload(
    body: &str,
    self_id: &str,
) -> Result<Vec<AgentDescriptor>, DirectoryError> {
    let payload: RegistryPayload =
        serde_json::from_str(body).map_err(|e| DirectoryError::Malformed(e.to_string()))?;

    let mut descriptors = Vec::new();
    for raw in payload.into_entries() {
        let entry: RegistryEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("directory: skipping malformed registry entry: {}", err);
                continue;
            }
        };
        let id = match non_empty(entry.agent_id).or_else(|| non_empty(entry.username)) {
            Some(id) => id,
            None => continue,
        };
        if id == self_id {
            continue;
        }
        let url = match non_empty(entry.endpoint).or_else(|| non_empty(entry.url)) {
            Some(url) => url,
            None => {
                log::warn!("directory: skipping @{}, registry lists no endpoint", id);
                continue;
            }
        };
        descriptors.push(AgentDescriptor {
            endpoint: normalize_endpoint(&url),
            id,
            capabilities: entry.capabilities.into_iter().collect(),
            label: non_empty(entry.label).or_else(|| non_empty(entry.name)),
            description: entry.description,
        });
    }
    Ok(descriptors)
}

/// Shared, concurrently readable directory of peer agents.
pub struct Directory {
    self_id: String,
    registry_url: String,
    timeout: Duration,
    agents: DashMap<String, AgentDescriptor>,
}

impl Directory {
    /// Create an empty directory for the local agent `self_id` backed by `registry_url`.
    pub fn new(self_id: impl Into<String>, registry_url: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            registry_url: registry_url.into(),
            timeout: Duration::from_secs(10),
            agents: DashMap::new(),
        }
    }

    /// Override the registry fetch timeout (10 seconds by default).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Fetch the registry and merge its entries, returning how many were applied.
    ///
    /// On any failure the directory keeps its current contents.
    pub async fn refresh(&self) -> Result<usize, DirectoryError> {
        let result = self.fetch_descriptors().await;
        match result {
            Ok(descriptors) => {
                let count = self.apply(descriptors);
                log::info!(
                    "directory: fetched {} agents from {} ({} known)",
                    count,
                    self.registry_url,
                    self.agents.len()
                );
                Ok(count)
            }
            Err(err) => {
                log::warn!(
                    "directory: refresh from {} failed, keeping {} known agents: {}",
                    self.registry_url,
                    self.agents.len(),
                    err
                );
                Err(err)
            }
        }
    }

    async fn fetch_descriptors(&self) -> Result<Vec<AgentDescriptor>, DirectoryError> {
        let response = get_or_create_client(&self.registry_url)
            .get(&self.registry_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DirectoryError::Http(e.to_string()))?;
        parse_registry_payload(&body, &self.self_id)
    }

    /// Insert descriptors by key, later ones overwriting earlier ones.
    pub fn apply(&self, descriptors: Vec<AgentDescriptor>) -> usize {
        let mut applied = 0;
        for descriptor in descriptors {
            if descriptor.id.is_empty() || descriptor.id == self.self_id {
                continue;
            }
            log::debug!("directory: @{} -> {}", descriptor.id, descriptor.endpoint);
            self.agents.insert(descriptor.id.clone(), descriptor);
            applied += 1;
        }
        applied
    }

    pub fn lookup(&self, id: &str) -> Option<AgentDescriptor> {
        self.agents.get(id).map(|entry| entry.value().clone())
    }

    /// Insert or overwrite one peer. The URL is stored as given.
    pub fn register(
        &self,
        id: &str,
        url: &str,
    ) -> Result<Option<AgentDescriptor>, RegistrationError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(RegistrationError::EmptyId);
        }
        if url.trim().is_empty() {
            return Err(RegistrationError::EmptyUrl);
        }
        let descriptor = AgentDescriptor {
            id: id.to_string(),
            endpoint: url.trim().to_string(),
            capabilities: BTreeSet::new(),
            label: None,
            description: None,
        };
        log::info!("directory: registered @{} -> {}", id, descriptor.endpoint);
        Ok(self.agents.insert(id.to_string(), descriptor))
    }

    /// Remove one peer, returning whether it was known.
    pub fn unregister(&self, id: &str) -> bool {
        self.agents.remove(id).is_some()
    }

    /// Known ids in lexical order.
    pub fn known_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// id -> endpoint view, ordered by id.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.agents
            .iter()
            .map(|e| (e.key().clone(), e.value().endpoint.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
