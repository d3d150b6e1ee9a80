//! Agent-facts catalog used by `/search`.
//!
//! Catalog entries follow the NANDA agent-facts layout. Only the fields the selector and
//! the router need are modelled; everything else is ignored on the way in.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::agent_twin::http_client_pool::get_or_create_client;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveResolver {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default, rename = "static")]
    pub static_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_resolver: Option<AdaptiveResolver>,
}

// Catalogs publish `null` for fields they do not fill in.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One agent as advertised by the catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCatalogEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<Skill>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoints: Endpoints,
}

impl AgentCatalogEntry {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_static_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.static_urls.push(url.into());
        self
    }

    pub fn with_skill(mut self, id: impl Into<String>) -> Self {
        self.skills.push(Skill {
            id: id.into(),
            description: None,
        });
        self
    }

    /// First static endpoint, otherwise the adaptive resolver's URL.
    pub fn preferred_endpoint(&self) -> Option<&str> {
        self.endpoints
            .static_urls
            .iter()
            .map(String::as_str)
            .find(|url| !url.is_empty())
            .or_else(|| {
                self.endpoints
                    .adaptive_resolver
                    .as_ref()
                    .and_then(|resolver| resolver.url.as_deref())
                    .filter(|url| !url.is_empty())
            })
    }

    pub fn skill_ids(&self) -> Vec<&str> {
        self.skills.iter().map(|skill| skill.id.as_str()).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogPayload {
    List(Vec<serde_json::Value>),
    Wrapped { agents: Vec<serde_json::Value> },
}

/// Parse a catalog body. Returns `None` when it matches neither accepted shape.
/// Individual entries that fail to parse are dropped.
pub fn parse_catalog_payload(body: &str) -> Option<Vec<AgentCatalogEntry>> {
    let payload: CatalogPayload = serde_json::from_str(body).ok()?;
    let raw = match payload {
        CatalogPayload::List(entries) => entries,
        CatalogPayload::Wrapped { agents } => agents,
    };
    Some(
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<AgentCatalogEntry>(value) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("catalog: dropping malformed entry: {}", err);
                    None
                }
            })
            .collect(),
    )
}

/// Fetches the catalog fresh on every call.
pub struct CatalogClient {
    url: String,
    timeout: Duration,
}

impl CatalogClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// All catalog entries; an unreachable or malformed catalog yields an empty list.
    pub async fn fetch(&self) -> Vec<AgentCatalogEntry> {
        let response = match get_or_create_client(&self.url)
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                log::warn!("catalog: fetch from {} failed: {}", self.url, err);
                return Vec::new();
            }
        };
        if !response.status().is_success() {
            log::warn!("catalog: {} returned {}", self.url, response.status());
            return Vec::new();
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                log::warn!("catalog: reading {} failed: {}", self.url, err);
                return Vec::new();
            }
        };
        parse_catalog_payload(&body).unwrap_or_else(|| {
            log::warn!("catalog: {} returned an unrecognised payload", self.url);
            Vec::new()
        })
    }
}
