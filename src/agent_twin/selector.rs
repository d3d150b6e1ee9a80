//! Choosing the best agent for a free-text query.
//!
//! Selection runs in two tiers behind one [`AgentSelector`]:
//!
//! 1. [`LlmSelection`] asks a language model to pick one catalog id (or none) and answer
//!    with `{"selected_agent_id": ..., "reasoning": ...}`.
//! 2. [`KeywordSelection`] is consulted whenever the model's answer is unusable: the call
//!    failed, the text is not that JSON object, or the id is not in the catalog. It returns
//!    the first entry whose label or description contains the query, case-insensitively.
//!
//! An explicit "no match" from the model (`null` id) is respected and ends the search.
//!
//! ```rust,no_run
//! use agent_twin::catalog::AgentCatalogEntry;
//! use agent_twin::selector::AgentSelector;
//! use agent_twin::clients::openai::{Model, OpenAIClient};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let client = Arc::new(OpenAIClient::new_with_model_enum("sk-...", Model::GPT4oMini));
//! let selector = AgentSelector::with_llm(client);
//! let catalog = vec![AgentCatalogEntry::new("mailer", "Mailer", "Sends email")];
//! let picked = selector.select("send an email", &catalog).await;
//! # }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::agent_twin::catalog::{AgentCatalogEntry, Endpoints};
use crate::agent_twin::client_wrapper::{ClientWrapper, SamplingOptions};

/// Sampling temperature used for the selection call.
pub const SELECTION_TEMPERATURE: f32 = 0.3;

/// The primary strategy could not produce a usable decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedSelection(pub String);

impl fmt::Display for MalformedSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed selection: {}", self.0)
    }
}

impl Error for MalformedSelection {}

/// One way of picking an agent.
///
/// `Ok(None)` is a definitive "nothing fits"; `Err` means "ask someone else".
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    async fn choose(
        &self,
        query: &str,
        catalog: &[AgentCatalogEntry],
    ) -> Result<Option<AgentCatalogEntry>, MalformedSelection>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct AgentSummary<'a> {
    id: &'a str,
    label: &'a str,
    description: &'a str,
    skills: Vec<&'a str>,
    endpoints: &'a Endpoints,
}

/// Render the routing prompt for `query` over `catalog`.
pub fn build_selection_prompt(query: &str, catalog: &[AgentCatalogEntry]) -> String {
    let summaries: Vec<AgentSummary> = catalog
        .iter()
        .map(|entry| AgentSummary {
            id: &entry.id,
            label: &entry.label,
            description: &entry.description,
            skills: entry.skill_ids(),
            endpoints: &entry.endpoints,
        })
        .collect();
    let agents_json = serde_json::to_string_pretty(&summaries).unwrap_or_else(|_| "[]".into());

    format!(
        r#"You are an agent router. Given a user query and a list of available agents, select the single best agent to handle the query.

User Query: "{query}"

Available Agents:
{agents_json}

Analyze the query and select the ONE agent that best matches the user's intent. Consider:
- The agent's description and label
- The agent's skills
- How well the agent's capabilities match the query

Respond with ONLY a JSON object in this exact format:
{{
    "selected_agent_id": "the id of the selected agent",
    "reasoning": "brief explanation of why this agent was selected"
}}

If no agent is suitable, respond with:
{{
    "selected_agent_id": null,
    "reasoning": "explanation of why no agent matches"
}}
"#
    )
}

/// Strip Markdown code fences around a model answer.
///
/// A ```` ```json ```` fence wins over a bare ```` ``` ```` fence; text without fences is
/// only trimmed.
pub fn unwrap_code_fence(text: &str) -> &str {
    let text = text.trim();
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };
    inner.trim()
}

/// Read the model's answer: `Ok(Some(id))`, `Ok(None)` for an explicit no-match.
pub fn parse_selection(text: &str) -> Result<Option<String>, MalformedSelection> {
    let body = unwrap_code_fence(text);
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| MalformedSelection(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| MalformedSelection("expected a JSON object".to_string()))?;
    if let Some(reasoning) = object.get("reasoning").and_then(|r| r.as_str()) {
        log::debug!("selector: model reasoning: {}", reasoning);
    }
    match object.get("selected_agent_id") {
        Some(serde_json::Value::String(id)) if id.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(id)) => Ok(Some(id.trim().to_string())),
        Some(serde_json::Value::Null) => Ok(None),
        Some(other) => Err(MalformedSelection(format!(
            "selected_agent_id is not a string: {}",
            other
        ))),
        None => Err(MalformedSelection(
            "missing selected_agent_id".to_string(),
        )),
    }
}

/// Model-backed strategy.
pub struct LlmSelection {
    client: Arc<dyn ClientWrapper>,
    temperature: f32,
}

impl LlmSelection {
    pub fn new(client: Arc<dyn ClientWrapper>) -> Self {
        Self {
            client,
            temperature: SELECTION_TEMPERATURE,
        }
    }
}

#[async_trait]
impl SelectionStrategy for LlmSelection {
    async fn choose(
        &self,
        query: &str,
        catalog: &[AgentCatalogEntry],
    ) -> Result<Option<AgentCatalogEntry>, MalformedSelection> {
        let prompt = build_selection_prompt(query, catalog);
        let reply = self
            .client
            .complete(&prompt, Some(SamplingOptions::with_temperature(self.temperature)))
            .await
            .map_err(|e| MalformedSelection(format!("model call failed: {}", e)))?;

        match parse_selection(&reply)? {
            None => Ok(None),
            Some(id) => catalog
                .iter()
                .find(|entry| entry.id == id)
                .cloned()
                .map(Some)
                .ok_or_else(|| MalformedSelection(format!("unknown agent id '{}'", id))),
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Deterministic substring strategy.
#[derive(Default)]
pub struct KeywordSelection;

#[async_trait]
impl SelectionStrategy for KeywordSelection {
    async fn choose(
        &self,
        query: &str,
        catalog: &[AgentCatalogEntry],
    ) -> Result<Option<AgentCatalogEntry>, MalformedSelection> {
        Ok(keyword_match(query, catalog).cloned())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// First entry whose description or label contains `query`, ignoring case.
pub fn keyword_match<'a>(
    query: &str,
    catalog: &'a [AgentCatalogEntry],
) -> Option<&'a AgentCatalogEntry> {
    let needle = query.to_lowercase();
    catalog.iter().find(|entry| {
        entry.description.to_lowercase().contains(&needle)
            || entry.label.to_lowercase().contains(&needle)
    })
}

/// Primary strategy with a fallback.
pub struct AgentSelector {
    primary: Box<dyn SelectionStrategy>,
    fallback: Box<dyn SelectionStrategy>,
}

impl AgentSelector {
    pub fn new(primary: Box<dyn SelectionStrategy>, fallback: Box<dyn SelectionStrategy>) -> Self {
        Self { primary, fallback }
    }

    /// LLM first, keyword match as fallback.
    pub fn with_llm(client: Arc<dyn ClientWrapper>) -> Self {
        Self::new(
            Box::new(LlmSelection::new(client)),
            Box::new(KeywordSelection),
        )
    }

    pub async fn select(
        &self,
        query: &str,
        catalog: &[AgentCatalogEntry],
    ) -> Option<AgentCatalogEntry> {
        if catalog.is_empty() {
            return None;
        }
        match self.primary.choose(query, catalog).await {
            Ok(choice) => {
                log::info!(
                    "selector: {} strategy chose {:?}",
                    self.primary.name(),
                    choice.as_ref().map(|entry| entry.id.as_str())
                );
                choice
            }
            Err(err) => {
                log::warn!(
                    "selector: {} strategy unusable ({}), falling back to {}",
                    self.primary.name(),
                    err,
                    self.fallback.name()
                );
                self.fallback.choose(query, catalog).await.unwrap_or(None)
            }
        }
    }
}
