//! Wire types for the HTTP surface.
//!
//! `A2ARequest`/`A2AResponse` are the message envelopes exchanged on `/a2a`; the query
//! and search types back `/query` and `/search`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

fn default_content_type() -> String {
    "text".to_string()
}

fn default_user_role() -> String {
    "user".to_string()
}

/// RFC 3339 timestamp for "now", UTC.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct A2AContent {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default = "default_content_type")]
    pub content_type: String,
}

impl A2AContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            content_type: default_content_type(),
        }
    }
}

impl Default for A2AContent {
    fn default() -> Self {
        Self::text("")
    }
}

/// Inbound `/a2a` message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct A2ARequest {
    #[serde(default)]
    pub content: A2AContent,
    #[serde(default = "default_user_role")]
    pub role: String,
    pub conversation_id: String,
}

impl A2ARequest {
    pub fn new(text: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            content: A2AContent::text(text),
            role: default_user_role(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Outbound `/a2a` reply. Always carries the request's conversation id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct A2AResponse {
    pub content: A2AContent,
    pub role: String,
    pub conversation_id: String,
    pub timestamp: String,
    /// Id of the agent that produced the reply (this twin).
    pub agent_id: String,
}

impl A2AResponse {
    pub fn assistant(
        text: impl Into<String>,
        conversation_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            content: A2AContent::text(text),
            role: "assistant".to_string(),
            conversation_id: conversation_id.into(),
            timestamp: now_rfc3339(),
            agent_id: agent_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub timestamp: String,
    /// Seconds spent producing the answer.
    pub processing_time: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedAgent {
    pub id: String,
    pub label: String,
    pub description: String,
    pub endpoint: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub selected_agent: SelectedAgent,
    pub agent_response: String,
    pub timestamp: String,
    pub processing_time: f64,
}
