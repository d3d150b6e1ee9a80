//! Forwarding of routed messages to peer agents.
//!
//! Peers expose two endpoints: `/a2a` (envelope in, envelope out) and `/query`
//! (`{"question", "user_id"}` in, `{"answer", ...}` out). The forwarder always talks to
//! `/query`, so a routed message is answered by the peer itself and never re-routed.

use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::agent_twin::directory::{Directory, A2A_SUFFIX};
use crate::agent_twin::http_client_pool::get_or_create_client;

pub const QUERY_SUFFIX: &str = "/query";

/// Rewrite an agent endpoint to its direct-query endpoint.
///
/// `.../a2a` becomes `.../query`, `.../query` is kept, anything else gets `/query`
/// appended.
pub fn to_query_endpoint(url: &str) -> String {
    if let Some(base) = url.strip_suffix(A2A_SUFFIX) {
        format!("{}{}", base, QUERY_SUFFIX)
    } else if url.ends_with(QUERY_SUFFIX) {
        url.to_string()
    } else {
        format!("{}{}", url.trim_end_matches('/'), QUERY_SUFFIX)
    }
}

/// Why a forward did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// The target is not in the directory. `known` lists the ids that are.
    UnknownAgent { agent_id: String, known: Vec<String> },
    /// The peer did not answer within the configured bound.
    Timeout { agent_id: String },
    /// Connection failure or non-2xx answer.
    Transport { agent_id: String, message: String },
}

impl ForwardError {
    pub fn agent_id(&self) -> &str {
        match self {
            ForwardError::UnknownAgent { agent_id, .. }
            | ForwardError::Timeout { agent_id }
            | ForwardError::Transport { agent_id, .. } => agent_id,
        }
    }
}

impl fmt::Display for ForwardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardError::UnknownAgent { agent_id, known } => write!(
                f,
                "Agent '{}' not found. Known agents: [{}]",
                agent_id,
                known.join(", ")
            ),
            ForwardError::Timeout { agent_id } => {
                write!(f, "Timeout connecting to agent '{}'", agent_id)
            }
            ForwardError::Transport { agent_id, message } => write!(
                f,
                "Error communicating with agent '{}': {}",
                agent_id, message
            ),
        }
    }
}

impl Error for ForwardError {}

#[derive(Serialize)]
struct QueryBody<'a> {
    question: &'a str,
    user_id: &'a str,
}

/// Sends routed messages to peers resolved through a shared [`Directory`].
pub struct Forwarder {
    directory: Arc<Directory>,
    caller_identity: String,
    timeout: Duration,
}

impl Forwarder {
    /// `caller_identity` is sent as `user_id` on every call (e.g. `agent-mimo`).
    pub fn new(directory: Arc<Directory>, caller_identity: impl Into<String>) -> Self {
        Self {
            directory,
            caller_identity: caller_identity.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the per-call timeout (30 seconds by default).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn caller_identity(&self) -> &str {
        &self.caller_identity
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Deliver `message` to the agent registered as `target_id` and return its answer.
    ///
    /// Exactly one attempt is made; unknown targets never touch the network.
    pub async fn forward(
        &self,
        target_id: &str,
        message: &str,
        conversation_id: &str,
    ) -> Result<String, ForwardError> {
        let descriptor = match self.directory.lookup(target_id) {
            Some(descriptor) => descriptor,
            None => {
                return Err(ForwardError::UnknownAgent {
                    agent_id: target_id.to_string(),
                    known: self.directory.known_ids(),
                })
            }
        };

        let url = to_query_endpoint(&descriptor.endpoint);
        log::info!(
            "forwarder: conversation {} -> @{} at {}",
            conversation_id,
            target_id,
            url
        );
        self.post_query(target_id, &url, message, &self.caller_identity)
            .await
    }

    /// Ask the `/query` endpoint at `url` directly, bypassing the directory.
    pub async fn query_url(
        &self,
        url: &str,
        question: &str,
        user_id: &str,
    ) -> Result<String, ForwardError> {
        self.post_query(url, url, question, user_id).await
    }

    async fn post_query(
        &self,
        label: &str,
        url: &str,
        question: &str,
        user_id: &str,
    ) -> Result<String, ForwardError> {
        let response = get_or_create_client(url)
            .post(url)
            .timeout(self.timeout)
            .json(&QueryBody { question, user_id })
            .send()
            .await
            .map_err(|err| classify(label, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Transport {
                agent_id: label.to_string(),
                message: format!("peer returned status {}", status),
            });
        }

        let body = response.text().await.map_err(|err| classify(label, err))?;
        Ok(extract_answer(&body))
    }
}

fn classify(label: &str, err: reqwest::Error) -> ForwardError {
    if err.is_timeout() {
        ForwardError::Timeout {
            agent_id: label.to_string(),
        }
    } else {
        ForwardError::Transport {
            agent_id: label.to_string(),
            message: err.to_string(),
        }
    }
}

/// `answer` of a JSON body when it is a string, the whole JSON otherwise, and the raw
/// text when the body is not JSON at all.
pub fn extract_answer(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("answer") {
            Some(serde_json::Value::String(answer)) => answer.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => value.to_string(),
        },
        Err(_) => body.to_string(),
    }
}
