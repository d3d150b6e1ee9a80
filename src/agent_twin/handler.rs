//! The `/a2a` routing pipeline.
//!
//! Every inbound envelope goes through the same steps: audit `INCOMING`, parse the first
//! `@mention`, reject messages without one (`NO_TARGET`), audit `ROUTING`, forward the
//! cleaned text, then audit `SUCCESS` or `ERROR`. Messages are never answered locally on
//! this path; local answers live on `/query`.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::agent_twin::audit::{AuditEvent, AuditLog};
use crate::agent_twin::envelope::{A2ARequest, A2AResponse};
use crate::agent_twin::forwarder::{ForwardError, Forwarder};
use crate::agent_twin::mention;

/// Why a message could not be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// No `@mention` in the message. `message` is the user-facing explanation.
    NoTarget { message: String },
    Forward(ForwardError),
}

impl HandlerError {
    /// HTTP status the server answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::NoTarget { .. } => 400,
            HandlerError::Forward(ForwardError::UnknownAgent { .. }) => 404,
            HandlerError::Forward(ForwardError::Timeout { .. }) => 504,
            HandlerError::Forward(ForwardError::Transport { .. }) => 502,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::NoTarget { message } => write!(f, "{}", message),
            HandlerError::Forward(err) => write!(f, "{}", err),
        }
    }
}

impl Error for HandlerError {}

impl From<ForwardError> for HandlerError {
    fn from(err: ForwardError) -> Self {
        HandlerError::Forward(err)
    }
}

/// Explanation returned when a message names no agent.
pub fn no_target_message(raw: &str) -> String {
    format!(
        "No target agent specified. A2A messages must include @agent-id to route to another agent.\n\n\
         Your message: '{}'\n\n\
         Examples:\n\
         - '@john-agent Can you help with this?'\n\
         - '@research-bot What's the latest on AI?'\n\n\
         For direct queries to THIS agent, use POST /query instead.",
        raw
    )
}

/// Text returned to the sender after a successful forward.
pub fn forwarded_text(target: &str, answer: &str) -> String {
    format!("[Forwarded to @{}]\n\n{}", target, answer)
}

pub struct A2aHandler {
    agent_id: String,
    forwarder: Arc<Forwarder>,
    audit: Arc<AuditLog>,
}

impl A2aHandler {
    pub fn new(agent_id: impl Into<String>, forwarder: Arc<Forwarder>, audit: Arc<AuditLog>) -> Self {
        Self {
            agent_id: agent_id.into(),
            forwarder,
            audit,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub async fn handle(&self, request: &A2ARequest) -> Result<A2AResponse, HandlerError> {
        let conversation_id = request.conversation_id.as_str();
        let raw = request.content.text.as_str();

        self.audit
            .record_async(
                AuditEvent::Incoming,
                conversation_id,
                &[("role", request.role.as_str()), ("message", raw)],
            )
            .await;

        let decision = mention::parse(raw);
        let target = match decision.target {
            Some(target) => target,
            None => {
                self.audit
                    .record_async(AuditEvent::NoTarget, conversation_id, &[("message", raw)])
                    .await;
                return Err(HandlerError::NoTarget {
                    message: no_target_message(raw),
                });
            }
        };

        self.audit
            .record_async(
                AuditEvent::Routing,
                conversation_id,
                &[("target", target.as_str()), ("message", decision.clean.as_str())],
            )
            .await;

        match self
            .forwarder
            .forward(&target, &decision.clean, conversation_id)
            .await
        {
            Ok(answer) => {
                let length = answer.chars().count().to_string();
                self.audit
                    .record_async(
                        AuditEvent::Success,
                        conversation_id,
                        &[("target", target.as_str()), ("response_length", length.as_str())],
                    )
                    .await;
                Ok(A2AResponse::assistant(
                    forwarded_text(&target, &answer),
                    conversation_id,
                    self.agent_id.as_str(),
                ))
            }
            Err(err) => {
                let detail = err.to_string();
                self.audit
                    .record_async(
                        AuditEvent::Error,
                        conversation_id,
                        &[("target", target.as_str()), ("error", detail.as_str())],
                    )
                    .await;
                Err(err.into())
            }
        }
    }
}
