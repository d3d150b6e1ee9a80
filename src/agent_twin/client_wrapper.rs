use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// A ClientWrapper is a wrapper around a specific hosted LLM service.
/// It provides a common interface so the twin, the agent selector and the tests can
/// talk to "a language model" without knowing which vendor sits behind it.
/// It does not keep track of any conversation, every call is self-contained.
// src/agent_twin/client_wrapper

/// Represents the possible roles for a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    // set by the developer to steer the model's responses
    User,
    // a message sent by a human user (or a peer agent)
    Assistant, // lets the model know the content was generated as a response to a user message
}

impl Role {
    /// Wire name used by OpenAI-compatible chat APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: Arc<str>,
}

impl Message {
    pub fn system(content: impl AsRef<str>) -> Self {
        Message {
            role: Role::System,
            content: Arc::from(content.as_ref()),
        }
    }

    pub fn user(content: impl AsRef<str>) -> Self {
        Message {
            role: Role::User,
            content: Arc::from(content.as_ref()),
        }
    }
}

/// Per-call sampling knobs. `None` fields are left to the provider's defaults.
#[derive(Clone, Debug, Default)]
pub struct SamplingOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl SamplingOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        SamplingOptions {
            temperature: Some(temperature),
            max_tokens: None,
        }
    }
}

/// Errors raised by the bundled client implementations.
#[derive(Debug)]
pub enum ClientError {
    /// No reply arrived within the client's time budget.
    Transport(String),
    /// The provider call failed: connection error, non-success status, or unparseable body.
    Provider(String),
    /// The provider answered 2xx but the body was not a usable completion.
    InvalidResponse(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "LLM transport error: {}", msg),
            ClientError::Provider(msg) => write!(f, "LLM provider error: {}", msg),
            ClientError::InvalidResponse(msg) => write!(f, "Invalid LLM response: {}", msg),
        }
    }
}

impl Error for ClientError {}

/// Trait defining the interface to interact with various LLM services.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send a message to the LLM and get a response.
    /// - `messages`: The messages to send in the request.
    /// - `options`: Optional sampling overrides for this call only.
    async fn send_message(
        &self,
        messages: &[Message],
        options: Option<SamplingOptions>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;

    /// Model identifier this client injects into each request.
    fn model_name(&self) -> &str;

    /// Single-prompt convenience used by callers that do not need a transcript.
    async fn complete(
        &self,
        prompt: &str,
        options: Option<SamplingOptions>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let reply = self.send_message(&[Message::user(prompt)], options).await?;
        Ok(reply.content.to_string())
    }
}
