//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI's Chat Completions API
//! and any OpenAI-compatible endpoint (self-hosted gateways, proxies, other vendors'
//! compatibility surfaces).
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_twin::clients::openai::{OpenAIClient, Model};
//! use agent_twin::client_wrapper::{ClientWrapper, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let secret_key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new_with_model_enum(&secret_key, Model::GPT4oMini);
//!
//!     let resp = client
//!         .send_message(
//!             &[Message::system("You are an assistant."), Message::user("Hello!")],
//!             None,
//!         )
//!         .await?;
//!     println!("Assistant: {}", resp.content);
//!     Ok(())
//! }
//! ```
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use openai_rust2 as openai_rust;
use reqwest::Url;

use crate::agent_twin::client_wrapper::{
    ClientError, ClientWrapper, Message, Role, SamplingOptions,
};
use crate::agent_twin::clients::common::{chat_arguments, send_chat};
use crate::agent_twin::http_client_pool::get_or_create_client;

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model identifiers commonly used by the twin.
pub enum Model {
    /// `gpt-4o` – Omni model with text + image inputs.
    GPT4o,
    /// `gpt-4o-mini` – cost effective GPT-4o derivative, the twin's default.
    GPT4oMini,
    /// `gpt-4.1` – general availability GPT-4.1.
    GPT41,
    /// `gpt-4.1-mini` – reduced cost GPT-4.1 tier.
    GPT41Mini,
    /// `gpt-4.1-nano` – ultra low cost GPT-4.1 derivative.
    GPT41Nano,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::GPT4o => "gpt-4o".to_string(),
        Model::GPT4oMini => "gpt-4o-mini".to_string(),
        Model::GPT41 => "gpt-4.1".to_string(),
        Model::GPT41Mini => "gpt-4.1-mini".to_string(),
        Model::GPT41Nano => "gpt-4.1-nano".to_string(),
    }
}

/// Client wrapper for OpenAI-compatible chat completion endpoints.
///
/// Requests go through the `openai_rust` SDK client, which shares the pooled
/// `reqwest::Client` for the provider's origin from
/// [`http_client_pool`](crate::agent_twin::http_client_pool).
pub struct OpenAIClient {
    /// Underlying SDK client pointing at the REST endpoint.
    client: openai_rust::Client,
    /// Base URL without the trailing `/chat/completions`.
    base_url: String,
    /// Path the SDK posts to; the SDK replaces the base URL's path with it.
    completions_path: String,
    /// Model name that will be injected into each request.
    model: String,
    timeout: Duration,
}

impl OpenAIClient {
    /// Construct a new client using the provided API key and [`Model`] variant.
    pub fn new_with_model_enum(secret_key: &str, model: Model) -> Self {
        Self::new_with_model_string(secret_key, &model_to_string(model))
    }

    /// Construct a new client using the provided API key and explicit model name.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(secret_key, model_name, DEFAULT_BASE_URL)
    }

    /// Construct a client targeting a custom OpenAI compatible base URL.
    ///
    /// An unparseable base URL is logged and replaced by [`DEFAULT_BASE_URL`].
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        let (base_url, completions_path) = match Url::parse(base_url.trim_end_matches('/')) {
            Ok(parsed) => (
                parsed.as_str().trim_end_matches('/').to_string(),
                format!("{}/chat/completions", parsed.path().trim_end_matches('/')),
            ),
            Err(err) => {
                log::warn!(
                    "OpenAIClient: invalid base URL {:?} ({}), using {}",
                    base_url,
                    err,
                    DEFAULT_BASE_URL
                );
                (
                    DEFAULT_BASE_URL.to_string(),
                    "/v1/chat/completions".to_string(),
                )
            }
        };

        OpenAIClient {
            client: openai_rust::Client::new_with_client_and_base_url(
                secret_key,
                get_or_create_client(&base_url),
                &base_url,
            ),
            base_url,
            completions_path,
            model: model_name.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Convenience helper wrapping [`OpenAIClient::new_with_base_url`] for strongly typed models.
    pub fn new_with_base_url_and_model_enum(
        secret_key: &str,
        model: Model,
        base_url: &str,
    ) -> Self {
        Self::new_with_base_url(secret_key, &model_to_string(model), base_url)
    }

    /// Override the per-request timeout (60 seconds by default). Provider retries count
    /// against the same budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_path(&self) -> &str {
        &self.completions_path
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        options: Option<SamplingOptions>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let chat_arguments = chat_arguments(&self.model, messages, options);

        let result = tokio::time::timeout(
            self.timeout,
            send_chat(&self.client, chat_arguments, self.completions_path()),
        )
        .await;

        let content = match result {
            Ok(reply) => reply?,
            Err(_) => {
                log::error!(
                    "OpenAIClient::send_message(...): no reply within {:?}",
                    self.timeout
                );
                return Err(Box::new(ClientError::Transport(format!(
                    "request timed out after {:?}",
                    self.timeout
                ))));
            }
        };

        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(content.as_str()),
        })
    }
}
