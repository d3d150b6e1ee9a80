//! Provider specific [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.
//!
//! Every OpenAI-compatible vendor (OpenAI itself, gateways, self-hosted servers) is reached
//! through [`openai::OpenAIClient`] with a different base URL.

pub mod common;
pub mod openai;
