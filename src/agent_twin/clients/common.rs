use crate::agent_twin::client_wrapper::{ClientError, Message, SamplingOptions};
use openai_rust::chat;
use openai_rust2 as openai_rust;

/// Convert twin messages into the format expected by openai_rust.
pub fn to_chat_messages(messages: &[Message]) -> Vec<chat::Message> {
    messages
        .iter()
        .map(|msg| chat::Message {
            role: msg.role.as_str().to_owned(),
            content: msg.content.to_string(),
        })
        .collect()
}

/// Build the request arguments, applying any per-call sampling overrides.
pub fn chat_arguments(
    model: &str,
    messages: &[Message],
    options: Option<SamplingOptions>,
) -> chat::ChatArguments {
    let mut chat_arguments = chat::ChatArguments::new(model, to_chat_messages(messages));
    if let Some(options) = options {
        chat_arguments.temperature = options.temperature;
        chat_arguments.max_tokens = options.max_tokens;
    }
    chat_arguments
}

/// Send a chat request and return the assistant's content.
pub async fn send_chat(
    api: &openai_rust::Client,
    chat_arguments: chat::ChatArguments,
    url_path: &str,
) -> Result<String, ClientError> {
    let response = api
        .create_chat(chat_arguments, Some(url_path.to_string()))
        .await
        .map_err(|err| {
            log::error!(
                "agent_twin::clients::common::send_chat(...): OpenAI API Error: {}",
                err
            );
            ClientError::Provider(err.to_string())
        })?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| ClientError::InvalidResponse("response has no choices".to_string()))
}
