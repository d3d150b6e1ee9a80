//! The local twin: an LLM-backed agent that answers direct questions on `/query`.
//!
//! An [`Agent`] carries identity (`id`, `name`) plus optional expertise, personality and
//! backstory. Those are folded into the system prompt of every call, the same way for
//! each question; no conversation state is kept between calls.
//!
//! ```rust,no_run
//! use agent_twin::Agent;
//! use agent_twin::clients::openai::{Model, OpenAIClient};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let twin = Agent::new(
//!     "mimo",
//!     "Mimo the Calico",
//!     Arc::new(OpenAIClient::new_with_model_enum("sk-...", Model::GPT4oMini)),
//! )
//! .with_expertise("cats, lizards, AI agents")
//! .with_personality("playful and curious");
//!
//! let answer = twin.answer("What is your favourite food?", "anonymous").await?;
//! # Ok(())
//! # }
//! ```

use std::error::Error;
use std::sync::Arc;

use crate::agent_twin::client_wrapper::{ClientWrapper, Message};

const ANSWER_INSTRUCTIONS: &str = "Answer the user's question clearly and accurately. \
If another agent is better suited, say so and suggest addressing it with @agent-id on /a2a.";

pub struct Agent {
    /// Stable identifier, also the id this twin registers under.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    pub expertise: Option<String>,
    pub personality: Option<String>,
    pub backstory: Option<String>,
    client: Arc<dyn ClientWrapper>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        client: Arc<dyn ClientWrapper>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            expertise: None,
            personality: None,
            backstory: None,
            client,
        }
    }

    pub fn with_expertise(mut self, expertise: impl Into<String>) -> Self {
        self.expertise = Some(expertise.into());
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = Some(backstory.into());
        self
    }

    /// System prompt with the agent's identity folded in ahead of `base_prompt`.
    fn augment_system_prompt(&self, base_prompt: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!("You are {}.\n", self.name));
        prompt.push_str(&format!("Your agent ID is: {}\n", self.id));

        if let Some(expertise) = &self.expertise {
            prompt.push_str(&format!("Your expertise: {}\n", expertise));
        }

        if let Some(personality) = &self.personality {
            prompt.push_str(&format!("Your approach: {}\n", personality));
        }

        if let Some(backstory) = &self.backstory {
            prompt.push('\n');
            prompt.push_str(backstory.trim());
            prompt.push('\n');
        }

        prompt.push('\n');
        prompt.push_str(base_prompt);

        prompt
    }

    /// Answer `question` on behalf of `user_id`.
    pub async fn answer(
        &self,
        question: &str,
        user_id: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        log::info!(
            "agent {}: answering question from {} ({} chars)",
            self.id,
            user_id,
            question.chars().count()
        );
        let messages = [
            Message::system(self.augment_system_prompt(ANSWER_INSTRUCTIONS)),
            Message::user(format!("[from {}] {}", user_id, question)),
        ];
        let reply = self.client.send_message(&messages, None).await?;
        Ok(reply.content.to_string())
    }
}
