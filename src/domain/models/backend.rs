#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use strum::EnumVariantNames;

use super::Attachment;
use super::Message;
use super::Sender;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// A history entry in the backend's vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn from_message(message: &Message) -> ChatMessage {
        let role = match message.sender {
            Sender::User => ChatRole::User,
            Sender::Ai => ChatRole::Assistant,
        };

        return ChatMessage {
            role,
            content: message.content.to_string(),
        };
    }

    pub fn from_history(messages: &[Message]) -> Vec<ChatMessage> {
        return messages
            .iter()
            .map(|message| return ChatMessage::from_message(message))
            .collect();
    }
}

/// Which conversational route of the API plain prompts are sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumVariantNames, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ChatEndpoint {
    Chat,
    Agent,
}

impl ChatEndpoint {
    pub fn parse(text: String) -> Option<ChatEndpoint> {
        return text.parse::<ChatEndpoint>().ok();
    }
}

#[async_trait]
pub trait Backend {
    /// Used at startup to verify the API is reachable before the first prompt.
    async fn health_check(&self) -> Result<()>;

    /// Sends a prompt along with the prior conversation and returns the
    /// complete answer.
    async fn send_message(&self, prompt: &str, history: &[ChatMessage]) -> Result<String>;

    /// Uploads a document on its own and returns the backend's analysis.
    async fn send_file(&self, file: &Attachment) -> Result<String>;

    /// Uploads a document together with a prompt about it and the prior
    /// conversation.
    async fn analyze_document_with_prompt(
        &self,
        file: &Attachment,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String>;
}

pub type BackendBox = Arc<dyn Backend + Send + Sync>;
