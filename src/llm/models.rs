use serde::{Deserialize, Serialize};

// Provider-neutral input for one completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// The two-message exchange every chat backend receives
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::new("system", &self.system),
            ChatMessage::new("user", &self.user),
        ]
    }
}

// Chat message as used by both the OpenAI-style and Ollama chat APIs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}
