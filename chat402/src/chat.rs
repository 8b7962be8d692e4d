//! Request and response bodies of the metered chat endpoint.

use serde::{Deserialize, Serialize};

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the turn: `"user"`, `"assistant"` or `"system"`.
    pub role: String,
    /// Text of the turn. A missing value is treated as empty.
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    /// A `"user"` turn with the given text.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Body of a successful `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Always `"assistant"`.
    pub role: String,
    /// The generated reply.
    pub content: String,
    /// Model that produced the reply.
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_content_defaults_to_empty() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user"}]}"#).unwrap();
        assert_eq!(req.messages[0].content, "");
    }

    #[test]
    fn request_without_messages_is_rejected() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"prompt":"hi"}"#).is_err());
    }
}
