//! Core types for streamed generation

use serde::{Deserialize, Serialize};

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Wire name used by chat-completions APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One turn of a conversation. Immutable once appended to a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Unix-millis creation timestamp
    pub created_at: i64,
}

impl Turn {
    /// Create a turn stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// One unit of streamed output from a generation source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fragment {
    /// A text chunk
    Token { text: String },
    /// End-of-generation marker
    Completion,
}

impl Fragment {
    /// Create a token fragment
    pub fn token(text: impl Into<String>) -> Self {
        Fragment::Token { text: text.into() }
    }
}

/// Configuration for a single generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Model identifier (e.g. "qwen-plus")
    pub model: String,
    /// Base URL of the chat-completions endpoint
    pub base_url: String,
    /// System prompt prepended to every call
    pub system_prompt: Option<String>,
    /// Maximum tokens per response
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "qwen-plus".to_string(),
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_constructors_stamp_role() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::assistant("ok").role, Role::Assistant);
        assert_eq!(Turn::system("rules").role, Role::System);
    }

    #[test]
    fn test_turn_has_timestamp() {
        let turn = Turn::user("hello");
        assert!(turn.created_at > 0);
    }

    #[test]
    fn test_fragment_serde_tagging() {
        let json = serde_json::to_string(&Fragment::token("hi")).unwrap();
        assert!(json.contains(r#""kind":"token"#), "got: {}", json);

        let done: Fragment = serde_json::from_str(r#"{"kind":"completion"}"#).unwrap();
        assert_eq!(done, Fragment::Completion);
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
        assert_eq!(Role::System.as_str(), "system");
    }
}
