//! UI-agnostic session state types
//!
//! These types are shared by every front end and do not depend on any UI
//! framework. `Message` serializes to the same `{ role, parts: [{ text }] }`
//! shape the generation service expects, so the transcript is sent as-is.

use serde::{Deserialize, Serialize};

/// Greeting shown when a widget is first mounted.
pub const GREETING: &str = "👋 Hi, this is the Gemini helper. What would you like to talk about?";

/// Greeting that replaces the transcript after a confirmed reset.
pub const CLEARED_GREETING: &str =
    "👋 History cleared! Ready for a new conversation. What can I help with?";

/// Who contributed a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    /// Label shown above a bubble
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Model => "Gemini",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    /// All parts joined with newlines
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything a widget instance knows about the current session.
///
/// Only the widget writes to this; front ends read it to render.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub model: String,
    pub transcript: Vec<Message>,
    pub draft: String,
    pub credential: String,
    pub remember_credential: bool,
    pub busy: bool,
    pub last_error: String,
}

impl SessionState {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            transcript: vec![Message::model(GREETING)],
            draft: String::new(),
            credential: String::new(),
            remember_credential: true,
            busy: false,
            last_error: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_in_wire_shape() {
        let msg = Message::user("Hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "role": "user", "parts": [{ "text": "Hello" }] })
        );
    }

    #[test]
    fn model_role_round_trips_lowercase() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"model","parts":[{"text":"Hi"}]}"#).unwrap();
        assert_eq!(msg.role, Role::Model);
        assert_eq!(msg.text(), "Hi");
    }

    #[test]
    fn text_joins_parts_with_newlines() {
        let msg = Message {
            role: Role::Model,
            parts: vec![
                Part { text: "first".into() },
                Part { text: "second".into() },
            ],
        };
        assert_eq!(msg.text(), "first\nsecond");
    }

    #[test]
    fn new_session_is_seeded_with_greeting() {
        let state = SessionState::new("gemini-2.5-flash");
        assert_eq!(state.transcript, vec![Message::model(GREETING)]);
        assert!(!state.busy);
        assert!(state.last_error.is_empty());
    }
}
