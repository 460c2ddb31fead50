//! Error types shared by the widget and its collaborators.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// No credential was entered or remembered.
    #[error("missing credential")]
    MissingCredential,

    /// The provider answered with a non-success status. The message is the
    /// provider's own description and is shown to the user verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Storage(err.to_string())
    }
}
