pub mod gemini;

pub use gemini::{GeminiClient, GeminiConnector};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::state::Message;

/// What gets sent for one turn: the model and the whole transcript so far.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    /// `None` when the provider answered without any text
    pub text: Option<String>,
}

/// A hosted model that turns a transcript into the next reply.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ChatError>;
}

/// Builds a service client from a credential. Fails when the credential
/// cannot be used to construct one.
pub trait ServiceConnector: Send + Sync {
    fn connect(&self, credential: &str) -> Result<Arc<dyn GenerationService>, ChatError>;
}
