pub mod ai;
pub mod config;
pub mod error;
pub mod render;
pub mod state;
pub mod storage;
pub mod widget;

// Re-export main types for convenience
pub use ai::{GeminiClient, GeminiConnector, GenerateRequest, GenerateResponse, GenerationService, ServiceConnector};
pub use config::Config;
pub use error::ChatError;
pub use render::{Bubble, BubbleKind};
pub use state::{Message, Part, Role, SessionState};
pub use storage::{CredentialStore, FileStore, KeyValueStore, MemoryStore};
pub use widget::{ChatWidget, Completion, Confirmation, Dispatch, Outcome, WidgetConfig};
