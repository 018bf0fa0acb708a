pub mod ai;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use ai::{loader_for, OllamaClient, OllamaLoader, OpenAIClient, OpenAILoader};
pub use config::Config;
pub use controller::{Conversation, PendingCompletion, FALLBACK_REPLY};
pub use engine::{
    Completion, CompletionRequest, CreateOptions, Engine, EngineHandle, EngineLoader, MAX_TOKENS,
};
pub use error::EngineError;
pub use lifecycle::{format_progress, EngineLifecycle, LifecycleEvent, LOAD_FAILED_NOTICE};
pub use provider::Provider;
pub use session::{Session, SessionStatus, QUICK_REPLIES, QUICK_REPLY_DELAY};
pub use state::{Message, Role, SYSTEM_PROMPT};
