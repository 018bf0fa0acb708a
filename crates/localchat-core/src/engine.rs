//! The engine capability boundary.
//!
//! An engine is whatever actually runs the model. The application only
//! ever sees two calls: [`EngineLoader::create`], which resolves to a
//! handle once the model is ready, and [`Engine::complete`], which turns a
//! full message history into a reply.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::state::Message;

/// Response length cap for every completion request.
pub const MAX_TOKENS: u32 = 500;

/// Progress sink handed to [`EngineLoader::create`]. Receives a fraction
/// in `[0, 1]`.
pub type ProgressFn = Box<dyn Fn(f64) + Send + Sync>;

/// Shared engine handle.
pub type EngineHandle = Arc<dyn Engine>;

#[derive(Default)]
pub struct CreateOptions {
    pub on_progress: Option<ProgressFn>,
}

impl CreateOptions {
    pub fn with_progress(on_progress: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            on_progress: Some(Box::new(on_progress)),
        }
    }

    pub fn report(&self, fraction: f64) {
        if let Some(cb) = &self.on_progress {
            cb(fraction.clamp(0.0, 1.0));
        }
    }
}

impl fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateOptions")
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub stream: bool,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Non-streaming request over the full history.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            stream: false,
            max_tokens: MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Completion {
    pub choices: Vec<Choice>,
}

impl Completion {
    /// Single-choice completion carrying `content` from the assistant.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: Message::assistant(content),
            }],
        }
    }

    /// Content of the first candidate.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, EngineError>;
}

#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn create(
        &self,
        model: &str,
        options: CreateOptions,
    ) -> Result<EngineHandle, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn request_defaults_to_non_streaming_with_token_cap() {
        let req = CompletionRequest::new(vec![Message::user("hi")]);
        assert!(!req.stream);
        assert_eq!(req.max_tokens, 500);
    }

    #[test]
    fn first_content_takes_first_choice() {
        let completion = Completion {
            choices: vec![
                Choice { message: Message::assistant("one") },
                Choice { message: Message::assistant("two") },
            ],
        };
        assert_eq!(completion.first_content(), Some("one"));
        assert_eq!(Completion { choices: vec![] }.first_content(), None);
    }

    #[test]
    fn report_clamps_fraction() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = CreateOptions::with_progress(move |f| sink.lock().unwrap().push(f));

        options.report(-0.5);
        options.report(0.25);
        options.report(1.7);

        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.25, 1.0]);
    }
}
