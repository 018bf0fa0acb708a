//! Conversation controller: the message log and the busy guard.
//!
//! A submission runs in two phases. [`Conversation::begin_submit`] checks the
//! preconditions, appends the user message and marks the conversation busy,
//! all synchronously. The returned [`PendingCompletion`] is awaited wherever
//! the caller likes, and its result goes back through
//! [`Conversation::finish_submit`], which appends the reply and clears busy.

use crate::engine::{Completion, CompletionRequest, EngineHandle};
use crate::error::EngineError;
use crate::state::{Message, SYSTEM_PROMPT};

/// Reply appended when the engine rejects a completion request.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// An issued completion request, not yet resolved.
pub struct PendingCompletion {
    engine: EngineHandle,
    request: CompletionRequest,
}

impl PendingCompletion {
    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }

    pub async fn run(self) -> Result<Completion, EngineError> {
        self.engine.complete(&self.request).await
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    busy: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_system_prompt(SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: &str) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
            busy: false,
        }
    }

    /// Full log, system seed included.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages shown to the user.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_visible())
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Phase one. Returns `None` without touching any state when the text is
    /// blank, a request is already in flight, or there is no engine.
    pub fn begin_submit(
        &mut self,
        text: &str,
        engine: Option<&EngineHandle>,
    ) -> Option<PendingCompletion> {
        if text.trim().is_empty() {
            tracing::debug!("ignoring blank submission");
            return None;
        }
        if self.busy {
            tracing::debug!("ignoring submission while a completion is in flight");
            return None;
        }
        let Some(engine) = engine else {
            tracing::debug!("ignoring submission without an engine");
            return None;
        };

        self.messages.push(Message::user(text));
        self.busy = true;
        tracing::debug!(history = self.messages.len(), "sending completion request");

        Some(PendingCompletion {
            engine: engine.clone(),
            request: CompletionRequest::new(self.messages.clone()),
        })
    }

    /// Phase two. Appends exactly one assistant message and clears busy.
    pub fn finish_submit(&mut self, result: Result<Completion, EngineError>) {
        if !self.busy {
            tracing::warn!("completion result arrived with no request in flight");
            return;
        }

        let reply = match result {
            Ok(completion) => match completion.first_content() {
                Some(content) => content.to_string(),
                None => {
                    tracing::warn!(error = %EngineError::EmptyResponse, "completion failed");
                    FALLBACK_REPLY.to_string()
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "completion failed");
                FALLBACK_REPLY.to_string()
            }
        };

        self.messages.push(Message::assistant(reply));
        self.busy = false;
    }

    /// Both phases back to back. Returns whether a request was issued.
    pub async fn submit(&mut self, text: &str, engine: Option<&EngineHandle>) -> bool {
        let Some(pending) = self.begin_submit(text, engine) else {
            return false;
        };
        let result = pending.run().await;
        self.finish_submit(result);
        true
    }
}
