//! A chat session: engine lifecycle, conversation, and the input field.
//!
//! The session is owned by a single task. Background work (engine creation,
//! completion requests) hands its results back through [`Session::apply`]
//! and [`Session::finish_submit`], so every mutation happens on the owner.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::controller::{Conversation, PendingCompletion};
use crate::engine::{Completion, EngineLoader};
use crate::error::EngineError;
use crate::lifecycle::{EngineLifecycle, LifecycleEvent};
use crate::state::Message;

/// Canned openers offered at the start of a conversation.
pub const QUICK_REPLIES: [&str; 4] = [
    "Hello!",
    "What can you do?",
    "Tell me a joke",
    "Help me with coding",
];

/// Pause between picking a quick reply and sending it.
pub const QUICK_REPLY_DELAY: Duration = Duration::from_millis(100);

/// Quick replies disappear once the visible log grows past this.
const QUICK_REPLY_MAX_VISIBLE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub initializing: bool,
    pub busy: bool,
    pub progress_text: String,
}

pub struct Session {
    model: String,
    input: String,
    lifecycle: EngineLifecycle,
    conversation: Conversation,
}

impl Session {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: String::new(),
            lifecycle: EngineLifecycle::new(),
            conversation: Conversation::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            initializing: self.lifecycle.is_initializing(),
            busy: self.conversation.is_busy(),
            progress_text: self.lifecycle.progress_text().to_string(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn is_initializing(&self) -> bool {
        self.lifecycle.is_initializing()
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.is_busy()
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Whether the user may type into the input field.
    pub fn accepts_input(&self) -> bool {
        !self.is_busy() && !self.is_initializing()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.lifecycle.take_notice()
    }

    // Engine lifecycle

    /// Start engine creation on a background task; see [`EngineLifecycle::spawn`].
    pub fn start_engine<F>(
        &mut self,
        loader: Arc<dyn EngineLoader>,
        sink: F,
    ) -> Result<JoinHandle<()>, EngineError>
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        let model = self.model.clone();
        self.lifecycle.spawn(loader, model, sink)
    }

    pub fn apply(&mut self, event: LifecycleEvent) {
        self.lifecycle.apply(event);
    }

    pub async fn initialize(&mut self, loader: &dyn EngineLoader) -> bool {
        let model = self.model.clone();
        self.lifecycle.initialize(loader, &model).await
    }

    // Submission

    pub fn begin_submit(&mut self, text: &str) -> Option<PendingCompletion> {
        let pending = self.conversation.begin_submit(text, self.lifecycle.handle())?;
        self.input.clear();
        Some(pending)
    }

    /// Submit whatever is in the input field.
    pub fn begin_submit_input(&mut self) -> Option<PendingCompletion> {
        let text = self.input.clone();
        self.begin_submit(&text)
    }

    pub fn finish_submit(&mut self, result: Result<Completion, EngineError>) {
        self.conversation.finish_submit(result);
    }

    pub async fn submit(&mut self, text: &str) -> bool {
        let Some(pending) = self.begin_submit(text) else {
            return false;
        };
        let result = pending.run().await;
        self.finish_submit(result);
        true
    }

    pub async fn submit_input(&mut self) -> bool {
        let text = self.input.clone();
        self.submit(&text).await
    }

    // Quick replies

    pub fn quick_replies_available(&self) -> bool {
        self.conversation.visible_count() <= QUICK_REPLY_MAX_VISIBLE
            && !self.is_busy()
            && !self.is_initializing()
    }

    /// Put quick reply `index` into the input field. The caller sends it
    /// after [`QUICK_REPLY_DELAY`].
    pub fn select_quick_reply(&mut self, index: usize) -> bool {
        if !self.quick_replies_available() {
            return false;
        }
        match QUICK_REPLIES.get(index) {
            Some(reply) => {
                self.input = reply.to_string();
                true
            }
            None => false,
        }
    }

    pub async fn choose_quick_reply(&mut self, index: usize) -> bool {
        if !self.select_quick_reply(index) {
            return false;
        }
        tokio::time::sleep(QUICK_REPLY_DELAY).await;
        self.submit_input().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FALLBACK_REPLY;
    use crate::state::SYSTEM_PROMPT;
    use crate::testing::{ScriptedEngine, ScriptedLoader};

    async fn ready_session(engine: Arc<ScriptedEngine>) -> Session {
        let loader = ScriptedLoader::succeeding(vec![0.5, 1.0], engine);
        let mut session = Session::new("tiny");
        assert!(session.initialize(&loader).await);
        session
    }

    #[test]
    fn new_session_is_initializing() {
        let session = Session::new("tiny");
        assert_eq!(
            session.status(),
            SessionStatus {
                initializing: true,
                busy: false,
                progress_text: String::new(),
            }
        );
        assert!(!session.accepts_input());
        assert!(!session.quick_replies_available());
    }

    #[tokio::test]
    async fn hello_scenario_through_input_field() {
        let mut session = ready_session(ScriptedEngine::replying(["Hi there!"])).await;

        session.set_input("Hello!");
        assert!(session.submit_input().await);

        assert_eq!(
            session.messages(),
            &[
                Message::system(SYSTEM_PROMPT),
                Message::user("Hello!"),
                Message::assistant("Hi there!"),
            ]
        );
        assert_eq!(session.input(), "");
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn failed_init_makes_every_submit_a_no_op() {
        let loader = ScriptedLoader::failing(vec![0.3]);
        let mut session = Session::new("tiny");
        assert!(!session.initialize(&loader).await);

        session.set_input("still typed");
        assert!(!session.submit_input().await);
        assert!(!session.submit("hello").await);

        assert_eq!(session.messages(), &[Message::system(SYSTEM_PROMPT)]);
        assert_eq!(session.input(), "still typed");
        assert!(session.take_notice().is_some());
    }

    #[tokio::test]
    async fn blank_input_is_not_cleared_or_sent() {
        let mut session = ready_session(ScriptedEngine::replying(["x"])).await;
        session.set_input("   ");

        assert!(session.begin_submit_input().is_none());
        assert_eq!(session.input(), "   ");
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn busy_gates_input_and_quick_replies() {
        let mut session = ready_session(ScriptedEngine::replying(["x"])).await;
        assert!(session.quick_replies_available());

        let pending = session.begin_submit("hi").unwrap();
        assert!(session.is_busy());
        assert!(!session.accepts_input());
        assert!(!session.quick_replies_available());
        assert!(!session.select_quick_reply(0));

        session.finish_submit(pending.run().await);
        assert!(session.accepts_input());
    }

    #[tokio::test]
    async fn quick_replies_hide_after_first_exchange() {
        let mut session = ready_session(ScriptedEngine::replying(["one", "two"])).await;

        assert!(session.submit("first").await);
        // Two visible messages is still within the limit.
        assert!(session.quick_replies_available());

        assert!(session.submit("second").await);
        assert!(!session.quick_replies_available());
    }

    #[tokio::test]
    async fn select_quick_reply_fills_input() {
        let mut session = ready_session(ScriptedEngine::replying(["x"])).await;

        assert!(session.select_quick_reply(2));
        assert_eq!(session.input(), "Tell me a joke");
        assert!(!session.select_quick_reply(QUICK_REPLIES.len()));
    }

    #[tokio::test(start_paused = true)]
    async fn choose_quick_reply_sends_after_delay() {
        let engine = ScriptedEngine::replying(["I can chat."]);
        let mut session = ready_session(engine.clone()).await;

        assert!(session.choose_quick_reply(1).await);

        assert_eq!(session.messages()[1], Message::user("What can you do?"));
        assert_eq!(session.messages()[2], Message::assistant("I can chat."));
        assert_eq!(engine.requests().len(), 1);
    }

    #[tokio::test]
    async fn engine_error_keeps_session_usable() {
        let engine = ScriptedEngine::new(vec![
            Err("oom".to_string()),
            Ok(Completion::from_content("fine")),
        ]);
        let mut session = ready_session(engine).await;

        assert!(session.submit("a").await);
        assert_eq!(session.messages().last(), Some(&Message::assistant(FALLBACK_REPLY)));

        assert!(session.submit("b").await);
        assert_eq!(session.messages().last(), Some(&Message::assistant("fine")));
    }
}
