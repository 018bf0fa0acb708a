use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use localchat_core::{
    Completion, Config, EngineError, EngineLoader, LifecycleEvent, Provider, Session, QUICK_REPLIES,
    QUICK_REPLY_DELAY,
};

use crate::tui::AppEvent;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: Session,
    pub provider: Provider,
    pub server_url: String,

    // Input state (the text itself lives in the session)
    pub cursor: usize,

    // Chat pane state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Quick reply highlight (Tab cycles)
    pub quick_reply_idx: Option<usize>,

    // Blocking failure notice, shown until dismissed
    pub notice: Option<String>,

    // Animation state for the typing indicator
    pub animation_frame: u8,

    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            session: Session::new(config.model()),
            provider: config.provider(),
            server_url: config.server_url().to_string(),

            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            quick_reply_idx: None,
            notice: None,
            animation_frame: 0,

            events,
        }
    }

    /// Kick off the one engine creation for this session.
    pub fn start_engine(&mut self, loader: Arc<dyn EngineLoader>) {
        let tx = self.events.clone();
        if let Err(err) = self.session.start_engine(loader, move |event| {
            let _ = tx.send(AppEvent::Engine(event));
        }) {
            tracing::warn!(error = %err, "engine start refused");
        }
    }

    pub fn handle_engine_event(&mut self, event: LifecycleEvent) {
        self.session.apply(event);
        if let Some(notice) = self.session.take_notice() {
            self.notice = Some(notice);
        }
    }

    /// Send the input field. Silently does nothing when the session will
    /// not accept a submission.
    pub fn send_input(&mut self) {
        let Some(pending) = self.session.begin_submit_input() else {
            return;
        };
        self.cursor = 0;
        self.quick_reply_idx = None;

        // Scroll to bottom so "Thinking..." is visible
        self.scroll_to_bottom();

        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = pending.run().await;
            let _ = tx.send(AppEvent::Completion(result));
        });
    }

    pub fn finish_completion(&mut self, result: Result<Completion, EngineError>) {
        self.session.finish_submit(result);
        self.scroll_to_bottom();
    }

    /// Put a quick reply in the input field and send it after a short delay.
    pub fn fire_quick_reply(&mut self, index: usize) {
        if !self.session.select_quick_reply(index) {
            return;
        }
        self.cursor = self.session.input().chars().count();

        let tx = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(QUICK_REPLY_DELAY).await;
            let _ = tx.send(AppEvent::SendInput);
        });
    }

    pub fn cycle_quick_reply(&mut self) {
        if !self.session.quick_replies_available() {
            self.quick_reply_idx = None;
            return;
        }
        self.quick_reply_idx = Some(match self.quick_reply_idx {
            Some(i) => (i + 1) % QUICK_REPLIES.len(),
            None => 0,
        });
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Scroll chat to bottom so the newest message is visible
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.session.conversation().visible() {
            total_lines = total_lines.saturating_add(1); // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { (char_count / wrap_width) + 1 };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.session.is_busy() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}
