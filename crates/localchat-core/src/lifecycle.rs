//! Engine lifecycle: one creation attempt per session.
//!
//! The manager starts out initializing. It leaves that state exactly once,
//! either holding an engine handle or permanently without one. Progress
//! reports only change the human-readable progress text.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::{CreateOptions, EngineHandle, EngineLoader};
use crate::error::EngineError;

/// Shown once when the engine cannot be created.
pub const LOAD_FAILED_NOTICE: &str =
    "Model failed to load. Try a smaller model or check that the model server is running.";

/// Format a progress fraction as a percentage with one decimal place.
pub fn format_progress(fraction: f64) -> String {
    format!("{:.1}%", fraction.clamp(0.0, 1.0) * 100.0)
}

/// Outcome of the background creation task, fed back into the manager.
pub enum LifecycleEvent {
    Progress(f64),
    Ready(EngineHandle),
    Failed(EngineError),
}

impl fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Progress(p) => f.debug_tuple("Progress").field(p).finish(),
            LifecycleEvent::Ready(engine) => f.debug_tuple("Ready").field(&engine.model()).finish(),
            LifecycleEvent::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

pub struct EngineLifecycle {
    started: bool,
    initializing: bool,
    progress_text: String,
    handle: Option<EngineHandle>,
    notice: Option<String>,
}

impl Default for EngineLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineLifecycle {
    pub fn new() -> Self {
        Self {
            started: false,
            initializing: true,
            progress_text: String::new(),
            handle: None,
            notice: None,
        }
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    pub fn is_ready(&self) -> bool {
        self.handle.is_some()
    }

    /// Engine handle, present only after a successful creation.
    pub fn handle(&self) -> Option<&EngineHandle> {
        self.handle.as_ref()
    }

    pub fn progress_text(&self) -> &str {
        &self.progress_text
    }

    /// Pending failure notice, if one has not been shown yet.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Acknowledge the failure notice so it is not shown again.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Mark the single creation attempt as issued.
    fn begin(&mut self) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    pub fn on_progress(&mut self, fraction: f64) {
        if !self.initializing {
            return;
        }
        self.progress_text = format!("Loading: {}", format_progress(fraction));
    }

    pub fn on_ready(&mut self, handle: EngineHandle) {
        if !self.initializing {
            tracing::warn!("ignoring engine handle delivered after initialization settled");
            return;
        }
        tracing::info!(model = handle.model(), "engine initialized");
        self.handle = Some(handle);
        self.initializing = false;
        self.progress_text.clear();
    }

    pub fn on_failed(&mut self, err: &EngineError) {
        if !self.initializing {
            return;
        }
        tracing::error!(error = %err, "engine failed to initialize");
        self.initializing = false;
        self.notice = Some(LOAD_FAILED_NOTICE.to_string());
    }

    pub fn apply(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Progress(fraction) => self.on_progress(fraction),
            LifecycleEvent::Ready(handle) => self.on_ready(handle),
            LifecycleEvent::Failed(err) => self.on_failed(&err),
        }
    }

    /// Issue the creation call on a background task. Every outcome is
    /// delivered through `sink` and must be passed back to [`apply`] by the
    /// task that owns the manager.
    ///
    /// [`apply`]: EngineLifecycle::apply
    pub fn spawn<F>(
        &mut self,
        loader: Arc<dyn EngineLoader>,
        model: String,
        sink: F,
    ) -> Result<JoinHandle<()>, EngineError>
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        self.begin()?;
        tracing::info!(%model, "creating engine");

        let sink = Arc::new(sink);
        let progress_sink = sink.clone();
        let options =
            CreateOptions::with_progress(move |f| progress_sink(LifecycleEvent::Progress(f)));

        Ok(tokio::spawn(async move {
            let event = match loader.create(&model, options).await {
                Ok(handle) => LifecycleEvent::Ready(handle),
                Err(err) => LifecycleEvent::Failed(err),
            };
            sink(event);
        }))
    }

    /// Create the engine in place, applying progress as it arrives.
    /// Returns whether the engine is ready afterwards.
    pub async fn initialize(&mut self, loader: &dyn EngineLoader, model: &str) -> bool {
        if let Err(err) = self.begin() {
            tracing::warn!(error = %err, "initialize called twice");
            return self.is_ready();
        }
        tracing::info!(%model, "creating engine");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let options = CreateOptions::with_progress(move |f| {
            let _ = tx.send(f);
        });

        let create = loader.create(model, options);
        tokio::pin!(create);

        let result = loop {
            tokio::select! {
                biased;
                Some(fraction) = rx.recv() => self.on_progress(fraction),
                result = &mut create => break result,
            }
        };
        while let Ok(fraction) = rx.try_recv() {
            self.on_progress(fraction);
        }

        match result {
            Ok(handle) => self.on_ready(handle),
            Err(err) => self.on_failed(&err),
        }
        self.is_ready()
    }
}
