//! Inbound editor events and outbound completion events.
//!
//! The host talks to a [`CompletionSession`](super::CompletionSession)
//! through a closed set of [`EditorEvent`]s, usually over a channel
//! consumed by [`run`](super::CompletionSession::run). The session reports
//! what it did with each request as [`CompletionEvent`]s delivered to an
//! [`EventHandler`].
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or headless use |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use tracing::{debug, info, warn};

use super::gate::{Suppression, Trigger};
use crate::CompletionError;
use crate::context::TextRange;
use crate::prompt::AssembledPrompt;

// ── Inbound ────────────────────────────────────────────────────────

/// One replacement inside a document change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub range: TextRange,
    pub old_text: String,
    pub new_text: String,
}

/// Notifications the host delivers, one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// A document was mutated. Each change becomes one edit record.
    DocumentChanged {
        file_id: String,
        language: String,
        changes: Vec<TextChange>,
    },
    /// The selection changed. Empty or whitespace-only selections are
    /// ignored.
    SelectionChanged {
        file_id: String,
        language: String,
        range: TextRange,
        selected_text: String,
    },
    /// Focus moved to another file.
    ActiveFileChanged { file_id: String, language: String },
    /// A document was closed.
    DocumentClosed { file_id: String },
}

impl EditorEvent {
    pub fn file_id(&self) -> &str {
        match self {
            EditorEvent::DocumentChanged { file_id, .. }
            | EditorEvent::SelectionChanged { file_id, .. }
            | EditorEvent::ActiveFileChanged { file_id, .. }
            | EditorEvent::DocumentClosed { file_id } => file_id,
        }
    }
}

// ── Outbound ───────────────────────────────────────────────────────

/// What happened to a completion request.
#[derive(Debug)]
pub enum CompletionEvent<'a> {
    /// The admission gate rejected the request before any work was done.
    Suppressed {
        trigger: Trigger,
        reason: Suppression,
    },
    /// A prompt was built and is about to be sent.
    PromptAssembled {
        trigger: Trigger,
        file_id: &'a str,
        prompt: &'a AssembledPrompt,
    },
    /// A suggestion is ready for insertion.
    Completed { trigger: Trigger, text: &'a str },
    /// The backend timed out or the reply sanitized to nothing.
    NoSuggestion { trigger: Trigger },
    /// The result arrived after the request had been superseded.
    Discarded { trigger: Trigger },
    /// The backend call failed.
    Failed {
        trigger: Trigger,
        error: &'a CompletionError,
    },
}

/// Observer for [`CompletionEvent`]s.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &CompletionEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Logs events with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &CompletionEvent<'_>) {
        match event {
            CompletionEvent::Suppressed { trigger, reason } => {
                debug!("[{trigger}] suppressed: {reason}");
            }
            CompletionEvent::PromptAssembled {
                trigger,
                file_id,
                prompt,
            } => {
                debug!(
                    "[{trigger}] prompt for {file_id}: ~{} tokens of {} ({} sections)",
                    prompt.estimated_tokens,
                    prompt.budget,
                    prompt.sections.len()
                );
            }
            CompletionEvent::Completed { trigger, text } => {
                info!("[{trigger}] suggestion ready ({} chars)", text.chars().count());
            }
            CompletionEvent::NoSuggestion { trigger } => {
                debug!("[{trigger}] no suggestion");
            }
            CompletionEvent::Discarded { trigger } => {
                debug!("[{trigger}] stale result discarded");
            }
            CompletionEvent::Failed { trigger, error } => {
                warn!("[{trigger}] completion failed: {error}");
            }
        }
    }
}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&CompletionEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&CompletionEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&CompletionEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &CompletionEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &CompletionEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}
