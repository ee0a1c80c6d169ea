//! The long-lived editing session.
//!
//! A [`CompletionSession`] is created when an editing session starts and
//! dropped (or [`dispose`](CompletionSession::dispose)d) when it ends. It
//! owns the [`ActivityStore`] and [`AnalysisCache`], applies
//! [`EditorEvent`]s to them, and serves completion requests:
//!
//! 1. the [`AdmissionGate`] may suppress automatic requests,
//! 2. the [`PromptAssembler`] renders a prompt from the current state,
//! 3. the backend is called (the only suspension point),
//! 4. results whose request was superseded meanwhile are discarded,
//! 5. the reply is [`sanitize`]d.
//!
//! State sits behind a single mutex that is never held across the backend
//! call, so host events keep flowing while a request is in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::events::{CompletionEvent, EditorEvent, EventHandler, NoopHandler, TextChange};
use super::gate::{AdmissionGate, Trigger};
use crate::cancel::CancelToken;
use crate::config::{CompletionConfig, SessionConfig};
use crate::context::{
    ActivityStore, AnalysisCache, AnalyzerRegistry, EditRecord, Position, ViewedSnippet,
};
use crate::prompt::{AssembledPrompt, CursorContext, PromptAssembler, system_instructions};
use crate::sanitize::sanitize;
use crate::{CompletionBackend, CompletionError};

/// One request for a completion at a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub trigger: Trigger,
    pub file_id: String,
    pub language: String,
    /// Full current content of the file.
    pub content: String,
    pub position: Position,
    /// Prompt token budget. `None` uses the session default for the trigger.
    pub budget: Option<usize>,
}

impl CompletionRequest {
    pub fn new(
        trigger: Trigger,
        file_id: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            trigger,
            file_id: file_id.into(),
            language: language.into(),
            content: content.into(),
            position,
            budget: None,
        }
    }

    pub fn automatic(
        file_id: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
        position: Position,
    ) -> Self {
        Self::new(Trigger::Automatic, file_id, language, content, position)
    }

    pub fn manual(
        file_id: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
        position: Position,
    ) -> Self {
        Self::new(Trigger::Manual, file_id, language, content, position)
    }

    pub fn with_budget(mut self, tokens: usize) -> Self {
        self.budget = Some(tokens);
        self
    }
}

struct InFlight {
    file_id: String,
    token: CancelToken,
}

struct SessionState {
    activity: ActivityStore,
    cache: AnalysisCache,
    gate: AdmissionGate,
    active_file: Option<String>,
    in_flight: HashMap<Trigger, InFlight>,
}

impl SessionState {
    /// Cancel requests whose result would describe an outdated `file_id`.
    fn cancel_for_file(&mut self, file_id: &str) {
        for (trigger, req) in &self.in_flight {
            if req.file_id == file_id && !req.token.is_cancelled() {
                debug!("Cancelling in-flight {trigger} request for {file_id}");
                req.token.cancel();
            }
        }
    }
}

/// Explicit owner of all per-editing-session completion state.
pub struct CompletionSession<B> {
    backend: B,
    state: Mutex<SessionState>,
    config: RwLock<CompletionConfig>,
    session_config: SessionConfig,
    assembler: PromptAssembler,
    instructions: String,
    clock: Arc<dyn Clock>,
    handler: Arc<dyn EventHandler>,
}

impl<B: CompletionBackend> CompletionSession<B> {
    pub fn new(backend: B, config: CompletionConfig, session_config: SessionConfig) -> Self {
        let state = SessionState {
            activity: ActivityStore::new(
                session_config.max_edit_history,
                session_config.max_viewed_snippets,
            ),
            cache: AnalysisCache::new(
                session_config.analysis_ttl(),
                AnalyzerRegistry::with_builtin_analyzers(),
            ),
            gate: AdmissionGate::from_config(&session_config),
            active_file: None,
            in_flight: HashMap::new(),
        };
        Self {
            backend,
            state: Mutex::new(state),
            config: RwLock::new(config),
            assembler: PromptAssembler::from_config(&session_config),
            session_config,
            instructions: system_instructions(),
            clock: Arc::new(SystemClock),
            handler: Arc::new(NoopHandler),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Replace the structural analyzers (e.g. with real parsers).
    pub fn with_analyzers(self, registry: AnalyzerRegistry) -> Self {
        *self.lock().cache.registry_mut() = registry;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    // ── Configuration ──────────────────────────────────────────────

    /// Snapshot of the backend configuration.
    pub fn config(&self) -> CompletionConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the backend configuration. Applies from the next request.
    pub fn set_config(&self, config: CompletionConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    // ── Host events ────────────────────────────────────────────────

    /// Apply one host notification.
    pub fn handle_event(&self, event: EditorEvent) {
        match event {
            EditorEvent::DocumentChanged {
                file_id, changes, ..
            } => {
                for TextChange {
                    range,
                    old_text,
                    new_text,
                } in changes
                {
                    self.record_edit(EditRecord {
                        timestamp: self.clock.now(),
                        range,
                        old_text,
                        new_text,
                        file_id: file_id.clone(),
                    });
                }
            }
            EditorEvent::SelectionChanged {
                file_id,
                language,
                range,
                selected_text,
            } => {
                self.record_viewed_snippet(ViewedSnippet {
                    timestamp: self.clock.now(),
                    file_id,
                    content: selected_text,
                    range,
                    language,
                });
            }
            EditorEvent::ActiveFileChanged { file_id, language } => {
                trace!("Active file: {file_id} ({language})");
                self.lock().active_file = Some(file_id);
            }
            EditorEvent::DocumentClosed { file_id } => {
                let mut state = self.lock();
                state.cache.invalidate(&file_id);
                state.cancel_for_file(&file_id);
            }
        }
    }

    /// Consume host events until the sender side closes.
    pub async fn run(&self, mut events: mpsc::Receiver<EditorEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("Editor event channel closed");
    }

    /// Store an edit, drop the file's cached analysis, and mark any
    /// in-flight request for that file as stale.
    pub fn record_edit(&self, edit: EditRecord) {
        let mut state = self.lock();
        state.cache.invalidate(&edit.file_id);
        state.cancel_for_file(&edit.file_id);
        state.activity.record_edit(edit);
    }

    /// Store a viewed snippet. Returns `false` for an empty selection.
    pub fn record_viewed_snippet(&self, snippet: ViewedSnippet) -> bool {
        self.lock().activity.record_viewed_snippet(snippet)
    }

    // ── Requests ───────────────────────────────────────────────────

    /// Produce a sanitized suggestion for `request`.
    ///
    /// `Ok(None)` covers every "no suggestion" outcome: gate suppression,
    /// backend timeout, a superseded request, or an empty reply. Transport,
    /// status, and protocol failures are returned as errors.
    pub async fn request_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<Option<String>, CompletionError> {
        let trigger = request.trigger;
        let config = self.config();
        let now = self.clock.now();

        let (prompt, typed_prefix, token) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.active_file = Some(request.file_id.clone());

            let window = state.gate.typing_window();
            let recent = state
                .activity
                .recent_edits(&request.file_id, window, now)
                .len();
            if let Err(reason) = state.gate.check(trigger, config.auto_trigger, recent, now) {
                drop(guard);
                self.handler
                    .on_event(&CompletionEvent::Suppressed { trigger, reason });
                return Ok(None);
            }

            let (cursor, prompt) = self.assemble(state, &request, now);
            let token = CancelToken::new();
            let superseded = state.in_flight.insert(
                trigger,
                InFlight {
                    file_id: request.file_id.clone(),
                    token: token.clone(),
                },
            );
            if let Some(previous) = superseded {
                previous.token.cancel();
            }
            (prompt, cursor.prefix, token)
        };

        self.handler.on_event(&CompletionEvent::PromptAssembled {
            trigger,
            file_id: &request.file_id,
            prompt: &prompt,
        });

        let result = self
            .backend
            .complete(&prompt.text, &self.instructions, &config, &token)
            .await;

        {
            let mut state = self.lock();
            if state
                .in_flight
                .get(&trigger)
                .is_some_and(|f| f.token.same_as(&token))
            {
                state.in_flight.remove(&trigger);
            }
        }

        if token.is_cancelled() {
            self.handler
                .on_event(&CompletionEvent::Discarded { trigger });
            return Ok(None);
        }

        let raw = match result {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.handler
                    .on_event(&CompletionEvent::NoSuggestion { trigger });
                return Ok(None);
            }
            Err(error) => {
                self.handler.on_event(&CompletionEvent::Failed {
                    trigger,
                    error: &error,
                });
                return Err(error);
            }
        };

        let text = sanitize(&raw, &typed_prefix);
        if text.trim().is_empty() {
            self.handler
                .on_event(&CompletionEvent::NoSuggestion { trigger });
            return Ok(None);
        }
        self.handler
            .on_event(&CompletionEvent::Completed { trigger, text: &text });
        Ok(Some(text))
    }

    /// Build the prompt `request` would send, bypassing the gate and the
    /// backend.
    pub fn preview_prompt(&self, request: &CompletionRequest) -> AssembledPrompt {
        let now = self.clock.now();
        let mut guard = self.lock();
        self.assemble(&mut guard, request, now).1
    }

    fn assemble(
        &self,
        state: &mut SessionState,
        request: &CompletionRequest,
        now: DateTime<Utc>,
    ) -> (CursorContext, AssembledPrompt) {
        let cursor = CursorContext::new(
            request.file_id.clone(),
            request.language.clone(),
            request.content.clone(),
            request.position,
            self.session_config.surrounding_lines,
        );
        let budget = request.budget.unwrap_or(match request.trigger {
            Trigger::Automatic => self.session_config.auto_prompt_budget,
            Trigger::Manual => self.session_config.manual_prompt_budget,
        });
        let prompt =
            self.assembler
                .assemble(&cursor, &state.activity, &mut state.cache, budget, now);
        (cursor, prompt)
    }

    // ── Inspection and teardown ────────────────────────────────────

    pub fn edit_count(&self) -> usize {
        self.lock().activity.edit_count()
    }

    /// Copy of the retained edits, oldest first.
    pub fn edits(&self) -> Vec<EditRecord> {
        self.lock().activity.edits().cloned().collect()
    }

    pub fn snippet_count(&self) -> usize {
        self.lock().activity.snippet_count()
    }

    pub fn active_file(&self) -> Option<String> {
        self.lock().active_file.clone()
    }

    /// Analysis cache hit rate (0.0 to 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        self.lock().cache.hit_rate()
    }

    /// Drop cached analyses whose TTL has elapsed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.lock().cache.purge_expired(now)
    }

    /// End the session: cancel in-flight requests and forget all activity.
    pub fn dispose(&self) {
        let mut state = self.lock();
        for (_, req) in state.in_flight.drain() {
            req.token.cancel();
        }
        state.activity.clear();
        state.cache.invalidate_all();
        state.gate.reset();
        state.active_file = None;
        debug!("Completion session disposed");
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
