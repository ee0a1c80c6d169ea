//! Context-aware cursor completion engine.
//!
//! `nudge` produces one text completion for the code at an editing cursor,
//! conditioned on a bounded, freshness-ranked slice of the developer's recent
//! activity. The crate is split into a small stateful core and a thin HTTP
//! client for any OpenAI-chat-completions-shaped backend:
//!
//! - **Activity tracking:** [`ActivityStore`](context::ActivityStore) keeps
//!   ring buffers of recent edits and viewed snippets.
//! - **Structural hints:** [`AnalysisCache`](context::AnalysisCache) holds a
//!   per-file best-effort summary (imports, functions, classes, variables)
//!   that expires after a TTL and is dropped on every edit.
//! - **Prompt assembly:** [`PromptAssembler`](prompt::PromptAssembler)
//!   renders activity, analysis, and the cursor neighbourhood into a single
//!   prompt under a token budget, admitting sections by priority.
//! - **Backend call:** [`CompletionClient`] posts the prompt and returns the
//!   raw reply. A timeout is "no suggestion", not an error.
//! - **Cleanup:** [`sanitize`](sanitize::sanitize) strips fences, line
//!   numbers, the cursor sentinel, and echoed prefix text.
//!
//! [`CompletionSession`](session::CompletionSession) ties these together
//! behind a request admission gate (debounce plus a rapid-typing guard) and
//! consumes host notifications as [`EditorEvent`](session::EditorEvent)s.
//!
//! ```ignore
//! use nudge::prelude::*;
//!
//! let client = CompletionClient::new()?;
//! let session = CompletionSession::new(client, CompletionConfig::default(), SessionConfig::default());
//! let text = session
//!     .request_completion(CompletionRequest::manual("src/main.rs", "rust", source, Position::new(12, 8)))
//!     .await?;
//! ```

pub mod cancel;
pub mod config;
pub mod context;
pub mod prelude;
pub mod prompt;
pub mod sanitize;
pub mod session;

use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::config::CompletionConfig;

/// Path appended to the configured server URL.
pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Sequences that terminate generation early: the end of a code fence and a
/// triple blank line.
pub const STOP_SEQUENCES: [&str; 2] = ["\n```", "\n\n\n"];

// ── Wire types ─────────────────────────────────────────────────────

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for `POST {serverUrl}/v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl ChatRequest {
    /// Build the two-message request (system instructions, user prompt).
    pub fn new(prompt: &str, instructions: &str, config: &CompletionConfig) -> Self {
        Self {
            model: config.model.clone(),
            messages: vec![Message::system(instructions), Message::user(prompt)],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop: STOP_SEQUENCES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawChatResponse {
    choices: Vec<RawChoice>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    content: String,
}

/// Extract `choices[0].message.content` from a response body.
///
/// Anything else (not JSON, no choices, non-string content) is a protocol
/// error.
pub fn parse_completion_body(body: &str) -> Result<String, CompletionError> {
    let parsed: RawChatResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::Protocol(format!("unexpected response shape: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| CompletionError::Protocol("response has no choices".into()))
}

// ── Errors ─────────────────────────────────────────────────────────

/// Failures surfaced by a completion backend.
///
/// Timeouts and cancellations are not errors; they resolve to `Ok(None)`.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("completion backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),
}

// ── Backend seam ───────────────────────────────────────────────────

/// Future returned by [`CompletionBackend::complete`].
pub type CompletionFuture<'a> = BoxFuture<'a, Result<Option<String>, CompletionError>>;

/// Anything that can turn a prompt into raw completion text.
///
/// [`CompletionClient`] is the HTTP implementation; tests and embedders can
/// substitute their own.
pub trait CompletionBackend: Send + Sync {
    /// Run one completion.
    ///
    /// Returns `Ok(None)` when no suggestion is available (timeout, or
    /// `cancel` was set while the call was in flight).
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        instructions: &'a str,
        config: &'a CompletionConfig,
        cancel: &'a CancelToken,
    ) -> CompletionFuture<'a>;
}

// ── HTTP client ────────────────────────────────────────────────────

/// HTTP client for an OpenAI-chat-completions-shaped endpoint.
///
/// Holds no configuration of its own: server URL, credentials, model, and
/// timeout are read from the [`CompletionConfig`] passed to each call.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
}

impl CompletionClient {
    pub fn new() -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(CompletionError::Client)?;
        Ok(Self { client })
    }

    /// Send one completion request.
    pub async fn complete(
        &self,
        prompt: &str,
        instructions: &str,
        config: &CompletionConfig,
        cancel: &CancelToken,
    ) -> Result<Option<String>, CompletionError> {
        let body = ChatRequest::new(prompt, instructions, config);
        let url = config.endpoint();
        debug!(
            "Completion request: model={}, prompt_chars={}, max_tokens={}, temp={}",
            body.model,
            prompt.chars().count(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let outcome = self.send(&url, &body, config).await;

        if cancel.is_cancelled() {
            debug!("Completion discarded: cancelled while in flight");
            return Ok(None);
        }

        let (status, text) = match outcome {
            Ok(pair) => pair,
            Err(e) if e.is_timeout() => {
                debug!(
                    "Completion timed out after {:.1}s (limit {}ms)",
                    start.elapsed().as_secs_f64(),
                    config.timeout_ms
                );
                return Ok(None);
            }
            Err(source) => return Err(CompletionError::Transport { url, source }),
        };

        debug!(
            "Completion response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_completion_body(&text).map(Some)
    }

    async fn send(
        &self,
        url: &str,
        body: &ChatRequest,
        config: &CompletionConfig,
    ) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .timeout(config.timeout())
            .json(body);
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        Ok((status, text))
    }
}

impl CompletionBackend for CompletionClient {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        instructions: &'a str,
        config: &'a CompletionConfig,
        cancel: &'a CancelToken,
    ) -> CompletionFuture<'a> {
        Box::pin(CompletionClient::complete(
            self,
            prompt,
            instructions,
            config,
            cancel,
        ))
    }
}
