//! Configuration consumed read-only by the completion core.
//!
//! [`CompletionConfig`] is the backend surface (where to send requests, how
//! to sample, how long to wait). [`SessionConfig`] holds the capacities,
//! windows, and thresholds of the stateful side. Both deserialize from
//! camelCase JSON with every field optional; [`Settings`] groups them for a
//! single file on disk.
//!
//! Nothing here validates or persists values beyond falling back to defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::COMPLETIONS_PATH;

/// Default backend: a local server on the loopback interface.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:11434";

/// Default model identifier sent to the backend.
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";

// ── Backend ────────────────────────────────────────────────────────

/// Backend settings, snapshotted at the start of every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionConfig {
    /// Base URL of the backend. Default: [`DEFAULT_SERVER_URL`].
    pub server_url: String,
    /// Bearer token. Sent only when present and non-empty.
    pub api_key: Option<String>,
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Sampling temperature. Default: `0.2`.
    pub temperature: f32,
    /// Maximum output tokens. Default: `256`.
    pub max_tokens: u32,
    /// Request timeout in milliseconds. Default: `5000`.
    pub timeout_ms: u64,
    /// Whether automatic (typing-triggered) requests are allowed. Default: `true`.
    pub auto_trigger: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 256,
            timeout_ms: 5_000,
            auto_trigger: true,
        }
    }
}

impl CompletionConfig {
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Read the API key from an environment variable. Unset or empty
    /// variables leave the key untouched.
    pub fn with_api_key_from_env(mut self, var: &str) -> Self {
        if let Ok(key) = std::env::var(var)
            && !key.trim().is_empty()
        {
            self.api_key = Some(key);
        }
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_auto_trigger(mut self, enabled: bool) -> Self {
        self.auto_trigger = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full completions URL, tolerating a trailing slash on `server_url`.
    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            COMPLETIONS_PATH
        )
    }
}

// ── Session ────────────────────────────────────────────────────────

/// Capacities, windows, and gate thresholds for a
/// [`CompletionSession`](crate::session::CompletionSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Edit ring capacity. Default: `20`.
    pub max_edit_history: usize,
    /// Viewed-snippet ring capacity. Default: `10`.
    pub max_viewed_snippets: usize,
    /// Analysis cache time-to-live in seconds. Default: `300`.
    pub analysis_ttl_secs: u64,
    /// Minimum spacing between automatic requests. Default: `300`.
    pub debounce_ms: u64,
    /// Look-back window of the rapid-typing guard. Default: `1000`.
    pub rapid_typing_window_ms: u64,
    /// Automatic requests are suppressed when the active file saw more than
    /// this many edits inside the window. Default: `2`.
    pub rapid_typing_max_edits: usize,
    /// How far back edit history reaches into a prompt. Default: `300`.
    pub edit_window_secs: u64,
    /// How far back viewed snippets reach into a prompt. Default: `600`.
    pub snippet_window_secs: u64,
    /// Lines on each side of the cursor in the "area around code". Default: `10`.
    pub surrounding_lines: usize,
    /// Prompt token budget for automatic requests. Default: `1500`.
    pub auto_prompt_budget: usize,
    /// Prompt token budget for manual requests. Default: `3500`.
    pub manual_prompt_budget: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_edit_history: 20,
            max_viewed_snippets: 10,
            analysis_ttl_secs: 300,
            debounce_ms: 300,
            rapid_typing_window_ms: 1_000,
            rapid_typing_max_edits: 2,
            edit_window_secs: 300,
            snippet_window_secs: 600,
            surrounding_lines: 10,
            auto_prompt_budget: 1_500,
            manual_prompt_budget: 3_500,
        }
    }
}

impl SessionConfig {
    pub fn with_max_edit_history(mut self, n: usize) -> Self {
        self.max_edit_history = n;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_analysis_ttl_secs(mut self, secs: u64) -> Self {
        self.analysis_ttl_secs = secs;
        self
    }

    pub fn with_prompt_budgets(mut self, automatic: usize, manual: usize) -> Self {
        self.auto_prompt_budget = automatic;
        self.manual_prompt_budget = manual;
        self
    }

    pub fn analysis_ttl(&self) -> Duration {
        Duration::from_secs(self.analysis_ttl_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rapid_typing_window(&self) -> Duration {
        Duration::from_millis(self.rapid_typing_window_ms)
    }

    pub fn edit_window(&self) -> Duration {
        Duration::from_secs(self.edit_window_secs)
    }

    pub fn snippet_window(&self) -> Duration {
        Duration::from_secs(self.snippet_window_secs)
    }
}

// ── File ───────────────────────────────────────────────────────────

/// Both configuration groups, as stored in one JSON file:
///
/// ```json
/// { "completion": { "serverUrl": "http://localhost:8080", "model": "coder" },
///   "session": { "debounceMs": 250 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub completion: CompletionConfig,
    pub session: SessionConfig,
}

impl Settings {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        let settings: Settings = serde_json::from_str(&data)
            .map_err(|e| format!("failed to parse config {}: {e}", path.display()))?;
        debug!(
            "Loaded config from {} (server={}, model={})",
            path.display(),
            settings.completion.server_url,
            settings.completion.model
        );
        Ok(settings)
    }
}
