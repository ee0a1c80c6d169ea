//! Request admission: debounce and rapid-typing suppression.
//!
//! Only [`Trigger::Automatic`] requests are gated. A manual request is an
//! explicit ask and always proceeds, and it does not reset the debounce
//! timer either.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::SessionConfig;

/// How a completion request was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Fired by typing; subject to the gate.
    Automatic,
    /// Explicitly requested by the developer.
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Automatic => write!(f, "automatic"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// Why a request was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Automatic triggering is switched off in the configuration.
    Disabled,
    /// Another automatic request fired less than the debounce interval ago.
    Debounced { since_last: Duration },
    /// The active file saw too many edits within the typing window.
    RapidTyping { recent_edits: usize },
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suppression::Disabled => write!(f, "automatic completions disabled"),
            Suppression::Debounced { since_last } => {
                write!(f, "debounced ({}ms since last request)", since_last.as_millis())
            }
            Suppression::RapidTyping { recent_edits } => {
                write!(f, "rapid typing ({recent_edits} recent edits)")
            }
        }
    }
}

/// Debounce plus rapid-typing guard for automatic requests.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    debounce: Duration,
    typing_window: Duration,
    max_typing_edits: usize,
    last_automatic: Option<DateTime<Utc>>,
}

impl AdmissionGate {
    pub fn new(debounce: Duration, typing_window: Duration, max_typing_edits: usize) -> Self {
        Self {
            debounce,
            typing_window,
            max_typing_edits,
            last_automatic: None,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.debounce(),
            config.rapid_typing_window(),
            config.rapid_typing_max_edits,
        )
    }

    /// The look-back window the caller should count edits over.
    pub fn typing_window(&self) -> Duration {
        self.typing_window
    }

    /// Decide whether a request may proceed.
    ///
    /// `recent_edits` is the number of edits to the active file inside
    /// [`typing_window`](Self::typing_window). An admitted automatic request
    /// restarts the debounce interval; suppressed ones do not.
    pub fn check(
        &mut self,
        trigger: Trigger,
        auto_enabled: bool,
        recent_edits: usize,
        now: DateTime<Utc>,
    ) -> Result<(), Suppression> {
        if trigger == Trigger::Manual {
            return Ok(());
        }
        if !auto_enabled {
            return Err(Suppression::Disabled);
        }
        if let Some(last) = self.last_automatic {
            let since_last = now.signed_duration_since(last).to_std().unwrap_or_default();
            if since_last < self.debounce {
                return Err(Suppression::Debounced { since_last });
            }
        }
        if recent_edits > self.max_typing_edits {
            return Err(Suppression::RapidTyping { recent_edits });
        }
        self.last_automatic = Some(now);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.last_automatic = None;
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
