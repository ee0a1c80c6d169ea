//! Token budget for prompt assembly.
//!
//! Token counts are a cheap proxy, `ceil(chars / 4)`, and only drive section
//! admission. They are never exact and nothing relies on them for
//! correctness.

/// Characters per token used by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Running budget for one assembly pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    total: usize,
    used: usize,
}

impl TokenBudget {
    pub fn new(total: usize) -> Self {
        Self { total, used: 0 }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.used)
    }

    /// Whether the remaining budget is strictly above `threshold`.
    pub fn admits(&self, threshold: usize) -> bool {
        self.remaining() > threshold
    }

    /// Whether `tokens` more would still fit.
    pub fn fits(&self, tokens: usize) -> bool {
        tokens <= self.remaining()
    }

    /// Record `tokens` as spent. Overspending is allowed (budget-exempt
    /// sections) and leaves `remaining()` at zero.
    pub fn consume(&mut self, tokens: usize) {
        self.used = self.used.saturating_add(tokens);
    }

    /// Format for logging, e.g. `"820/1500 tokens (55%)"`.
    pub fn to_log_string(&self) -> String {
        let pct = if self.total == 0 {
            100.0
        } else {
            self.used as f64 / self.total as f64 * 100.0
        };
        format!("{}/{} tokens ({pct:.0}%)", self.used, self.total)
    }
}
