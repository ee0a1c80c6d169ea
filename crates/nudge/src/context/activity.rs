//! Bounded memory of recent edits and viewed code.
//!
//! The [`ActivityStore`] keeps two independent ring buffers: one of
//! [`EditRecord`]s (every observed text replacement) and one of
//! [`ViewedSnippet`]s (non-empty selections the developer looked at). When a
//! buffer exceeds its capacity the oldest entries are dropped, so the store
//! always holds exactly the most recent activity in arrival order.
//!
//! Reads are pure filters: [`recent_edits`](ActivityStore::recent_edits)
//! and [`recent_snippets`](ActivityStore::recent_snippets) return entries
//! strictly newer than `now - window`, oldest first.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A zero-based line/column location in a document. Columns count chars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A half-open `[start, end)` span of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty range at a single position (pure insertion point).
    pub fn at(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }
}

/// One atomic text replacement observed in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    pub timestamp: DateTime<Utc>,
    pub range: TextRange,
    pub old_text: String,
    pub new_text: String,
    pub file_id: String,
}

/// A non-empty selection the developer looked at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewedSnippet {
    pub timestamp: DateTime<Utc>,
    pub file_id: String,
    pub content: String,
    pub range: TextRange,
    pub language: String,
}

/// Ring buffers of recent edits and viewed snippets.
#[derive(Debug, Clone)]
pub struct ActivityStore {
    edits: VecDeque<EditRecord>,
    snippets: VecDeque<ViewedSnippet>,
    max_edits: usize,
    max_snippets: usize,
}

impl Default for ActivityStore {
    fn default() -> Self {
        Self::new(20, 10)
    }
}

impl ActivityStore {
    pub fn new(max_edits: usize, max_snippets: usize) -> Self {
        Self {
            edits: VecDeque::with_capacity(max_edits),
            snippets: VecDeque::with_capacity(max_snippets),
            max_edits,
            max_snippets,
        }
    }

    /// Append an edit, dropping the oldest entries beyond capacity.
    ///
    /// Invalidating the file's analysis is the caller's job; the session
    /// does both under one lock.
    pub fn record_edit(&mut self, edit: EditRecord) {
        trace!(
            "Recorded edit in {} at {}:{}",
            edit.file_id, edit.range.start.line, edit.range.start.column
        );
        self.edits.push_back(edit);
        while self.edits.len() > self.max_edits {
            self.edits.pop_front();
        }
    }

    /// Append a viewed snippet. Empty or whitespace-only selections are
    /// ignored and return `false`.
    pub fn record_viewed_snippet(&mut self, snippet: ViewedSnippet) -> bool {
        if snippet.content.trim().is_empty() {
            return false;
        }
        self.snippets.push_back(snippet);
        while self.snippets.len() > self.max_snippets {
            self.snippets.pop_front();
        }
        true
    }

    /// Edits to `file_id` newer than `now - window`, oldest first.
    pub fn recent_edits(
        &self,
        file_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Vec<&EditRecord> {
        let cutoff = cutoff(now, window);
        self.edits
            .iter()
            .filter(|e| e.file_id == file_id && is_after(e.timestamp, cutoff))
            .collect()
    }

    /// Snippets in `language` newer than `now - window`, oldest first.
    pub fn recent_snippets(
        &self,
        language: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Vec<&ViewedSnippet> {
        let cutoff = cutoff(now, window);
        self.snippets
            .iter()
            .filter(|s| s.language == language && is_after(s.timestamp, cutoff))
            .collect()
    }

    /// All retained edits, oldest first.
    pub fn edits(&self) -> impl Iterator<Item = &EditRecord> {
        self.edits.iter()
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    pub fn snippet_count(&self) -> usize {
        self.snippets.len()
    }

    pub fn clear(&mut self) {
        self.edits.clear();
        self.snippets.clear();
    }
}

/// `None` means the window reaches past the representable range, so
/// everything is inside it.
fn cutoff(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    let window = TimeDelta::from_std(window).ok()?;
    now.checked_sub_signed(window)
}

fn is_after(ts: DateTime<Utc>, cutoff: Option<DateTime<Utc>>) -> bool {
    cutoff.is_none_or(|c| ts > c)
}
