//! Token-budgeted prompt assembly.
//!
//! [`PromptAssembler::assemble`] turns the cursor neighbourhood plus the
//! session's recorded activity into one prompt string. Sections are admitted
//! in a fixed order, each only while the remaining budget is above its
//! threshold:
//!
//! | Priority | Section | Admission |
//! |----------|---------|-----------|
//! | 100 | Scaffold | always |
//! | 90 | File snapshot (numbered) | remaining > 100; first 50 lines if too big |
//! | 80 | Recent edits | remaining > 50; newest 3, each ≤ 30% of remaining |
//! | 70 | Viewed snippets | remaining > 50; newest 3, total ≤ 30% of budget |
//! | 60 | File structure | remaining > 100 |
//! | 50 | Area around cursor | always |
//! | 40 | Code to edit | always |
//! | 10 | Closing instruction | always |
//!
//! The always-included sections are charged against the budget before any
//! optional section, so a zero budget still yields a usable prompt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::instructions::{CURSOR_SENTINEL, closing_instruction, scaffold};
use super::sections::{PromptLayout, PromptSection};
use crate::config::SessionConfig;
use crate::context::{
    ActivityStore, AnalysisCache, EditRecord, FileAnalysis, Position, TokenBudget, ViewedSnippet,
    estimate_tokens,
};

const PRIORITY_SCAFFOLD: i32 = 100;
const PRIORITY_SNAPSHOT: i32 = 90;
const PRIORITY_EDITS: i32 = 80;
const PRIORITY_SNIPPETS: i32 = 70;
const PRIORITY_ANALYSIS: i32 = 60;
const PRIORITY_AREA: i32 = 50;
const PRIORITY_CODE: i32 = 40;
const PRIORITY_CLOSING: i32 = 10;

const SNAPSHOT_THRESHOLD: usize = 100;
const EDITS_THRESHOLD: usize = 50;
const SNIPPETS_THRESHOLD: usize = 50;
const ANALYSIS_THRESHOLD: usize = 100;

// ── Cursor context ─────────────────────────────────────────────────

/// The file being edited and everything derived from the cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorContext {
    pub file_id: String,
    pub language: String,
    pub content: String,
    /// Cursor position, clamped into the document.
    pub position: Position,
    /// Text on the cursor line before the cursor.
    pub prefix: String,
    /// Text on the cursor line after the cursor.
    pub suffix: String,
    /// Numbered lines within `surrounding_lines` of the cursor.
    pub area: String,
}

impl CursorContext {
    pub fn new(
        file_id: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
        position: Position,
        surrounding_lines: usize,
    ) -> Self {
        let content = content.into();
        let lines = document_lines(&content);
        let line = position.line.min(lines.len().saturating_sub(1));
        let current = lines.get(line).copied().unwrap_or("");
        let column = position.column.min(current.chars().count());

        let prefix: String = current.chars().take(column).collect();
        let suffix: String = current.chars().skip(column).collect();

        let first = line.saturating_sub(surrounding_lines);
        let last = line.saturating_add(surrounding_lines);
        let area = number_lines(
            lines
                .iter()
                .enumerate()
                .filter(|(i, _)| (first..=last).contains(i)),
        );

        Self {
            file_id: file_id.into(),
            language: language.into(),
            content,
            position: Position::new(line, column),
            prefix,
            suffix,
            area,
        }
    }

    /// The cursor line with the sentinel at the cursor.
    pub fn code_to_edit(&self) -> String {
        format!("{}{CURSOR_SENTINEL}{}", self.prefix, self.suffix)
    }
}

/// Lines of `content` without terminators. A trailing newline yields a
/// final empty line so the cursor can sit after it.
fn document_lines(content: &str) -> Vec<&str> {
    content
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

fn number_lines<S: AsRef<str>>(lines: impl Iterator<Item = (usize, S)>) -> String {
    let mut out = String::new();
    for (i, text) in lines {
        out.push_str(&format!("{}| {}\n", i + 1, text.as_ref()));
    }
    out
}

// ── Result ─────────────────────────────────────────────────────────

/// A rendered prompt and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub text: String,
    pub estimated_tokens: usize,
    pub budget: usize,
    /// Names of the sections that made it in, in render order.
    pub sections: Vec<String>,
}

impl AssembledPrompt {
    pub fn includes(&self, section: &str) -> bool {
        self.sections.iter().any(|s| s == section)
    }
}

// ── Assembler ──────────────────────────────────────────────────────

/// Builds prompts from a cursor context, activity history, and analysis.
///
/// Holds only policy (windows and caps); all state is passed per call so
/// concurrent requests never share assembly state.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    pub edit_window: Duration,
    pub snippet_window: Duration,
    pub max_edits: usize,
    pub max_snippets: usize,
    pub snapshot_head_lines: usize,
    pub analysis_entries: usize,
    /// Share of the remaining budget one edit may use, in percent.
    pub edit_share_pct: usize,
    /// Share of the call's budget all snippets together may use, in percent.
    pub snippet_share_pct: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            edit_window: Duration::from_secs(300),
            snippet_window: Duration::from_secs(600),
            max_edits: 3,
            max_snippets: 3,
            snapshot_head_lines: 50,
            analysis_entries: 5,
            edit_share_pct: 30,
            snippet_share_pct: 30,
        }
    }
}

impl PromptAssembler {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            edit_window: config.edit_window(),
            snippet_window: config.snippet_window(),
            ..Self::default()
        }
    }

    pub fn assemble(
        &self,
        cursor: &CursorContext,
        activity: &ActivityStore,
        cache: &mut AnalysisCache,
        budget_tokens: usize,
        now: DateTime<Utc>,
    ) -> AssembledPrompt {
        let mut budget = TokenBudget::new(budget_tokens);
        let mut layout = PromptLayout::new();

        let intro = PromptSection::new("scaffold", PRIORITY_SCAFFOLD)
            .with_content(scaffold(&cursor.file_id, &cursor.language))
            .separated();
        let area = PromptSection::new("area_around_code", PRIORITY_AREA)
            .with_heading("## Area around the cursor")
            .with_content(cursor.area.clone())
            .separated();
        let code = PromptSection::new("code_to_edit", PRIORITY_CODE)
            .with_heading("## Code to edit")
            .with_content(cursor.code_to_edit())
            .separated();
        let closing = PromptSection::new("closing", PRIORITY_CLOSING)
            .with_content(closing_instruction())
            .with_break_before(true);

        for section in [&intro, &area, &code, &closing] {
            budget.consume(section_tokens(section));
        }

        if budget.admits(SNAPSHOT_THRESHOLD)
            && let Some(section) = self.snapshot_section(cursor, &mut budget)
        {
            layout.push(section);
        }

        let edits = activity.recent_edits(&cursor.file_id, self.edit_window, now);
        if !edits.is_empty()
            && budget.admits(EDITS_THRESHOLD)
            && let Some(section) = self.edits_section(&edits, &mut budget)
        {
            layout.push(section);
        }

        let snippets = activity.recent_snippets(&cursor.language, self.snippet_window, now);
        if !snippets.is_empty()
            && budget.admits(SNIPPETS_THRESHOLD)
            && let Some(section) = self.snippets_section(&snippets, &mut budget)
        {
            layout.push(section);
        }

        if budget.admits(ANALYSIS_THRESHOLD) {
            let analysis = cache.get(&cursor.file_id, &cursor.content, &cursor.language, now);
            if let Some(section) = self.analysis_section(&analysis, &mut budget) {
                layout.push(section);
            }
        }

        layout.push(intro);
        layout.push(area);
        layout.push(code);
        layout.push(closing);

        let text = layout.render();
        let estimated_tokens = estimate_tokens(&text);
        let sections = layout.section_names();
        debug!(
            file = %cursor.file_id,
            "Assembled prompt: {} across [{}]",
            budget.to_log_string(),
            sections.join(", ")
        );

        AssembledPrompt {
            text,
            estimated_tokens,
            budget: budget_tokens,
            sections,
        }
    }

    fn snapshot_section(
        &self,
        cursor: &CursorContext,
        budget: &mut TokenBudget,
    ) -> Option<PromptSection> {
        let lines = document_lines(&cursor.content);
        let snapshot = |body: String| {
            PromptSection::new("file_snapshot", PRIORITY_SNAPSHOT)
                .with_heading(format!("## Current file: {}", cursor.file_id))
                .with_content(body)
                .separated()
        };

        // The heading counts too: a body that fits on its own may not.
        let full = snapshot(number_lines(lines.iter().enumerate()));
        if budget.fits(section_tokens(&full)) {
            return admit(full, budget);
        }

        let head = number_lines(lines.iter().enumerate().take(self.snapshot_head_lines));
        let hidden = lines.len().saturating_sub(self.snapshot_head_lines);
        admit(
            snapshot(format!("{head}... ({hidden} more lines truncated)\n")),
            budget,
        )
    }

    fn edits_section(
        &self,
        edits: &[&EditRecord],
        budget: &mut TokenBudget,
    ) -> Option<PromptSection> {
        let per_edit = budget.remaining() * self.edit_share_pct / 100;
        let newest = edits.len().saturating_sub(self.max_edits);

        let mut body = String::new();
        for edit in edits.iter().skip(newest) {
            let rendered = render_edit(edit);
            if estimate_tokens(&rendered) > per_edit {
                debug!(
                    "Dropping edit at line {}: exceeds {per_edit} token share",
                    edit.range.start.line + 1
                );
                continue;
            }
            body.push_str(&rendered);
        }
        if body.is_empty() {
            return None;
        }

        let section = PromptSection::new("edit_history", PRIORITY_EDITS)
            .with_heading("## Recent edits in this file (oldest first)")
            .with_content(body)
            .separated();
        admit(section, budget)
    }

    fn snippets_section(
        &self,
        snippets: &[&ViewedSnippet],
        budget: &mut TokenBudget,
    ) -> Option<PromptSection> {
        let limit = budget.total() * self.snippet_share_pct / 100;
        let newest = snippets.len().saturating_sub(self.max_snippets);

        let mut used = 0;
        let mut body = String::new();
        for snippet in snippets.iter().skip(newest) {
            let rendered = render_snippet(snippet);
            let tokens = estimate_tokens(&rendered);
            if used + tokens > limit {
                continue;
            }
            used += tokens;
            body.push_str(&rendered);
        }
        if body.is_empty() {
            return None;
        }

        let section = PromptSection::new("viewed_snippets", PRIORITY_SNIPPETS)
            .with_heading("## Recently viewed code")
            .with_content(body)
            .separated();
        admit(section, budget)
    }

    fn analysis_section(
        &self,
        analysis: &FileAnalysis,
        budget: &mut TokenBudget,
    ) -> Option<PromptSection> {
        if analysis.is_empty() {
            return None;
        }
        let n = self.analysis_entries;
        let mut body = String::new();
        for (label, items) in [
            ("Imports", &analysis.imports),
            ("Functions", &analysis.functions),
            ("Types", &analysis.classes),
            ("Variables", &analysis.variables),
        ] {
            if items.is_empty() {
                continue;
            }
            let shown: Vec<&str> = items.iter().take(n).map(String::as_str).collect();
            let more = items.len().saturating_sub(n);
            if more > 0 {
                body.push_str(&format!("{label}: {} (+{more} more)\n", shown.join(", ")));
            } else {
                body.push_str(&format!("{label}: {}\n", shown.join(", ")));
            }
        }

        let section = PromptSection::new("file_structure", PRIORITY_ANALYSIS)
            .with_heading("## File structure")
            .with_content(body)
            .separated();
        admit(section, budget)
    }
}

fn section_tokens(section: &PromptSection) -> usize {
    section.heading.as_deref().map_or(0, estimate_tokens) + estimate_tokens(&section.content)
}

/// Charge the section against the budget if it fits.
fn admit(section: PromptSection, budget: &mut TokenBudget) -> Option<PromptSection> {
    let tokens = section_tokens(&section);
    if !budget.fits(tokens) {
        debug!("Section '{}' ({tokens} tokens) does not fit", section.name);
        return None;
    }
    budget.consume(tokens);
    Some(section)
}

fn render_edit(edit: &EditRecord) -> String {
    let mut out = format!("@@ line {} @@\n", edit.range.start.line + 1);
    for line in edit.old_text.lines() {
        out.push_str(&format!("- {line}\n"));
    }
    for line in edit.new_text.lines() {
        out.push_str(&format!("+ {line}\n"));
    }
    out
}

fn render_snippet(snippet: &ViewedSnippet) -> String {
    format!(
        "From {} (lines {}-{}):\n{}\n\n",
        snippet.file_id,
        snippet.range.start.line + 1,
        snippet.range.end.line + 1,
        snippet.content.trim_end()
    )
}
