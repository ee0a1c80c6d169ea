//! Activity tracking and per-file structural hints.
//!
//! 1. **[`activity`]**: [`ActivityStore`] ring buffers of recent edits and
//!    viewed snippets, filtered by file or language and a freshness window.
//!
//! 2. **[`analysis`]**: heuristic extraction of imports, functions, classes,
//!    and variables behind the [`Analyzer`] trait, keyed by language.
//!
//! 3. **[`cache`]**: [`AnalysisCache`] with TTL expiry and edit-triggered
//!    invalidation.
//!
//! 4. **[`budget`]**: the character-based token estimate and the running
//!    [`TokenBudget`] used when admitting prompt sections.

pub mod activity;
pub mod analysis;
pub mod budget;
pub mod cache;

pub use activity::{ActivityStore, EditRecord, Position, TextRange, ViewedSnippet};
pub use analysis::{
    Analyzer, AnalyzerRegistry, FileAnalysis, LanguagePatterns, PatternAnalyzer, Structure,
    language_from_path,
};
pub use budget::{CHARS_PER_TOKEN, TokenBudget, estimate_tokens};
pub use cache::AnalysisCache;
