//! Convenience re-exports for the common case.
//!
//! ```ignore
//! use nudge::prelude::*;
//! ```

pub use crate::cancel::CancelToken;
pub use crate::config::{CompletionConfig, SessionConfig, Settings};
pub use crate::context::{
    ActivityStore, AnalysisCache, Analyzer, AnalyzerRegistry, EditRecord, FileAnalysis, Position,
    TextRange, ViewedSnippet, language_from_path,
};
pub use crate::prompt::{AssembledPrompt, CursorContext, PromptAssembler};
pub use crate::sanitize::sanitize;
pub use crate::session::{
    Clock, CompletionEvent, CompletionRequest, CompletionSession, EditorEvent, EventHandler,
    LoggingHandler, ManualClock, NoopHandler, SystemClock, TextChange, Trigger,
};
pub use crate::{CompletionBackend, CompletionClient, CompletionError, Message, MessageRole};
