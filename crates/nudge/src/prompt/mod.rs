//! Prompt construction: section tree, fixed instructions, and the
//! budget-driven assembler.

pub mod assembler;
pub mod instructions;
pub mod sections;

pub use assembler::{AssembledPrompt, CursorContext, PromptAssembler};
pub use instructions::{CURSOR_SENTINEL, closing_instruction, scaffold, system_instructions};
pub use sections::{PromptLayout, PromptSection, collapse_newlines};
