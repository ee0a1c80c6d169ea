//! Fixed text wrapped around every assembled prompt.

/// Marks the cursor inside the code-to-edit section. Replies should never
/// contain it; the sanitizer strips it if they do.
pub const CURSOR_SENTINEL: &str = "<|cursor|>";

/// System message sent alongside every prompt.
pub fn system_instructions() -> String {
    format!(
        "\
You are a code completion engine embedded in an editor. You receive the \
developer's current file, their recent edits, code they recently looked at, \
and the exact cursor position marked with {CURSOR_SENTINEL}.

Rules:
- Reply with code only. No explanations, no markdown fences.
- Produce only the text that belongs at {CURSOR_SENTINEL}.
- Do not repeat code that already appears before the cursor.
- Match the surrounding indentation, naming, and style.
- If nothing sensible fits, reply with an empty message."
    )
}

/// Opening scaffold of the user prompt.
pub fn scaffold(file_id: &str, language: &str) -> String {
    format!(
        "Complete the {language} code in `{file_id}` at the cursor. Context \
follows in order of importance; the section \"Code to edit\" is the line \
being completed."
    )
}

/// Closing instruction, always the last section.
pub fn closing_instruction() -> String {
    format!(
        "Rewrite only the {CURSOR_SENTINEL} region of \"Code to edit\". Output the \
inserted code and nothing else."
    )
}
