//! Cleanup of raw model replies into insertable code.
//!
//! Models asked for "code only" still wrap replies in markdown fences, copy
//! the line numbers and cursor marker from the prompt, or repeat the text
//! already typed before the cursor. [`sanitize`] removes all of that, in
//! order:
//!
//! 1. one leading and one trailing code fence marker,
//! 2. every cursor sentinel,
//! 3. `<number>| ` prefixes at the start of each line,
//! 4. a copy of the already-typed prefix at the start of the reply,
//! 5. runs of three or more newlines (collapsed to two), and trailing
//!    line breaks.

use crate::prompt::{CURSOR_SENTINEL, collapse_newlines};

const FENCE: &str = "```";

/// Turn a raw reply into the text to insert at the cursor.
///
/// Pure and deterministic.
pub fn sanitize(raw: &str, typed_prefix: &str) -> String {
    let unfenced = strip_fences(raw);
    let unmarked = unfenced.replace(CURSOR_SENTINEL, "");
    let unnumbered = unmarked
        .split('\n')
        .map(strip_line_number)
        .collect::<Vec<_>>()
        .join("\n");
    let deduped = strip_typed_prefix(&unnumbered, typed_prefix);
    collapse_newlines(deduped)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// Remove the first line if it opens a fence and the last line if it
/// closes one. Blank lines outside the fences are ignored.
///
/// A reply fenced on one line (`` ```x + 1``` ``) keeps what sits between
/// the markers, and a closing marker glued to the last code line is cut off
/// that line.
fn strip_fences(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return raw.to_string();
    };

    if first == last {
        let line = lines[first].trim();
        return match line.strip_prefix(FENCE) {
            // A lone opener (`` ``` `` or `` ```rust ``) carries no code.
            Some(inner) => inner
                .strip_suffix(FENCE)
                .map(|code| code.trim().to_string())
                .unwrap_or_default(),
            None => raw.to_string(),
        };
    }

    let opens = lines[first].trim_start().starts_with(FENCE);
    let closes = lines[last].trim() == FENCE;
    if !opens && !closes {
        return raw.to_string();
    }
    let start = if opens { first + 1 } else { 0 };
    let end = if closes { last } else { lines.len() };
    let mut kept: Vec<&str> = lines.get(start..end.max(start)).unwrap_or_default().to_vec();
    if opens
        && !closes
        && let Some(tail) = kept.iter().rposition(|l| !l.trim().is_empty())
        && let Some(code) = kept[tail].trim_end().strip_suffix(FENCE)
    {
        kept[tail] = code;
    }
    kept.join("\n")
}

/// Strip a leading `<digits>| ` (optionally indented, space optional).
fn strip_line_number(line: &str) -> &str {
    let rest = line.trim_start();
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    let after_digits = rest.get(digits..).unwrap_or("");
    match after_digits.strip_prefix('|') {
        Some(text) => text.strip_prefix(' ').unwrap_or(text),
        None => line,
    }
}

fn strip_typed_prefix<'a>(text: &'a str, typed_prefix: &str) -> &'a str {
    if typed_prefix.is_empty() {
        return text;
    }
    if let Some(rest) = text.strip_prefix(typed_prefix) {
        return rest;
    }
    let unindented = typed_prefix.trim_start();
    if !unindented.is_empty()
        && let Some(rest) = text.trim_start().strip_prefix(unindented)
    {
        return rest;
    }
    text
}
