//! Weighted prompt sections and the rendering pass that joins them.
//!
//! A prompt is a small tree of named [`PromptSection`]s. Each section carries
//! a priority, optional heading and body text, and flags saying whether it
//! wants a blank line before or after it. [`PromptLayout::render`] orders
//! sections by priority (highest first, insertion order for ties), flattens
//! the tree, and then runs a single cleanup:
//!
//! - adjacent separators collapse into one blank line,
//! - runs of three or more newlines collapse to two ([`collapse_newlines`]),
//! - leading and trailing whitespace is trimmed.
//!
//! Sections that end up empty are dropped together with their separators, so
//! omitting a section never leaves a gap behind.

/// One named, weighted piece of a prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptSection {
    pub name: String,
    /// Higher renders earlier.
    pub priority: i32,
    pub heading: Option<String>,
    pub content: String,
    pub break_before: bool,
    pub break_after: bool,
    pub children: Vec<PromptSection>,
}

impl PromptSection {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            ..Self::default()
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Request a blank line before and after this section.
    pub fn separated(mut self) -> Self {
        self.break_before = true;
        self.break_after = true;
        self
    }

    pub fn with_break_before(mut self, on: bool) -> Self {
        self.break_before = on;
        self
    }

    pub fn with_break_after(mut self, on: bool) -> Self {
        self.break_after = on;
        self
    }

    pub fn with_child(mut self, child: PromptSection) -> Self {
        self.children.push(child);
        self
    }

    /// True when neither this section nor any child has body text.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.children.iter().all(PromptSection::is_empty)
    }

    fn flatten<'a>(&'a self, out: &mut Vec<Piece<'a>>) {
        if self.is_empty() {
            return;
        }
        if self.break_before {
            out.push(Piece::Break);
        }
        if let Some(heading) = &self.heading {
            out.push(Piece::Text(heading));
        }
        if !self.content.trim().is_empty() {
            out.push(Piece::Text(&self.content));
        }
        for child in sorted(&self.children) {
            child.flatten(out);
        }
        if self.break_after {
            out.push(Piece::Break);
        }
    }
}

enum Piece<'a> {
    Text(&'a str),
    Break,
}

/// Stable sort, highest priority first.
fn sorted(sections: &[PromptSection]) -> Vec<&PromptSection> {
    let mut refs: Vec<&PromptSection> = sections.iter().collect();
    refs.sort_by(|a, b| b.priority.cmp(&a.priority));
    refs
}

/// An ordered collection of top-level sections.
#[derive(Debug, Clone, Default)]
pub struct PromptLayout {
    sections: Vec<PromptSection>,
}

impl PromptLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: PromptSection) {
        self.sections.push(section);
    }

    /// Names of the non-empty sections in render order.
    pub fn section_names(&self) -> Vec<String> {
        sorted(&self.sections)
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn render(&self) -> String {
        let mut pieces = Vec::new();
        for section in sorted(&self.sections) {
            section.flatten(&mut pieces);
        }

        let mut out = String::new();
        let mut pending_break = false;
        for piece in pieces {
            match piece {
                Piece::Break => pending_break = true,
                Piece::Text(text) => {
                    if pending_break && !out.is_empty() {
                        out.push('\n');
                    }
                    pending_break = false;
                    out.push_str(text);
                    if !text.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
        collapse_newlines(&out).trim().to_string()
    }
}

/// Collapse every run of three or more `\n` to exactly two.
pub fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            run += 1;
            if run <= 2 {
                out.push(ch);
            }
        } else {
            run = 0;
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_by_priority_with_stable_ties() {
        let mut layout = PromptLayout::new();
        layout.push(PromptSection::new("low", 1).with_content("C"));
        layout.push(PromptSection::new("tie-a", 5).with_content("A1"));
        layout.push(PromptSection::new("high", 9).with_content("H"));
        layout.push(PromptSection::new("tie-b", 5).with_content("A2"));
        assert_eq!(layout.render(), "H\nA1\nA2\nC");
        assert_eq!(layout.section_names(), ["high", "tie-a", "tie-b", "low"]);
    }

    #[test]
    fn adjacent_breaks_collapse_to_one_blank_line() {
        let mut layout = PromptLayout::new();
        layout.push(PromptSection::new("a", 3).with_content("first").separated());
        layout.push(PromptSection::new("b", 2).with_content("second").separated());
        assert_eq!(layout.render(), "first\n\nsecond");
    }

    #[test]
    fn omitted_sections_leave_no_gap() {
        let mut layout = PromptLayout::new();
        layout.push(PromptSection::new("a", 3).with_content("first").separated());
        layout.push(
            PromptSection::new("empty", 2)
                .with_heading("## Nothing")
                .separated(),
        );
        layout.push(PromptSection::new("c", 1).with_content("third\n\n\n\n").separated());
        let out = layout.render();
        assert_eq!(out, "first\n\nthird");
        assert!(!out.contains("## Nothing"));
    }

    #[test]
    fn heading_and_children_render_in_order() {
        let section = PromptSection::new("parent", 5)
            .with_heading("## Parent")
            .with_child(PromptSection::new("late", 1).with_content("late child"))
            .with_child(
                PromptSection::new("early", 2)
                    .with_content("early child")
                    .with_break_after(true),
            );
        let mut layout = PromptLayout::new();
        layout.push(section);
        assert_eq!(layout.render(), "## Parent\nearly child\n\nlate child");
    }

    #[test]
    fn output_never_has_three_newlines() {
        let mut layout = PromptLayout::new();
        for (i, body) in ["x\n\n\n\n", "\n\n\ny", "", "\n\n\n", "z"].iter().enumerate() {
            layout.push(PromptSection::new(format!("s{i}"), 0).with_content(*body).separated());
        }
        let out = layout.render();
        assert!(!out.contains("\n\n\n"), "{out:?}");
        assert!(out.starts_with('x'));
        assert!(out.ends_with('z'));
    }

    #[test]
    fn collapse_newlines_only_touches_long_runs() {
        assert_eq!(collapse_newlines("a\nb\n\nc\n\n\n\nd"), "a\nb\n\nc\n\nd");
        assert_eq!(collapse_newlines(""), "");
    }
}
