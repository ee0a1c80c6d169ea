//! Best-effort structural analysis of source files.
//!
//! Extraction is line-oriented pattern matching, not parsing: it will
//! over- and under-match, and the results are only ever used as hints in the
//! prompt. Each language is handled by an [`Analyzer`] registered in an
//! [`AnalyzerRegistry`] under its editor language id, so a stronger
//! per-language implementation can replace the heuristic without touching
//! prompt assembly.
//!
//! Unsupported languages produce an analysis with all lists empty. That is
//! not a failure.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

/// Structural summary of one file at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAnalysis {
    /// The content the analysis was computed from.
    pub snapshot_content: String,
    pub language: String,
    /// Whole import lines, trimmed.
    pub imports: Vec<String>,
    pub functions: Vec<String>,
    /// Classes, structs, traits, interfaces, and other type declarations.
    pub classes: Vec<String>,
    pub variables: Vec<String>,
}

impl FileAnalysis {
    /// True when nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
            && self.functions.is_empty()
            && self.classes.is_empty()
            && self.variables.is_empty()
    }
}

/// The four lists an analyzer extracts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    pub imports: Vec<String>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub variables: Vec<String>,
}

/// Extracts structure from the text of one language.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, content: &str) -> Structure;
}

// ── Pattern analyzer ───────────────────────────────────────────────

/// Regex sources for one language.
///
/// Import patterns select whole lines. The other categories take the name
/// from capture group 1.
#[derive(Debug, Clone, Copy)]
pub struct LanguagePatterns {
    pub imports: &'static [&'static str],
    pub functions: &'static [&'static str],
    pub classes: &'static [&'static str],
    pub variables: &'static [&'static str],
}

/// Names that patterns commonly capture by accident.
const REJECTED_NAMES: &[&str] = &[
    "if", "else", "for", "while", "switch", "match", "catch", "return", "new", "function", "do",
    "try", "throw", "await", "yield", "typeof", "super", "this", "self", "_",
];

/// Heuristic analyzer driven by a [`LanguagePatterns`] table.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    imports: Vec<Regex>,
    functions: Vec<Regex>,
    classes: Vec<Regex>,
    variables: Vec<Regex>,
}

impl PatternAnalyzer {
    pub fn new(patterns: &LanguagePatterns) -> Result<Self, regex::Error> {
        let compile = |srcs: &[&str]| -> Result<Vec<Regex>, regex::Error> {
            srcs.iter().map(|s| Regex::new(s)).collect()
        };
        Ok(Self {
            imports: compile(patterns.imports)?,
            functions: compile(patterns.functions)?,
            classes: compile(patterns.classes)?,
            variables: compile(patterns.variables)?,
        })
    }
}

impl Analyzer for PatternAnalyzer {
    fn analyze(&self, content: &str) -> Structure {
        let mut out = Structure::default();
        for line in content.lines() {
            if self.imports.iter().any(|re| re.is_match(line)) {
                push_unique(&mut out.imports, line.trim());
                continue;
            }
            if let Some(name) = first_name(&self.classes, line) {
                push_unique(&mut out.classes, name);
            } else if let Some(name) = first_name(&self.functions, line) {
                push_unique(&mut out.functions, name);
            } else if let Some(name) = first_name(&self.variables, line) {
                push_unique(&mut out.variables, name);
            }
        }
        // Arrow functions also match the binding patterns.
        out.variables.retain(|v| !out.functions.contains(v));
        out
    }
}

fn first_name<'a>(patterns: &[Regex], line: &'a str) -> Option<&'a str> {
    patterns.iter().find_map(|re| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|name| !REJECTED_NAMES.contains(name))
    })
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|x| x == item) {
        list.push(item.to_string());
    }
}

// ── Built-in tables ────────────────────────────────────────────────

pub const RUST_PATTERNS: LanguagePatterns = LanguagePatterns {
    imports: &[r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+\S", r"^\s*extern\s+crate\s+\w"],
    functions: &[
        r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)"#,
    ],
    classes: &[
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(?:struct|enum|trait|union|type)\s+([A-Za-z_][A-Za-z0-9_]*)",
    ],
    variables: &[
        r"^\s*let\s+(?:mut\s+)?([A-Za-z_][A-Za-z0-9_]*)",
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+(?:mut\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*:",
    ],
};

pub const PYTHON_PATTERNS: LanguagePatterns = LanguagePatterns {
    imports: &[r"^\s*import\s+\w", r"^\s*from\s+\S+\s+import\s+"],
    functions: &[r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)"],
    classes: &[r"^\s*class\s+([A-Za-z_]\w*)"],
    variables: &[r"^([A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]"],
};

pub const JAVASCRIPT_PATTERNS: LanguagePatterns = LanguagePatterns {
    imports: &[
        r"^\s*import\s",
        r#"^\s*(?:const|let|var)\s+.*=\s*require\(\s*['"]"#,
    ],
    functions: &[
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
        r"^\s+(?:(?:public|private|protected|static|async|get|set)\s+)*([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*(?::[^{]+)?\{\s*$",
    ],
    classes: &[
        r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
        r"^\s*(?:export\s+)?(?:declare\s+)?(?:interface|type|enum)\s+([A-Za-z_$][\w$]*)",
    ],
    variables: &[r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)"],
};

pub const GO_PATTERNS: LanguagePatterns = LanguagePatterns {
    imports: &[r"^\s*import\s", r#"^\s+(?:\w+\s+)?"[\w./-]+"\s*$"#],
    functions: &[r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)"],
    classes: &[r"^\s*type\s+([A-Za-z_]\w*)\s+(?:struct|interface)\b"],
    variables: &[
        r"^\s*(?:var|const)\s+([A-Za-z_]\w*)",
        r"^\s*([A-Za-z_]\w*)(?:\s*,\s*\w+)*\s*:=",
    ],
};

pub const JAVA_PATTERNS: LanguagePatterns = LanguagePatterns {
    imports: &[r"^\s*import\s+[\w.*]+", r"^\s*package\s+[\w.]+"],
    functions: &[
        r"^\s*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default)\s+)*[\w<>\[\],?]+(?:\s*<[^>]*>)?\s+([A-Za-z_]\w*)\s*\([^;]*$",
    ],
    classes: &[
        r"^\s*(?:(?:public|private|protected|static|final|abstract|sealed)\s+)*(?:class|interface|enum|record|@interface)\s+([A-Za-z_]\w*)",
    ],
    variables: &[
        r"^\s*(?:(?:public|private|protected|static|final|volatile|transient)\s+)*[\w<>\[\],?]+\s+([A-Za-z_]\w*)\s*(?:=[^=]|;)",
    ],
};

// ── Registry ───────────────────────────────────────────────────────

/// Analyzers keyed by editor language id.
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<dyn Analyzer>>,
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut langs: Vec<_> = self.analyzers.keys().collect();
        langs.sort();
        f.debug_struct("AnalyzerRegistry")
            .field("languages", &langs)
            .finish()
    }
}

impl AnalyzerRegistry {
    /// An empty registry: every language analyzes to nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the heuristic analyzers for Rust, Python,
    /// JavaScript/TypeScript (including the React variants), Go, and Java.
    pub fn with_builtin_analyzers() -> Self {
        let table: [(&[&str], &LanguagePatterns); 5] = [
            (&["rust"], &RUST_PATTERNS),
            (&["python"], &PYTHON_PATTERNS),
            (
                &[
                    "javascript",
                    "typescript",
                    "javascriptreact",
                    "typescriptreact",
                ],
                &JAVASCRIPT_PATTERNS,
            ),
            (&["go"], &GO_PATTERNS),
            (&["java"], &JAVA_PATTERNS),
        ];

        let mut registry = Self::new();
        for (languages, patterns) in table {
            match PatternAnalyzer::new(patterns) {
                Ok(analyzer) => {
                    let analyzer: Arc<dyn Analyzer> = Arc::new(analyzer);
                    for lang in languages {
                        registry
                            .analyzers
                            .insert((*lang).to_string(), Arc::clone(&analyzer));
                    }
                }
                Err(e) => warn!("Skipping analyzer for {languages:?}: {e}"),
            }
        }
        registry
    }

    /// Register (or replace) the analyzer for a language.
    pub fn register(&mut self, language: impl Into<String>, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.insert(language.into(), analyzer);
    }

    pub fn with(mut self, language: impl Into<String>, analyzer: Arc<dyn Analyzer>) -> Self {
        self.register(language, analyzer);
        self
    }

    pub fn supports(&self, language: &str) -> bool {
        self.analyzers.contains_key(language)
    }

    /// Analyze `content` as `language`.
    pub fn analyze(&self, content: &str, language: &str) -> FileAnalysis {
        let structure = self
            .analyzers
            .get(language)
            .map(|a| a.analyze(content))
            .unwrap_or_default();
        FileAnalysis {
            snapshot_content: content.to_string(),
            language: language.to_string(),
            imports: structure.imports,
            functions: structure.functions,
            classes: structure.classes,
            variables: structure.variables,
        }
    }
}

/// Guess the editor language id from a file extension.
pub fn language_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("rs") => "rust",
        Some("py" | "pyi") => "python",
        Some("js" | "mjs" | "cjs") => "javascript",
        Some("jsx") => "javascriptreact",
        Some("ts" | "mts" | "cts") => "typescript",
        Some("tsx") => "typescriptreact",
        Some("go") => "go",
        Some("java") => "java",
        Some("c" | "h") => "c",
        Some("cc" | "cpp" | "cxx" | "hpp" | "hh") => "cpp",
        Some("cs") => "csharp",
        Some("rb") => "ruby",
        Some("php") => "php",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(content: &str, lang: &str) -> FileAnalysis {
        AnalyzerRegistry::with_builtin_analyzers().analyze(content, lang)
    }

    #[test]
    fn builtin_patterns_compile() {
        for p in [
            &RUST_PATTERNS,
            &PYTHON_PATTERNS,
            &JAVASCRIPT_PATTERNS,
            &GO_PATTERNS,
            &JAVA_PATTERNS,
        ] {
            PatternAnalyzer::new(p).unwrap();
        }
    }

    #[test]
    fn rust_structure() {
        let src = "\
use std::collections::HashMap;
pub(crate) use crate::foo::Bar;

pub struct Cache {
    map: HashMap<String, u32>,
}

enum Mode { A, B }

pub const LIMIT: usize = 4;

impl Cache {
    pub async fn fetch(&self) -> u32 {
        let mut total = 0;
        total
    }
}

fn helper() {}
";
        let a = analyze(src, "rust");
        assert_eq!(
            a.imports,
            ["use std::collections::HashMap;", "pub(crate) use crate::foo::Bar;"]
        );
        assert_eq!(a.classes, ["Cache", "Mode"]);
        assert_eq!(a.functions, ["fetch", "helper"]);
        assert_eq!(a.variables, ["LIMIT", "total"]);
        assert_eq!(a.language, "rust");
        assert_eq!(a.snapshot_content, src);
    }

    #[test]
    fn python_structure() {
        let src = "\
import os
from typing import List

MAX = 10

class Parser:
    def parse(self, text):
        return text

async def main():
    pass
";
        let a = analyze(src, "python");
        assert_eq!(a.imports, ["import os", "from typing import List"]);
        assert_eq!(a.classes, ["Parser"]);
        assert_eq!(a.functions, ["parse", "main"]);
        assert_eq!(a.variables, ["MAX"]);
    }

    #[test]
    fn typescript_structure() {
        let src = "\
import { readFile } from 'fs';
const path = require('path');

export interface Options { verbose: boolean }

export class Loader {
  load(name: string): string {
    if (name) {
      return name;
    }
  }
}

export const handler = async (req) => {
  return req;
};

function plain() {}
let counter = 0;
";
        let a = analyze(src, "typescript");
        assert_eq!(
            a.imports,
            ["import { readFile } from 'fs';", "const path = require('path');"]
        );
        assert_eq!(a.classes, ["Options", "Loader"]);
        assert_eq!(a.functions, ["load", "handler", "plain"]);
        assert_eq!(a.variables, ["counter"]);
    }

    #[test]
    fn go_and_java_find_declarations() {
        let go = analyze(
            "package main\n\nimport \"fmt\"\n\ntype Server struct {}\n\nfunc (s *Server) Run() {\n\tport := 80\n}\n",
            "go",
        );
        assert_eq!(go.imports, ["import \"fmt\""]);
        assert_eq!(go.classes, ["Server"]);
        assert_eq!(go.functions, ["Run"]);
        assert_eq!(go.variables, ["port"]);

        let java = analyze(
            "import java.util.List;\n\npublic class App {\n    private int count = 0;\n    public static void main(String[] args) {\n    }\n}\n",
            "java",
        );
        assert_eq!(java.imports, ["import java.util.List;"]);
        assert_eq!(java.classes, ["App"]);
        assert_eq!(java.functions, ["main"]);
        assert_eq!(java.variables, ["count"]);
    }

    #[test]
    fn unsupported_language_is_empty_not_error() {
        let a = analyze("SELECT * FROM t;", "sql");
        assert!(a.is_empty());
        assert_eq!(a.language, "sql");
        assert_eq!(a.snapshot_content, "SELECT * FROM t;");
    }

    #[test]
    fn custom_analyzer_replaces_builtin() {
        struct Fixed;
        impl Analyzer for Fixed {
            fn analyze(&self, _content: &str) -> Structure {
                Structure {
                    functions: vec!["from_parser".into()],
                    ..Structure::default()
                }
            }
        }

        let registry = AnalyzerRegistry::with_builtin_analyzers().with("rust", Arc::new(Fixed));
        let a = registry.analyze("fn ignored() {}", "rust");
        assert_eq!(a.functions, ["from_parser"]);
    }

    #[test]
    fn language_detection_by_extension() {
        assert_eq!(language_from_path(Path::new("src/main.rs")), "rust");
        assert_eq!(language_from_path(Path::new("App.TSX")), "typescriptreact");
        assert_eq!(language_from_path(Path::new("a/b.py")), "python");
        assert_eq!(language_from_path(Path::new("Makefile")), "plaintext");
    }
}
