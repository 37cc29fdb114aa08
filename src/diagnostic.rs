//! Source positions and the diagnostic records shared by the lexer, parser,
//! and type checker.

use serde::Serialize;

use crate::suggest::{find_similar, KNOWN_WORDS};

/// A single source location: line/column are 1-based, offset is a 0-based
/// byte index into the source string. Assigned once at lexing time and
/// copied verbatim into every AST node and diagnostic that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Self { line, column, offset }
    }

    pub const fn start() -> Self {
        Self { line: 1, column: 1, offset: 0 }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
}

/// A diagnostic produced by lexing, parsing, or type checking. Collected
/// into an append-only list; the existence of any error is the observable
/// failure signal for the whole pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub position: Position,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, position: Position) -> Self {
        Diagnostic { severity: Severity::Error, message: message.into(), position, suggestion: None }
    }

    /// Attach a "did you mean" suggestion if `word` is close to a known
    /// keyword.
    pub fn with_suggestion_for(mut self, word: &str) -> Self {
        if let Some(s) = find_similar(word, KNOWN_WORDS, 2) {
            if !s.eq_ignore_ascii_case(word) {
                self.suggestion = Some(s.to_string());
            }
        }
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error at {}: {}", self.position, self.message)?;
        if let Some(s) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_display_is_line_colon_column() {
        let p = Position::new(3, 7, 42);
        assert_eq!(p.to_string(), "3:7");
    }

    #[test]
    fn with_suggestion_for_finds_close_keyword() {
        let d = Diagnostic::error("unexpected identifier", Position::start())
            .with_suggestion_for("fucntion");
        assert_eq!(d.suggestion.as_deref(), Some("function"));
    }

    #[test]
    fn with_suggestion_for_no_match_leaves_none() {
        let d = Diagnostic::error("x", Position::start()).with_suggestion_for("xyzzy");
        assert_eq!(d.suggestion, None);
    }

    #[test]
    fn display_includes_suggestion() {
        let d = Diagnostic::error("bad", Position::start()).with_suggestion_for("cosnt");
        let s = d.to_string();
        assert!(s.contains("did you mean 'const'?"));
    }
}
