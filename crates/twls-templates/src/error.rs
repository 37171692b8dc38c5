use std::fmt;

use serde::Serialize;
use thiserror::Error;
use twls_source::Span;

/// Which Twig construct a delimiter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Delimiter {
    Statement,
    Expression,
    Comment,
}

impl Delimiter {
    #[must_use]
    pub fn open(self) -> &'static str {
        match self {
            Delimiter::Statement => "{%",
            Delimiter::Expression => "{{",
            Delimiter::Comment => "{#",
        }
    }

    #[must_use]
    pub fn close(self) -> &'static str {
        match self {
            Delimiter::Statement => "%}",
            Delimiter::Expression => "}}",
            Delimiter::Comment => "#}",
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Delimiter::Statement => "statement",
            Delimiter::Expression => "expression",
            Delimiter::Comment => "comment",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ParseErrorKind {
    UnbalancedTag,
    UnclosedBlock,
    UnterminatedExpression,
    EmptyTag,
}

/// A recoverable problem found while parsing. The parser keeps going after
/// every one of these and returns a best-effort tree next to them.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
pub enum ParseError {
    /// A closing tag with no open block to close.
    ///
    /// ```twig
    /// {% if user %}hi{% endif %}{% endif %}
    /// ```
    #[error("Unbalanced closing tag '{tag}' has no matching opening tag")]
    UnbalancedTag { tag: String, span: Span },

    /// A block that was still open when its parent closed or the file ended.
    #[error("Unclosed '{tag}' block: expected '{expected_closer}'")]
    UnclosedBlock {
        tag: String,
        expected_closer: String,
        span: Span,
    },

    /// `{%`, `{{` or `{#` without the matching closing delimiter.
    #[error("Unterminated {delimiter}: missing '{}'", .delimiter.close())]
    UnterminatedExpression { delimiter: Delimiter, span: Span },

    #[error("Empty tag")]
    EmptyTag { span: Span },
}

impl ParseError {
    #[must_use]
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            ParseError::UnbalancedTag { .. } => ParseErrorKind::UnbalancedTag,
            ParseError::UnclosedBlock { .. } => ParseErrorKind::UnclosedBlock,
            ParseError::UnterminatedExpression { .. } => ParseErrorKind::UnterminatedExpression,
            ParseError::EmptyTag { .. } => ParseErrorKind::EmptyTag,
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnbalancedTag { span, .. }
            | ParseError::UnclosedBlock { span, .. }
            | ParseError::UnterminatedExpression { span, .. }
            | ParseError::EmptyTag { span } => *span,
        }
    }

    /// Stable diagnostic code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ParseErrorKind::UnbalancedTag => "T100",
            ParseErrorKind::UnclosedBlock => "T101",
            ParseErrorKind::UnterminatedExpression => "T102",
            ParseErrorKind::EmptyTag => "T103",
        }
    }
}
