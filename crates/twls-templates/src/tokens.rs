use serde::Serialize;
use twls_source::Span;

use crate::error::Delimiter;

/// Lexical unit of a template.
///
/// `span` on the delimited variants covers the trimmed content between the
/// delimiters; `full_span` covers the delimiters as well.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Token {
    Block {
        content: String,
        span: Span,
        full_span: Span,
    },
    Variable {
        content: String,
        span: Span,
        full_span: Span,
    },
    Comment {
        content: String,
        span: Span,
        full_span: Span,
    },
    /// An opening delimiter whose closing delimiter was never found. `content`
    /// runs to the point where the lexer resynchronized.
    Error {
        content: String,
        delimiter: Delimiter,
        span: Span,
        full_span: Span,
    },
    Text {
        span: Span,
    },
    Whitespace {
        span: Span,
    },
    Newline {
        span: Span,
    },
    Eof {
        offset: u32,
    },
}

impl Token {
    #[must_use]
    pub fn full_span(&self) -> Span {
        match self {
            Token::Block { full_span, .. }
            | Token::Variable { full_span, .. }
            | Token::Comment { full_span, .. }
            | Token::Error { full_span, .. } => *full_span,
            Token::Text { span } | Token::Whitespace { span } | Token::Newline { span } => *span,
            Token::Eof { offset } => Span::new(*offset, 0),
        }
    }

    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Token::Text { .. } | Token::Whitespace { .. } | Token::Newline { .. }
        )
    }
}
