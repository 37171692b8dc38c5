use serde::Serialize;
use twls_source::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ExprTokenKind {
    Name,
    /// Quoted string; `text` keeps the quotes.
    String,
    Number,
    Punct,
}

/// One lexical unit of a Twig expression, e.g. the content of `{{ ... }}` or
/// the arguments of a statement tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExprToken<'src> {
    pub kind: ExprTokenKind,
    pub text: &'src str,
    pub span: Span,
}

impl<'src> ExprToken<'src> {
    #[must_use]
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == ExprTokenKind::Punct && self.text == punct
    }

    #[must_use]
    pub fn is_name(&self, name: &str) -> bool {
        self.kind == ExprTokenKind::Name && self.text == name
    }

    /// String contents without the quotes. Escapes are left as written.
    #[must_use]
    pub fn string_value(&self) -> Option<&'src str> {
        if self.kind != ExprTokenKind::String {
            return None;
        }
        let quote = self.text.chars().next()?;
        let inner = &self.text[1..];
        Some(inner.strip_suffix(quote).unwrap_or(inner))
    }

    /// Span of the string contents without the quotes.
    #[must_use]
    pub fn value_span(&self) -> Span {
        let value_len = self.string_value().map_or(0, str::len);
        if self.kind == ExprTokenKind::String {
            Span::from_parts(self.span.start_usize() + 1, value_len)
        } else {
            self.span
        }
    }
}

/// Multi-character operators, longest first.
const OPERATORS: &[&str] = &[
    "...", "..", "==", "!=", "<=", ">=", "??", "?:", "**", "//", "=>", "?.",
];

/// Scan `text` into expression tokens. Spans are absolute: `offset` is where
/// `text` starts in the template source. Unknown characters become
/// single-character punctuation, an unterminated string runs to the end.
#[must_use]
pub fn scan(text: &str, offset: u32) -> Vec<ExprToken<'_>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;

    while let Some(ch) = text[pos..].chars().next() {
        let start = pos;
        let kind = if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        } else if ch == '\'' || ch == '"' {
            pos = string_end(bytes, pos);
            ExprTokenKind::String
        } else if ch.is_ascii_digit() {
            pos = number_end(bytes, pos);
            ExprTokenKind::Number
        } else if is_name_start(ch) {
            pos += ch.len_utf8();
            while let Some(next) = text[pos..].chars().next() {
                if !is_name_continue(next) {
                    break;
                }
                pos += next.len_utf8();
            }
            ExprTokenKind::Name
        } else {
            let rest = &text[pos..];
            pos += OPERATORS
                .iter()
                .find(|punct| rest.starts_with(**punct))
                .map_or(ch.len_utf8(), |punct| punct.len());
            ExprTokenKind::Punct
        };

        tokens.push(ExprToken {
            kind,
            text: &text[start..pos],
            span: Span::from_parts(offset as usize + start, pos - start),
        });
    }

    tokens
}

fn string_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn number_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' | b'_' => i += 1,
            // `1.5` is a number, `1..5` is a range
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => i += 1,
            _ => break,
        }
    }
    i
}

fn is_name_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_name_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}
