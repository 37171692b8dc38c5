use twls_source::Span;

use crate::error::Delimiter;
use crate::tokens::Token;

const OPENERS: [&str; 3] = ["{%", "{{", "{#"];

pub struct Lexer<'src> {
    source: &'src str,
    start: usize,
    current: usize,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            start: 0,
            current: 0,
        }
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::with_capacity(self.source.len() / 16 + 1);

        while !self.is_at_end() {
            self.start = self.current;

            let token = match self.peek() {
                '{' => match self.peek_next() {
                    '%' => self.lex_construct(Delimiter::Statement),
                    '{' => self.lex_construct(Delimiter::Expression),
                    '#' => self.lex_construct(Delimiter::Comment),
                    _ => self.lex_text(),
                },
                c if c.is_whitespace() => self.lex_whitespace(c),
                _ => self.lex_text(),
            };

            tokens.push(token);
        }

        tokens.push(Token::Eof {
            offset: u32::try_from(self.source.len()).unwrap_or(u32::MAX),
        });

        tokens
    }

    fn lex_construct(&mut self, delimiter: Delimiter) -> Token {
        let open_end = self.start + 2;

        let Some(close_start) = self.find_close(open_end, delimiter.close()) else {
            self.current = open_end;
            self.synchronize();
            let full_span = Span::from_bounds(self.start, self.current);
            let (content, span) = self.trimmed_content(open_end, self.current, delimiter);
            return Token::Error {
                content,
                delimiter,
                span,
                full_span,
            };
        };

        self.current = close_start + 2;
        let full_span = Span::from_bounds(self.start, self.current);
        let (content, span) = self.trimmed_content(open_end, close_start, delimiter);

        match delimiter {
            Delimiter::Statement => Token::Block {
                content,
                span,
                full_span,
            },
            Delimiter::Expression => Token::Variable {
                content,
                span,
                full_span,
            },
            Delimiter::Comment => Token::Comment {
                content,
                span,
                full_span,
            },
        }
    }

    /// Locate the closing delimiter, skipping over quoted strings in
    /// statements and expressions. Falls back to a plain search when a quote
    /// is never closed so a stray apostrophe does not swallow the file.
    fn find_close(&self, from: usize, close: &str) -> Option<usize> {
        let rest = &self.source[from..];
        if close != "#}" {
            if let Some(pos) = find_unquoted(rest, close) {
                return Some(from + pos);
            }
        }
        rest.find(close).map(|pos| from + pos)
    }

    /// Strip whitespace-control modifiers (`-`, `~`) and surrounding
    /// whitespace from the text between delimiters.
    fn trimmed_content(&self, start: usize, end: usize, delimiter: Delimiter) -> (String, Span) {
        let mut start = start;
        let mut end = end;
        if delimiter != Delimiter::Comment {
            let inner = &self.source[start..end];
            if inner.starts_with(['-', '~']) {
                start += 1;
            }
            if end > start && self.source[start..end].ends_with(['-', '~']) {
                end -= 1;
            }
        }

        let raw = &self.source[start..end];
        let leading = raw.len() - raw.trim_start().len();
        let trimmed = raw.trim();
        let content_start = start + leading;
        (
            trimmed.to_string(),
            Span::from_parts(content_start, trimmed.len()),
        )
    }

    fn lex_whitespace(&mut self, c: char) -> Token {
        if c == '\n' || c == '\r' {
            self.consume();
            if c == '\r' && self.peek() == '\n' {
                self.consume();
            }
            Token::Newline {
                span: Span::from_bounds(self.start, self.current),
            }
        } else {
            self.consume();
            while !self.is_at_end() {
                let next = self.peek();
                if !next.is_whitespace() || next == '\n' || next == '\r' {
                    break;
                }
                self.consume();
            }
            Token::Whitespace {
                span: Span::from_bounds(self.start, self.current),
            }
        }
    }

    fn lex_text(&mut self) -> Token {
        // the first character is always part of the run, even a lone `{`
        self.consume();

        while !self.is_at_end() {
            let rest = &self.source[self.current..];
            if rest.starts_with('\n')
                || rest.starts_with('\r')
                || OPENERS.iter().any(|open| rest.starts_with(open))
            {
                break;
            }
            self.consume();
        }

        Token::Text {
            span: Span::from_bounds(self.start, self.current),
        }
    }

    #[inline]
    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    #[inline]
    fn consume(&mut self) {
        if let Some(ch) = self.source[self.current..].chars().next() {
            self.current += ch.len_utf8();
        }
    }

    /// Skip to the next plausible construct start or line break.
    fn synchronize(&mut self) {
        const SYNC_POINTS: &[u8] = b"{\n\r";

        while !self.is_at_end() {
            if SYNC_POINTS.contains(&self.source.as_bytes()[self.current]) {
                return;
            }
            self.consume();
        }
    }
}

fn find_unquoted(haystack: &str, needle: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => {
                i += 2;
                continue;
            }
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if bytes[i..].starts_with(needle.as_bytes()) => return Some(i),
            None => {}
        }
        i += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize()
    }

    fn slice(source: &str, span: Span) -> &str {
        &source[span.start_usize()..span.end_usize()]
    }

    #[test]
    fn test_tokenize_html() {
        let source = r#"<div class="container">"#;
        let tokens = tokenize(source);
        assert_eq!(tokens.len(), 2);
        assert!(matches!(tokens[0], Token::Text { span } if span == Span::new(0, 23)));
        assert!(matches!(tokens[1], Token::Eof { offset: 23 }));
    }

    #[test]
    fn test_tokenize_expression() {
        let source = "{{ user.name|default('Anonymous') }}";
        let tokens = tokenize(source);
        let Token::Variable {
            content,
            span,
            full_span,
        } = &tokens[0]
        else {
            panic!("expected variable token, got {:?}", tokens[0]);
        };
        assert_eq!(content, "user.name|default('Anonymous')");
        assert_eq!(slice(source, *span), content);
        assert_eq!(*full_span, Span::new(0, 36));
    }

    #[test]
    fn test_tokenize_statement_sequence() {
        let source = "{% if user %}Admin{% else %}User{% endif %}";
        let tokens = tokenize(source);
        let kinds: Vec<&str> = tokens
            .iter()
            .map(|t| match t {
                Token::Block { content, .. } => content.as_str(),
                Token::Text { .. } => "text",
                Token::Eof { .. } => "eof",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            ["if user", "text", "else", "text", "endif", "eof"]
        );
    }

    #[test]
    fn test_whitespace_control_modifiers_are_stripped() {
        let source = "{%- block body -%}{{~ name ~}}";
        let tokens = tokenize(source);
        let Token::Block { content, span, .. } = &tokens[0] else {
            panic!("expected block token");
        };
        assert_eq!(content, "block body");
        assert_eq!(slice(source, *span), "block body");
        let Token::Variable { content, .. } = &tokens[1] else {
            panic!("expected variable token");
        };
        assert_eq!(content, "name");
    }

    #[test]
    fn test_closing_delimiter_inside_string_is_skipped() {
        let source = "{{ '}}' ~ x }}";
        let tokens = tokenize(source);
        let Token::Variable { content, .. } = &tokens[0] else {
            panic!("expected variable token");
        };
        assert_eq!(content, "'}}' ~ x");
    }

    #[test]
    fn test_unclosed_quote_falls_back_to_plain_search() {
        let source = "{{ it's }}after";
        let tokens = tokenize(source);
        let Token::Variable { content, .. } = &tokens[0] else {
            panic!("expected variable token");
        };
        assert_eq!(content, "it's");
    }

    #[test]
    fn test_comment() {
        let source = "{# a note #}";
        let tokens = tokenize(source);
        assert!(matches!(&tokens[0], Token::Comment { content, .. } if content == "a note"));
    }

    #[test]
    fn test_unterminated_expression_resynchronizes() {
        let source = "{{ user\n{% endif %}";
        let tokens = tokenize(source);
        let Token::Error {
            content,
            delimiter,
            span,
            full_span,
        } = &tokens[0]
        else {
            panic!("expected error token, got {:?}", tokens[0]);
        };
        assert_eq!(content, "user");
        assert_eq!(*delimiter, Delimiter::Expression);
        assert_eq!(*span, Span::new(3, 4));
        assert_eq!(*full_span, Span::new(0, 7));
        assert!(matches!(tokens[1], Token::Newline { .. }));
        assert!(matches!(&tokens[2], Token::Block { content, .. } if content == "endif"));
    }

    #[test]
    fn test_newlines() {
        let source = "a\r\nb\n";
        let tokens = tokenize(source);
        assert!(matches!(tokens[1], Token::Newline { span } if span == Span::new(1, 2)));
        assert!(matches!(tokens[3], Token::Newline { span } if span == Span::new(4, 1)));
    }

    #[test]
    fn test_lone_brace_is_text() {
        let source = "a { b";
        let tokens = tokenize(source);
        assert!(tokens
            .iter()
            .all(|t| t.is_literal() || matches!(t, Token::Eof { .. })));
    }

    #[test]
    fn test_multibyte_text() {
        let source = "héllo {{ ü }}";
        let tokens = tokenize(source);
        let Token::Variable { span, .. } = &tokens[1] else {
            panic!("expected variable token");
        };
        assert_eq!(slice(source, *span), "ü");
    }
}
