use twls_source::Span;

use crate::error::Delimiter;
use crate::error::ParseError;
use crate::nodes::Bit;
use crate::nodes::Node;
use crate::tokens::Token;

/// Tags that open a body closed by `end<name>`.
const BLOCK_TAGS: &[&str] = &[
    "apply",
    "autoescape",
    "block",
    "cache",
    "embed",
    "filter",
    "for",
    "if",
    "macro",
    "raw",
    "sandbox",
    "set",
    "spaceless",
    "verbatim",
    "with",
];

/// Blocks whose body is literal text, not template code.
const LITERAL_BLOCKS: &[&str] = &["raw", "verbatim"];

struct OpenBlock {
    name: String,
    bits: Vec<Bit>,
    span: Span,
    body: Vec<Node>,
}

impl OpenBlock {
    fn close(self, end: Option<Span>) -> Node {
        Node::Block {
            name: self.name,
            bits: self.bits,
            span: self.span,
            body: self.body,
            end,
        }
    }

    fn closer(&self) -> String {
        format!("end{}", self.name)
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    stack: Vec<OpenBlock>,
    root: Vec<Node>,
    errors: Vec<ParseError>,
}

impl Parser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            stack: Vec::new(),
            root: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Build the node tree. Never fails: malformed constructs are recorded in
    /// the returned error list and parsing continues after them.
    pub fn parse(mut self) -> (Vec<Node>, Vec<ParseError>) {
        while let Some(token) = self.advance() {
            match token {
                Token::Block {
                    content,
                    span,
                    full_span,
                } => self.parse_statement(&content, span, full_span),
                Token::Variable {
                    content,
                    span,
                    full_span,
                } => self.push(Node::Expression {
                    content,
                    span: full_span,
                    content_span: span,
                }),
                Token::Comment {
                    content, full_span, ..
                } => self.push(Node::Comment {
                    content,
                    span: full_span,
                }),
                Token::Error {
                    content,
                    delimiter,
                    span,
                    full_span,
                } => self.recover_unterminated(content, delimiter, span, full_span),
                Token::Text { span } | Token::Whitespace { span } | Token::Newline { span } => {
                    self.parse_text(span);
                }
                Token::Eof { .. } => break,
            }
        }

        while let Some(open) = self.stack.pop() {
            self.errors.push(ParseError::UnclosedBlock {
                tag: open.name.clone(),
                expected_closer: open.closer(),
                span: open.span,
            });
            let node = open.close(None);
            self.push(node);
        }

        self.errors.sort_by_key(|e| e.span().start());
        (self.root, self.errors)
    }

    fn parse_statement(&mut self, content: &str, content_span: Span, full_span: Span) {
        let Some((name, bits)) = split_tag(content, content_span.start()) else {
            self.error(ParseError::EmptyTag { span: full_span });
            return;
        };

        if let Some(opened) = name.strip_prefix("end") {
            if self.is_closer(opened) {
                self.close_block(&name, full_span);
                return;
            }
        }

        if !is_block_opener(&name, &bits) {
            self.push(Node::Tag {
                name,
                bits,
                span: full_span,
            });
            return;
        }

        if LITERAL_BLOCKS.contains(&name.as_str()) {
            self.parse_literal_block(name, bits, full_span);
            return;
        }

        self.stack.push(OpenBlock {
            name,
            bits,
            span: full_span,
            body: Vec::new(),
        });
    }

    fn is_closer(&self, opened: &str) -> bool {
        BLOCK_TAGS.contains(&opened) || self.stack.iter().any(|open| open.name == opened)
    }

    /// Close the innermost open block named by `closer`. Blocks opened above
    /// it are closed as unclosed; a closer that matches nothing is reported
    /// and dropped.
    fn close_block(&mut self, closer: &str, span: Span) {
        let Some(depth) = self
            .stack
            .iter()
            .rposition(|open| open.closer() == closer)
        else {
            self.error(ParseError::UnbalancedTag {
                tag: closer.to_string(),
                span,
            });
            return;
        };

        while self.stack.len() > depth + 1 {
            let Some(open) = self.stack.pop() else { break };
            self.errors.push(ParseError::UnclosedBlock {
                tag: open.name.clone(),
                expected_closer: open.closer(),
                span: open.span,
            });
            let node = open.close(None);
            self.push(node);
        }

        if let Some(open) = self.stack.pop() {
            let node = open.close(Some(span));
            self.push(node);
        }
    }

    /// `raw`/`verbatim`: everything up to the matching end tag is text.
    fn parse_literal_block(&mut self, name: String, bits: Vec<Bit>, span: Span) {
        let closer = format!("end{name}");
        let mut body_span: Option<Span> = None;
        let mut end = None;

        while let Some(token) = self.advance() {
            if let Token::Block {
                content, full_span, ..
            } = &token
            {
                if content.split_whitespace().next() == Some(closer.as_str()) {
                    end = Some(*full_span);
                    break;
                }
            }
            if matches!(token, Token::Eof { .. }) {
                break;
            }
            let token_span = token.full_span();
            body_span = Some(body_span.map_or(token_span, |s| s.cover(token_span)));
        }

        let body = body_span
            .map(|span| vec![Node::Text { span }])
            .unwrap_or_default();

        if end.is_none() {
            self.errors.push(ParseError::UnclosedBlock {
                tag: name.clone(),
                expected_closer: closer,
                span,
            });
        }

        self.push(Node::Block {
            name,
            bits,
            span,
            body,
            end,
        });
    }

    /// Merge a run of text, whitespace and newline tokens into one node.
    fn parse_text(&mut self, first: Span) {
        let mut span = first;
        while let Some(token) = self.tokens.get(self.current) {
            if !token.is_literal() {
                break;
            }
            span = span.cover(token.full_span());
            self.current += 1;
        }
        self.push(Node::Text { span });
    }

    /// Report an unterminated `{{`/`{%` and keep what was typed so far.
    /// Expressions are kept as-is; statements only when they neither open nor
    /// close a body, so a half-typed `{% if` cannot swallow the rest of the
    /// file.
    fn recover_unterminated(
        &mut self,
        content: String,
        delimiter: Delimiter,
        span: Span,
        full_span: Span,
    ) {
        self.error(ParseError::UnterminatedExpression {
            delimiter,
            span: full_span,
        });

        match delimiter {
            Delimiter::Expression if !content.is_empty() => self.push(Node::Expression {
                content,
                span: full_span,
                content_span: span,
            }),
            Delimiter::Statement => {
                let Some((name, bits)) = split_tag(&content, span.start()) else {
                    return;
                };
                if !name.starts_with("end") && !is_block_opener(&name, &bits) {
                    self.push(Node::Tag {
                        name,
                        bits,
                        span: full_span,
                    });
                }
            }
            Delimiter::Expression | Delimiter::Comment => {}
        }
    }

    fn error(&mut self, error: ParseError) {
        let span = error.span();
        self.errors.push(error.clone());
        self.push(Node::Error { span, error });
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(open) => open.body.push(node),
            None => self.root.push(node),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current)?.clone();
        self.current += 1;
        Some(token)
    }
}

fn is_block_opener(name: &str, bits: &[Bit]) -> bool {
    match name {
        // `{% set x = 1 %}` is inline, `{% set x %}...{% endset %}` captures
        "set" => !bits.iter().any(|bit| bit.text.contains('=')),
        // `{% block title 'Home' %}` is the short form with no body
        "block" => bits.len() <= 1,
        name => BLOCK_TAGS.contains(&name),
    }
}

/// Split tag content into its name and quote-aware arguments, each with an
/// absolute span. `offset` is where `content` starts in the source.
fn split_tag(content: &str, offset: u32) -> Option<(String, Vec<Bit>)> {
    let mut pieces: Vec<Bit> = Vec::with_capacity((content.len() / 8).clamp(2, 8));
    let mut start = None;
    let mut quote: Option<char> = None;
    let mut escape = false;

    let flush = |start: usize, end: usize, pieces: &mut Vec<Bit>| {
        let span = Span::from_parts(offset as usize + start, end - start);
        pieces.push(Bit {
            text: content[start..end].to_owned(),
            span,
        });
    };

    for (idx, ch) in content.char_indices() {
        if start.is_none() && !ch.is_whitespace() {
            start = Some(idx);
        }
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if quote.is_some() => escape = true,
            '"' | '\'' if quote == Some(ch) => quote = None,
            '"' | '\'' if quote.is_none() => quote = Some(ch),
            c if quote.is_none() && c.is_whitespace() => {
                if let Some(s) = start.take() {
                    flush(s, idx, &mut pieces);
                }
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        flush(s, content.len(), &mut pieces);
    }

    let mut iter = pieces.into_iter();
    let name = iter.next()?;
    Some((name.text, iter.collect()))
}
