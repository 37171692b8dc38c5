use serde::Serialize;
use twls_source::ByteOffset;
use twls_source::LineCol;
use twls_source::LineIndex;
use twls_source::Span;

use crate::error::ParseError;

/// One whitespace-separated argument of a statement tag, with its location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bit {
    pub text: String,
    pub span: Span,
}

impl Bit {
    /// The unquoted value if this argument is a single string literal.
    #[must_use]
    pub fn string_literal(&self) -> Option<&str> {
        let text = self.text.as_str();
        let quote = text.chars().next()?;
        if (quote == '\'' || quote == '"') && text.len() >= 2 && text.ends_with(quote) {
            let inner = &text[1..text.len() - 1];
            (!inner.contains(quote)).then_some(inner)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Node {
    Text {
        span: Span,
    },
    Comment {
        content: String,
        span: Span,
    },
    /// A statement tag that does not open a body: `extends`, `include`,
    /// `set x = ...`, and intermediate tags such as `else`.
    Tag {
        name: String,
        bits: Vec<Bit>,
        span: Span,
    },
    /// `{{ ... }}`
    Expression {
        content: String,
        span: Span,
        content_span: Span,
    },
    /// A statement tag with a body, closed by `end<name>`. `end` is `None`
    /// when the closing tag was never found.
    Block {
        name: String,
        bits: Vec<Bit>,
        span: Span,
        body: Vec<Node>,
        end: Option<Span>,
    },
    /// A construct skipped during error recovery.
    Error {
        span: Span,
        error: ParseError,
    },
}

impl Node {
    /// Span of the node's own tag or text.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Node::Text { span }
            | Node::Comment { span, .. }
            | Node::Tag { span, .. }
            | Node::Expression { span, .. }
            | Node::Block { span, .. }
            | Node::Error { span, .. } => *span,
        }
    }

    /// Span covering the node including any body and closing tag.
    #[must_use]
    pub fn full_span(&self) -> Span {
        match self {
            Node::Block {
                span, body, end, ..
            } => {
                let covered = body
                    .last()
                    .map_or(*span, |last| span.cover(last.full_span()));
                end.map_or(covered, |end| covered.cover(end))
            }
            other => other.span(),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Tag { name, .. } | Node::Block { name, .. } => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn bits(&self) -> &[Bit] {
        match self {
            Node::Tag { bits, .. } | Node::Block { bits, .. } => bits,
            _ => &[],
        }
    }

    /// Span of all arguments after the tag name.
    #[must_use]
    pub fn args_span(&self) -> Option<Span> {
        let bits = self.bits();
        let first = bits.first()?;
        let last = bits.last()?;
        Some(first.span.cover(last.span))
    }
}

/// Depth-first, document-order walk over a node list.
pub fn walk<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        if let Node::Block { body, .. } = node {
            walk(body, visit);
        }
    }
}

/// Result of parsing one template: the best-effort tree, every recoverable
/// error found on the way, and the line index for position mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParsedTemplate {
    source: String,
    nodes: Vec<Node>,
    errors: Vec<ParseError>,
    line_index: LineIndex,
}

impl ParsedTemplate {
    #[must_use]
    pub fn new(source: String, nodes: Vec<Node>, errors: Vec<ParseError>) -> Self {
        let line_index = LineIndex::from_text(&source);
        Self {
            source,
            nodes,
            errors,
            line_index,
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    #[must_use]
    pub fn line_col(&self, offset: ByteOffset) -> LineCol {
        self.line_index.to_line_col(offset)
    }

    #[must_use]
    pub fn text(&self, span: Span) -> &str {
        span.text(&self.source).unwrap_or_default()
    }

    /// Every node in document order, blocks before their bodies.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        walk(&self.nodes, &mut |node| out.push(node));
        out
    }

    /// Re-serialize the tag structure of the tree.
    ///
    /// Literal text collapses to `_`, comments to `{##}`; tags keep their
    /// names and arguments, blocks their body and closing tag. Parsing the
    /// outline yields a tree with the same outline.
    #[must_use]
    pub fn outline(&self) -> String {
        let mut out = String::new();
        write_outline(&self.nodes, &mut out);
        out
    }
}

fn write_outline(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text { .. } => out.push('_'),
            Node::Comment { .. } => out.push_str("{##}"),
            Node::Expression { content, .. } => {
                out.push_str("{{ ");
                out.push_str(content);
                out.push_str(" }}");
            }
            Node::Tag { name, bits, .. } => write_tag(name, bits, out),
            Node::Block {
                name,
                bits,
                body,
                end,
                ..
            } => {
                write_tag(name, bits, out);
                write_outline(body, out);
                if end.is_some() {
                    out.push_str("{% end");
                    out.push_str(name);
                    out.push_str(" %}");
                }
            }
            Node::Error { .. } => {}
        }
    }
}

fn write_tag(name: &str, bits: &[Bit], out: &mut String) {
    out.push_str("{% ");
    out.push_str(name);
    for bit in bits {
        out.push(' ');
        out.push_str(&bit.text);
    }
    out.push_str(" %}");
}
