use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use twls_source::LineCol;
use twls_source::Span;
use twls_source::TemplateId;
use twls_templates::expression;
use twls_templates::walk;
use twls_templates::ExprToken;
use twls_templates::ExprTokenKind;
use twls_templates::Node;
use twls_templates::ParsedTemplate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Extends,
    Include,
    Import,
    BlockDef,
    BlockOverride,
    VariableRead,
    VariableDef,
    JsonPathRef,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 8] = [
        ReferenceKind::Extends,
        ReferenceKind::Include,
        ReferenceKind::Import,
        ReferenceKind::BlockDef,
        ReferenceKind::BlockOverride,
        ReferenceKind::VariableRead,
        ReferenceKind::VariableDef,
        ReferenceKind::JsonPathRef,
    ];

    /// Kinds whose target names another template.
    #[must_use]
    pub fn is_template(self) -> bool {
        matches!(
            self,
            ReferenceKind::Extends | ReferenceKind::Include | ReferenceKind::Import
        )
    }

    #[must_use]
    pub fn is_block(self) -> bool {
        matches!(self, ReferenceKind::BlockDef | ReferenceKind::BlockOverride)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::Extends => "extends",
            ReferenceKind::Include => "include",
            ReferenceKind::Import => "import",
            ReferenceKind::BlockDef => "block_def",
            ReferenceKind::BlockOverride => "block_override",
            ReferenceKind::VariableRead => "variable_read",
            ReferenceKind::VariableDef => "variable_def",
            ReferenceKind::JsonPathRef => "json_path_ref",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown reference kind '{0}'")]
pub struct UnknownReferenceKind(String);

impl FromStr for ReferenceKind {
    type Err = UnknownReferenceKind;

    /// Accepts `block_def`, `block-def` and `blockdef` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        ReferenceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().replace('_', "") == wanted)
            .ok_or_else(|| UnknownReferenceKind(s.to_string()))
    }
}

/// What a reference points at. Template arguments that are not a single
/// string literal cannot be known without rendering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetName {
    Named(String),
    Unknown,
}

impl TargetName {
    #[must_use]
    pub fn named(&self) -> Option<&str> {
        match self {
            TargetName::Named(name) => Some(name),
            TargetName::Unknown => None,
        }
    }

    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.named() == Some(name)
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetName::Named(name) => f.write_str(name),
            TargetName::Unknown => f.write_str("<dynamic>"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub source: TemplateId,
    pub span: Span,
    pub start: LineCol,
    pub target: TargetName,
    /// For JSON paths: the variable the path is applied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// For template arguments: the whole tag, so the tag keyword resolves
    /// like its argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Span>,
    /// For blocks inside `{% embed %}`: the embedded template they override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<TargetName>,
}

const KEYWORDS: &[&str] = &[
    "_charset", "_context", "_self", "and", "as", "by", "ends", "false", "FALSE", "from",
    "if", "ignore", "import", "in", "is", "matches", "missing", "none", "NONE", "not", "null",
    "NULL", "only", "or", "starts", "true", "TRUE", "with", "xor",
];

/// Extract every reference from a parsed template, in source order.
#[must_use]
pub fn extract(source: &TemplateId, tree: &ParsedTemplate) -> Vec<Reference> {
    let mut has_extends = false;
    walk(tree.nodes(), &mut |node| {
        has_extends |= matches!(node, Node::Tag { name, .. } if name == "extends");
    });

    let mut extractor = Extractor {
        source,
        tree,
        has_extends,
        tag: None,
        embeds: Vec::new(),
        references: Vec::new(),
    };
    extractor.visit_nodes(tree.nodes());

    let mut references = extractor.references;
    references.sort_by_key(|reference| reference.span.start());
    references
}

struct Extractor<'a> {
    source: &'a TemplateId,
    tree: &'a ParsedTemplate,
    has_extends: bool,
    /// Span of the tag being visited.
    tag: Option<Span>,
    /// Targets of the `embed` tags enclosing the current node.
    embeds: Vec<TargetName>,
    references: Vec<Reference>,
}

impl Extractor<'_> {
    fn visit_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            let depth = self.embeds.len();
            self.visit(node);
            if let Node::Block { body, .. } = node {
                self.visit_nodes(body);
            }
            self.embeds.truncate(depth);
        }
    }

    fn visit(&mut self, node: &Node) {
        match node {
            Node::Expression {
                content,
                content_span,
                ..
            } => {
                let tokens = expression::scan(content, content_span.start());
                self.scan_expression(&tokens);
            }
            Node::Tag { name, .. } | Node::Block { name, .. } => {
                let Some(args) = node.args_span() else {
                    return;
                };
                let text = self.tree.text(args);
                let tokens = expression::scan(text, args.start());
                self.tag = Some(node.span());
                self.visit_tag(name, &tokens);
                self.tag = None;
            }
            Node::Text { .. } | Node::Comment { .. } | Node::Error { .. } => {}
        }
    }

    fn visit_tag(&mut self, name: &str, tokens: &[ExprToken<'_>]) {
        match name {
            "extends" => {
                self.template_argument(ReferenceKind::Extends, tokens);
            }
            "include" | "embed" => {
                let (template, rest) = split_at_keyword(tokens, &["with", "only", "ignore"]);
                let target = self.template_argument(ReferenceKind::Include, template);
                if name == "embed" {
                    self.embeds.push(target.unwrap_or(TargetName::Unknown));
                }
                self.scan_expression(rest);
            }
            "use" => {
                let (template, _) = split_at_keyword(tokens, &["with"]);
                self.template_argument(ReferenceKind::Import, template);
            }
            "import" => {
                let (template, alias) = split_at_keyword(tokens, &["as"]);
                self.template_argument(ReferenceKind::Import, template);
                if let Some(alias) = alias.get(1).filter(|t| t.kind == ExprTokenKind::Name) {
                    self.push_name(ReferenceKind::VariableDef, alias);
                }
            }
            "from" => {
                let (template, imports) = split_at_keyword(tokens, &["import"]);
                self.template_argument(ReferenceKind::Import, template);
                for group in imports.get(1..).unwrap_or_default().split(|t| t.is_punct(",")) {
                    if let Some(alias) = group.iter().rev().find(|t| t.kind == ExprTokenKind::Name)
                    {
                        self.push_name(ReferenceKind::VariableDef, alias);
                    }
                }
            }
            "block" => {
                let Some((block_name, rest)) = tokens.split_first() else {
                    return;
                };
                if block_name.kind == ExprTokenKind::Name {
                    let embed = self.embeds.last().cloned();
                    let kind = if self.has_extends || embed.is_some() {
                        ReferenceKind::BlockOverride
                    } else {
                        ReferenceKind::BlockDef
                    };
                    self.push_name(kind, block_name);
                    if let Some(block) = self.references.last_mut() {
                        block.embed = embed;
                    }
                }
                self.scan_expression(rest);
            }
            "set" => {
                let split = top_level_position(tokens, |t| t.is_punct("="));
                let (targets, value) = split.map_or((tokens, &[][..]), |i| tokens.split_at(i));
                self.define_names(targets);
                self.scan_expression(value);
            }
            "for" => {
                let (targets, sequence) = split_at_keyword(tokens, &["in"]);
                self.define_names(targets);
                self.scan_expression(sequence);
            }
            "macro" => self.macro_arguments(tokens),
            // arguments are filter names or strategies, never variables
            "apply" | "filter" | "autoescape" => {}
            _ => self.scan_expression(tokens),
        }
    }

    /// The template argument of `extends`, `include`, `import`, ... Returns
    /// the target it recorded.
    fn template_argument(
        &mut self,
        kind: ReferenceKind,
        tokens: &[ExprToken<'_>],
    ) -> Option<TargetName> {
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return None;
        };

        if tokens.len() == 1 {
            let name = if first.is_name("_self") {
                Some(self.source.as_str())
            } else {
                first.string_value()
            };
            if let Some(name) = name {
                let target = TargetName::Named(name.to_string());
                self.push_tag_argument(kind, first.span, target.clone());
                return Some(target);
            }
        }

        self.push_tag_argument(kind, first.span.cover(last.span), TargetName::Unknown);
        self.scan_expression(tokens);
        Some(TargetName::Unknown)
    }

    fn push_tag_argument(&mut self, kind: ReferenceKind, span: Span, target: TargetName) {
        self.push(kind, span, target, None);
        let tag = self.tag;
        if let Some(reference) = self.references.last_mut() {
            reference.tag = tag;
        }
    }

    /// `{% macro name(a, b = default) %}`: parameters define variables,
    /// default values are read.
    fn macro_arguments(&mut self, tokens: &[ExprToken<'_>]) {
        let mut depth = 0usize;
        let mut default_start = None;

        for (i, token) in tokens.iter().enumerate() {
            if depth == 1 && (token.is_punct(",") || token.is_punct(")")) {
                if let Some(start) = default_start.take() {
                    self.scan_expression(&tokens[start..i]);
                }
            }
            match token.text {
                "(" | "[" | "{" if token.kind == ExprTokenKind::Punct => depth += 1,
                ")" | "]" | "}" if token.kind == ExprTokenKind::Punct => {
                    depth = depth.saturating_sub(1);
                }
                "=" if depth == 1 && token.kind == ExprTokenKind::Punct => {
                    default_start = Some(i + 1);
                }
                _ if depth == 1 && token.kind == ExprTokenKind::Name && default_start.is_none() => {
                    let after_separator = i
                        .checked_sub(1)
                        .is_some_and(|p| tokens[p].is_punct("(") || tokens[p].is_punct(","));
                    if after_separator {
                        self.push_name(ReferenceKind::VariableDef, token);
                    }
                }
                _ => {}
            }
        }
    }

    fn define_names(&mut self, tokens: &[ExprToken<'_>]) {
        for token in tokens {
            if token.kind == ExprTokenKind::Name && !KEYWORDS.contains(&token.text) {
                self.push_name(ReferenceKind::VariableDef, token);
            }
        }
    }

    /// Find variable reads, JSON paths and `include()`/`source()` calls.
    fn scan_expression(&mut self, tokens: &[ExprToken<'_>]) {
        let mut brackets: Vec<&str> = Vec::new();
        let mut last_read: Option<&str> = None;
        let arrows = arrow_scopes(tokens);

        for (i, token) in tokens.iter().enumerate() {
            match token.kind {
                ExprTokenKind::Punct => match token.text {
                    "(" | "[" | "{" => brackets.push(token.text),
                    ")" | "]" | "}" => {
                        brackets.pop();
                    }
                    _ => {}
                },
                ExprTokenKind::String => {
                    if let Some(path) = token.string_value().filter(|v| v.starts_with('$')) {
                        self.push(
                            ReferenceKind::JsonPathRef,
                            token.span,
                            TargetName::Named(path.to_string()),
                            last_read.map(ToString::to_string),
                        );
                    }
                }
                ExprTokenKind::Name => {
                    let next = tokens.get(i + 1);
                    if next.is_some_and(|n| n.is_punct("(")) {
                        if !follows_accessor(tokens, i) && matches!(token.text, "include" | "source")
                        {
                            self.template_call(token, &tokens[i + 2..]);
                        }
                        continue;
                    }
                    let parameter = arrows.iter().any(|scope| scope.binds(i, token.text));
                    if !parameter && is_variable_read(tokens, i, brackets.last().copied()) {
                        self.push_name(ReferenceKind::VariableRead, token);
                        last_read = Some(token.text);
                    }
                }
                ExprTokenKind::Number => {}
            }
        }
    }

    /// `include('x')` / `source('x')`: `args` starts after the parenthesis.
    fn template_call(&mut self, function: &ExprToken<'_>, args: &[ExprToken<'_>]) {
        let literal = args.first().and_then(|first| {
            let closed = args
                .get(1)
                .is_some_and(|t| t.is_punct(")") || t.is_punct(","));
            first.string_value().filter(|_| closed).map(|name| (first, name))
        });
        match literal {
            Some((token, name)) => self.push(
                ReferenceKind::Include,
                token.span,
                TargetName::Named(name.to_string()),
                None,
            ),
            None => self.push(ReferenceKind::Include, function.span, TargetName::Unknown, None),
        }
    }

    fn push_name(&mut self, kind: ReferenceKind, token: &ExprToken<'_>) {
        self.push(kind, token.span, TargetName::Named(token.text.to_string()), None);
    }

    fn push(&mut self, kind: ReferenceKind, span: Span, target: TargetName, root: Option<String>) {
        self.references.push(Reference {
            kind,
            source: self.source.clone(),
            span,
            start: self.tree.line_col(span.start_offset()),
            target,
            root,
            tag: None,
            embed: None,
        });
    }
}

/// Parameters of one arrow function and the token range they are bound in,
/// from the parameter list to the end of the body.
struct ArrowScope<'src> {
    parameters: Vec<&'src str>,
    start: usize,
    end: usize,
}

impl ArrowScope<'_> {
    fn binds(&self, index: usize, name: &str) -> bool {
        (self.start..self.end).contains(&index) && self.parameters.contains(&name)
    }
}

/// `x => body` and `(k, v) => body`. The body runs to the first unmatched
/// closing bracket or top-level comma.
fn arrow_scopes<'src>(tokens: &[ExprToken<'src>]) -> Vec<ArrowScope<'src>> {
    let mut scopes = Vec::new();
    for (arrow, token) in tokens.iter().enumerate() {
        if !token.is_punct("=>") {
            continue;
        }
        let Some(before) = arrow.checked_sub(1) else {
            continue;
        };

        let (start, parameters) = if tokens[before].kind == ExprTokenKind::Name {
            (before, vec![tokens[before].text])
        } else if tokens[before].is_punct(")") {
            let Some(open) = tokens[..before].iter().rposition(|t| t.is_punct("(")) else {
                continue;
            };
            let names = tokens[open..before]
                .iter()
                .filter(|t| t.kind == ExprTokenKind::Name)
                .map(|t| t.text)
                .collect();
            (open, names)
        } else {
            continue;
        };

        let mut depth = 0usize;
        let mut end = tokens.len();
        for (i, t) in tokens.iter().enumerate().skip(arrow + 1) {
            if t.kind != ExprTokenKind::Punct {
                continue;
            }
            match t.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" if depth == 0 => {
                    end = i;
                    break;
                }
                ")" | "]" | "}" => depth -= 1,
                "," if depth == 0 => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }

        scopes.push(ArrowScope {
            parameters,
            start,
            end,
        });
    }
    scopes
}

fn follows_accessor(tokens: &[ExprToken<'_>], i: usize) -> bool {
    i.checked_sub(1)
        .and_then(|p| tokens.get(p))
        .is_some_and(|prev| prev.is_punct(".") || prev.is_punct("?.") || prev.is_punct("|"))
}

fn is_variable_read(tokens: &[ExprToken<'_>], i: usize, bracket: Option<&str>) -> bool {
    let token = &tokens[i];
    if KEYWORDS.contains(&token.text) || follows_accessor(tokens, i) {
        return false;
    }

    // test names: `x is defined`, `x is not empty`
    let prev = i.checked_sub(1).map(|p| &tokens[p]);
    let before_prev = i.checked_sub(2).map(|p| &tokens[p]);
    if prev.is_some_and(|p| p.is_name("is"))
        || (prev.is_some_and(|p| p.is_name("not")) && before_prev.is_some_and(|p| p.is_name("is")))
    {
        return false;
    }

    // bitwise operators: `b-and`, `b-or`, `b-xor`
    if token.text == "b"
        && tokens.get(i + 1).is_some_and(|t| t.is_punct("-"))
        && tokens
            .get(i + 2)
            .is_some_and(|t| matches!(t.text, "and" | "or" | "xor"))
    {
        return false;
    }

    match tokens.get(i + 1) {
        // hash key
        Some(next) if next.is_punct(":") && bracket == Some("{") => false,
        // named argument
        Some(next) if (next.is_punct(":") || next.is_punct("=")) && bracket == Some("(") => false,
        _ => true,
    }
}

/// Split at the first top-level name in `keywords`; the keyword starts the
/// second half.
fn split_at_keyword<'t, 'src>(
    tokens: &'t [ExprToken<'src>],
    keywords: &[&str],
) -> (&'t [ExprToken<'src>], &'t [ExprToken<'src>]) {
    let position = top_level_position(tokens, |t| {
        t.kind == ExprTokenKind::Name && keywords.contains(&t.text)
    });
    tokens.split_at(position.unwrap_or(tokens.len()))
}

fn top_level_position(
    tokens: &[ExprToken<'_>],
    predicate: impl Fn(&ExprToken<'_>) -> bool,
) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        if token.kind == ExprTokenKind::Punct {
            match token.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        if depth == 0 && predicate(token) {
            return Some(i);
        }
    }
    None
}
