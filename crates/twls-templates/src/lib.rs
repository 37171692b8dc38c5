//! Twig template lexing and parsing.
//!
//! Parsing never fails. [`parse`] always returns a [`ParsedTemplate`] holding
//! a best-effort node tree next to every [`ParseError`] found on the way, so
//! that a half-typed template in an editor still yields references.
//!
//! ```
//! let parsed = twls_templates::parse("{% extends 'base.twig' %}{% block body %}{% endblock %}");
//! assert!(parsed.errors().is_empty());
//! assert_eq!(parsed.nodes().len(), 2);
//! ```

mod error;
pub mod expression;
mod lexer;
mod nodes;
mod parser;
mod tokens;

pub use error::Delimiter;
pub use error::ParseError;
pub use error::ParseErrorKind;
pub use expression::ExprToken;
pub use expression::ExprTokenKind;
pub use lexer::Lexer;
pub use nodes::walk;
pub use nodes::Bit;
pub use nodes::Node;
pub use nodes::ParsedTemplate;
pub use parser::Parser;
pub use tokens::Token;

/// Parse template source into a node tree, collecting recoverable errors.
#[must_use]
pub fn parse(text: &str) -> ParsedTemplate {
    let tokens = Lexer::new(text).tokenize();
    let (nodes, errors) = Parser::new(tokens).parse();
    ParsedTemplate::new(text.to_string(), nodes, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod outline {
        use super::*;

        fn assert_fixpoint(source: &str) {
            let first = parse(source).outline();
            let second = parse(&first).outline();
            assert_eq!(first, second, "outline of {source:?} is not stable");
        }

        #[test]
        fn test_outline_shape() {
            let parsed = parse(
                "{% extends 'base.twig' %}\n{% block body %}\n  <p>{{ user.name }}</p>\n{# hi #}{% endblock %}",
            );
            assert_eq!(
                parsed.outline(),
                "{% extends 'base.twig' %}_{% block body %}_{{ user.name }}_{##}{% endblock %}"
            );
        }

        #[test]
        fn test_outline_is_a_fixpoint() {
            assert_fixpoint("{% block a %}{% if x %}{{ y }}{% else %}z{% endif %}{% endblock %}");
            assert_fixpoint("{% for k, v in items %}{{ k }}: {{ v|upper }}{% endfor %}");
            assert_fixpoint("{% set x = 1 %}{% set y %}cap{% endset %}{% include 'a.twig' %}");
            assert_fixpoint("{% macro m(a, b) %}{{ a }}{% endmacro %}{% import 'f.twig' as f %}");
        }

        #[test]
        fn test_unclosed_block_drops_its_end() {
            let parsed = parse("{% if a %}text");
            assert_eq!(parsed.outline(), "{% if a %}_");
            assert_eq!(parsed.errors().len(), 1);
        }
    }

    #[test]
    fn test_parse_keeps_source_and_positions() {
        let parsed = parse("line one\n{{ x }}");
        assert_eq!(parsed.source(), "line one\n{{ x }}");
        let Node::Expression { span, .. } = &parsed.nodes()[1] else {
            panic!("expected expression, got {:?}", parsed.nodes());
        };
        let position = parsed.line_col(span.start_offset());
        assert_eq!((position.line(), position.column()), (1, 0));
    }

    #[test]
    fn test_flatten_is_document_order() {
        let parsed = parse("{% block a %}{% block b %}{% endblock %}{% endblock %}{% block c %}{% endblock %}");
        let names: Vec<String> = parsed
            .flatten()
            .iter()
            .filter_map(|node| node.bits().first().map(|bit| bit.text.clone()))
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
