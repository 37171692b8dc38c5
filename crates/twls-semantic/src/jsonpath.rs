//! Syntax of JSON path expressions used in templates, e.g.
//! `{{ data|json_path('$.store.book[0].title') }}`.
//!
//! Only the shape of a path is checked. Whether it matches the data it is
//! applied to is not known until render time.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Selector {
    Index(i64),
    Name(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Segment {
    /// `.name` or `['name']`
    Child(String),
    /// `..name`
    Descendant(String),
    /// `.*` or `[*]`
    Wildcard,
    /// `..*`
    DescendantWildcard,
    /// `[n]`
    Index(i64),
    /// `[a,b]`
    Union(Vec<Selector>),
    /// `[start:end:step]`
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    /// `[?(...)]`, kept as written
    Filter(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("JSON path must start with '$'")]
    MissingRoot,
    #[error("unexpected end of JSON path")]
    UnexpectedEnd,
    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[error("invalid index '{text}' at offset {offset}")]
    InvalidIndex { text: String, offset: usize },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("empty member name at offset {offset}")]
    EmptyName { offset: usize },
}

impl JsonPath {
    pub fn parse(raw: &str) -> Result<Self, JsonPathError> {
        let segments = PathParser::new(raw).parse()?;
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True for the bare `$`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

struct PathParser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn parse(mut self) -> Result<Vec<Segment>, JsonPathError> {
        if !self.eat('$') {
            return Err(JsonPathError::MissingRoot);
        }

        let mut segments = Vec::new();
        while let Some(ch) = self.peek() {
            let segment = match ch {
                '.' => {
                    self.bump();
                    if self.eat('.') {
                        if self.eat('*') {
                            Segment::DescendantWildcard
                        } else {
                            Segment::Descendant(self.member_name()?)
                        }
                    } else if self.eat('*') {
                        Segment::Wildcard
                    } else {
                        Segment::Child(self.member_name()?)
                    }
                }
                '[' => {
                    self.bump();
                    let segment = self.bracket()?;
                    self.expect(']')?;
                    segment
                }
                found => {
                    return Err(JsonPathError::UnexpectedChar {
                        found,
                        offset: self.pos,
                    })
                }
            };
            segments.push(segment);
        }

        Ok(segments)
    }

    fn member_name(&mut self) -> Result<String, JsonPathError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' || ch == '$' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return match self.peek() {
                None => Err(JsonPathError::UnexpectedEnd),
                Some(_) => Err(JsonPathError::EmptyName { offset: start }),
            };
        }
        Ok(self.text[start..self.pos].to_string())
    }

    /// The inside of `[...]`.
    fn bracket(&mut self) -> Result<Segment, JsonPathError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(JsonPathError::UnexpectedEnd),
            Some('*') => {
                self.bump();
                self.skip_whitespace();
                Ok(Segment::Wildcard)
            }
            Some('?') => self.filter(),
            Some(':') => self.slice(None),
            Some(_) => {
                let first = self.selector()?;
                self.skip_whitespace();
                if self.peek() == Some(':') {
                    let Selector::Index(start) = first else {
                        return Err(self.unexpected());
                    };
                    return self.slice(Some(start));
                }
                let mut selectors = vec![first];
                while self.eat(',') {
                    self.skip_whitespace();
                    selectors.push(self.selector()?);
                    self.skip_whitespace();
                }
                Ok(match selectors.as_slice() {
                    [Selector::Index(index)] => Segment::Index(*index),
                    [Selector::Name(name)] => Segment::Child(name.clone()),
                    _ => Segment::Union(selectors),
                })
            }
        }
    }

    fn selector(&mut self) -> Result<Selector, JsonPathError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => self.quoted(quote).map(Selector::Name),
            Some(_) => self.integer().map(Selector::Index),
            None => Err(JsonPathError::UnexpectedEnd),
        }
    }

    fn slice(&mut self, start: Option<i64>) -> Result<Segment, JsonPathError> {
        let mut bounds = [start, None, None];
        for bound in bounds.iter_mut().skip(1) {
            if !self.eat(':') {
                break;
            }
            self.skip_whitespace();
            if matches!(self.peek(), Some(c) if c == '-' || c.is_ascii_digit()) {
                *bound = Some(self.integer()?);
            }
            self.skip_whitespace();
        }
        let [start, end, step] = bounds;
        Ok(Segment::Slice { start, end, step })
    }

    /// `?(...)` with balanced parentheses; quotes may contain anything.
    fn filter(&mut self) -> Result<Segment, JsonPathError> {
        let start = self.pos;
        self.bump();
        self.expect('(')?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => return Err(JsonPathError::UnexpectedEnd),
                Some(quote @ ('\'' | '"')) => {
                    self.quoted(quote)?;
                }
                Some('(') => {
                    depth += 1;
                    self.bump();
                }
                Some(')') => {
                    depth -= 1;
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
        let expression = self.text[start..self.pos].to_string();
        self.skip_whitespace();
        Ok(Segment::Filter(expression))
    }

    fn quoted(&mut self, quote: char) -> Result<String, JsonPathError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(JsonPathError::UnterminatedString { offset: start }),
                Some('\\') => {
                    self.bump();
                    let Some(escaped) = self.peek() else {
                        return Err(JsonPathError::UnterminatedString { offset: start });
                    };
                    value.push(escaped);
                    self.bump();
                }
                Some(ch) if ch == quote => {
                    self.bump();
                    return Ok(value);
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
    }

    fn integer(&mut self) -> Result<i64, JsonPathError> {
        let start = self.pos;
        self.eat('-');
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let text = &self.text[start..self.pos];
        text.parse().map_err(|_| {
            if self.peek().is_none() && text.is_empty() {
                JsonPathError::UnexpectedEnd
            } else if text.is_empty() {
                self.unexpected()
            } else {
                JsonPathError::InvalidIndex {
                    text: text.to_string(),
                    offset: start,
                }
            }
        })
    }

    fn expect(&mut self, expected: char) -> Result<(), JsonPathError> {
        self.skip_whitespace();
        if self.eat(expected) {
            Ok(())
        } else if self.peek().is_none() {
            Err(JsonPathError::UnexpectedEnd)
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> JsonPathError {
        match self.peek() {
            Some(found) => JsonPathError::UnexpectedChar {
                found,
                offset: self.pos,
            },
            None => JsonPathError::UnexpectedEnd,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(raw: &str) -> Vec<Segment> {
        JsonPath::parse(raw).unwrap().segments().to_vec()
    }

    #[test]
    fn test_root_only() {
        assert!(JsonPath::parse("$").unwrap().is_root());
    }

    #[test]
    fn test_dot_notation() {
        assert_eq!(
            segments("$.store.book[0].title"),
            [
                Segment::Child("store".to_string()),
                Segment::Child("book".to_string()),
                Segment::Index(0),
                Segment::Child("title".to_string()),
            ]
        );
    }

    #[test]
    fn test_descendants_and_wildcards() {
        assert_eq!(
            segments("$..price"),
            [Segment::Descendant("price".to_string())]
        );
        assert_eq!(
            segments("$.items.*[*]..*"),
            [
                Segment::Child("items".to_string()),
                Segment::Wildcard,
                Segment::Wildcard,
                Segment::DescendantWildcard,
            ]
        );
    }

    #[test]
    fn test_brackets() {
        assert_eq!(
            segments("$['first name'][-1]"),
            [Segment::Child("first name".to_string()), Segment::Index(-1)]
        );
        assert_eq!(
            segments("$[0, 2]"),
            [Segment::Union(vec![Selector::Index(0), Selector::Index(2)])]
        );
        assert_eq!(
            segments(r#"$["a","b"]"#),
            [Segment::Union(vec![
                Selector::Name("a".to_string()),
                Selector::Name("b".to_string())
            ])]
        );
    }

    #[test]
    fn test_slices() {
        assert_eq!(
            segments("$[1:3]"),
            [Segment::Slice {
                start: Some(1),
                end: Some(3),
                step: None
            }]
        );
        assert_eq!(
            segments("$[0:-1:2]"),
            [Segment::Slice {
                start: Some(0),
                end: Some(-1),
                step: Some(2)
            }]
        );
        assert_eq!(
            segments("$[:2]"),
            [Segment::Slice {
                start: None,
                end: Some(2),
                step: None
            }]
        );
        assert_eq!(
            segments("$[2:]"),
            [Segment::Slice {
                start: Some(2),
                end: None,
                step: None
            }]
        );
    }

    #[test]
    fn test_filter() {
        assert_eq!(
            segments("$.book[?(@.price < 10 && (@.tag == ')'))]"),
            [
                Segment::Child("book".to_string()),
                Segment::Filter("?(@.price < 10 && (@.tag == ')'))".to_string()),
            ]
        );
    }

    mod errors {
        use super::*;

        #[test]
        fn test_missing_root() {
            assert_eq!(JsonPath::parse("store.book"), Err(JsonPathError::MissingRoot));
        }

        #[test]
        fn test_trailing_dot() {
            assert_eq!(JsonPath::parse("$.store."), Err(JsonPathError::UnexpectedEnd));
        }

        #[test]
        fn test_unclosed_bracket() {
            assert_eq!(JsonPath::parse("$.items[0"), Err(JsonPathError::UnexpectedEnd));
        }

        #[test]
        fn test_garbage_after_root() {
            assert_eq!(
                JsonPath::parse("$store"),
                Err(JsonPathError::UnexpectedChar {
                    found: 's',
                    offset: 1
                })
            );
        }

        #[test]
        fn test_unterminated_name() {
            assert_eq!(
                JsonPath::parse("$['abc]"),
                Err(JsonPathError::UnterminatedString { offset: 2 })
            );
        }

        #[test]
        fn test_bad_index() {
            assert!(matches!(
                JsonPath::parse("$[abc]"),
                Err(JsonPathError::UnexpectedChar { found: 'a', .. })
            ));
            assert_eq!(
                JsonPath::parse("$[-]"),
                Err(JsonPathError::InvalidIndex {
                    text: "-".to_string(),
                    offset: 2
                })
            );
        }

        #[test]
        fn test_unbalanced_filter() {
            assert_eq!(
                JsonPath::parse("$[?(@.a == (1)]"),
                Err(JsonPathError::UnexpectedEnd)
            );
        }
    }
}
