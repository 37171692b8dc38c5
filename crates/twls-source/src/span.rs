use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A byte offset within a template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteOffset(u32);

impl ByteOffset {
    #[must_use]
    pub fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[must_use]
    pub fn from_usize(offset: usize) -> Self {
        Self(u32::try_from(offset).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ByteOffset {
    fn from(offset: u32) -> Self {
        Self(offset)
    }
}

/// A zero-based line and column position. Columns count bytes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LineCol {
    line: u32,
    column: u32,
}

impl LineCol {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    start: u32,
    length: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    #[must_use]
    pub fn from_parts(start: usize, length: usize) -> Self {
        let start_u32 = u32::try_from(start).unwrap_or(u32::MAX);
        let length_u32 = u32::try_from(length).unwrap_or(u32::MAX.saturating_sub(start_u32));
        Span::new(start_u32, length_u32)
    }

    /// Construct a span from integer bounds expressed as byte offsets.
    #[must_use]
    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self::from_parts(start, end.saturating_sub(start))
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn cover(self, other: Span) -> Self {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        Self::new(start, end - start)
    }

    #[must_use]
    pub fn start(self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn start_usize(self) -> usize {
        self.start as usize
    }

    #[must_use]
    pub fn end(self) -> u32 {
        self.start.saturating_add(self.length)
    }

    #[must_use]
    pub fn end_usize(self) -> usize {
        self.end() as usize
    }

    #[must_use]
    pub fn length(self) -> u32 {
        self.length
    }

    #[must_use]
    pub fn length_usize(self) -> usize {
        self.length as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn start_offset(self) -> ByteOffset {
        ByteOffset(self.start)
    }

    #[must_use]
    pub fn end_offset(self) -> ByteOffset {
        ByteOffset(self.end())
    }

    /// Whether `offset` falls inside the span. The end bound is inclusive so a
    /// cursor placed right after the last character still hits.
    #[must_use]
    pub fn contains(self, offset: ByteOffset) -> bool {
        offset.0 >= self.start && offset.0 <= self.end()
    }

    #[must_use]
    pub fn as_tuple(self) -> (u32, u32) {
        (self.start, self.length)
    }

    /// Slice the span out of `source`, if it lies on character boundaries.
    #[must_use]
    pub fn text(self, source: &str) -> Option<&str> {
        source.get(self.start_usize()..self.end_usize())
    }
}

impl From<Span> for (u32, u32) {
    fn from(span: Span) -> Self {
        span.as_tuple()
    }
}

impl From<&Span> for (u32, u32) {
    fn from(span: &Span) -> Self {
        span.as_tuple()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_end_inclusive() {
        let span = Span::new(4, 3);
        assert!(!span.contains(ByteOffset::new(3)));
        assert!(span.contains(ByteOffset::new(4)));
        assert!(span.contains(ByteOffset::new(7)));
        assert!(!span.contains(ByteOffset::new(8)));
    }

    #[test]
    fn test_cover() {
        let a = Span::new(2, 3);
        let b = Span::new(10, 2);
        assert_eq!(a.cover(b), Span::new(2, 10));
        assert_eq!(b.cover(a), Span::new(2, 10));
    }

    #[test]
    fn test_from_bounds_saturates() {
        assert_eq!(Span::from_bounds(5, 3), Span::new(5, 0));
        assert_eq!(Span::from_bounds(1, 4), Span::new(1, 3));
    }

    #[test]
    fn test_text() {
        let source = "{% extends 'base.twig' %}";
        assert_eq!(Span::new(11, 11).text(source), Some("'base.twig'"));
        assert_eq!(Span::new(40, 2).text(source), None);
    }
}
