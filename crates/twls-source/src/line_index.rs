use serde::Serialize;

use crate::ByteOffset;
use crate::LineCol;

/// Start offsets of every line in a source text.
///
/// Built once per parse so byte offsets can be mapped to line/column pairs
/// (and back) without rescanning the text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    length: u32,
}

impl LineIndex {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut line_starts = Vec::with_capacity(text.len() / 40 + 1);
        line_starts.push(0);

        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => line_starts.push(u32::try_from(i + 1).unwrap_or(u32::MAX)),
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    line_starts.push(u32::try_from(i + 1).unwrap_or(u32::MAX));
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            line_starts,
            length: u32::try_from(text.len()).unwrap_or(u32::MAX),
        }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    #[must_use]
    pub fn to_line_col(&self, offset: ByteOffset) -> LineCol {
        let offset = offset.get().min(self.length);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts[line];
        LineCol::new(u32::try_from(line).unwrap_or(u32::MAX), offset - line_start)
    }

    /// Map a line/column back to a byte offset. Columns past the end of the
    /// line are clamped to the line's end.
    #[must_use]
    pub fn offset(&self, position: LineCol) -> Option<ByteOffset> {
        let line = position.line() as usize;
        let line_start = *self.line_starts.get(line)?;
        let line_end = self
            .line_starts
            .get(line + 1)
            .map_or(self.length, |next| next.saturating_sub(1));
        Some(ByteOffset::new(
            line_start.saturating_add(position.column()).min(line_end),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let index = LineIndex::from_text("hello");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.to_line_col(ByteOffset::new(3)), LineCol::new(0, 3));
    }

    #[test]
    fn test_multiple_lines() {
        let index = LineIndex::from_text("a\nbc\n\nd");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.to_line_col(ByteOffset::new(0)), LineCol::new(0, 0));
        assert_eq!(index.to_line_col(ByteOffset::new(2)), LineCol::new(1, 0));
        assert_eq!(index.to_line_col(ByteOffset::new(3)), LineCol::new(1, 1));
        assert_eq!(index.to_line_col(ByteOffset::new(5)), LineCol::new(2, 0));
        assert_eq!(index.to_line_col(ByteOffset::new(6)), LineCol::new(3, 0));
    }

    #[test]
    fn test_crlf() {
        let index = LineIndex::from_text("a\r\nb\rc");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.to_line_col(ByteOffset::new(3)), LineCol::new(1, 0));
        assert_eq!(index.to_line_col(ByteOffset::new(5)), LineCol::new(2, 0));
    }

    #[test]
    fn test_offset_round_trip() {
        let text = "{% extends 'b.twig' %}\n{% block content %}\n";
        let index = LineIndex::from_text(text);
        let position = LineCol::new(1, 3);
        let offset = index.offset(position).unwrap();
        assert_eq!(offset.get(), 26);
        assert_eq!(index.to_line_col(offset), position);
    }

    #[test]
    fn test_offset_clamps_column_and_rejects_missing_line() {
        let index = LineIndex::from_text("ab\ncd");
        assert_eq!(index.offset(LineCol::new(0, 99)), Some(ByteOffset::new(2)));
        assert_eq!(index.offset(LineCol::new(5, 0)), None);
    }
}
