//! Source text positions and ranges.

use std::fmt;

pub use text_size::TextRange;
pub use text_size::TextSize;

/// A line and column position in source text.
///
/// Both line and column are 0-indexed internally, but displayed as 1-indexed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct LineCol {
    /// 0-indexed line number
    pub line: u32,
    /// 0-indexed column (in UTF-8 bytes, not characters)
    pub col: u32,
}

impl LineCol {
    /// Create a new LineCol position.
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Create from 1-indexed line and column (as displayed to users).
    #[inline]
    pub const fn from_one_indexed(line: u32, col: u32) -> Self {
        Self {
            line: line.saturating_sub(1),
            col: col.saturating_sub(1),
        }
    }

    /// Get 1-indexed line number (for display).
    #[inline]
    pub const fn line_one_indexed(self) -> u32 {
        self.line + 1
    }

    /// Get 1-indexed column number (for display).
    #[inline]
    pub const fn col_one_indexed(self) -> u32 {
        self.col + 1
    }
}

impl fmt::Debug for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_one_indexed(), self.col_one_indexed())
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_one_indexed(), self.col_one_indexed())
    }
}

/// A located span of source text, as reported by the parser.
///
/// Carries both the byte range and the start position so diagnostics can
/// be displayed without re-scanning the document.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SourceLocation {
    pub range: TextRange,
    pub start: LineCol,
}

impl SourceLocation {
    pub const fn new(range: TextRange, start: LineCol) -> Self {
        Self { range, start }
    }

    /// Build a location from an offset/length pair, computing the start
    /// position through `index`.
    pub fn from_offset(index: &LineIndex, offset: u32, length: u32) -> Self {
        let start = TextSize::from(offset);
        Self {
            range: TextRange::at(start, TextSize::from(length)),
            start: index.line_col(start),
        }
    }

    /// The smallest location covering both `self` and `other`.
    pub fn cover(self, other: SourceLocation) -> Self {
        let start = if other.range.start() < self.range.start() {
            other.start
        } else {
            self.start
        };
        Self {
            range: self.range.cover(other.range),
            start,
        }
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.range.start().into()
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.range.len().into()
    }

    /// A location is valid once it points at real text.
    pub fn is_valid(&self) -> bool {
        !self.range.is_empty()
    }
}

impl fmt::Debug for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.start, self.range)
    }
}

/// Index for converting between byte offsets and line/column positions.
#[derive(Clone, Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line
    line_starts: Vec<TextSize>,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];

        for (offset, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(TextSize::from((offset + 1) as u32));
            }
        }

        Self { line_starts }
    }

    /// Convert a byte offset to a line/column position.
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);

        let line_start = self.line_starts[line];
        let col = offset - line_start;

        LineCol {
            line: line as u32,
            col: col.into(),
        }
    }

    /// Convert a line/column position to a byte offset.
    pub fn offset(&self, line_col: LineCol) -> Option<TextSize> {
        let line_start = self.line_starts.get(line_col.line as usize)?;
        Some(*line_start + TextSize::from(line_col.col))
    }

    /// Get the number of lines.
    pub fn len(&self) -> usize {
        self.line_starts.len()
    }

    /// Check if there are no lines (empty file).
    pub fn is_empty(&self) -> bool {
        self.line_starts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_display() {
        assert_eq!(format!("{}", LineCol::new(0, 0)), "1:1");
        assert_eq!(format!("{}", LineCol::new(5, 10)), "6:11");
    }

    #[test]
    fn test_line_index_multi_line() {
        let index = LineIndex::new("import QtQuick\nItem {}\n");

        assert_eq!(index.line_col(TextSize::from(0)), LineCol::new(0, 0));
        assert_eq!(index.line_col(TextSize::from(15)), LineCol::new(1, 0));
        assert_eq!(index.line_col(TextSize::from(20)), LineCol::new(1, 5));
        assert_eq!(index.offset(LineCol::new(1, 5)), Some(TextSize::from(20)));
    }

    #[test]
    fn test_source_location_from_offset() {
        let index = LineIndex::new("Item {\n  id: root\n}");
        let loc = SourceLocation::from_offset(&index, 9, 2);

        assert_eq!(loc.start, LineCol::new(1, 2));
        assert_eq!(loc.offset(), 9);
        assert_eq!(loc.length(), 2);
        assert!(loc.is_valid());
        assert!(!SourceLocation::default().is_valid());
    }

    #[test]
    fn test_source_location_cover() {
        let index = LineIndex::new("import Foo 1.0 as F");
        let a = SourceLocation::from_offset(&index, 7, 3);
        let b = SourceLocation::from_offset(&index, 15, 4);

        let covered = b.cover(a);
        assert_eq!(covered.offset(), 7);
        assert_eq!(covered.length(), 12);
        assert_eq!(covered.start, LineCol::new(0, 7));
    }
}
