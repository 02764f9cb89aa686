//! Byte-offset source positions.
//!
//! Spans are half-open byte ranges into the original source text.
//! Nothing in the compiler serializes them; they exist to anchor
//! diagnostics, which render through [`Span::line_col`].

/// Half-open byte range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero span for synthesized nodes (tests, desugared constructs).
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Smallest span covering both operands.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 1-indexed line and column of the span start within `source`.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        offset_to_line_col(source, self.start)
    }
}

/// Convert a byte offset into a 1-indexed line:column pair.
///
/// Offsets past the end of the source clamp to its last position, so a
/// diagnostic at EOF still renders.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut line_start = 0;
    for (i, byte) in source.bytes().enumerate().take(offset) {
        if byte == b'\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    let col = source
        .get(line_start..offset)
        .map(|s| s.chars().count())
        .unwrap_or(offset - line_start);
    (line, col + 1)
}

/// A node paired with the span it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both_ranges() {
        let merged = Span::new(4, 7).merge(Span::new(1, 5));
        assert_eq!(merged, Span::new(1, 7));
    }

    #[test]
    fn line_col_counts_from_one() {
        let source = "stream type S {\n  A(x : int);\n}\n";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 7), (1, 8));
        // first character after the first newline
        assert_eq!(offset_to_line_col(source, 16), (2, 1));
    }

    #[test]
    fn line_col_clamps_past_eof() {
        assert_eq!(offset_to_line_col("ab", 100), (1, 3));
    }
}
