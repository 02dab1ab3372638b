/// A 1-based line / column pair. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display("line {line}, column {column}")]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

/// Map a byte offset in `text` to its line and column.
///
/// Offsets past the end (or inside a multi-byte char) are clamped to the
/// nearest preceding char boundary.
pub fn line_column(text: &str, offset: usize) -> LineColumn {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    LineColumn { line, column }
}

/// Convert a 0-based character position into a byte offset.
pub fn char_to_byte(text: &str, char_pos: usize) -> Option<usize> {
    if char_pos == text.chars().count() {
        return Some(text.len());
    }
    text.char_indices().nth(char_pos).map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("select 1", 0, 1, 1)]
    #[case("select 1", 7, 1, 8)]
    #[case("select\n  from", 9, 2, 3)]
    #[case("a\nb\nc", 4, 3, 1)]
    #[case("abc", 99, 1, 4)]
    #[case("ä\nöx", 5, 2, 2)]
    fn maps_offsets(
        #[case] text: &str,
        #[case] offset: usize,
        #[case] line: usize,
        #[case] column: usize,
    ) {
        assert_eq!(line_column(text, offset), LineColumn { line, column });
    }

    #[test]
    fn char_positions() {
        assert_eq!(char_to_byte("äbc", 1), Some(2));
        assert_eq!(char_to_byte("äbc", 3), Some(4));
        assert_eq!(char_to_byte("äbc", 4), None);
    }

    #[test]
    fn display() {
        assert_eq!(
            LineColumn { line: 2, column: 5 }.to_string(),
            "line 2, column 5"
        );
    }
}
