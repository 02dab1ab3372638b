//! Token model tying a `TokenKind` to its source span.
//!
//! A `Token` borrows its text from the scanned input and records byte offsets
//! (`start`, `end`) into that input, so higher level passes (splitting,
//! clause location, error highlighting) can slice the original string without
//! a parallel reconstructed copy. Tokens are immutable once produced.
use crate::sql::{keyword::Keyword, token_kind::TokenKind};

/// A lexical token with its inclusive start and exclusive end byte offsets.
///
/// Invariants:
/// - `end >= start`
/// - `text == &input[start..end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    pub const fn new(kind: TokenKind, text: &'a str, start: usize, end: usize) -> Self {
        Self {
            kind,
            text,
            start,
            end,
        }
    }

    /// Byte length of this token (`end - start`).
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this token represents a given keyword.
    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind.is_keyword(kw)
    }

    /// Case-insensitive comparison of the token text against a word.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind.is_word() && self.text.eq_ignore_ascii_case(word)
    }

    /// Identifier text with surrounding quote characters removed.
    pub fn unquoted(&self) -> &'a str {
        if self.kind != TokenKind::QuotedIdent || self.text.len() < 2 {
            return self.text;
        }
        let inner = &self.text[1..];
        match inner.char_indices().last() {
            Some((i, c)) if matches!(c, '"' | '`' | ']') => &inner[..i],
            _ => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{keyword::Keyword, token_kind::TokenKind};

    #[test]
    fn length_and_empty() {
        let t = Token::new(TokenKind::Comma, ",", 5, 6);
        assert_eq!(t.len(), 1);
        assert!(!t.is_empty());
    }

    #[test]
    fn word_comparison_ignores_case() {
        let t = Token::new(TokenKind::Keyword(Keyword::Select), "SeLeCt", 0, 6);
        assert!(t.is_keyword(Keyword::Select));
        assert!(t.is_word("select"));
    }

    #[test]
    fn unquoted_strips_delimiters() {
        let t = Token::new(TokenKind::QuotedIdent, "\"first name\"", 0, 12);
        assert_eq!(t.unquoted(), "first name");
        let t = Token::new(TokenKind::QuotedIdent, "[order]", 0, 7);
        assert_eq!(t.unquoted(), "order");
        let t = Token::new(TokenKind::QuotedIdent, "\"open", 0, 5);
        assert_eq!(t.unquoted(), "open");
        let t = Token::new(TokenKind::Ident, "plain", 0, 5);
        assert_eq!(t.unquoted(), "plain");
    }
}
