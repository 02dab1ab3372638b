//! Token kind definitions for the SQL lexer.
//!
//! Each `TokenKind` variant represents a lexical atom discovered while
//! scanning. Kinds carry no text; the owning `Token` borrows its text from the
//! input so classification stays allocation free.
//!
//! See `keyword.rs` for the `Keyword` enum and `tokenizer.rs` for scanning.

use crate::sql::keyword::Keyword;

/// Classification for a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Recognized SQL keyword.
    Keyword(Keyword),
    /// Unquoted identifier / any other word.
    Ident,
    /// `"quoted"`, `` `backtick` `` or `[bracketed]` identifier.
    QuotedIdent,
    /// Single quoted or dollar quoted string literal.
    StringLiteral,
    /// Numeric literal.
    NumberLiteral,
    /// Operator, single or multi character (`=`, `<>`, `::`, `?` ...).
    Operator,
    /// Line (`--`, optionally `#`) or block (`/* */`) comment.
    Comment,
    /// Run of whitespace.
    Whitespace,
    /// Opening parenthesis `(`.
    ParenOpen,
    /// Closing parenthesis `)`.
    ParenClose,
    /// Comma `,`.
    Comma,
    /// Dot `.` (catalog separator in qualified names).
    Dot,
    /// Semicolon `;`.
    Semicolon,
}

impl TokenKind {
    /// True if this token is the given keyword.
    pub fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self, TokenKind::Keyword(k) if *k == kw)
    }

    /// Plain identifiers and keywords; anything that reads as a bare word.
    pub fn is_word(&self) -> bool {
        matches!(self, TokenKind::Ident | TokenKind::Keyword(_))
    }

    /// Anything that can name an object: bare words and quoted identifiers.
    pub fn is_identifier(&self) -> bool {
        self.is_word() || matches!(self, TokenKind::QuotedIdent)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, TokenKind::StringLiteral | TokenKind::NumberLiteral)
    }

    /// Whitespace and comments carry no meaning for the parser.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::keyword::Keyword;

    #[test]
    fn keyword_detection() {
        let tk = TokenKind::Keyword(Keyword::Select);
        assert!(tk.is_keyword(Keyword::Select));
        assert!(!tk.is_keyword(Keyword::From));
        assert!(tk.is_word());
    }

    #[test]
    fn identifier_classes() {
        assert!(TokenKind::Ident.is_identifier());
        assert!(TokenKind::QuotedIdent.is_identifier());
        assert!(!TokenKind::QuotedIdent.is_word());
        assert!(!TokenKind::StringLiteral.is_identifier());
    }

    #[test]
    fn trivia_classification() {
        assert!(!TokenKind::Operator.is_trivia());
        assert!(TokenKind::Comment.is_trivia());
        assert!(TokenKind::Whitespace.is_trivia());
    }
}
