use crate::sql::{keyword::Keyword, token::Token, token_kind::TokenKind};

/// Switches for dialect dependent lexing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerOptions {
    /// Treat `#` as the start of a line comment (MySQL style).
    pub hash_comments: bool,
    /// Lex PostgreSQL `$tag$ ... $tag$` bodies as a single string literal.
    pub dollar_quotes: bool,
    /// Lex `[name]` as a quoted identifier (SQL Server style).
    pub bracket_identifiers: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            hash_comments: false,
            dollar_quotes: true,
            bracket_identifiers: true,
        }
    }
}

const MULTI_CHAR_OPERATORS: [&str; 13] = [
    "->>", "<=", ">=", "<>", "!=", "||", "::", ":=", "=>", "->", "**", "?|", "?&",
];

/// Lenient SQL lexer producing a stream of `Token`s over a borrowed input.
///
/// Behavior:
/// - Recognizes single quoted literals (`''` escapes), `E'..'` / `N'..'`
///   prefixed literals, double quoted / backtick / bracket identifiers, line
///   comments (`--`, optionally `#`), non-nesting block comments, dollar quoted
///   bodies, numbers, multi character operators and structural punctuation.
/// - An unterminated literal, identifier or comment runs to the end of input.
///
/// Guarantees:
/// - Never panics and never returns an error; every byte of the input is
///   covered by exactly one token, so concatenating all token texts
///   reproduces the input.
///
/// A lexer is a cheap cursor. Build one per lookup instead of sharing it.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    options: LexerOptions,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_options(input, LexerOptions::default())
    }

    pub fn with_options(input: &'a str, options: LexerOptions) -> Self {
        Self {
            input,
            pos: 0,
            options,
        }
    }

    /// Replace the input and rewind to offset 0.
    pub fn reset(&mut self, input: &'a str) {
        self.input = input;
        self.pos = 0;
    }

    /// Current byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Next token, optionally skipping whitespace and/or comments.
    /// Returns `None` once the input is exhausted.
    pub fn next_token(&mut self, include_whitespace: bool, include_comments: bool) -> Option<Token<'a>> {
        loop {
            let token = self.scan()?;
            match token.kind {
                TokenKind::Whitespace if !include_whitespace => continue,
                TokenKind::Comment if !include_comments => continue,
                _ => return Some(token),
            }
        }
    }

    /// Iterator over tokens that are neither whitespace nor comments.
    pub fn significant(self) -> impl Iterator<Item = Token<'a>> {
        self.filter(|t| !t.kind.is_trivia())
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_at(&self, byte_offset: usize) -> Option<char> {
        self.input.get(self.pos + byte_offset..)?.chars().next()
    }

    fn emit(&mut self, kind: TokenKind, start: usize) -> Token<'a> {
        Token::new(kind, &self.input[start..self.pos], start, self.pos)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        let len = self
            .rest()
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest().len());
        self.pos += len;
    }

    /// Move the cursor just past `needle`, or to the end when it never occurs.
    fn advance_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(i) => self.pos += i + needle.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn scan(&mut self) -> Option<Token<'a>> {
        let c = self.peek_at(0)?;
        let next = self.peek_at(c.len_utf8());
        let start = self.pos;

        if c.is_whitespace() {
            self.advance_while(char::is_whitespace);
            return Some(self.emit(TokenKind::Whitespace, start));
        }

        match (c, next) {
            ('-', Some('-')) => return Some(self.line_comment(start)),
            ('#', _) if self.options.hash_comments => return Some(self.line_comment(start)),
            ('/', Some('*')) => {
                self.pos += 2;
                self.advance_past("*/");
                return Some(self.emit(TokenKind::Comment, start));
            }
            ('\'', _) => {
                self.pos += 1;
                self.quoted_run('\'', false);
                return Some(self.emit(TokenKind::StringLiteral, start));
            }
            ('E' | 'e', Some('\'')) => {
                self.pos += 2;
                self.quoted_run('\'', true);
                return Some(self.emit(TokenKind::StringLiteral, start));
            }
            ('N' | 'n', Some('\'')) => {
                self.pos += 2;
                self.quoted_run('\'', false);
                return Some(self.emit(TokenKind::StringLiteral, start));
            }
            ('"', _) => {
                self.pos += 1;
                self.quoted_run('"', false);
                return Some(self.emit(TokenKind::QuotedIdent, start));
            }
            ('`', _) => {
                self.pos += 1;
                self.advance_past("`");
                return Some(self.emit(TokenKind::QuotedIdent, start));
            }
            ('[', _) if self.options.bracket_identifiers => {
                self.pos += 1;
                self.advance_past("]");
                return Some(self.emit(TokenKind::QuotedIdent, start));
            }
            ('$', _) if self.options.dollar_quotes => {
                if let Some(tag) = self.dollar_tag() {
                    self.pos += tag.len();
                    self.advance_past(tag);
                    return Some(self.emit(TokenKind::StringLiteral, start));
                }
            }
            _ => {}
        }

        if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            self.number();
            return Some(self.emit(TokenKind::NumberLiteral, start));
        }

        if c.is_alphabetic() || c == '_' {
            let hash_in_words = !self.options.hash_comments;
            self.advance_while(|ch| {
                ch.is_alphanumeric() || ch == '_' || ch == '$' || (hash_in_words && ch == '#')
            });
            let text = &self.input[start..self.pos];
            let kind = Keyword::from_lower(&text.to_ascii_lowercase())
                .map(TokenKind::Keyword)
                .unwrap_or(TokenKind::Ident);
            return Some(self.emit(kind, start));
        }

        let punct = match c {
            '(' => Some(TokenKind::ParenOpen),
            ')' => Some(TokenKind::ParenClose),
            ',' => Some(TokenKind::Comma),
            '.' => Some(TokenKind::Dot),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = punct {
            self.pos += 1;
            return Some(self.emit(kind, start));
        }

        if c == '$' && next.is_some_and(|n| n.is_ascii_digit()) {
            // positional parameter: $1, $2 ...
            self.pos += 1;
            self.advance_while(|ch| ch.is_ascii_digit());
            return Some(self.emit(TokenKind::Operator, start));
        }

        let op_len = MULTI_CHAR_OPERATORS
            .iter()
            .find(|op| self.rest().starts_with(*op))
            .map(|op| op.len())
            .unwrap_or(c.len_utf8());
        self.pos += op_len;
        Some(self.emit(TokenKind::Operator, start))
    }

    fn line_comment(&mut self, start: usize) -> Token<'a> {
        self.advance_while(|ch| ch != '\n' && ch != '\r');
        self.emit(TokenKind::Comment, start)
    }

    /// Consume a quoted run whose opening quote was already consumed. A doubled
    /// quote is an escaped quote; with `backslash` a backslash escapes the next char.
    fn quoted_run(&mut self, quote: char, backslash: bool) {
        let mut chars = self.rest().char_indices().peekable();
        while let Some((i, ch)) = chars.next() {
            if backslash && ch == '\\' {
                chars.next();
                continue;
            }
            if ch == quote {
                if chars.peek().is_some_and(|&(_, n)| n == quote) {
                    chars.next();
                    continue;
                }
                self.pos += i + ch.len_utf8();
                return;
            }
        }
        self.pos = self.input.len();
    }

    /// The opening `$tag$` at the cursor, if one starts here.
    fn dollar_tag(&self) -> Option<&'a str> {
        let rest = self.rest();
        let body = &rest[1..];
        let tag_len = body
            .char_indices()
            .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(body.len());
        let tag_name = &body[..tag_len];
        if tag_name.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        if body[tag_len..].starts_with('$') {
            Some(&rest[..tag_len + 2])
        } else {
            None
        }
    }

    fn number(&mut self) {
        self.advance_while(|ch| ch.is_ascii_digit());
        if self.peek_at(0) == Some('.') && self.peek_at(1).is_none_or(|c| c != '.') {
            self.pos += 1;
            self.advance_while(|ch| ch.is_ascii_digit());
        }
        if matches!(self.peek_at(0), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-')) as usize;
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.advance_while(|ch| ch.is_ascii_digit());
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan()
    }
}

/// Tokenize `sql` with default options, dropping whitespace and comments.
pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    Lexer::new(sql).significant().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::keyword::Keyword;
    use crate::sql::token_kind::TokenKind;
    use rstest::rstest;

    fn kinds(sql: &str) -> Vec<(TokenKind, &str)> {
        Lexer::new(sql).map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn basic_select_sequence() {
        let toks = tokenize("SELECT a, b FROM t");
        let texts = toks.iter().map(|t| t.text).collect::<Vec<_>>();
        assert_eq!(texts, ["SELECT", "a", ",", "b", "FROM", "t"]);
        assert!(toks[0].is_keyword(Keyword::Select));
        assert!(toks[4].is_keyword(Keyword::From));
        assert_eq!(toks[5].kind, TokenKind::Ident);
    }

    #[test]
    fn tokens_cover_the_whole_input() {
        let sql = "select 'it''s' /* c */ from \"T x\" -- tail\n where a<>1;";
        let joined: String = Lexer::new(sql).map(|t| t.text).collect();
        assert_eq!(joined, sql);
    }

    #[rstest]
    #[case("'abc'", TokenKind::StringLiteral)]
    #[case("'it''s'", TokenKind::StringLiteral)]
    #[case("E'a\\'b'", TokenKind::StringLiteral)]
    #[case("\"first name\"", TokenKind::QuotedIdent)]
    #[case("`tbl`", TokenKind::QuotedIdent)]
    #[case("[my col]", TokenKind::QuotedIdent)]
    #[case("-- note", TokenKind::Comment)]
    #[case("/* a ; b */", TokenKind::Comment)]
    #[case("$$ begin; end $$", TokenKind::StringLiteral)]
    #[case("$body$ x $body$", TokenKind::StringLiteral)]
    #[case("12.5e-3", TokenKind::NumberLiteral)]
    #[case("->>", TokenKind::Operator)]
    #[case("<>", TokenKind::Operator)]
    #[case("::", TokenKind::Operator)]
    #[case("$1", TokenKind::Operator)]
    fn single_token(#[case] sql: &str, #[case] kind: TokenKind) {
        assert_eq!(kinds(sql), vec![(kind, sql)]);
    }

    #[rstest]
    #[case("'never closed")]
    #[case("\"never closed")]
    #[case("/* never closed")]
    #[case("$$ never closed")]
    #[case("[never closed")]
    fn unterminated_runs_to_end(#[case] sql: &str) {
        let toks = kinds(sql);
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].1, sql);
    }

    #[test]
    fn hash_comments_are_optional() {
        let options = LexerOptions {
            hash_comments: true,
            ..Default::default()
        };
        let toks: Vec<_> = Lexer::with_options("a # b\nc", options)
            .significant()
            .map(|t| t.text)
            .collect();
        assert_eq!(toks, ["a", "c"]);

        let toks: Vec<_> = Lexer::new("a # b").significant().map(|t| t.text).collect();
        assert_eq!(toks, ["a", "#", "b"]);
    }

    #[test]
    fn next_token_filters_trivia() {
        let mut lexer = Lexer::new(" /* c */ select -- x\n 1");
        let first = lexer.next_token(false, true).expect("comment");
        assert_eq!(first.kind, TokenKind::Comment);
        let second = lexer.next_token(false, false).expect("select");
        assert!(second.is_keyword(Keyword::Select));
        assert_eq!(second.start, 9);
        let third = lexer.next_token(true, false).expect("whitespace");
        assert_eq!(third.kind, TokenKind::Whitespace);
        assert_eq!(lexer.next_token(false, false).map(|t| t.text), Some("1"));
        assert!(lexer.next_token(true, true).is_none());
    }

    #[test]
    fn reset_rewinds() {
        let mut lexer = Lexer::new("a b");
        lexer.next_token(false, false);
        lexer.reset("c");
        assert_eq!(lexer.position(), 0);
        assert_eq!(lexer.next_token(false, false).map(|t| t.text), Some("c"));
    }

    #[test]
    fn parentheses_are_distinct_tokens() {
        let toks = tokenize("f((a),b)");
        let opens = toks.iter().filter(|t| t.kind == TokenKind::ParenOpen).count();
        let closes = toks.iter().filter(|t| t.kind == TokenKind::ParenClose).count();
        assert_eq!((opens, closes), (2, 2));
    }

    #[test]
    fn non_ascii_identifiers() {
        let toks = tokenize("select größe from tåble");
        assert_eq!(toks[1].text, "größe");
        assert_eq!(toks[3].text, "tåble");
    }

    #[test]
    fn qualified_name_sequence() {
        let toks = tokenize("schema.tbl");
        assert_eq!(
            toks.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Ident, TokenKind::Dot, TokenKind::Ident]
        );
    }
}
