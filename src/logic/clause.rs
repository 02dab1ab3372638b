//! Clause location over single statements.
//!
//! Every lookup here is best effort. Malformed or unexpected input never
//! produces an error: the lookups answer with an empty string, `None` or an
//! empty list and the feature relying on them simply stays disabled.
use crate::logic::alias::TableAlias;
use crate::sql::{Keyword, Lexer, LexerOptions, Token, TokenKind};

/// Keywords ending the FROM part of a query.
pub const DEFAULT_FROM_TERMINALS: [&str; 17] = [
    "WHERE",
    "GROUP BY",
    "ORDER BY",
    "HAVING",
    "UNION",
    "UNION ALL",
    "INTERSECT",
    "EXCEPT",
    "MINUS",
    "LIMIT",
    "OFFSET",
    "FETCH",
    "WINDOW",
    "FOR UPDATE",
    "CONNECT BY",
    "START WITH",
    "QUALIFY",
];

/// Words that end an expression and so are never a bare column alias.
const VALUE_WORDS: [&str; 12] = [
    "NULL",
    "TRUE",
    "FALSE",
    "UNKNOWN",
    "END",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "CURRENT_USER",
    "SESSION_USER",
];

/// Words that need an operand after them; whatever follows belongs to the
/// expression.
const OPERATOR_WORDS: [&str; 16] = [
    "AND", "NOT", "IS", "BETWEEN", "CASE", "WHEN", "THEN", "ELSE", "LIKE", "ILIKE", "IN",
    "SIMILAR", "ESCAPE", "COLLATE", "INTERVAL", "EXISTS",
];

/// Locates verbs, clauses, target tables and column lists in a statement.
///
/// Construct one where the system is composed and pass it to whoever needs
/// it; it is immutable and cheap to clone.
#[derive(Debug, Clone)]
pub struct ClauseLocator {
    terminals: Vec<String>,
    catalog_separator: char,
    lexer_options: LexerOptions,
}

impl Default for ClauseLocator {
    fn default() -> Self {
        Self {
            terminals: DEFAULT_FROM_TERMINALS.iter().map(|s| s.to_string()).collect(),
            catalog_separator: '.',
            lexer_options: LexerOptions::default(),
        }
    }
}

impl ClauseLocator {
    pub fn with_terminals<I, S>(mut self, terminals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terminals = terminals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_catalog_separator(mut self, separator: char) -> Self {
        self.catalog_separator = separator;
        self
    }

    pub fn with_lexer_options(mut self, options: LexerOptions) -> Self {
        self.lexer_options = options;
        self
    }

    pub fn lexer_options(&self) -> LexerOptions {
        self.lexer_options
    }

    fn tokens<'a>(&self, sql: &'a str) -> Vec<Token<'a>> {
        Lexer::with_options(sql, self.lexer_options)
            .significant()
            .collect()
    }

    /// The first token that is not whitespace or a comment; callers compare it
    /// case-insensitively. A leading `@` (script include) is a verb of its own.
    pub fn sql_verb<'a>(&self, sql: &'a str) -> &'a str {
        let mut lexer = Lexer::with_options(sql, self.lexer_options);
        match lexer.next_token(false, false) {
            Some(token) if token.text.starts_with('@') => &token.text[..1],
            Some(token) => token.text,
            None => "",
        }
    }

    /// Byte offset of the first token at bracket depth 0 (counted from
    /// `start`) matching one of `keywords`. Multi-word keywords such as
    /// `GROUP BY` match consecutive words.
    pub fn keyword_position(&self, keywords: &[&str], sql: &str, start: usize) -> Option<usize> {
        let phrases = keywords
            .iter()
            .map(|k| k.split_whitespace().collect::<Vec<_>>())
            .filter(|words| !words.is_empty())
            .collect::<Vec<_>>();
        let tokens = self.tokens(sql);
        let mut depth = 0i32;
        for (i, token) in tokens.iter().enumerate().filter(|(_, t)| t.start >= start) {
            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => depth -= 1,
                _ if depth == 0
                    && phrases
                        .iter()
                        .any(|phrase| Self::matches_phrase(&tokens[i..], phrase)) =>
                {
                    return Some(token.start);
                }
                _ => {}
            }
        }
        None
    }

    fn matches_phrase(tokens: &[Token<'_>], phrase: &[&str]) -> bool {
        phrase.len() <= tokens.len() && phrase.iter().zip(tokens).all(|(w, t)| t.is_word(w))
    }

    /// Text between the first top-level `FROM` and the first terminal keyword
    /// (or the end of the statement).
    pub fn from_part<'a>(&self, sql: &'a str) -> Option<&'a str> {
        let from = self.keyword_position(&["FROM"], sql, 0)?;
        let begin = from + "FROM".len();
        let terminals = self.terminals.iter().map(String::as_str).collect::<Vec<_>>();
        let end = self
            .keyword_position(&terminals, sql, begin)
            .unwrap_or(sql.len());
        sql.get(begin..end)
    }

    /// Target table of a DML statement. `verb` must be the first token and,
    /// when given, `second` the token right after it.
    pub fn dml_table(&self, sql: &str, verb: &str, second: Option<&str>) -> Option<String> {
        let tokens = self.tokens(sql);
        if !tokens.first()?.is_word(verb) {
            return None;
        }
        let mut idx = 1;
        if let Some(word) = second {
            if !tokens.get(idx)?.is_word(word) {
                return None;
            }
            idx += 1;
        }
        if tokens.get(idx).is_some_and(|t| t.is_word("only"))
            && tokens.get(idx + 1).is_some_and(|t| t.kind.is_identifier())
        {
            idx += 1;
        }
        self.qualified_name(sql, &tokens, idx)
            .map(|(name, _)| name.to_string())
    }

    pub fn insert_table(&self, sql: &str) -> Option<String> {
        self.dml_table(sql, "INSERT", Some("INTO"))
    }

    pub fn update_table(&self, sql: &str) -> Option<String> {
        self.dml_table(sql, "UPDATE", None)
    }

    pub fn delete_table(&self, sql: &str) -> Option<String> {
        self.dml_table(sql, "DELETE", Some("FROM"))
            .or_else(|| self.dml_table(sql, "DELETE", None))
    }

    pub fn truncate_table(&self, sql: &str) -> Option<String> {
        self.dml_table(sql, "TRUNCATE", Some("TABLE"))
            .or_else(|| self.dml_table(sql, "TRUNCATE", None))
    }

    /// Reads `name[.name...]` starting at `tokens[idx]`; returns the source
    /// text of the name and the index of the token following it.
    fn qualified_name<'a>(&self, sql: &'a str, tokens: &[Token<'_>], idx: usize) -> Option<(&'a str, usize)> {
        let first = tokens.get(idx).filter(|t| match t.kind {
            TokenKind::Ident | TokenKind::QuotedIdent => true,
            TokenKind::Keyword(kw) => !kw.is_structural(),
            _ => false,
        })?;
        let mut last = idx;
        while tokens.get(last + 1).is_some_and(|t| self.is_separator(t))
            && tokens
                .get(last + 2)
                .is_some_and(|t| t.kind.is_identifier() || t.text == "*")
        {
            last += 2;
        }
        Some((sql.get(first.start..tokens[last].end)?, last + 1))
    }

    fn is_separator(&self, token: &Token<'_>) -> bool {
        let mut chars = token.text.chars();
        chars.next() == Some(self.catalog_separator) && chars.next().is_none()
    }

    /// The column list of a SELECT (or `WITH ... SELECT`) statement, split on
    /// top-level commas. Without `include_alias` trailing aliases are removed.
    pub fn select_columns(&self, sql: &str, include_alias: bool) -> Vec<String> {
        let tokens = self.tokens(sql);
        let is_query = tokens
            .first()
            .is_some_and(|t| t.is_keyword(Keyword::Select) || t.is_keyword(Keyword::With));
        if !is_query {
            return vec![];
        }

        let mut depth = 0i32;
        let mut select_idx = None;
        for (i, t) in tokens.iter().enumerate() {
            match t.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => depth -= 1,
                TokenKind::Keyword(Keyword::Select) if depth == 0 => {
                    select_idx = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let Some(select_idx) = select_idx else {
            return vec![];
        };

        let mut first = select_idx + 1;
        if tokens.get(first).is_some_and(|t| t.is_keyword(Keyword::All)) {
            first += 1;
        } else if tokens
            .get(first)
            .is_some_and(|t| t.is_keyword(Keyword::Distinct))
        {
            first += 1;
            let distinct_on = tokens.get(first).is_some_and(|t| t.is_keyword(Keyword::On))
                && tokens
                    .get(first + 1)
                    .is_some_and(|t| t.kind == TokenKind::ParenOpen);
            if distinct_on {
                first = Self::matching_paren(&tokens, first + 1)
                    .map(|close| close + 1)
                    .unwrap_or(tokens.len());
            }
        }

        let mut columns = Vec::new();
        let mut push = |range: &[Token<'_>]| {
            if let (Some(head), Some(tail)) = (range.first(), range.last()) {
                let column = if include_alias {
                    sql.get(head.start..tail.end).map(str::to_string)
                } else {
                    Self::column_without_alias(sql, range)
                };
                columns.extend(column);
            }
        };

        let mut depth = 0i32;
        let mut col_start = first;
        let mut end = tokens.len();
        for (j, t) in tokens.iter().enumerate().skip(first) {
            match t.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => {
                    depth -= 1;
                    if depth < 0 {
                        end = j;
                        break;
                    }
                }
                TokenKind::Comma if depth == 0 => {
                    push(&tokens[col_start..j]);
                    col_start = j + 1;
                }
                TokenKind::Semicolon if depth == 0 => {
                    end = j;
                    break;
                }
                TokenKind::Keyword(
                    Keyword::From
                    | Keyword::Into
                    | Keyword::Where
                    | Keyword::Group
                    | Keyword::Order
                    | Keyword::Having
                    | Keyword::Limit
                    | Keyword::Offset
                    | Keyword::Fetch
                    | Keyword::Union
                    | Keyword::Except
                    | Keyword::Intersect
                    | Keyword::Minus
                    | Keyword::Window,
                ) if depth == 0 => {
                    end = j;
                    break;
                }
                _ => {}
            }
        }
        if col_start < end {
            push(&tokens[col_start..end]);
        }
        columns
    }

    /// Column text without `AS alias` or a bare trailing alias.
    fn column_without_alias(sql: &str, tokens: &[Token<'_>]) -> Option<String> {
        let head = tokens.first()?;
        let mut keep = tokens.len();
        if keep >= 3 && tokens[keep - 2].is_keyword(Keyword::As) {
            keep -= 2;
        } else if keep >= 2 {
            let last = &tokens[keep - 1];
            let prev = &tokens[keep - 2];
            let alias_like = match last.kind {
                TokenKind::QuotedIdent => true,
                TokenKind::Ident => !VALUE_WORDS.iter().any(|w| last.is_word(w)),
                _ => false,
            };
            let ends_expression = match prev.kind {
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    !OPERATOR_WORDS.iter().any(|w| prev.is_word(w))
                }
                TokenKind::Keyword(_) => false,
                kind => kind.is_literal() || kind == TokenKind::ParenClose,
            };
            if alias_like && ends_expression && prev.end < last.start {
                keep -= 1;
            }
        }
        sql.get(head.start..tokens[keep - 1].end).map(str::to_string)
    }

    fn matching_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
        let mut depth = 0i32;
        for (i, t) in tokens.iter().enumerate().skip(open) {
            match t.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Arguments of the first function call in `sql`, as raw trimmed text.
    pub fn function_parameters(&self, sql: &str) -> Vec<String> {
        let tokens = self.tokens(sql);
        let Some(open) = tokens.iter().position(|t| t.kind == TokenKind::ParenOpen) else {
            return vec![];
        };

        let mut params = Vec::new();
        let mut push = |range: &[Token<'_>]| {
            if let (Some(head), Some(tail)) = (range.first(), range.last()) {
                params.extend(sql.get(head.start..tail.end).map(str::to_string));
            }
        };

        let mut depth = 0i32;
        let mut start = open + 1;
        for (j, t) in tokens.iter().enumerate().skip(open) {
            match t.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => {
                    depth -= 1;
                    if depth == 0 {
                        push(&tokens[start..j]);
                        return params;
                    }
                }
                TokenKind::Comma if depth == 1 => {
                    push(&tokens[start..j]);
                    start = j + 1;
                }
                _ => {}
            }
        }
        if start < tokens.len() {
            push(&tokens[start..]);
        }
        params
    }

    /// Tables referenced in the FROM / JOIN list. Derived tables and table
    /// functions are skipped.
    pub fn tables(&self, sql: &str) -> Vec<TableAlias> {
        let Some(from) = self.from_part(sql) else {
            return vec![];
        };
        let tokens = self.tokens(from);
        let mut result = Vec::new();
        let mut depth = 0usize;
        let mut expect_table = true;
        let mut i = 0;

        while let Some(t) = tokens.get(i) {
            if depth == 0 && expect_table {
                expect_table = false;
                if let Some((name, next)) = self.qualified_name(from, &tokens, i) {
                    if tokens
                        .get(next)
                        .is_some_and(|t| t.kind == TokenKind::ParenOpen)
                    {
                        i = next;
                        continue;
                    }
                    let (alias, after) = Self::alias_at(&tokens, next);
                    result.push(TableAlias::new(name, alias));
                    i = after;
                    continue;
                }
            }
            match t.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => depth = depth.saturating_sub(1),
                TokenKind::Comma if depth == 0 => expect_table = true,
                TokenKind::Keyword(Keyword::Join) if depth == 0 => expect_table = true,
                _ => {}
            }
            i += 1;
        }
        result
    }

    fn alias_at(tokens: &[Token<'_>], idx: usize) -> (Option<String>, usize) {
        match tokens.get(idx) {
            Some(t) if t.is_keyword(Keyword::As) => match tokens.get(idx + 1) {
                Some(alias) if alias.kind.is_identifier() => {
                    (Some(alias.unquoted().to_string()), idx + 2)
                }
                _ => (None, idx + 1),
            },
            Some(t) if matches!(t.kind, TokenKind::Ident | TokenKind::QuotedIdent) => {
                (Some(t.unquoted().to_string()), idx + 1)
            }
            _ => (None, idx),
        }
    }

    /// `sql` with all comments removed. Block comments become a single space
    /// so neighbouring tokens stay apart.
    pub fn strip_comments(&self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len());
        for token in Lexer::with_options(sql, self.lexer_options) {
            match token.kind {
                TokenKind::Comment if token.text.starts_with("/*") => out.push(' '),
                TokenKind::Comment => {}
                _ => out.push_str(token.text),
            }
        }
        out
    }
}

/// Remove a trailing alias from a column expression.
///
/// Scans left to right tracking quotes (`'`, `"`, `` ` ``, `[...]`) and
/// parentheses, and cuts at the first whitespace outside of both.
pub fn strip_column_alias(expr: &str) -> String {
    let expr = expr.trim();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for (i, c) in expr.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '[' => quote = Some(']'),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() && depth == 0 => return expr[..i].to_string(),
                _ => {}
            },
        }
    }
    expr.to_string()
}
