use crate::sql::{Token, TokenKind};

/// The string that terminates a statement inside a script.
///
/// The standard definition is a bare `;`. Alternate definitions (`/`, `GO`,
/// `@@`, ...) are matched against the raw script text, but only where they
/// start and end on token boundaries outside literals and comments.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{delimiter}")]
pub struct DelimiterDefinition {
    delimiter: String,
    case_sensitive: bool,
    needs_whitespace_before: bool,
}

impl Default for DelimiterDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

impl DelimiterDefinition {
    pub const STANDARD: &'static str = ";";
    /// Suffix marking a delimiter that must be preceded by whitespace (`/:nl`).
    pub const WHITESPACE_SUFFIX: &'static str = ":nl";

    pub fn standard() -> Self {
        Self::new(Self::STANDARD)
    }

    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            case_sensitive: false,
            needs_whitespace_before: false,
        }
    }

    /// Parse a user supplied definition. Returns `None` for blank input.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let suffix_at = value.len().checked_sub(Self::WHITESPACE_SUFFIX.len());
        let (delimiter, needs_whitespace_before) = match suffix_at {
            Some(at)
                if at > 0
                    && value.is_char_boundary(at)
                    && value[at..].eq_ignore_ascii_case(Self::WHITESPACE_SUFFIX) =>
            {
                (value[..at].trim_end(), true)
            }
            _ => (value, false),
        };
        if delimiter.is_empty() {
            return None;
        }
        Some(Self::new(delimiter).with_whitespace_before(needs_whitespace_before))
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_whitespace_before(mut self, needs_whitespace_before: bool) -> Self {
        self.needs_whitespace_before = needs_whitespace_before;
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn needs_whitespace_before(&self) -> bool {
        self.needs_whitespace_before
    }

    pub fn is_standard(&self) -> bool {
        self.delimiter == Self::STANDARD
    }

    /// Try to match the delimiter at `tokens[idx]`.
    ///
    /// Returns the index of the last token covered by the delimiter, or `None`
    /// when the delimiter does not start here.
    pub fn match_at(&self, script: &str, tokens: &[Token<'_>], idx: usize) -> Option<usize> {
        let first = tokens.get(idx)?;
        if !Self::can_start(first.kind) {
            return None;
        }
        if self.needs_whitespace_before
            && script[..first.start]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_whitespace())
        {
            return None;
        }
        if self.is_standard() {
            return (first.kind == TokenKind::Semicolon).then_some(idx);
        }

        let end = first.start + self.delimiter.len();
        let candidate = script.get(first.start..end)?;
        let equal = if self.case_sensitive {
            candidate == self.delimiter
        } else {
            candidate.eq_ignore_ascii_case(&self.delimiter)
        };
        if !equal {
            return None;
        }

        let mut last = idx;
        while tokens[last].end < end {
            last += 1;
            let token = tokens.get(last)?;
            if token.kind.is_trivia() {
                return None;
            }
        }
        if tokens[last].end != end {
            return None;
        }
        if self.is_word() && !Self::alone_on_line(script, first.start, end) {
            return None;
        }
        Some(last)
    }

    /// Word delimiters (`GO`) could also be an identifier inside a statement.
    fn is_word(&self) -> bool {
        self.delimiter
            .starts_with(|c: char| c.is_alphanumeric() || c == '_')
    }

    fn alone_on_line(script: &str, start: usize, end: usize) -> bool {
        let before = script[..start].rsplit('\n').next().unwrap_or_default();
        let after = script[end..].split('\n').next().unwrap_or_default();
        before.trim().is_empty() && after.trim().is_empty()
    }

    fn can_start(kind: TokenKind) -> bool {
        !matches!(
            kind,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::StringLiteral | TokenKind::QuotedIdent
        )
    }
}
