//! Positional `?` placeholders.
//!
//! Placeholders are found with the lexer, so a `?` inside a literal, a quoted
//! identifier or a comment is never treated as a parameter.
use crate::sql::{Lexer, LexerOptions, Token, TokenKind};
use crate::value::Value;

fn is_placeholder(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Operator && token.text == "?"
}

/// Number of `?` placeholders in `sql`.
pub fn count_parameters(sql: &str, options: LexerOptions) -> usize {
    Lexer::with_options(sql, options).filter(is_placeholder).count()
}

/// Echo of `sql` with every placeholder replaced by the literal form of the
/// matching value. Placeholders without a value are left as `?`.
///
/// The result is meant for logs and previews; execution binds the values.
pub fn replace_parameters(sql: &str, values: &[Value], options: LexerOptions) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut values = values.iter();
    for token in Lexer::with_options(sql, options) {
        if is_placeholder(&token) {
            if let Some(value) = values.next() {
                out.push_str(&value.to_sql_literal());
                continue;
            }
        }
        out.push_str(token.text);
    }
    out
}

/// Rewrite `?` placeholders into PostgreSQL `$1 .. $n` form.
pub fn to_numbered(sql: &str, options: LexerOptions) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    for token in Lexer::with_options(sql, options) {
        if is_placeholder(&token) {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push_str(token.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("select * from t where a = ? and b = ?", 2)]
    #[case("select '?' from t where \"?\" = ? -- ?", 1)]
    #[case("select data ?| array['a'] from t", 0)]
    #[case("", 0)]
    fn counts(#[case] sql: &str, #[case] expected: usize) {
        assert_eq!(count_parameters(sql, LexerOptions::default()), expected);
    }

    #[test]
    fn replaces_with_literals() {
        let sql = "insert into t values (?, ?, ?, ?)";
        let values = [
            Value::Text("it's".into()),
            Value::Null,
            Value::Int(5),
            Value::Bool(false),
        ];
        assert_eq!(
            replace_parameters(sql, &values, LexerOptions::default()),
            "insert into t values ('it''s', NULL, 5, false)"
        );
    }

    #[test]
    fn missing_values_keep_placeholder() {
        assert_eq!(
            replace_parameters("select ?, ? /* ? */", &[Value::Int(1)], LexerOptions::default()),
            "select 1, ? /* ? */"
        );
    }

    #[test]
    fn numbered_placeholders() {
        assert_eq!(
            to_numbered(
                "update t set a = ? where b = '?' and c = ?",
                LexerOptions::default()
            ),
            "update t set a = $1 where b = '?' and c = $2"
        );
    }

    #[test]
    fn hash_comments_hide_placeholders() {
        let sql = "select ? # why ?\nfrom t where a = ?";
        let hash = LexerOptions {
            hash_comments: true,
            ..Default::default()
        };
        assert_eq!(count_parameters(sql, hash), 2);
        assert_eq!(
            to_numbered(sql, hash),
            "select $1 # why ?\nfrom t where a = $2"
        );
        assert_eq!(
            replace_parameters(sql, &[Value::Int(1), Value::Int(2)], hash),
            "select 1 # why ?\nfrom t where a = 2"
        );
        assert_eq!(count_parameters(sql, LexerOptions::default()), 3);
    }
}
