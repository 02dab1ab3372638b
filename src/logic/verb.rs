use crate::logic::clause::ClauseLocator;
use crate::sql::{Lexer, TokenKind};

const DDL_VERBS: [&str; 9] = [
    "CREATE", "ALTER", "DROP", "TRUNCATE", "COMMENT", "GRANT", "REVOKE", "RENAME", "ANALYZE",
];
const QUERY_VERBS: [&str; 6] = ["SELECT", "WITH", "VALUES", "SHOW", "EXPLAIN", "TABLE"];
const DML_VERBS: [&str; 5] = ["INSERT", "UPDATE", "DELETE", "MERGE", "COPY"];

fn verb_in(verb: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|c| verb.eq_ignore_ascii_case(c))
}

pub fn is_ddl(verb: &str) -> bool {
    verb_in(verb, &DDL_VERBS)
}

pub fn is_query(verb: &str) -> bool {
    verb_in(verb, &QUERY_VERBS)
}

pub fn is_dml(verb: &str) -> bool {
    verb_in(verb, &DML_VERBS)
}

/// `COMMIT`, `END` and `ROLLBACK` verbs, regardless of what follows them.
pub fn is_transaction_control(verb: &str) -> bool {
    verb_in(verb, &["COMMIT", "END", "ROLLBACK"])
}

/// How the runner treats a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum StatementKind {
    Query,
    Dml,
    Ddl,
    /// `COMMIT` / `END`, handled by the runner itself.
    Commit,
    /// `ROLLBACK` without `TO SAVEPOINT`, handled by the runner itself.
    Rollback,
    /// `@file` script include directive.
    Include,
    Other,
}

impl StatementKind {
    pub fn classify(locator: &ClauseLocator, sql: &str) -> Self {
        let verb = locator.sql_verb(sql);
        if verb == "@" {
            Self::Include
        } else if verb_in(verb, &["COMMIT", "END"]) && Self::word_count(locator, sql) <= 2 {
            Self::Commit
        } else if verb.eq_ignore_ascii_case("ROLLBACK")
            && locator.keyword_position(&["TO"], sql, 0).is_none()
        {
            Self::Rollback
        } else if is_query(verb) {
            Self::Query
        } else if is_dml(verb) {
            Self::Dml
        } else if is_ddl(verb) {
            Self::Ddl
        } else {
            Self::Other
        }
    }

    /// DDL update counts carry no meaning and are left out of script totals.
    pub fn ignores_update_count(self) -> bool {
        matches!(self, Self::Ddl)
    }

    pub fn is_transaction_control(self) -> bool {
        matches!(self, Self::Commit | Self::Rollback)
    }

    // `COMMIT`, `COMMIT WORK`, `END TRANSACTION`; longer forms (e.g. `END IF`
    // fragments, `COMMIT PREPARED 'x'`) are sent to the server as they are.
    fn word_count(locator: &ClauseLocator, sql: &str) -> usize {
        Lexer::with_options(sql, locator.lexer_options())
            .significant()
            .filter(|t| t.kind != TokenKind::Semicolon)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("select 1", StatementKind::Query)]
    #[case("with x as (select 1) select * from x", StatementKind::Query)]
    #[case("-- c\ninsert into t values (1)", StatementKind::Dml)]
    #[case("create table t (a int)", StatementKind::Ddl)]
    #[case("DROP TABLE t", StatementKind::Ddl)]
    #[case("commit", StatementKind::Commit)]
    #[case("COMMIT WORK", StatementKind::Commit)]
    #[case("end", StatementKind::Commit)]
    #[case("commit prepared 'tx1'", StatementKind::Other)]
    #[case("rollback", StatementKind::Rollback)]
    #[case("rollback to savepoint s1", StatementKind::Other)]
    #[case("@setup.sql", StatementKind::Include)]
    #[case("vacuum", StatementKind::Other)]
    #[case("", StatementKind::Other)]
    fn classify(#[case] sql: &str, #[case] expected: StatementKind) {
        assert_eq!(StatementKind::classify(&ClauseLocator::default(), sql), expected);
    }

    #[test]
    fn only_ddl_ignores_update_counts() {
        assert!(StatementKind::Ddl.ignores_update_count());
        assert!(!StatementKind::Dml.ignores_update_count());
        assert!(StatementKind::Commit.is_transaction_control());
    }

    #[rstest]
    #[case("create", true, false, false)]
    #[case("Select", false, true, false)]
    #[case("end", false, false, true)]
    #[case("rollback", false, false, true)]
    #[case("", false, false, false)]
    fn verb_helpers(
        #[case] verb: &str,
        #[case] ddl: bool,
        #[case] query: bool,
        #[case] transaction: bool,
    ) {
        assert_eq!(
            (is_ddl(verb), is_query(verb), is_transaction_control(verb)),
            (ddl, query, transaction)
        );
    }
}
