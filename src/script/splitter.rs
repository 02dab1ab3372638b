//! Splits a multi statement script into individual commands.
//!
//! Statement boundaries are only recognized at bracket depth 0 and outside
//! literals, quoted identifiers and comments. Statements made of nothing but
//! whitespace and comments are dropped, so `;;` never yields an empty command.
//!
//! Command offsets always point into the original script: `start` is the first
//! non-whitespace byte of the statement, `end` is one past its last
//! non-whitespace byte before the delimiter.
use crate::script::delimiter::DelimiterDefinition;
use crate::sql::{Keyword, Lexer, LexerOptions, Token, TokenKind};

/// One statement extracted from a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Position of the command in the script, starting at 0.
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

/// The ordered commands of one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script<'a> {
    source: &'a str,
    commands: Vec<Command<'a>>,
}

impl<'a> Script<'a> {
    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn commands(&self) -> &[Command<'a>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Command<'a>> {
        self.commands.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command<'a>> {
        self.commands.iter()
    }
}

impl<'a> IntoIterator for Script<'a> {
    type Item = Command<'a>;
    type IntoIter = std::vec::IntoIter<Command<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Script splitter configured with a primary and an optional alternate delimiter.
///
/// When an alternate delimiter is set, statements that open a procedural block
/// (`CREATE FUNCTION`, `DECLARE`, `DO`, ...) only end at the alternate
/// delimiter. All other statements end at either one.
#[derive(Debug, Clone, Default)]
pub struct ScriptParser {
    delimiter: DelimiterDefinition,
    alternate: Option<DelimiterDefinition>,
    lexer_options: LexerOptions,
}

impl ScriptParser {
    pub fn new(delimiter: DelimiterDefinition) -> Self {
        Self {
            delimiter,
            ..Default::default()
        }
    }

    pub fn with_alternate(mut self, alternate: Option<DelimiterDefinition>) -> Self {
        self.alternate = alternate;
        self
    }

    pub fn with_lexer_options(mut self, options: LexerOptions) -> Self {
        self.lexer_options = options;
        self
    }

    pub fn delimiter(&self) -> &DelimiterDefinition {
        &self.delimiter
    }

    pub fn alternate(&self) -> Option<&DelimiterDefinition> {
        self.alternate.as_ref()
    }

    pub fn lexer_options(&self) -> LexerOptions {
        self.lexer_options
    }

    pub fn split<'a>(&self, script: &'a str) -> Script<'a> {
        let tokens: Vec<Token<'a>> = Lexer::with_options(script, self.lexer_options).collect();
        let mut commands = Vec::new();

        let mut stmt_start = 0;
        let mut has_content = false;
        let mut block = false;
        let mut depth = 0usize;
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            if token.kind.is_trivia() {
                i += 1;
                continue;
            }

            if depth == 0 {
                let matched = self
                    .alternate
                    .as_ref()
                    .and_then(|alt| alt.match_at(script, &tokens, i))
                    .or_else(|| {
                        (!block)
                            .then(|| self.delimiter.match_at(script, &tokens, i))
                            .flatten()
                    });
                if let Some(last) = matched {
                    if has_content {
                        Self::push(&mut commands, script, stmt_start, token.start);
                    }
                    stmt_start = tokens[last].end;
                    has_content = false;
                    block = false;
                    i = last + 1;
                    continue;
                }
            }

            if !has_content {
                has_content = true;
                block = self.alternate.is_some() && Self::opens_block(&tokens[i..]);
            }

            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }

        if has_content {
            Self::push(&mut commands, script, stmt_start, script.len());
        }

        Script {
            source: script,
            commands,
        }
    }

    /// The command containing `offset`. Between two commands the preceding
    /// one wins; before the first command the first one is returned.
    pub fn command_at<'a>(&self, script: &'a str, offset: usize) -> Option<Command<'a>> {
        let parsed = self.split(script);
        parsed
            .iter()
            .rev()
            .find(|c| c.start <= offset)
            .or_else(|| parsed.commands().first())
            .copied()
    }

    fn push<'a>(commands: &mut Vec<Command<'a>>, script: &'a str, from: usize, to: usize) {
        let region = &script[from..to];
        let leading = region.len() - region.trim_start().len();
        let start = from + leading;
        let end = from + region.trim_end().len();
        if start >= end {
            return;
        }
        commands.push(Command {
            index: commands.len(),
            start,
            end,
            text: &script[start..end],
        });
    }

    /// True when the statement starting at `tokens[0]` is a procedural block
    /// that may contain bare semicolons.
    fn opens_block(tokens: &[Token<'_>]) -> bool {
        let mut words = tokens.iter().filter(|t| !t.kind.is_trivia());
        let Some(first) = words.next() else {
            return false;
        };
        match first.kind {
            TokenKind::Keyword(Keyword::Declare | Keyword::Do) => true,
            TokenKind::Keyword(Keyword::Begin) => match words.next() {
                None => false,
                Some(next) if next.kind == TokenKind::Semicolon => false,
                Some(next) => !["transaction", "work", "isolation", "read"]
                    .iter()
                    .any(|w| next.is_word(w)),
            },
            TokenKind::Keyword(Keyword::Create) => {
                let mut next = words.next();
                if next.is_some_and(|t| t.is_keyword(Keyword::Or)) {
                    words.next();
                    next = words.next();
                }
                while next.is_some_and(|t| t.is_word("editionable") || t.is_word("noneditionable")) {
                    next = words.next();
                }
                next.is_some_and(|t| {
                    matches!(
                        t.kind,
                        TokenKind::Keyword(
                            Keyword::Function | Keyword::Procedure | Keyword::Trigger | Keyword::Package
                        )
                    ) || t.is_word("type")
                })
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn texts<'a>(script: &Script<'a>) -> Vec<&'a str> {
        script.iter().map(|c| c.text).collect()
    }

    fn standard() -> ScriptParser {
        ScriptParser::default()
    }

    #[test]
    fn empty_statements_are_dropped() {
        let script = standard().split("SELECT 1; SELECT 2;;  ");
        assert_eq!(texts(&script), ["SELECT 1", "SELECT 2"]);
        assert_eq!(script.get(1).map(|c| c.index), Some(1));
    }

    #[rstest]
    #[case("", vec![])]
    #[case("   \n ", vec![])]
    #[case(";;;", vec![])]
    #[case("-- only a comment", vec![])]
    #[case("select 1", vec!["select 1"])]
    #[case("select 1;\n-- trailing comment\n", vec!["select 1"])]
    #[case("select ';' from t; select 2", vec!["select ';' from t", "select 2"])]
    #[case("select \"a;b\" from t;", vec!["select \"a;b\" from t"])]
    #[case("select 1 /* ; */; select 2", vec!["select 1 /* ; */", "select 2"])]
    #[case("-- c;\nselect 1;", vec!["-- c;\nselect 1"])]
    #[case("insert into t values ((1;2)); select 3", vec!["insert into t values ((1;2))", "select 3"])]
    #[case("select 1) ; select 2", vec!["select 1)", "select 2"])]
    #[case("create function f() returns int as $$ begin; return 1; end $$ language plpgsql; select f()",
        vec!["create function f() returns int as $$ begin; return 1; end $$ language plpgsql", "select f()"])]
    fn splits_with_standard_delimiter(#[case] sql: &str, #[case] expected: Vec<&str>) {
        assert_eq!(texts(&standard().split(sql)), expected);
    }

    #[test]
    fn offsets_point_into_the_source() {
        let sql = "  select 1 ;\n\n  update t set a = 1  ;";
        let script = standard().split(sql);
        for command in script.iter() {
            assert_eq!(&sql[command.start..command.end], command.text);
        }
        let starts = script.iter().map(|c| (c.start, c.end)).collect::<Vec<_>>();
        assert_eq!(starts, [(2, 10), (16, 34)]);
    }

    #[rstest]
    #[case("select 1; select 2; select 3")]
    #[case("select 'a;b';\n insert into x values (1, (2));   delete from y")]
    #[case("  -- lead\nselect 1 ;select 2  ")]
    fn offsets_round_trip(#[case] sql: &str) {
        let script = standard().split(sql);
        let joined = script
            .iter()
            .map(|c| &sql[c.start..c.end])
            .collect::<Vec<_>>()
            .join(";");
        let squash = |s: &str| {
            s.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
        };
        assert_eq!(squash(&joined), squash(sql));
    }

    #[test]
    fn offsets_are_monotonic() {
        let script = standard().split("a; b ;c;; d");
        let pairs = script
            .iter()
            .map(|c| (c.start, c.end))
            .collect::<Vec<_>>();
        assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].0));
    }

    #[test]
    fn custom_delimiter_replaces_semicolon() {
        let parser = ScriptParser::new(DelimiterDefinition::new("GO"));
        let script = parser.split("select 1; select 2\nGO\nselect 3\ngo");
        assert_eq!(texts(&script), ["select 1; select 2", "select 3"]);
    }

    #[test]
    fn word_delimiter_inside_statement_is_an_identifier() {
        let parser = ScriptParser::new(DelimiterDefinition::new("GO"));
        let script = parser.split("select go from t\nGO\nselect 2");
        assert_eq!(texts(&script), ["select go from t", "select 2"]);
    }

    #[test]
    fn alternate_delimiter_only_ends_blocks() {
        let parser = ScriptParser::default().with_alternate(DelimiterDefinition::parse("/:nl"));
        let sql = "select 1;\ndeclare x int; begin null; end;\n/\nselect 2;\nbegin;\ncommit;";
        let script = parser.split(sql);
        assert_eq!(
            texts(&script),
            [
                "select 1",
                "declare x int; begin null; end;",
                "select 2",
                "begin",
                "commit"
            ]
        );
    }

    #[rstest]
    #[case("create or replace procedure p as begin null; end;\n/", vec!["create or replace procedure p as begin null; end;"])]
    #[case("create function f() as begin return 1; end;\n/", vec!["create function f() as begin return 1; end;"])]
    #[case("create table t (a int);\n/", vec!["create table t (a int)"])]
    #[case("begin transaction;", vec!["begin transaction"])]
    #[case("begin\n null;\nend;\n/", vec!["begin\n null;\nend;"])]
    #[case("do begin null; end;\n/", vec!["do begin null; end;"])]
    fn block_detection(#[case] sql: &str, #[case] expected: Vec<&str>) {
        let parser = ScriptParser::default().with_alternate(DelimiterDefinition::parse("/:nl"));
        assert_eq!(texts(&parser.split(sql)), expected);
    }

    #[test]
    fn command_at_cursor() {
        let sql = "select 1;\nselect 2;\nselect 3";
        let parser = standard();
        assert_eq!(parser.command_at(sql, 0).map(|c| c.text), Some("select 1"));
        assert_eq!(parser.command_at(sql, 12).map(|c| c.text), Some("select 2"));
        assert_eq!(parser.command_at(sql, 19).map(|c| c.text), Some("select 2"));
        assert_eq!(parser.command_at(sql, sql.len()).map(|c| c.text), Some("select 3"));
        assert_eq!(parser.command_at("", 0), None);
    }

    #[test]
    fn hash_comments_hide_delimiters() {
        let parser = standard().with_lexer_options(LexerOptions {
            hash_comments: true,
            ..Default::default()
        });
        let script = parser.split("select 1 # not; a delimiter\n; select 2");
        assert_eq!(texts(&script), ["select 1 # not; a delimiter", "select 2"]);
    }
}
