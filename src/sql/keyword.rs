//! SQL keyword model used by the lexer and the clause locator.
//!
//! Only the words the splitter, the verb classifier and the clause locator
//! actually reason about are modelled here. Every other word is lexed as an
//! identifier; lookups that accept arbitrary keyword sets compare token text
//! case-insensitively, so a word does not need to be listed here to be found.
//!
//! Keywords are matched case-insensitively via `from_lower` using a
//! pre-lower-cased string slice.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Select,
    From,
    Join,
    On,
    Using,
    As,
    Where,
    Group,
    Order,
    By,
    Having,
    Limit,
    Offset,
    Fetch,
    Union,
    Except,
    Intersect,
    Minus,
    Window,
    Distinct,
    All,
    With,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Truncate,
    Table,
    Create,
    Or,
    Replace,
    Alter,
    Drop,
    Function,
    Procedure,
    Trigger,
    Package,
    Declare,
    Begin,
    Do,
    Commit,
    Rollback,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    Natural,
    Lateral,
}

impl Keyword {
    /// Words that may precede `JOIN` in a join clause.
    pub const JOIN_MODIFIERS: [Self; 7] = [
        Keyword::Inner,
        Keyword::Left,
        Keyword::Right,
        Keyword::Full,
        Keyword::Outer,
        Keyword::Cross,
        Keyword::Natural,
    ];

    /// Keywords that shape a statement or a FROM list and therefore never
    /// name a table on their own. The object words (`package`, `trigger`,
    /// `function`, ...) are valid unquoted table names in PostgreSQL.
    pub fn is_structural(self) -> bool {
        use Keyword::*;
        Self::JOIN_MODIFIERS.contains(&self)
            || matches!(
                self,
                Select
                    | From
                    | Join
                    | On
                    | Using
                    | As
                    | Where
                    | Group
                    | Order
                    | Having
                    | Limit
                    | Offset
                    | Fetch
                    | Union
                    | Except
                    | Intersect
                    | Minus
                    | With
                    | Into
                    | Values
                    | Set
                    | Table
                    | Lateral
            )
    }

    /// Attempt to classify a *lower-cased* word slice into a `Keyword`.
    /// Returns `None` if the word is not a recognized keyword.
    ///
    /// NOTE: The caller is responsible for lower-casing the input.
    pub fn from_lower(word: &str) -> Option<Self> {
        use Keyword::*;
        let kw = match word {
            "select" => Select,
            "from" => From,
            "join" => Join,
            "on" => On,
            "using" => Using,
            "as" => As,
            "where" => Where,
            "group" => Group,
            "order" => Order,
            "by" => By,
            "having" => Having,
            "limit" => Limit,
            "offset" => Offset,
            "fetch" => Fetch,
            "union" => Union,
            "except" => Except,
            "intersect" => Intersect,
            "minus" => Minus,
            "window" => Window,
            "distinct" => Distinct,
            "all" => All,
            "with" => With,
            "insert" => Insert,
            "into" => Into,
            "values" => Values,
            "update" => Update,
            "set" => Set,
            "delete" => Delete,
            "truncate" => Truncate,
            "table" => Table,
            "create" => Create,
            "or" => Or,
            "replace" => Replace,
            "alter" => Alter,
            "drop" => Drop,
            "function" => Function,
            "procedure" => Procedure,
            "trigger" => Trigger,
            "package" => Package,
            "declare" => Declare,
            "begin" => Begin,
            "do" => Do,
            "commit" => Commit,
            "rollback" => Rollback,
            "inner" => Inner,
            "left" => Left,
            "right" => Right,
            "full" => Full,
            "outer" => Outer,
            "cross" => Cross,
            "natural" => Natural,
            "lateral" => Lateral,
            _ => return None,
        };
        Some(kw)
    }

    /// Canonical lowercase string form of the keyword.
    pub const fn as_str(self) -> &'static str {
        use Keyword::*;
        match self {
            Select => "select",
            From => "from",
            Join => "join",
            On => "on",
            Using => "using",
            As => "as",
            Where => "where",
            Group => "group",
            Order => "order",
            By => "by",
            Having => "having",
            Limit => "limit",
            Offset => "offset",
            Fetch => "fetch",
            Union => "union",
            Except => "except",
            Intersect => "intersect",
            Minus => "minus",
            Window => "window",
            Distinct => "distinct",
            All => "all",
            With => "with",
            Insert => "insert",
            Into => "into",
            Values => "values",
            Update => "update",
            Set => "set",
            Delete => "delete",
            Truncate => "truncate",
            Table => "table",
            Create => "create",
            Or => "or",
            Replace => "replace",
            Alter => "alter",
            Drop => "drop",
            Function => "function",
            Procedure => "procedure",
            Trigger => "trigger",
            Package => "package",
            Declare => "declare",
            Begin => "begin",
            Do => "do",
            Commit => "commit",
            Rollback => "rollback",
            Inner => "inner",
            Left => "left",
            Right => "right",
            Full => "full",
            Outer => "outer",
            Cross => "cross",
            Natural => "natural",
            Lateral => "lateral",
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
