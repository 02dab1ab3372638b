//! Named script variables.
//!
//! A reference is written `$[name]`. `$[?name]` asks the user for a value every
//! time the statement runs, `$[&name]` only when the variable is not defined.
//! Substitution is textual, so references inside string literals are replaced
//! too (`where name = '$[who]'`).
use std::collections::HashMap;

pub const VARIABLE_PREFIX: &str = "$[";
pub const VARIABLE_SUFFIX: &str = "]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// `$[name]`: substituted when defined, otherwise left untouched.
    Never,
    /// `$[?name]`
    Always,
    /// `$[&name]`
    IfUndefined,
}

/// One `$[...]` reference inside a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableRef<'a> {
    pub name: &'a str,
    pub mode: PromptMode,
    pub start: usize,
    pub end: usize,
}

/// All `$[...]` references in `sql`, in source order.
pub fn variable_refs(sql: &str) -> Vec<VariableRef<'_>> {
    let mut refs = Vec::new();
    let mut from = 0;
    while let Some(found) = sql[from..].find(VARIABLE_PREFIX) {
        let start = from + found;
        let body_start = start + VARIABLE_PREFIX.len();
        let Some(close) = sql[body_start..].find(VARIABLE_SUFFIX) else {
            break;
        };
        let body = &sql[body_start..body_start + close];
        let end = body_start + close + VARIABLE_SUFFIX.len();
        let (mode, name) = match body.as_bytes().first() {
            Some(b'?') => (PromptMode::Always, &body[1..]),
            Some(b'&') => (PromptMode::IfUndefined, &body[1..]),
            _ => (PromptMode::Never, body),
        };
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        if valid {
            refs.push(VariableRef {
                name,
                mode,
                start,
                end,
            });
            from = end;
        } else {
            from = body_start;
        }
    }
    refs
}

/// Variable values for one script run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariablePool {
    values: HashMap<String, String>,
}

impl VariablePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `name=value` definition as given on the command line.
    pub fn parse_definition(definition: &str) -> Option<(String, String)> {
        let (name, value) = definition.split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = (String, String)>) {
        self.values.extend(values);
    }

    /// Names that need interactive input before `sql` can run, without duplicates.
    pub fn prompt_names(&self, sql: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for r in variable_refs(sql) {
            let needs_prompt = match r.mode {
                PromptMode::Always => true,
                PromptMode::IfUndefined => !self.is_defined(r.name),
                PromptMode::Never => false,
            };
            if needs_prompt && !names.iter().any(|n| n == r.name) {
                names.push(r.name.to_string());
            }
        }
        names
    }

    /// Replace every reference to a defined variable with its value.
    pub fn substitute(&self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut last = 0;
        for r in variable_refs(sql) {
            if let Some(value) = self.get(r.name) {
                out.push_str(&sql[last..r.start]);
                out.push_str(value);
                last = r.end;
            }
        }
        out.push_str(&sql[last..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(values: &[(&str, &str)]) -> VariablePool {
        let mut pool = VariablePool::new();
        for (k, v) in values {
            pool.set(*k, *v);
        }
        pool
    }

    #[test]
    fn finds_references_with_modes() {
        let refs = variable_refs("select $[a], $[?b], $[&c], $[ bad ], $[");
        let found = refs.iter().map(|r| (r.name, r.mode)).collect::<Vec<_>>();
        assert_eq!(
            found,
            [
                ("a", PromptMode::Never),
                ("b", PromptMode::Always),
                ("c", PromptMode::IfUndefined)
            ]
        );
        assert_eq!((refs[0].start, refs[0].end), (7, 11));
    }

    #[test]
    fn substitutes_defined_values_only() {
        let pool = pool(&[("who", "O'Neil"), ("id", "42")]);
        assert_eq!(
            pool.substitute("select * from t where name = '$[who]' and id = $[?id] and x = $[nope]"),
            "select * from t where name = 'O'Neil' and id = 42 and x = $[nope]"
        );
    }

    #[test]
    fn prompt_names_follow_modes() {
        let pool = pool(&[("known", "1")]);
        let sql = "select $[?known], $[&known], $[&unknown], $[plain], $[?again], $[?again]";
        assert_eq!(pool.prompt_names(sql), ["known", "unknown", "again"]);
    }

    #[test]
    fn parse_definitions() {
        assert_eq!(
            VariablePool::parse_definition("name = x=y"),
            Some(("name".to_string(), " x=y".to_string()))
        );
        assert_eq!(VariablePool::parse_definition("=x"), None);
        assert_eq!(VariablePool::parse_definition("novalue"), None);
    }
}
