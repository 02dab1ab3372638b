use crate::sql::tokenize;

/// A possibly qualified table name split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl TableIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse `name`, `schema.name` or `catalog.schema.name`. Quoted parts are
    /// unquoted; anything unparseable ends up verbatim in `name`.
    pub fn parse(qualified: &str) -> Self {
        let parts = tokenize(qualified)
            .into_iter()
            .filter(|t| t.kind.is_identifier())
            .map(|t| t.unquoted().to_string())
            .collect::<Vec<_>>();
        match parts.as_slice() {
            [] => Self::new(qualified.trim()),
            [name] => Self::new(name.clone()),
            [schema, name] => Self {
                schema: Some(schema.clone()),
                ..Self::new(name.clone())
            },
            [.., catalog, schema, name] => Self {
                catalog: Some(catalog.clone()),
                schema: Some(schema.clone()),
                name: name.clone(),
            },
        }
    }
}

impl std::fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in [&self.catalog, &self.schema].into_iter().flatten() {
            write!(f, "{part}.")?;
        }
        f.write_str(&self.name)
    }
}

/// A table reference found in a FROM / JOIN list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAlias {
    /// The name as written in the statement, quotes included.
    pub object_name: String,
    pub alias: Option<String>,
    pub table: TableIdentifier,
}

impl TableAlias {
    pub fn new(object_name: impl Into<String>, alias: Option<String>) -> Self {
        let object_name = object_name.into();
        let table = TableIdentifier::parse(&object_name);
        Self {
            object_name,
            alias,
            table,
        }
    }

    /// The name other parts of the statement use to refer to this table.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("orders", None, None, "orders")]
    #[case("public.orders", None, Some("public"), "orders")]
    #[case("db.public.orders", Some("db"), Some("public"), "orders")]
    #[case("\"My Schema\".\"Order Lines\"", None, Some("My Schema"), "Order Lines")]
    #[case("[dbo].[t]", None, Some("dbo"), "t")]
    fn parse_identifier(
        #[case] input: &str,
        #[case] catalog: Option<&str>,
        #[case] schema: Option<&str>,
        #[case] name: &str,
    ) {
        let id = TableIdentifier::parse(input);
        assert_eq!(id.catalog.as_deref(), catalog);
        assert_eq!(id.schema.as_deref(), schema);
        assert_eq!(id.name, name);
    }

    #[test]
    fn display_joins_parts() {
        assert_eq!(TableIdentifier::parse("a.b.c").to_string(), "a.b.c");
        assert_eq!(TableIdentifier::parse("c").to_string(), "c");
    }

    #[test]
    fn reference_name_prefers_alias() {
        let aliased = TableAlias::new("public.orders", Some("o".into()));
        assert_eq!(aliased.reference_name(), "o");
        let plain = TableAlias::new("public.orders", None);
        assert_eq!(plain.reference_name(), "orders");
    }
}
