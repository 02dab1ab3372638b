/// A scalar value as shown to the user, bound to a parameter or echoed into SQL.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum Value {
    #[display("NULL")]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Best guess at the type of user typed input.
    ///
    /// `null` (any case) is NULL, `true`/`false` are booleans, anything that
    /// parses as a finite number is numeric, everything else stays text.
    pub fn infer(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && trimmed.contains(|c: char| c.is_ascii_digit()) => {
                Value::Float(f)
            }
            _ => Value::Text(input.to_string()),
        }
    }

    /// Literal form for display and logging: text is single quoted with
    /// embedded quotes doubled, NULL is `NULL`, the rest use their display form.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_string(),
        }
    }

    /// Rough in-memory footprint, used to cap materialized result sets.
    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + match self {
                Value::Text(s) => s.len(),
                _ => 0,
            }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("NULL", Value::Null)]
    #[case("true", Value::Bool(true))]
    #[case("False", Value::Bool(false))]
    #[case("42", Value::Int(42))]
    #[case("-7", Value::Int(-7))]
    #[case("2.5", Value::Float(2.5))]
    #[case("inf", Value::Text("inf".into()))]
    #[case("O'Brien", Value::Text("O'Brien".into()))]
    fn infer(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(Value::infer(input), expected);
    }

    #[rstest]
    #[case(Value::Text("O'Brien".into()), "'O''Brien'")]
    #[case(Value::Null, "NULL")]
    #[case(Value::Int(3), "3")]
    #[case(Value::Bool(true), "true")]
    #[case(Value::Float(1.5), "1.5")]
    fn sql_literal(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_sql_literal(), expected);
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
