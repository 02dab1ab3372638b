use crate::*;
use std::time::Duration;

/// What went wrong with a failed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorKind {
    /// Rejected by the server.
    Statement,
    Timeout,
    /// The materialized result grew past the configured limit.
    ResourceExhausted,
    Cancelled,
    /// Anything unexpected, e.g. a lost connection. Stops the script.
    Fatal,
}

/// Structured description of a failed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    /// SQLSTATE when the server reported one.
    pub code: Option<String>,
    /// Byte offset of the error inside the statement text.
    pub offset: Option<usize>,
    pub position: Option<LineColumn>,
}

impl ErrorDescriptor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Statement,
            message: message.into(),
            code: None,
            offset: None,
            position: None,
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the location of `offset` inside `sql`.
    pub fn at(mut self, sql: &str, offset: usize) -> Self {
        let offset = offset.min(sql.len());
        self.offset = Some(offset);
        self.position = Some(line_column(sql, offset));
        self
    }

    pub fn from_error(err: Error) -> Self {
        match err {
            Error::Statement(descriptor) => descriptor,
            Error::Timeout(after) => Self::new(format!("Statement timed out after {after:?}"))
                .with_kind(ErrorKind::Timeout),
            Error::ResourceExhausted(message) => {
                Self::new(message).with_kind(ErrorKind::ResourceExhausted)
            }
            Error::Cancelled => Self::new("Statement cancelled").with_kind(ErrorKind::Cancelled),
            other => Self::new(other.to_string()).with_kind(ErrorKind::Fatal),
        }
    }
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{code}] ")?;
        }
        f.write_str(&self.message)?;
        if let Some(position) = self.position {
            write!(f, " ({position})")?;
        }
        Ok(())
    }
}

/// One tabular result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows were dropped because of the max rows setting.
    pub truncated: bool,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }
}

/// What an executor hands back for one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementOutput {
    pub update_count: Option<u64>,
    pub result_sets: Vec<ResultSet>,
    /// Server notices and warnings.
    pub messages: Vec<String>,
}

impl StatementOutput {
    pub fn updated(count: u64) -> Self {
        Self {
            update_count: Some(count),
            ..Default::default()
        }
    }

    pub fn rows(result: ResultSet) -> Self {
        Self {
            result_sets: vec![result],
            ..Default::default()
        }
    }
}

/// The outcome of one statement of a script run.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementResult {
    pub index: usize,
    pub sql: String,
    pub kind: StatementKind,
    pub success: bool,
    pub messages: Vec<String>,
    pub update_count: Option<u64>,
    pub result_sets: Vec<ResultSet>,
    pub duration: Duration,
    pub error: Option<ErrorDescriptor>,
    /// No further statement of the script runs after this one.
    pub stop_script: bool,
    /// The update count is left out of the script total.
    pub ignore_update_count: bool,
    /// The statement never ran, e.g. a variable prompt was cancelled.
    pub skipped: bool,
}

impl StatementResult {
    pub fn new(index: usize, sql: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            index,
            sql: sql.into(),
            kind,
            success: false,
            messages: Vec::new(),
            update_count: None,
            result_sets: Vec::new(),
            duration: Duration::ZERO,
            error: None,
            stop_script: false,
            ignore_update_count: kind.ignores_update_count(),
            skipped: false,
        }
    }

    pub fn succeeded(mut self, output: StatementOutput, duration: Duration) -> Self {
        self.success = true;
        self.update_count = output.update_count;
        self.result_sets = output.result_sets;
        self.messages.extend(output.messages);
        self.duration = duration;
        self
    }

    pub fn failed(mut self, error: ErrorDescriptor, duration: Duration) -> Self {
        self.success = false;
        self.messages.push(error.to_string());
        self.error = Some(error);
        self.duration = duration;
        self
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skipped = true;
        self.messages.push(reason.into());
        self
    }

    pub fn row_count(&self) -> usize {
        self.result_sets.iter().map(|rs| rs.rows.len()).sum()
    }

    /// The one line progress message for this statement.
    pub fn summary(&self) -> String {
        let n = self.index + 1;
        if self.skipped {
            return format!("Statement {n} skipped");
        }
        if let Some(error) = &self.error {
            return format!("Statement {n} failed: {error}");
        }
        let detail = match (self.result_sets.is_empty(), self.update_count) {
            (false, _) => {
                let truncated = self.result_sets.iter().any(|rs| rs.truncated);
                format!(
                    "{} row(s) retrieved{}",
                    self.row_count(),
                    if truncated { " (truncated)" } else { "" }
                )
            }
            (true, Some(count)) if !self.ignore_update_count => {
                format!("{count} row(s) affected")
            }
            _ => format!("{} executed", self.kind),
        };
        format!("Statement {n}: {detail} in {:.2?}", self.duration)
    }
}

/// Lifecycle of one script run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    FatalError,
}

/// Totals over a script run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptStats {
    pub state: RunState,
    pub elapsed: Duration,
    /// Statements sent to the server, failed ones and retries included.
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_update_count: u64,
}

impl ScriptStats {
    pub fn record(&mut self, result: &StatementResult) {
        if result.skipped {
            self.skipped += 1;
            return;
        }
        self.executed += 1;
        if !result.success {
            self.failed += 1;
        } else if !result.ignore_update_count {
            self.total_update_count += result.update_count.unwrap_or(0);
        }
    }
}

impl std::fmt::Display for ScriptStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} statement(s) executed, {} failed, {} skipped, {} row(s) affected in {:.2?}",
            self.state,
            self.executed,
            self.failed,
            self.skipped,
            self.total_update_count,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(kind: StatementKind) -> StatementResult {
        StatementResult::new(0, "x", kind)
    }

    #[test]
    fn descriptor_locates_offset() {
        let sql = "select *\nfrom nope";
        let descriptor = ErrorDescriptor::new("relation \"nope\" does not exist")
            .with_code("42P01")
            .at(sql, 14);
        assert_eq!(descriptor.position, Some(LineColumn { line: 2, column: 6 }));
        assert_eq!(
            descriptor.to_string(),
            "[42P01] relation \"nope\" does not exist (line 2, column 6)"
        );
    }

    #[test]
    fn descriptor_from_errors() {
        let timeout = ErrorDescriptor::from_error(Error::Timeout(Duration::from_secs(2)));
        assert_eq!(timeout.kind, ErrorKind::Timeout);

        let fatal = ErrorDescriptor::from_error(Error::Internal("gone".into()));
        assert_eq!(fatal.kind, ErrorKind::Fatal);

        let cancelled = ErrorDescriptor::from_error(Error::Cancelled);
        assert_eq!(cancelled.kind, ErrorKind::Cancelled);
    }

    #[test]
    fn stats_ignore_ddl_update_counts() {
        let mut stats = ScriptStats::default();
        stats.record(&result(StatementKind::Dml).succeeded(StatementOutput::updated(3), Duration::ZERO));
        stats.record(&result(StatementKind::Ddl).succeeded(StatementOutput::updated(7), Duration::ZERO));
        stats.record(&result(StatementKind::Dml).failed(ErrorDescriptor::new("no"), Duration::ZERO));
        stats.record(&result(StatementKind::Query).skipped("cancelled"));
        assert_eq!(
            (stats.executed, stats.failed, stats.skipped, stats.total_update_count),
            (3, 1, 1, 3)
        );
    }

    #[test]
    fn summaries() {
        let mut rows = ResultSet::new(vec!["a".into()]);
        rows.rows.push(vec![Value::Int(1)]);
        let query = result(StatementKind::Query).succeeded(StatementOutput::rows(rows), Duration::ZERO);
        assert!(query.summary().starts_with("Statement 1: 1 row(s) retrieved"));

        let ddl = result(StatementKind::Ddl).succeeded(StatementOutput::updated(0), Duration::ZERO);
        assert!(ddl.summary().starts_with("Statement 1: Ddl executed"));

        let failed = result(StatementKind::Dml).failed(ErrorDescriptor::new("boom"), Duration::ZERO);
        assert_eq!(failed.summary(), "Statement 1 failed: boom");
    }
}
