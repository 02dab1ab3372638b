//! In-memory collaborators for driver and session tests.
//!
//! `ScriptedExecutor` decides the outcome of a statement from its text:
//! - contains `fail`: server error located at the word `fail`
//! - starts with `hang`: waits until cancelled (forever when unresponsive)
//! - starts with `huge`: result too large
//! - starts with `lost`: connection level failure
//! - starts with `select`: one row holding the statement text
//! - anything else: one row affected
use crate::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Vec<String>>,
    cancel: Notify,
    cancel_requests: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct ScriptedExecutor {
    shared: Arc<Shared>,
    responsive: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            shared: Arc::default(),
            responsive: true,
        }
    }

    /// Cancel requests are counted but never stop a hanging statement.
    pub fn unresponsive(mut self) -> Self {
        self.responsive = false;
        self
    }

    /// Every call in order: statement texts as they are, everything else in `<...>`.
    pub fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().expect("calls lock").clone()
    }

    /// Only the statement texts.
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with('<'))
            .collect()
    }

    pub fn cancel_requests(&self) -> usize {
        self.shared.cancel_requests.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.shared.calls.lock().expect("calls lock").push(call.into());
    }

    async fn outcome(&self, sql: &str) -> Result<StatementOutput> {
        let lower = sql.to_ascii_lowercase();
        if let Some(at) = lower.find("fail") {
            return Err(Error::Statement(
                ErrorDescriptor::new("boom").with_code("42000").at(sql, at),
            ));
        }
        if lower.starts_with("hang") {
            if self.responsive {
                self.shared.cancel.notified().await;
            } else {
                std::future::pending::<()>().await;
            }
            return Err(Error::Statement(
                ErrorDescriptor::new("canceling statement due to user request").with_code("57014"),
            ));
        }
        if lower.starts_with("huge") {
            return Err(Error::ResourceExhausted("result exceeds 10 bytes".into()));
        }
        if lower.starts_with("lost") {
            return Err(Error::Internal("connection reset by peer".into()));
        }
        if lower.starts_with("select") {
            let mut result_set = ResultSet::new(vec!["sql".into()]);
            result_set.rows.push(vec![Value::from(sql)]);
            return Ok(StatementOutput::rows(result_set));
        }
        Ok(StatementOutput::updated(1))
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementExecutor for ScriptedExecutor {
    type Canceller = ScriptedCanceller;

    async fn execute(&mut self, sql: &str, _limits: FetchLimits) -> Result<StatementOutput> {
        self.record(sql);
        self.outcome(sql).await
    }

    async fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[Value],
        _limits: FetchLimits,
    ) -> Result<StatementOutput> {
        let params = params.iter().map(Value::to_sql_literal).collect::<Vec<_>>();
        self.record(format!("<prepared {sql} [{}]>", params.join(", ")));
        self.outcome(sql).await
    }

    async fn commit(&mut self) -> Result {
        self.record("<commit>");
        Ok(())
    }

    async fn rollback(&mut self) -> Result {
        self.record("<rollback>");
        Ok(())
    }

    async fn savepoint(&mut self, name: &str) -> Result {
        self.record(format!("<savepoint {name}>"));
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &str) -> Result {
        self.record(format!("<release {name}>"));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result {
        self.record(format!("<rollback to {name}>"));
        Ok(())
    }

    fn canceller(&self) -> ScriptedCanceller {
        ScriptedCanceller {
            shared: Arc::clone(&self.shared),
            responsive: self.responsive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedCanceller {
    shared: Arc<Shared>,
    responsive: bool,
}

impl StatementCanceller for ScriptedCanceller {
    async fn cancel(&self) -> Result {
        self.shared.cancel_requests.fetch_add(1, Ordering::SeqCst);
        if self.responsive {
            self.shared.cancel.notify_one();
        }
        Ok(())
    }
}

/// Collects everything a run reports.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub started: Vec<usize>,
    pub results: Vec<StatementResult>,
    pub lines: Vec<String>,
    pub finished: Option<ScriptStats>,
}

impl ScriptListener for RecordingListener {
    fn on_statement_start(&mut self, index: usize, _total: usize, _sql: &str) {
        self.started.push(index);
    }

    fn on_result(&mut self, result: &StatementResult) {
        self.results.push(result.clone());
    }

    fn log(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn on_finished(&mut self, stats: &ScriptStats) {
        self.finished = Some(stats.clone());
    }
}

/// Answers prompts from queues filled up front. Empty queues cancel.
#[derive(Debug, Default)]
pub struct ScriptedPrompts {
    decisions: Mutex<VecDeque<ErrorDecision>>,
    variables: Mutex<VecDeque<PromptAnswer<Vec<(String, String)>>>>,
    parameters: Mutex<VecDeque<PromptAnswer<Vec<Value>>>>,
    pub errors_seen: AtomicUsize,
    pub variables_seen: AtomicUsize,
}

impl ScriptedPrompts {
    pub fn with_decisions(self, decisions: impl IntoIterator<Item = ErrorDecision>) -> Self {
        self.decisions.lock().expect("decisions lock").extend(decisions);
        self
    }

    pub fn with_variables(self, answer: PromptAnswer<Vec<(String, String)>>) -> Self {
        self.variables.lock().expect("variables lock").push_back(answer);
        self
    }

    pub fn with_parameters(self, answer: PromptAnswer<Vec<Value>>) -> Self {
        self.parameters.lock().expect("parameters lock").push_back(answer);
        self
    }
}

impl PromptProvider for ScriptedPrompts {
    async fn variable_values(&self, _names: &[String]) -> PromptAnswer<Vec<(String, String)>> {
        self.variables_seen.fetch_add(1, Ordering::SeqCst);
        self.variables
            .lock()
            .expect("variables lock")
            .pop_front()
            .unwrap_or(PromptAnswer::Cancelled)
    }

    async fn parameter_values(&self, _sql: &str, _count: usize) -> PromptAnswer<Vec<Value>> {
        self.parameters
            .lock()
            .expect("parameters lock")
            .pop_front()
            .unwrap_or(PromptAnswer::Cancelled)
    }

    async fn on_error(&self, _failed: FailedStatement<'_>) -> ErrorDecision {
        self.errors_seen.fetch_add(1, Ordering::SeqCst);
        self.decisions
            .lock()
            .expect("decisions lock")
            .pop_front()
            .unwrap_or(ErrorDecision::Cancel)
    }
}
