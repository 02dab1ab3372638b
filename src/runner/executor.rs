use crate::*;
use std::future::Future;
use std::time::Duration;

/// What happens when a statement fails and more statements follow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, clap::ValueEnum, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Ask the prompt provider for every failure.
    #[default]
    #[display("ask")]
    Ask,
    /// Continue after every failure without asking.
    #[serde(rename = "ignore")]
    #[value(name = "ignore")]
    #[display("ignore")]
    IgnoreAll,
    /// Stop at the first failure.
    #[display("abort")]
    Abort,
}

/// Knobs for one script run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOptions {
    pub max_rows: Option<usize>,
    pub query_timeout: Option<Duration>,
    pub autocommit: bool,
    /// Commit after every successful DDL statement when autocommit is off.
    pub commit_ddl: bool,
    /// Wrap every statement in a savepoint when autocommit is off, so a failed
    /// statement does not poison the surrounding transaction.
    pub use_savepoint: bool,
    /// Prompt for values of `?` placeholders and run the statement prepared.
    pub check_parameters: bool,
    pub max_result_bytes: Option<usize>,
    /// How long a cancelled statement may take to stop before it is abandoned.
    pub cancel_grace: Duration,
    pub error_policy: ErrorPolicy,
    /// Skip a statement whose variable prompt was cancelled and go on, instead
    /// of stopping the script.
    pub continue_on_prompt_cancel: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            max_rows: None,
            query_timeout: None,
            autocommit: true,
            commit_ddl: false,
            use_savepoint: false,
            check_parameters: false,
            max_result_bytes: Some(256 * 1024 * 1024),
            cancel_grace: Duration::from_secs(5),
            error_policy: ErrorPolicy::Ask,
            continue_on_prompt_cancel: true,
        }
    }
}

impl ExecOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_rows: config.max_rows,
            query_timeout: config.query_timeout_secs.map(Duration::from_secs),
            autocommit: config.autocommit,
            commit_ddl: config.commit_ddl,
            use_savepoint: config.use_savepoint,
            check_parameters: config.check_parameters,
            max_result_bytes: (config.max_result_bytes > 0).then_some(config.max_result_bytes),
            cancel_grace: Duration::from_millis(config.cancel_grace_ms),
            error_policy: config.on_error,
            continue_on_prompt_cancel: config.continue_on_prompt_cancel,
        }
    }

    pub fn limits(&self) -> FetchLimits {
        FetchLimits {
            max_rows: self.max_rows,
            max_bytes: self.max_result_bytes,
        }
    }

    pub(crate) fn savepoints_active(&self) -> bool {
        !self.autocommit && self.use_savepoint
    }
}

/// Bounds on how much of a result is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchLimits {
    /// Rows past this are dropped and the result set is marked truncated.
    pub max_rows: Option<usize>,
    /// Going past this fails the statement with `Error::ResourceExhausted`.
    pub max_bytes: Option<usize>,
}

/// Interrupts whatever statement its executor is running.
pub trait StatementCanceller: Clone + Send + Sync + 'static {
    fn cancel(&self) -> impl Future<Output = Result> + Send;
}

/// A connection that runs one statement at a time.
///
/// Server side failures are returned as `Error::Statement`, anything else
/// (lost connection, protocol errors) is treated as fatal by the driver.
pub trait StatementExecutor: Send {
    type Canceller: StatementCanceller;

    fn execute(
        &mut self,
        sql: &str,
        limits: FetchLimits,
    ) -> impl Future<Output = Result<StatementOutput>> + Send;

    /// Run `sql` with `$n` placeholders bound to `params`.
    fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[Value],
        limits: FetchLimits,
    ) -> impl Future<Output = Result<StatementOutput>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result> + Send;

    fn savepoint(&mut self, name: &str) -> impl Future<Output = Result> + Send;

    fn release_savepoint(&mut self, name: &str) -> impl Future<Output = Result> + Send;

    fn rollback_to_savepoint(&mut self, name: &str) -> impl Future<Output = Result> + Send;

    fn canceller(&self) -> Self::Canceller;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ExecOptions::default();
        assert!(options.autocommit);
        assert!(!options.savepoints_active());
        assert_eq!(options.error_policy, ErrorPolicy::Ask);
        assert_eq!(options.limits().max_rows, None);
    }

    #[test]
    fn savepoints_need_manual_commit() {
        let options = ExecOptions {
            autocommit: false,
            use_savepoint: true,
            ..Default::default()
        };
        assert!(options.savepoints_active());
    }

    #[test]
    fn policy_names() {
        use clap::ValueEnum as _;
        assert_eq!(ErrorPolicy::from_str("ignore", true), Ok(ErrorPolicy::IgnoreAll));
        assert_eq!(ErrorPolicy::IgnoreAll.to_string(), "ignore");
    }
}
