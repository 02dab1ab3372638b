use crate::*;
use std::future::Future;

/// The answer to an error prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDecision {
    Continue,
    /// Run the failed statement again, optionally with edited text.
    Retry(Option<String>),
    /// Continue now and after every later failure of this run.
    IgnoreAll,
    Cancel,
}

/// The answer to a value prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptAnswer<T> {
    Values(T),
    Cancelled,
}

/// Context handed to the error prompt.
#[derive(Debug, Clone, Copy)]
pub struct FailedStatement<'a> {
    pub index: usize,
    pub total: usize,
    pub sql: &'a str,
    pub error: &'a ErrorDescriptor,
}

/// Interactive input needed while a script runs.
///
/// The driver awaits these calls on its own task, so an implementation may
/// block on a user for as long as it likes without stalling anything else.
pub trait PromptProvider: Send + Sync {
    /// Values for the `$[...]` variables named in `names`.
    fn variable_values(
        &self,
        names: &[String],
    ) -> impl Future<Output = PromptAnswer<Vec<(String, String)>>> + Send;

    /// Values for the `count` `?` placeholders of `sql`.
    fn parameter_values(
        &self,
        sql: &str,
        count: usize,
    ) -> impl Future<Output = PromptAnswer<Vec<Value>>> + Send;

    fn on_error(&self, failed: FailedStatement<'_>) -> impl Future<Output = ErrorDecision> + Send;
}

/// Answers every prompt without asking: prompts are cancelled and errors
/// cancel the script.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompts;

impl PromptProvider for NoPrompts {
    async fn variable_values(&self, _names: &[String]) -> PromptAnswer<Vec<(String, String)>> {
        PromptAnswer::Cancelled
    }

    async fn parameter_values(&self, _sql: &str, _count: usize) -> PromptAnswer<Vec<Value>> {
        PromptAnswer::Cancelled
    }

    async fn on_error(&self, _failed: FailedStatement<'_>) -> ErrorDecision {
        ErrorDecision::Cancel
    }
}
