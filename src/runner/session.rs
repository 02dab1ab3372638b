use crate::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns an executor and runs at most one script on it at a time.
///
/// A second `start` while a run is in flight is rejected with `Error::Busy`
/// instead of being queued.
pub struct Session<E> {
    executor: Arc<Mutex<E>>,
}

impl<E> Clone for Session<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E: StatementExecutor + 'static> Session<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor: Arc::new(Mutex::new(executor)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.executor.try_lock().is_err()
    }

    /// Run `script` on a background task.
    pub fn start<P, L>(
        &self,
        script: impl Into<String>,
        prompts: P,
        listener: L,
        settings: RunSettings,
    ) -> Result<ExecutionHandle>
    where
        P: PromptProvider + 'static,
        L: ScriptListener + 'static,
    {
        let mut executor = Arc::clone(&self.executor)
            .try_lock_owned()
            .map_err(|_| Error::Busy)?;
        let script = script.into();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let mut runner = ScriptRunner::new(&mut *executor, prompts, listener, settings, task_token);
            runner.run(&script).await
        });
        Ok(ExecutionHandle { token, task })
    }

    /// Commit or roll back whatever the last run left open.
    pub async fn end_transaction(&self, commit: bool) -> Result {
        let mut executor = self.executor.try_lock().map_err(|_| Error::Busy)?;
        if commit {
            executor.commit().await
        } else {
            executor.rollback().await
        }
    }

    /// Give the executor back once no run and no other clone holds it.
    pub fn into_executor(self) -> Option<E> {
        Arc::try_unwrap(self.executor).ok().map(Mutex::into_inner)
    }
}

/// A script run in flight.
#[derive(Debug)]
pub struct ExecutionHandle {
    token: CancellationToken,
    task: JoinHandle<ScriptStats>,
}

impl ExecutionHandle {
    /// Request cancellation: no further statement starts and the running one
    /// is interrupted.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the run to end. The session is free again once this returns.
    pub async fn join(self) -> Result<ScriptStats> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("script task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn settings() -> RunSettings {
        RunSettings {
            options: ExecOptions {
                error_policy: ErrorPolicy::IgnoreAll,
                cancel_grace: Duration::from_millis(100),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_busy() -> Result {
        let executor = ScriptedExecutor::new();
        let session = Session::new(executor.clone());
        let handle = session.start("hang", NoPrompts, TracingListener, settings())?;

        assert!(session.is_busy());
        let second = session.start("select 1", NoPrompts, TracingListener, settings());
        assert!(matches!(second, Err(Error::Busy)));

        handle.cancel();
        let stats = handle.join().await?;
        assert_eq!(stats.state, RunState::Cancelled);
        assert!(!session.is_busy());
        Ok(())
    }

    #[tokio::test]
    async fn cancel_frees_session_within_grace() -> Result {
        let executor = ScriptedExecutor::new().unresponsive();
        let session = Session::new(executor.clone());
        let handle = session.start("hang; select 1", NoPrompts, TracingListener, settings())?;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cancelled_at = Instant::now();
        handle.cancel();
        let stats = handle.join().await?;
        assert!(cancelled_at.elapsed() < Duration::from_secs(2));
        assert_eq!(stats.state, RunState::Cancelled);
        assert_eq!(executor.cancel_requests(), 1);

        let stats = session
            .start("select 2", NoPrompts, TracingListener, settings())?
            .join()
            .await?;
        assert_eq!(stats.state, RunState::Completed);
        assert_eq!(executor.executed(), ["hang", "select 2"]);
        Ok(())
    }

    #[tokio::test]
    async fn end_transaction_uses_executor() -> Result {
        let executor = ScriptedExecutor::new();
        let session = Session::new(executor.clone());
        session.end_transaction(true).await?;
        session.end_transaction(false).await?;
        assert_eq!(executor.calls(), ["<commit>", "<rollback>"]);
        Ok(())
    }

    #[tokio::test]
    async fn executor_is_returned_after_the_run() -> Result {
        let session = Session::new(ScriptedExecutor::new());
        let other = session.clone();
        let stats = session
            .start("select 1", NoPrompts, TracingListener, settings())?
            .join()
            .await?;
        assert_eq!(stats.executed, 1);
        assert!(other.into_executor().is_none());

        let executor = session.into_executor().expect("no other owner left");
        assert_eq!(executor.executed(), ["select 1"]);
        Ok(())
    }
}
