//! Runs the commands of a script one after another.
//!
//! Per statement the driver resolves `$[...]` variables, handles `COMMIT`,
//! `ROLLBACK` and `@file` itself, executes everything else under the
//! cancellation token and the query timeout, and applies the error policy when
//! a statement fails. Statements always run in source order.
use crate::*;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const MAX_INCLUDE_DEPTH: usize = 8;
const STATEMENT_SAVEPOINT: &str = "sqlbench_statement";

/// Everything a run needs besides the executor and its collaborators.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub parser: ScriptParser,
    pub locator: ClauseLocator,
    pub options: ExecOptions,
    pub variables: VariablePool,
    /// Relative `@file` includes of the top level script resolve against this.
    pub base_dir: Option<PathBuf>,
}

struct Frame {
    commands: Vec<String>,
    next: usize,
    depth: usize,
    dir: Option<PathBuf>,
}

impl Frame {
    fn is_exhausted(&self) -> bool {
        self.next >= self.commands.len()
    }
}

enum Flow {
    Next,
    Retry(Option<String>),
    Finish(RunState),
}

pub struct ScriptRunner<'e, E: StatementExecutor, P, L> {
    executor: &'e mut E,
    canceller: E::Canceller,
    prompts: P,
    listener: L,
    settings: RunSettings,
    token: CancellationToken,
    ignore_all: bool,
    stats: ScriptStats,
    total: usize,
    next_index: usize,
}

impl<'e, E, P, L> ScriptRunner<'e, E, P, L>
where
    E: StatementExecutor,
    P: PromptProvider,
    L: ScriptListener,
{
    pub fn new(
        executor: &'e mut E,
        prompts: P,
        listener: L,
        settings: RunSettings,
        token: CancellationToken,
    ) -> Self {
        let canceller = executor.canceller();
        Self {
            executor,
            canceller,
            prompts,
            listener,
            settings,
            token,
            ignore_all: false,
            stats: ScriptStats::default(),
            total: 0,
            next_index: 0,
        }
    }

    pub async fn run(&mut self, script: &str) -> ScriptStats {
        let started = Instant::now();
        self.stats = ScriptStats {
            state: RunState::Running,
            ..Default::default()
        };
        self.ignore_all = self.settings.options.error_policy == ErrorPolicy::IgnoreAll;
        self.next_index = 0;

        let commands = self.split(script);
        self.total = commands.len();
        info!(statements = self.total, "Running script");

        let mut frames = vec![Frame {
            commands,
            next: 0,
            depth: 0,
            dir: self.settings.base_dir.clone(),
        }];
        let state = self.run_frames(&mut frames).await;

        self.stats.state = state;
        self.stats.elapsed = started.elapsed();
        let stats = self.stats.clone();
        info!(
            state = %stats.state,
            executed = stats.executed,
            failed = stats.failed,
            "Script finished in {:.2?}",
            stats.elapsed
        );
        self.listener.log(&stats.to_string());
        self.listener.on_finished(&stats);
        stats
    }

    fn split(&self, script: &str) -> Vec<String> {
        self.settings
            .parser
            .split(script)
            .iter()
            .map(|command| command.text.to_string())
            .collect()
    }

    async fn run_frames(&mut self, frames: &mut Vec<Frame>) -> RunState {
        loop {
            if self.token.is_cancelled() {
                self.listener.log("Script cancelled");
                return RunState::Cancelled;
            }
            let Some(frame) = frames.last_mut() else {
                return RunState::Completed;
            };
            let Some(sql) = frame.commands.get(frame.next).cloned() else {
                frames.pop();
                continue;
            };
            frame.next += 1;
            let (depth, dir) = (frame.depth, frame.dir.clone());
            let is_last = frames.iter().all(Frame::is_exhausted);

            let index = self.next_index;
            self.next_index += 1;
            self.listener.on_statement_start(index, self.total, &sql);

            let flow = if self.settings.locator.sql_verb(&sql) == "@" {
                self.include(index, sql, depth, dir, frames, is_last).await
            } else {
                self.statement(index, sql, is_last).await
            };
            if let Flow::Finish(state) = flow {
                return state;
            }
        }
    }

    async fn include(
        &mut self,
        index: usize,
        mut sql: String,
        depth: usize,
        dir: Option<PathBuf>,
        frames: &mut Vec<Frame>,
        is_last: bool,
    ) -> Flow {
        loop {
            let result = StatementResult::new(index, &sql, StatementKind::Include);
            let started = Instant::now();
            let path = include_path(&sql, dir.as_deref());
            let loaded = match &path {
                _ if depth >= MAX_INCLUDE_DEPTH => Err(ErrorDescriptor::new(format!(
                    "Script includes nested deeper than {MAX_INCLUDE_DEPTH} levels"
                ))),
                None => Err(ErrorDescriptor::new("No file name after @")),
                Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                    ErrorDescriptor::new(format!("Cannot read {}: {e}", path.display()))
                }),
            };

            match loaded {
                Ok(text) => {
                    let commands = self.split(&text);
                    debug!(?path, statements = commands.len(), depth, "Including script");
                    self.total += commands.len();
                    frames.push(Frame {
                        commands,
                        next: 0,
                        depth: depth + 1,
                        dir: path.as_deref().and_then(Path::parent).map(Path::to_path_buf),
                    });
                    let result = result.succeeded(StatementOutput::default(), started.elapsed());
                    self.listener.log(&result.summary());
                    self.report(result);
                    return Flow::Next;
                }
                Err(error) => {
                    let result = result.failed(error, started.elapsed());
                    match self.resolve_failure(result, is_last).await {
                        Flow::Retry(Some(text)) => sql = text,
                        Flow::Retry(None) => {}
                        flow => return flow,
                    }
                }
            }
        }
    }

    async fn statement(&mut self, index: usize, sql: String, is_last: bool) -> Flow {
        let names = self.settings.variables.prompt_names(&sql);
        if !names.is_empty() {
            match self.prompts.variable_values(&names).await {
                PromptAnswer::Values(values) => self.settings.variables.extend(values),
                PromptAnswer::Cancelled => return self.skip(index, &sql, "Variable prompt cancelled"),
            }
        }

        let mut sql = self.settings.variables.substitute(&sql);
        loop {
            let kind = StatementKind::classify(&self.settings.locator, &sql);
            let Some(result) = self.execute(index, &sql, kind).await else {
                return self.skip(index, &sql, "Parameter prompt cancelled");
            };
            if result.success {
                self.listener.log(&result.summary());
                self.report(result);
                return Flow::Next;
            }
            match self.resolve_failure(result, is_last).await {
                Flow::Retry(Some(text)) => sql = self.settings.variables.substitute(&text),
                Flow::Retry(None) => {}
                flow => return flow,
            }
        }
    }

    fn skip(&mut self, index: usize, sql: &str, reason: &str) -> Flow {
        let kind = StatementKind::classify(&self.settings.locator, sql);
        let mut result = StatementResult::new(index, sql, kind).skipped(reason);
        let stop = !self.settings.options.continue_on_prompt_cancel;
        result.stop_script = stop;
        self.listener.log(&format!("{}: {reason}", result.summary()));
        self.report(result);
        if stop {
            Flow::Finish(RunState::Cancelled)
        } else {
            Flow::Next
        }
    }

    /// `None` when the statement was skipped at the parameter prompt.
    async fn execute(&mut self, index: usize, sql: &str, kind: StatementKind) -> Option<StatementResult> {
        let options = self.settings.options.clone();
        let lexer_options = self.settings.locator.lexer_options();
        let params = match count_parameters(sql, lexer_options) {
            count if count > 0 && options.check_parameters && !kind.is_transaction_control() => {
                match self.prompts.parameter_values(sql, count).await {
                    PromptAnswer::Values(values) => Some(values),
                    PromptAnswer::Cancelled => return None,
                }
            }
            _ => None,
        };
        if let Some(values) = &params {
            self.listener
                .log(&format!("Executing {}", replace_parameters(sql, values, lexer_options)));
        }

        let result = StatementResult::new(index, sql, kind);
        let started = Instant::now();
        let executed = self.execute_with_savepoint(sql, kind, params.as_deref(), &options).await;
        let elapsed = started.elapsed();

        Some(match executed {
            Ok(output) => result.succeeded(output, elapsed),
            Err(err) => {
                if !matches!(
                    err,
                    Error::Statement(_) | Error::Timeout(_) | Error::ResourceExhausted(_) | Error::Cancelled
                ) {
                    error!(?err, "Unexpected failure in statement {}", index + 1);
                }
                result.failed(ErrorDescriptor::from_error(err), elapsed)
            }
        })
    }

    async fn execute_with_savepoint(
        &mut self,
        sql: &str,
        kind: StatementKind,
        params: Option<&[Value]>,
        options: &ExecOptions,
    ) -> Result<StatementOutput> {
        match kind {
            StatementKind::Commit => {
                self.executor.commit().await?;
                return Ok(message("Transaction committed"));
            }
            StatementKind::Rollback => {
                self.executor.rollback().await?;
                return Ok(message("Transaction rolled back"));
            }
            _ => {}
        }

        let savepoint = options.savepoints_active();
        if savepoint {
            self.executor.savepoint(STATEMENT_SAVEPOINT).await?;
        }

        let numbered = params.map(|_| to_numbered(sql, self.settings.locator.lexer_options()));
        let limits = options.limits();
        let executor = &mut *self.executor;
        let exec = async move {
            match (&numbered, params) {
                (Some(numbered), Some(values)) => executor.execute_prepared(numbered, values, limits).await,
                _ => executor.execute(sql, limits).await,
            }
        };
        let mut executed = supervise(
            exec,
            &self.canceller,
            &self.token,
            options.query_timeout,
            options.cancel_grace,
        )
        .await;

        if savepoint {
            let cleanup = match &executed {
                Ok(_) => self.executor.release_savepoint(STATEMENT_SAVEPOINT).await,
                Err(_) => self.executor.rollback_to_savepoint(STATEMENT_SAVEPOINT).await,
            };
            if let Err(err) = cleanup {
                warn!("Savepoint cleanup failed: {err}");
            }
        }

        if let Ok(output) = &mut executed {
            if kind == StatementKind::Ddl && options.commit_ddl && !options.autocommit {
                self.executor.commit().await?;
                output.messages.push("DDL committed".to_string());
            }
        }
        executed
    }

    async fn resolve_failure(&mut self, mut result: StatementResult, is_last: bool) -> Flow {
        let Some(error) = result.error.clone() else {
            self.report(result);
            return Flow::Next;
        };
        self.listener.log(&result.summary());

        // Abort wins wherever the failure happens, the last statement included.
        let policy = self.settings.options.error_policy;
        let flow = match error.kind {
            ErrorKind::Cancelled => Flow::Finish(RunState::Cancelled),
            ErrorKind::Fatal => Flow::Finish(RunState::FatalError),
            _ if policy == ErrorPolicy::Abort => Flow::Finish(RunState::FatalError),
            _ if is_last => Flow::Finish(RunState::Completed),
            _ if self.ignore_all || policy == ErrorPolicy::IgnoreAll => Flow::Next,
            _ => {
                let failed = FailedStatement {
                    index: result.index,
                    total: self.total,
                    sql: &result.sql,
                    error: &error,
                };
                match self.prompts.on_error(failed).await {
                    ErrorDecision::Continue => Flow::Next,
                    ErrorDecision::Retry(text) => Flow::Retry(text),
                    ErrorDecision::IgnoreAll => {
                        self.ignore_all = true;
                        Flow::Next
                    }
                    ErrorDecision::Cancel => Flow::Finish(RunState::Cancelled),
                }
            }
        };
        result.stop_script = matches!(flow, Flow::Finish(_));
        self.report(result);
        flow
    }

    fn report(&mut self, result: StatementResult) {
        self.stats.record(&result);
        self.listener.on_result(&result);
    }
}

fn message(text: &str) -> StatementOutput {
    StatementOutput {
        messages: vec![text.to_string()],
        ..Default::default()
    }
}

/// The file named by an `@file` directive, relative to `dir` unless absolute.
fn include_path(sql: &str, dir: Option<&Path>) -> Option<PathBuf> {
    let name = sql
        .trim()
        .strip_prefix('@')?
        .trim()
        .trim_end_matches(';')
        .trim_matches(|c| c == '"' || c == '\'');
    if name.is_empty() {
        return None;
    }
    let path = PathBuf::from(name);
    Some(match dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    })
}

/// Drive `exec` to completion unless the token is cancelled or the timeout
/// elapses first. In that case the canceller is asked to stop the statement,
/// which then gets `grace` to finish before it is abandoned.
async fn supervise<T, F, C>(
    exec: F,
    canceller: &C,
    token: &CancellationToken,
    timeout: Option<Duration>,
    grace: Duration,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
    C: StatementCanceller,
{
    tokio::pin!(exec);
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    let interrupted = tokio::select! {
        result = &mut exec => return result,
        _ = token.cancelled() => Error::Cancelled,
        _ = deadline => Error::Timeout(timeout.unwrap_or_default()),
    };

    debug!("Interrupting statement: {interrupted}");
    if let Err(err) = canceller.cancel().await {
        warn!("Cancel request failed: {err}");
    }
    match tokio::time::timeout(grace, &mut exec).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(_)) => Err(interrupted),
        Err(_) => {
            warn!("Statement did not stop within {grace:?}, abandoning it");
            Err(interrupted)
        }
    }
}
