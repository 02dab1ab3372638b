use crate::*;

/// Receives progress of a script run. Every method defaults to doing nothing.
pub trait ScriptListener: Send {
    fn on_statement_start(&mut self, _index: usize, _total: usize, _sql: &str) {}

    fn on_result(&mut self, _result: &StatementResult) {}

    /// Human readable progress line.
    fn log(&mut self, _line: &str) {}

    fn on_finished(&mut self, _stats: &ScriptStats) {}
}

/// Forwards log lines to `tracing` and drops everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl ScriptListener for TracingListener {
    fn log(&mut self, line: &str) {
        info!("{line}");
    }
}
