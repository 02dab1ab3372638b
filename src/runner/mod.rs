//! Statement execution and the script driver.
//!
//! `ScriptRunner` walks the commands of a script in order against a
//! `StatementExecutor`, asks a `PromptProvider` for variable values and error
//! decisions, and reports every `StatementResult` to a `ScriptListener`.
//! `Session` guards one executor so that only one run is in flight at a time.
crate::reexport!(driver);
crate::reexport!(executor);
crate::reexport!(listener);
crate::reexport!(outcome);
crate::reexport!(pg);
crate::reexport!(prompt);
crate::reexport!(session);
