//! Script level parsing: delimiter definitions and the statement splitter.
pub mod delimiter;
pub mod splitter;

pub use delimiter::DelimiterDefinition;
pub use splitter::{Command, Script, ScriptParser};
