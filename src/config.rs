use crate::*;
use confique::Config as _;
use std::path::Path;

/// Settings read from `SQLBENCH_*` environment variables and, optionally, a
/// TOML file. Environment variables win over the file, command line flags win
/// over both.
#[derive(Debug, confique::Config)]
pub struct Config {
    /// PostgreSQL connection URL.
    #[config(env = "SQLBENCH_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Statement delimiter. A `:nl` suffix requires whitespace before it.
    #[config(env = "SQLBENCH_DELIMITER", default = ";")]
    pub delimiter: String,

    /// Delimiter ending procedural blocks (`CREATE FUNCTION`, `DO`, ...).
    #[config(env = "SQLBENCH_ALTERNATE_DELIMITER")]
    pub alternate_delimiter: Option<String>,

    /// Treat `#` as the start of a line comment.
    #[config(env = "SQLBENCH_HASH_COMMENTS", default = false)]
    pub hash_comments: bool,

    #[config(env = "SQLBENCH_MAX_ROWS")]
    pub max_rows: Option<usize>,

    #[config(env = "SQLBENCH_QUERY_TIMEOUT_SECS")]
    pub query_timeout_secs: Option<u64>,

    #[config(env = "SQLBENCH_AUTOCOMMIT", default = true)]
    pub autocommit: bool,

    #[config(env = "SQLBENCH_COMMIT_DDL", default = false)]
    pub commit_ddl: bool,

    #[config(env = "SQLBENCH_USE_SAVEPOINT", default = false)]
    pub use_savepoint: bool,

    #[config(env = "SQLBENCH_CHECK_PARAMETERS", default = false)]
    pub check_parameters: bool,

    /// Upper bound on a materialized result, 0 for no limit.
    #[config(env = "SQLBENCH_MAX_RESULT_BYTES", default = 268435456)]
    pub max_result_bytes: usize,

    #[config(env = "SQLBENCH_CANCEL_GRACE_MS", default = 5000)]
    pub cancel_grace_ms: u64,

    /// `ask`, `ignore` or `abort`.
    #[config(env = "SQLBENCH_ON_ERROR", default = "ask")]
    pub on_error: ErrorPolicy,

    #[config(env = "SQLBENCH_CONTINUE_ON_PROMPT_CANCEL", default = true)]
    pub continue_on_prompt_cancel: bool,

    #[cfg(test)]
    #[config(env = "SQLBENCH_CONTAINER_RAMDISKED", default = true)]
    pub container_ramdisked: bool,
    #[cfg(test)]
    #[config(env = "SQLBENCH_CONTAINER_LOGS", default = false)]
    pub container_logs: bool,
}

impl Config {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().env();
        if let Some(file) = file {
            debug!("Reading configuration from {}", file.display());
            builder = builder.file(file);
        }
        builder.load().map_err(Into::into)
    }

    pub fn delimiter(&self) -> Result<DelimiterDefinition> {
        DelimiterDefinition::parse(&self.delimiter)
            .ok_or_else(|| Error::Config(format!("invalid delimiter {:?}", self.delimiter)))
    }

    pub fn alternate_delimiter(&self) -> Result<Option<DelimiterDefinition>> {
        self.alternate_delimiter
            .as_deref()
            .map(|d| {
                DelimiterDefinition::parse(d)
                    .ok_or_else(|| Error::Config(format!("invalid alternate delimiter {d:?}")))
            })
            .transpose()
    }

    pub fn lexer_options(&self) -> LexerOptions {
        LexerOptions {
            hash_comments: self.hash_comments,
            ..Default::default()
        }
    }
}

#[cfg(test)]
pub fn config() -> &'static Config {
    use std::sync::OnceLock;
    static CONFIG: OnceLock<Config> = OnceLock::new();
    CONFIG.get_or_init(|| {
        Config::builder()
            .env()
            .load()
            .expect("Failed to load one or more value configuration from the current environment")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let config = Config::builder().load().expect("defaults");
        assert_eq!(config.delimiter, ";");
        assert!(config.autocommit);
        assert_eq!(config.on_error, ErrorPolicy::Ask);
        assert_eq!(config.max_rows, None);
        assert!(config.delimiter().is_ok_and(|d| d.is_standard()));
        assert!(matches!(config.alternate_delimiter(), Ok(None)));
    }

    #[test]
    fn reads_toml_file() {
        use std::io::Write as _;
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create config file");
        file.write_all(
            b"delimiter = \"GO\"\nalternate_delimiter = \"/:nl\"\non_error = \"ignore\"\nmax_rows = 10\n",
        )
        .expect("write config");
        let config = Config::builder().file(file.path()).load().expect("load file");

        assert_eq!(config.on_error, ErrorPolicy::IgnoreAll);
        assert_eq!(config.max_rows, Some(10));
        let alternate = config.alternate_delimiter().expect("valid").expect("present");
        assert_eq!(alternate.delimiter(), "/");
        assert!(alternate.needs_whitespace_before());

        let options = ExecOptions::from_config(&config);
        assert_eq!(options.max_rows, Some(10));
        assert_eq!(options.error_policy, ErrorPolicy::IgnoreAll);
    }
}
