//! Command line front end: argument parsing, terminal prompts and result output.
use crate::*;
use clap::Parser;
use itertools::Itertools as _;
use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Run SQL scripts against PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "sqlbench")]
#[command(version)]
#[command(about = "Split and run SQL scripts against PostgreSQL", long_about = None)]
pub struct Cli {
    /// Script file to run, `-` reads from stdin
    #[arg(required_unless_present = "command", conflicts_with = "command")]
    pub file: Option<PathBuf>,

    /// Run this SQL instead of a file
    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    /// PostgreSQL connection URL
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// TOML configuration file
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Statement delimiter (e.g. `GO`, `/:nl`)
    #[arg(short = 'd', long = "delimiter")]
    pub delimiter: Option<String>,

    /// Delimiter ending procedural blocks
    #[arg(long = "alt-delimiter")]
    pub alt_delimiter: Option<String>,

    /// What to do when a statement fails
    #[arg(long = "on-error")]
    pub on_error: Option<ErrorPolicy>,

    /// Maximum rows kept per result set
    #[arg(long = "max-rows")]
    pub max_rows: Option<usize>,

    /// Query timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Run the script in one transaction, committed only if nothing failed
    #[arg(long = "no-autocommit")]
    pub no_autocommit: bool,

    /// Define a script variable, `name=value` (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Print the split statements with their offsets and exit
    #[arg(long = "split-only")]
    pub split_only: bool,
}

impl Cli {
    fn reads_stdin(&self) -> bool {
        self.command.is_none() && self.file.as_deref().is_some_and(|f| f == Path::new("-"))
    }

    /// Combine the loaded configuration with the flags given on the command line.
    pub fn settings(&self, config: &Config) -> Result<RunSettings> {
        let delimiter = match &self.delimiter {
            Some(d) => parse_delimiter(d)?,
            None => config.delimiter()?,
        };
        let alternate = match &self.alt_delimiter {
            Some(d) => Some(parse_delimiter(d)?),
            None => config.alternate_delimiter()?,
        };
        let lexer_options = config.lexer_options();

        let mut options = ExecOptions::from_config(config);
        if let Some(policy) = self.on_error {
            options.error_policy = policy;
        }
        if let Some(max_rows) = self.max_rows {
            options.max_rows = Some(max_rows);
        }
        if let Some(secs) = self.timeout {
            options.query_timeout = Some(Duration::from_secs(secs));
        }
        if self.no_autocommit {
            options.autocommit = false;
        }

        let mut variables = VariablePool::new();
        for definition in &self.vars {
            let (name, value) = VariablePool::parse_definition(definition).ok_or_else(|| {
                Error::Config(format!("invalid variable {definition:?}, expected name=value"))
            })?;
            variables.set(name, value);
        }

        let base_dir = match &self.file {
            Some(file) if !self.reads_stdin() => file.parent().map(Path::to_path_buf),
            _ => None,
        };

        Ok(RunSettings {
            parser: ScriptParser::new(delimiter)
                .with_alternate(alternate)
                .with_lexer_options(lexer_options),
            locator: ClauseLocator::default().with_lexer_options(lexer_options),
            options,
            variables,
            base_dir,
        })
    }

    async fn script(&self) -> Result<String> {
        use tokio::io::AsyncReadExt as _;
        if let Some(command) = &self.command {
            return Ok(command.clone());
        }
        match &self.file {
            Some(_) if self.reads_stdin() => {
                let mut script = String::new();
                tokio::io::stdin().read_to_string(&mut script).await?;
                Ok(script)
            }
            Some(file) => Ok(tokio::fs::read_to_string(file).await?),
            None => Err(Error::Config("no script given".to_string())),
        }
    }
}

fn parse_delimiter(value: &str) -> Result<DelimiterDefinition> {
    DelimiterDefinition::parse(value)
        .ok_or_else(|| Error::Config(format!("invalid delimiter {value:?}")))
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;
    let settings = cli.settings(&config)?;
    let script = cli.script().await?;

    if cli.split_only {
        print!("{}", describe_commands(&settings, &script));
        return Ok(ExitCode::SUCCESS);
    }

    let url = cli
        .url
        .clone()
        .or_else(|| config.database_url.clone())
        .ok_or_else(|| Error::Config("no database URL, use --url or SQLBENCH_DATABASE_URL".to_string()))?;
    let autocommit = settings.options.autocommit;
    let session = Session::new(PgExecutor::connect(&url, autocommit).await?);

    let interactive = !cli.reads_stdin() && std::io::stdin().is_terminal();
    let handle = session.start(script, StdinPrompts { interactive }, ConsoleListener, settings)?;
    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling script");
            token.cancel();
        }
    });

    let stats = handle.join().await?;
    let clean = stats.state == RunState::Completed && stats.failed == 0;
    if !autocommit {
        session.end_transaction(clean).await?;
        info!(committed = clean, "Transaction ended");
    }
    if let Some(executor) = session.into_executor() {
        executor.close().await?;
    }
    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// One block per command: number, kind, offsets, then the statement text.
fn describe_commands(settings: &RunSettings, script: &str) -> String {
    settings
        .parser
        .split(script)
        .iter()
        .map(|command| {
            let kind = StatementKind::classify(&settings.locator, command.text);
            format!(
                "-- #{} {kind} [{}..{}]\n{}\n",
                command.index + 1,
                command.start,
                command.end,
                command.text
            )
        })
        .join("\n")
}

/// Render a result set as an aligned text table.
pub fn render_table(result_set: &ResultSet) -> String {
    let cells = result_set
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect_vec())
        .collect_vec();
    let widths = result_set
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .chain([column])
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect_vec();
    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![
        line(&result_set.columns),
        widths.iter().map(|w| "-".repeat(*w)).join("-+-"),
    ];
    lines.extend(cells.iter().map(|row| line(row)));
    if result_set.truncated {
        lines.push("(more rows available)".to_string());
    }
    lines.join("\n")
}

/// Prints result tables to stdout and progress to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleListener;

impl ScriptListener for ConsoleListener {
    fn on_result(&mut self, result: &StatementResult) {
        for result_set in &result.result_sets {
            println!("{}\n", render_table(result_set));
        }
    }

    fn log(&mut self, line: &str) {
        eprintln!("{line}");
    }
}

/// Answers prompts from the terminal. Without a terminal every prompt is
/// answered like `NoPrompts` would.
#[derive(Debug, Clone, Copy)]
pub struct StdinPrompts {
    pub interactive: bool,
}

impl PromptProvider for StdinPrompts {
    async fn variable_values(&self, names: &[String]) -> PromptAnswer<Vec<(String, String)>> {
        if !self.interactive {
            return NoPrompts.variable_values(names).await;
        }
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            match ask(format!("Value for $[{name}]: ")).await {
                Some(value) => values.push((name.clone(), value)),
                None => return PromptAnswer::Cancelled,
            }
        }
        PromptAnswer::Values(values)
    }

    async fn parameter_values(&self, sql: &str, count: usize) -> PromptAnswer<Vec<Value>> {
        if !self.interactive {
            return NoPrompts.parameter_values(sql, count).await;
        }
        eprintln!("{sql}");
        let mut values = Vec::with_capacity(count);
        for n in 1..=count {
            match ask(format!("Value for parameter {n}: ")).await {
                Some(value) => values.push(Value::infer(&value)),
                None => return PromptAnswer::Cancelled,
            }
        }
        PromptAnswer::Values(values)
    }

    async fn on_error(&self, failed: FailedStatement<'_>) -> ErrorDecision {
        if !self.interactive {
            return NoPrompts.on_error(failed).await;
        }
        eprintln!(
            "Statement {} of {} failed: {}",
            failed.index + 1,
            failed.total,
            failed.error
        );
        loop {
            let Some(answer) = ask("[c]ontinue, [r]etry, [i]gnore all, [a]bort? ".to_string()).await
            else {
                return ErrorDecision::Cancel;
            };
            match parse_decision(&answer) {
                Some(ErrorDecision::Retry(_)) => {
                    let edited = ask("Statement to run (empty to run it unchanged): ".to_string()).await;
                    return ErrorDecision::Retry(edited.filter(|sql| !sql.trim().is_empty()));
                }
                Some(decision) => return decision,
                None => continue,
            }
        }
    }
}

fn parse_decision(answer: &str) -> Option<ErrorDecision> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "c" | "continue" => Some(ErrorDecision::Continue),
        "r" | "retry" => Some(ErrorDecision::Retry(None)),
        "i" | "ignore" => Some(ErrorDecision::IgnoreAll),
        "a" | "abort" | "cancel" => Some(ErrorDecision::Cancel),
        _ => None,
    }
}

/// Read one line from stdin without blocking the runtime. `None` on EOF.
async fn ask(question: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        use std::io::Write as _;
        let mut stderr = std::io::stderr();
        write!(stderr, "{question}").ok()?;
        stderr.flush().ok()?;
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    })
    .await
    .ok()
    .flatten()
}
