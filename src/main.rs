reexport!(testing, test);
reexport!(cli);
reexport!(config);
reexport!(error);
reexport!(logic);
reexport!(runner);
reexport!(script);
reexport!(sql);
reexport!(value);
reexport!(variables);
#[allow(unused_imports)]
pub(crate) use tracing::{debug, error, info, span, trace, warn};

use clap::Parser as _;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()) // <- reads RUST_LOG
        .with_writer(std::io::stderr)
        .init();

    match cli::run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[macro_export]
macro_rules! reexport {
    ($module:ident) => {
        $crate::reexport!($module, false);
    };
    ($module:ident, test) => {
        $crate::reexport!($module, true);
    };
    ($module:ident, $is_test:literal) => {
        #[cfg_attr($is_test, cfg(test))]
        mod $module;
        #[cfg_attr($is_test, cfg(test))]
        #[allow(unused_imports)]
        #[allow(ambiguous_glob_reexports)]
        pub use $module::*;
    };
}
