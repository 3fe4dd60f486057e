use std::path::Path;

use tracing_subscriber::fmt::{self, format::Format, format::Full, time::SystemTime};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FERROBANK_LOG";

const DEFAULT_DIRECTIVES: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

fn build_base_log_format() -> Format<Full, SystemTime> {
    fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_target(true)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global subscriber: stderr always, plus a daily-rolling file
/// under `log_dir` when given. Stdout stays reserved for command output.
pub fn setup_logging(log_dir: Option<&Path>) {
    let stderr_layer = fmt::layer()
        .event_format(build_base_log_format().with_ansi(true))
        .with_writer(std::io::stderr);

    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .event_format(build_base_log_format())
            .with_writer(tracing_appender::rolling::daily(dir, "ferrobank.log"))
    });

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}
