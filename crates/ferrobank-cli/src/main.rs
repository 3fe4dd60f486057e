mod cli;
mod commands;
mod context;
mod error;
mod logging;
mod output;
mod user_agent;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::context::AppContext;
use crate::error::CliError;

/// Some providers failed during `sync`; the report was still printed.
const PARTIAL_FAILURE_EXIT: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::setup_logging(cli.log_dir.as_deref());

    match run(&cli).await {
        Ok(code) => code,
        Err(error) => {
            match error.code() {
                Some(code) => eprintln!("error[{code}]: {error}"),
                None => eprintln!("error: {error}"),
            }
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let context = AppContext::load(cli.home.as_deref())?;
    tracing::debug!(home = %context.home.display(), command = ?cli.command, "running command");

    let result = commands::run(cli, &context).await?;
    output::render(&result, cli.pretty)?;

    if result.partial_failure {
        return Ok(ExitCode::from(PARTIAL_FAILURE_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}
