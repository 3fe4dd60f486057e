mod accounts;
mod budget;
mod consent;
mod forecast;
mod providers;
mod sync;

use crate::cli::{Cli, Command};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::CommandResult;

pub async fn run(cli: &Cli, context: &AppContext) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Providers => providers::list(context),
        Command::Connect(args) => providers::connect(args, context).await,
        Command::Disconnect(args) => providers::disconnect(args, context).await,
        Command::Sync(args) => sync::run(args, context).await,
        Command::Accounts => accounts::list(context),
        Command::Balance(args) => accounts::balance(args, context),
        Command::Transactions(args) => accounts::transactions(args, context),
        Command::Forecast(args) => forecast::run(args, context),
        Command::Budget(command) => budget::run(command, context),
        Command::Consent(command) => consent::run(command, context).await,
    }
}
