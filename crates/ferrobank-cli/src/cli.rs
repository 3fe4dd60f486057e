//! CLI argument definitions for Ferrobank.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `providers` | List configured providers and their connection state |
//! | `connect` | Obtain a first token and record the provider as connected |
//! | `disconnect` | Deactivate a provider and forget its credentials |
//! | `sync` | Pull accounts and transactions from connected providers |
//! | `accounts` | List stored accounts of connected providers |
//! | `balance` | Total balance across active accounts in one currency |
//! | `transactions` | Most recent stored transactions |
//! | `forecast` | Income or expense forecast from stored history |
//! | `budget` | Create and inspect budgets |
//! | `consent` | Inspect or revoke a provider consent |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--home` | `$FERROBANK_HOME` or `~/.ferrobank` | Data and config directory |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-dir` | none | Also write daily-rolling log files here |
//!
//! # Examples
//!
//! ```bash
//! ferrobank connect vbank
//! ferrobank sync --pretty
//! ferrobank forecast --direction expense --by-category
//! ferrobank budget add groceries --limit 30000 --category food=15000
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ferrobank_core::{BudgetPeriod, ForecastDirection, ForecastPeriod};

/// Ferrobank - multi-bank Open Banking aggregator
#[derive(Debug, Parser)]
#[command(
    name = "ferrobank",
    author,
    version,
    about = "Multi-bank Open Banking aggregator",
    long_about = "Ferrobank connects to several Open Banking providers, keeps a local copy of \
accounts and transactions, tracks budgets and forecasts income and spending.\n\
\n\
Use 'ferrobank <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Data directory holding config.toml, secrets and the warehouse.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Directory for daily-rolling log files.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured providers and whether they are connected.
    Providers,

    /// Connect a provider.
    ///
    /// Standard providers with `--interactive` run the authorization-code
    /// flow: the authorization URL is printed and the redirect URL is read
    /// from stdin. Otherwise the client-credentials exchange is used.
    ///
    /// # Examples
    ///
    ///   ferrobank connect vbank
    ///   ferrobank connect abank --interactive
    Connect(ConnectArgs),

    /// Deactivate a provider; stored accounts and transactions are kept.
    Disconnect(ProviderArgs),

    /// Sync accounts and transactions.
    ///
    /// # Examples
    ///
    ///   ferrobank sync
    ///   ferrobank sync --provider vbank --force
    Sync(SyncArgs),

    /// List stored accounts of active providers.
    Accounts,

    /// Total balance across active accounts.
    Balance(BalanceArgs),

    /// Most recent stored transactions, newest first.
    Transactions(TransactionsArgs),

    /// Forecast income or expenses from stored transactions.
    Forecast(ForecastArgs),

    /// Manage budgets.
    #[command(subcommand)]
    Budget(BudgetCommand),

    /// Inspect or revoke a provider's consent.
    #[command(subcommand)]
    Consent(ConsentCommand),
}

#[derive(Debug, Args)]
pub struct ProviderArgs {
    /// Provider id from config.toml.
    pub provider: String,
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Provider id from config.toml.
    pub provider: String,

    /// Run the interactive authorization-code flow through the console.
    #[arg(long, default_value_t = false)]
    pub interactive: bool,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Only sync this provider.
    #[arg(long)]
    pub provider: Option<String>,

    /// Ignore the freshness window and refetch.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct BalanceArgs {
    /// ISO 4217 currency; defaults to `sync.default_currency`.
    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransactionsArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    #[arg(long, value_enum)]
    pub direction: DirectionArg,

    #[arg(long, value_enum, default_value_t = PeriodArg::NextMonth)]
    pub period: PeriodArg,

    /// Per-category expense forecast instead of the blended total.
    #[arg(long, default_value_t = false)]
    pub by_category: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Income,
    Expense,
}

impl From<DirectionArg> for ForecastDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::Income => Self::Income,
            DirectionArg::Expense => Self::Expense,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeriodArg {
    NextWeek,
    NextMonth,
    NextQuarter,
    NextYear,
}

impl From<PeriodArg> for ForecastPeriod {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::NextWeek => Self::NextWeek,
            PeriodArg::NextMonth => Self::NextMonth,
            PeriodArg::NextQuarter => Self::NextQuarter,
            PeriodArg::NextYear => Self::NextYear,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum BudgetCommand {
    /// Create a budget for the current period.
    Add(BudgetAddArgs),
    /// List budgets with their current spend.
    List,
}

#[derive(Debug, Args)]
pub struct BudgetAddArgs {
    pub name: String,

    /// Total limit for the period.
    #[arg(long)]
    pub limit: String,

    #[arg(long, value_enum, default_value_t = PeriodChoice::Monthly)]
    pub period: PeriodChoice,

    /// Per-category limit as `category=amount`; repeatable.
    #[arg(long = "category")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeriodChoice {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    Custom,
}

impl From<PeriodChoice> for BudgetPeriod {
    fn from(value: PeriodChoice) -> Self {
        match value {
            PeriodChoice::Weekly => Self::Weekly,
            PeriodChoice::Monthly => Self::Monthly,
            PeriodChoice::Quarterly => Self::Quarterly,
            PeriodChoice::Yearly => Self::Yearly,
            PeriodChoice::Custom => Self::Custom,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ConsentCommand {
    /// Current status of the stored consent.
    Status(ProviderArgs),
    /// Revoke the stored consent at the provider.
    Revoke(ProviderArgs),
}
