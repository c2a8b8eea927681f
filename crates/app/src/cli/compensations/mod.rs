use checkout_app::config::{CheckoutConfig, DatabaseConfig};
use clap::{Args, Subcommand};

use crate::cli::CliError;

mod list;
mod retry;

#[derive(Debug, Args)]
pub(crate) struct CompensationsCommand {
    #[command(subcommand)]
    command: CompensationsSubcommand,
}

#[derive(Debug, Subcommand)]
enum CompensationsSubcommand {
    /// Show stock releases that have not been settled yet
    List(CompensationsArgs),
    /// Settle outstanding stock releases now
    Retry(CompensationsArgs),
}

#[derive(Debug, Args)]
struct CompensationsArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(flatten)]
    checkout: CheckoutConfig,

    /// Maximum compensations to handle
    #[arg(long, default_value_t = 100)]
    limit: u32,
}

pub(crate) async fn run(command: CompensationsCommand) -> Result<(), CliError> {
    match command.command {
        CompensationsSubcommand::List(args) => list::run(args).await,
        CompensationsSubcommand::Retry(args) => retry::run(args).await,
    }
}
