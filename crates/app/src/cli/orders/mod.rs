use clap::{Args, Subcommand};

use crate::cli::CliError;

mod list;
mod transition;

#[derive(Debug, Args)]
pub(crate) struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrdersSubcommand {
    /// List orders, newest first
    List(list::ListOrdersArgs),
    /// Move one or more orders to a new status
    Transition(transition::TransitionArgs),
}

pub(crate) async fn run(command: OrdersCommand) -> Result<(), CliError> {
    match command.command {
        OrdersSubcommand::List(args) => list::run(args).await,
        OrdersSubcommand::Transition(args) => transition::run(args).await,
    }
}
