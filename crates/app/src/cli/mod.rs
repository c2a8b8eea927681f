use checkout_app::{config::LoggingConfig, observability};
use clap::{Parser, Subcommand};

mod catalog;
mod compensations;
mod errors;
mod migrate;
mod orders;
mod stock;
mod worker;

pub(crate) use errors::CliError;

#[derive(Debug, Parser)]
#[command(name = "checkout-app", about = "Checkout CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate(migrate::MigrateArgs),
    Catalog(catalog::CatalogCommand),
    Orders(orders::OrdersCommand),
    Compensations(compensations::CompensationsCommand),
    Stock(stock::StockCommand),
    /// Run background sweeps until interrupted
    Worker(worker::WorkerArgs),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), CliError> {
        observability::init_subscriber(&self.logging)?;

        match self.command {
            Commands::Migrate(args) => migrate::run(args).await,
            Commands::Catalog(command) => catalog::run(command).await,
            Commands::Orders(command) => orders::run(command).await,
            Commands::Compensations(command) => compensations::run(command).await,
            Commands::Stock(command) => stock::run(command).await,
            Commands::Worker(args) => worker::run(args).await,
        }
    }
}
