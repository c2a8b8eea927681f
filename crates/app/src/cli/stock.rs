use std::sync::Arc;

use checkout::prelude::Variant;
use checkout_app::{
    config::DatabaseConfig,
    database::{self, Db},
    domain::{catalog::records::ProductUuid, stock::StockLedger},
    store::PgStore,
};
use clap::{Args, Subcommand};
use tracing::info;

use crate::cli::CliError;

#[derive(Debug, Args)]
pub(crate) struct StockCommand {
    #[command(subcommand)]
    command: StockSubcommand,
}

#[derive(Debug, Subcommand)]
enum StockSubcommand {
    /// Show whether a quantity of a variant can be sold right now
    Check(StockArgs),
    /// Return units to a variant's stock
    Release(StockArgs),
}

#[derive(Debug, Args)]
struct StockArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    /// Product UUID
    #[arg(long)]
    product: ProductUuid,

    #[arg(long)]
    size: String,

    #[arg(long)]
    color: String,

    #[arg(long, default_value_t = 1)]
    quantity: u32,
}

impl StockArgs {
    fn variant(&self) -> Variant {
        Variant::new(self.size.as_str(), self.color.as_str())
    }
}

pub(crate) async fn run(command: StockCommand) -> Result<(), CliError> {
    match command.command {
        StockSubcommand::Check(args) => check(args).await,
        StockSubcommand::Release(args) => release(args).await,
    }
}

async fn ledger(database: &DatabaseConfig) -> Result<StockLedger, CliError> {
    let pool = database::connect(&database.database_url)
        .await
        .map_err(CliError::Database)?;

    Ok(StockLedger::new(Arc::new(PgStore::new(Db::new(pool)))))
}

async fn check(args: StockArgs) -> Result<(), CliError> {
    let ledger = ledger(&args.database).await?;
    let variant = args.variant();

    let availability = ledger
        .check_availability(args.product, &variant, args.quantity)
        .await?;

    println!("variant: {variant}");
    println!("in stock: {}", availability.in_stock);
    println!("unit price: {}", availability.unit_price);
    println!("available: {}", availability.available);

    Ok(())
}

async fn release(args: StockArgs) -> Result<(), CliError> {
    let ledger = ledger(&args.database).await?;
    let variant = args.variant();

    let remaining = ledger
        .release(args.product, &variant, args.quantity)
        .await?;

    info!(product = %args.product, %variant, remaining, "released stock");

    println!("{}\t{variant}\t{remaining}", args.product);

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(subcommand)]
        command: StockSubcommand,
    }

    #[test]
    fn release_flags_name_one_variant() -> TestResult {
        let product = ProductUuid::new();
        let harness = Harness::try_parse_from([
            "stock",
            "release",
            "--database-url",
            "postgres://localhost/checkout",
            "--product",
            &product.to_string(),
            "--size",
            "M",
            "--color",
            "Red",
            "--quantity",
            "3",
        ])?;

        let StockSubcommand::Release(args) = harness.command else {
            panic!("expected the release subcommand");
        };

        assert_eq!(args.product, product);
        assert_eq!(args.variant(), Variant::new("M", "Red"));
        assert_eq!(args.quantity, 3);

        Ok(())
    }
}
