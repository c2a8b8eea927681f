use std::path::PathBuf;

use checkout_app::{
    config::DatabaseConfig,
    database::{self, Db},
    domain::catalog::data::NewProduct,
    store::{CheckoutStore, PgStore},
};
use clap::{Args, Subcommand};
use serde::Deserialize;
use tracing::info;

use crate::cli::CliError;

#[derive(Debug, Args)]
pub(crate) struct CatalogCommand {
    #[command(subcommand)]
    command: CatalogSubcommand,
}

#[derive(Debug, Subcommand)]
enum CatalogSubcommand {
    /// Create or replace products, and their stock, from a YAML file
    Import(ImportArgs),
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    /// YAML file with a top-level `products` list
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<NewProduct>,
}

fn parse(source: &str) -> Result<Vec<NewProduct>, serde_norway::Error> {
    Ok(serde_norway::from_str::<CatalogFile>(source)?.products)
}

pub(crate) async fn run(command: CatalogCommand) -> Result<(), CliError> {
    match command.command {
        CatalogSubcommand::Import(args) => import(args).await,
    }
}

async fn import(args: ImportArgs) -> Result<(), CliError> {
    let source = tokio::fs::read_to_string(&args.path)
        .await
        .map_err(|source| CliError::Read {
            path: args.path.clone(),
            source,
        })?;

    let products = parse(&source)?;

    let pool = database::connect(&args.database.database_url)
        .await
        .map_err(CliError::Database)?;

    let store = PgStore::new(Db::new(pool));

    for product in products {
        let record = store.save_product(product).await?;

        info!(
            product = %record.uuid,
            variants = record.stock.len(),
            "imported product"
        );

        println!("{}\t{}", record.uuid, record.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn catalog_yaml_fills_defaults() -> TestResult {
        let products = parse(
            r"
products:
  - uuid: 0190a5e4-8c4e-7b6a-9d2f-3e1c5a7b9d01
    name: Linen Shirt
    price: 4500
    discount_price: 3900
    stock:
      - size: M
        color: White
        quantity: 12
      - size: L
        color: White
        quantity: 4
  - uuid: 0190a5e4-8c4e-7b6a-9d2f-3e1c5a7b9d02
    name: Gift Card
    price: 2500
    active: false
",
        )?;

        assert_eq!(products.len(), 2);

        let shirt = &products[0];

        assert!(shirt.active, "products are active unless stated otherwise");
        assert_eq!(shirt.discount_price, Some(3900));
        assert_eq!(shirt.stock.len(), 2);
        assert_eq!(shirt.stock[1].quantity, 4);
        assert_ne!(
            shirt.stock[0].uuid, shirt.stock[1].uuid,
            "stock entry ids are generated"
        );

        let card = &products[1];

        assert!(!card.active);
        assert!(card.stock.is_empty());
        assert_eq!(card.image, None);

        Ok(())
    }

    #[test]
    fn missing_price_is_rejected() {
        let result = parse(
            r"
products:
  - uuid: 0190a5e4-8c4e-7b6a-9d2f-3e1c5a7b9d03
    name: Mystery Box
",
        );

        assert!(result.is_err(), "price is required");
    }
}
