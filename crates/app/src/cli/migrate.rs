use checkout_app::{config::DatabaseConfig, database};
use clap::Args;
use tracing::info;

use crate::cli::CliError;

#[derive(Debug, Args)]
pub(crate) struct MigrateArgs {
    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: MigrateArgs) -> Result<(), CliError> {
    let pool = database::connect(&args.database.database_url)
        .await
        .map_err(CliError::Database)?;

    database::migrate(&pool).await?;

    info!("migrations applied");

    Ok(())
}
