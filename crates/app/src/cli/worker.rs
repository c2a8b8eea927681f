use checkout_app::{
    config::{CheckoutConfig, DatabaseConfig},
    context::AppContext,
    shutdown, tasks,
};
use clap::Args;
use tracing::info;

use crate::cli::CliError;

#[derive(Debug, Args)]
pub(crate) struct WorkerArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(flatten)]
    checkout: CheckoutConfig,
}

pub(crate) async fn run(args: WorkerArgs) -> Result<(), CliError> {
    let context =
        AppContext::from_database_url(&args.database.database_url, &args.checkout).await?;
    let settings = context.settings;
    let (notify, receiver) = shutdown::channel();

    let sweeper = tasks::spawn_cache_sweeper(
        context.cache,
        settings.cache_sweep_interval,
        receiver.clone(),
    );
    let retrier = tasks::spawn_compensation_retrier(
        context.orders,
        settings.compensation_retry_interval,
        settings.compensation_batch_size,
        receiver,
    );

    info!(
        retry_interval = ?settings.compensation_retry_interval,
        batch_size = settings.compensation_batch_size,
        "worker started"
    );

    shutdown::listen(notify).await?;

    sweeper.await?;
    retrier.await?;

    info!("worker stopped");

    Ok(())
}
