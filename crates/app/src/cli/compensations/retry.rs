use checkout_app::context::AppContext;

use crate::cli::{CliError, compensations::CompensationsArgs};

pub(super) async fn run(args: CompensationsArgs) -> Result<(), CliError> {
    let context =
        AppContext::from_database_url(&args.database.database_url, &args.checkout).await?;

    let report = context.orders.retry_compensations(args.limit).await?;

    println!("settled: {}", report.settled);
    println!("failed: {}", report.failed);

    Ok(())
}
