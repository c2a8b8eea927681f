use checkout::prelude::OrderStatus;
use checkout_app::{
    config::{CheckoutConfig, DatabaseConfig},
    context::AppContext,
    domain::orders::records::OrderUuid,
};
use clap::Args;
use tracing::warn;

use crate::cli::CliError;

#[derive(Debug, Args)]
pub(crate) struct TransitionArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(flatten)]
    checkout: CheckoutConfig,

    /// Target status
    #[arg(long)]
    status: OrderStatus,

    /// Note recorded in each order's status history
    #[arg(long)]
    note: Option<String>,

    /// Orders to move
    #[arg(required = true, num_args = 1..)]
    orders: Vec<OrderUuid>,
}

pub(crate) async fn run(args: TransitionArgs) -> Result<(), CliError> {
    let context =
        AppContext::from_database_url(&args.database.database_url, &args.checkout).await?;

    if let [order] = args.orders.as_slice() {
        let record = context
            .orders
            .transition(*order, args.status, args.note)
            .await?;

        println!("{}\t{}\t{}", record.uuid, record.order_number, record.status);

        return Ok(());
    }

    let report = context
        .orders
        .batch_transition(args.orders, args.status, args.note)
        .await?;

    for order in &report.updated {
        println!("{order}\t{}", args.status);
    }

    for skipped in &report.skipped {
        warn!(order = %skipped.order, reason = %skipped.reason, "order not transitioned");
    }

    if report.skipped.is_empty() {
        Ok(())
    } else {
        Err(CliError::Skipped(report.skipped.len()))
    }
}
