use checkout_app::{context::AppContext, domain::orders::records::CompensationRecord};
use tabled::{builder::Builder, settings::Style};

use crate::cli::{CliError, compensations::CompensationsArgs};

pub(super) async fn run(args: CompensationsArgs) -> Result<(), CliError> {
    let context =
        AppContext::from_database_url(&args.database.database_url, &args.checkout).await?;

    let pending = context.orders.pending_compensations(args.limit).await?;

    if pending.is_empty() {
        println!("no pending compensations");
        return Ok(());
    }

    println!("{}", render(&pending));

    Ok(())
}

fn render(pending: &[CompensationRecord]) -> String {
    let mut builder = Builder::default();

    builder.push_record([
        "Compensation",
        "Order",
        "Product",
        "Variant",
        "Quantity",
        "Attempts",
        "Last error",
        "Created",
    ]);

    for compensation in pending {
        builder.push_record([
            compensation.uuid.to_string(),
            compensation.order_uuid.to_string(),
            compensation.product_uuid.to_string(),
            compensation.variant.to_string(),
            compensation.quantity.to_string(),
            compensation.attempts.to_string(),
            compensation.last_error.clone().unwrap_or_default(),
            compensation.created_at.to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());

    table.to_string()
}
