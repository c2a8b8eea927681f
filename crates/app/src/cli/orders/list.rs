use checkout::prelude::OrderStatus;
use checkout_app::{
    config::{CheckoutConfig, DatabaseConfig},
    context::AppContext,
    domain::{
        orders::{data::OrderQuery, records::OrderRecord},
        users::UserUuid,
    },
};
use clap::Args;
use tabled::{builder::Builder, settings::Style};

use crate::cli::CliError;

#[derive(Debug, Args)]
pub(crate) struct ListOrdersArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(flatten)]
    checkout: CheckoutConfig,

    /// Only orders placed by this user
    #[arg(long)]
    user: Option<UserUuid>,

    /// Only orders currently in this status
    #[arg(long)]
    status: Option<OrderStatus>,

    #[arg(long, default_value_t = OrderQuery::DEFAULT_LIMIT)]
    limit: u32,

    #[arg(long, default_value_t = 0)]
    offset: u32,
}

pub(crate) async fn run(args: ListOrdersArgs) -> Result<(), CliError> {
    let context =
        AppContext::from_database_url(&args.database.database_url, &args.checkout).await?;

    let orders = context
        .orders
        .list_orders(OrderQuery {
            user: args.user,
            status: args.status,
            limit: args.limit,
            offset: args.offset,
        })
        .await?;

    if orders.is_empty() {
        println!("no orders found");
        return Ok(());
    }

    println!("{}", render(&orders));

    Ok(())
}

fn render(orders: &[OrderRecord]) -> String {
    let mut builder = Builder::default();

    builder.push_record([
        "Order", "Number", "Status", "Payment", "Items", "Total", "Created",
    ]);

    for order in orders {
        builder.push_record([
            order.uuid.to_string(),
            order.order_number.to_string(),
            order.status.to_string(),
            format!("{} ({})", order.payment_status, order.payment_method),
            order
                .items
                .iter()
                .map(|line| u64::from(line.quantity))
                .sum::<u64>()
                .to_string(),
            order.totals.total_amount.to_string(),
            order.created_at.to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());

    table.to_string()
}
