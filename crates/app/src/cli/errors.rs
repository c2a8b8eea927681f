use std::{io, path::PathBuf};

use checkout_app::{
    context::AppInitError,
    domain::{orders::OrdersServiceError, stock::StockError},
    observability::ObservabilityError,
    shutdown::ShutdownSignalError,
    store::StoreError,
};
use sqlx::migrate::MigrateError;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Observability(#[from] ObservabilityError),

    #[error("failed to initialise application: {0}")]
    Init(#[from] AppInitError),

    #[error("failed to connect to database: {0}")]
    Database(#[source] sqlx::Error),

    #[error("failed to run migrations: {0}")]
    Migrate(#[from] MigrateError),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Catalog(#[from] serde_norway::Error),

    #[error("failed to save product: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Orders(#[from] OrdersServiceError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("{0} order(s) could not be transitioned")]
    Skipped(usize),

    #[error(transparent)]
    Shutdown(#[from] ShutdownSignalError),

    #[error("background task panicked: {0}")]
    Task(#[from] JoinError),
}
