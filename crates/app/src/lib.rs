//! Checkout application layer: persistence, services, configuration and background tasks.

pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod observability;
pub mod shutdown;
pub mod store;
pub mod tasks;
pub mod uuids;

#[cfg(test)]
mod test;
