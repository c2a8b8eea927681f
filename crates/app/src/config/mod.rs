//! Configuration
//!
//! `clap` argument groups with environment fallbacks. Binaries flatten the groups they need.

pub mod checkout;
pub mod db;
pub mod logging;

pub use checkout::{CheckoutConfig, CheckoutSettings};
pub use db::DatabaseConfig;
pub use logging::{LogFormat, LoggingConfig};
