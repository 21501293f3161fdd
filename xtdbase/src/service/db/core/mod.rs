//! Core database service modules
//!
//! Driver interface, shared types and query helpers

pub mod config;
pub mod driver;
pub mod executor;
pub mod types;

pub use config::{QueryConfig, RetryConfig};
pub use driver::{AsyncDatabase, Connect, MySqlConnector};
pub use executor::{bind_params, row_to_map, QueryLogger};
pub use types::*;
