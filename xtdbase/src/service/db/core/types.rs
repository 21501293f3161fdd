//! Common type definitions for database service
//!
//! Shared types used across database service modules

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Query result row type - column name to value
pub type QueryRow = HashMap<String, serde_json::Value>;

/// Positional query parameter, bound in order to `?` placeholders
pub type SqlValue = serde_json::Value;

/// Handle of an open transaction, owned by the driver that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub u64);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Result of a data-modifying statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

impl ExecOutcome {
    /// Last insert id for INSERT statements, affected row count otherwise.
    pub fn primary_count(&self, query: &str) -> u64 {
        if is_insert(query) {
            self.last_insert_id
        } else {
            self.rows_affected
        }
    }
}

pub fn is_insert(query: &str) -> bool {
    query
        .trim_start()
        .get(..6)
        .map_or(false, |head| head.eq_ignore_ascii_case("INSERT"))
}

/// Connection statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub size: u32,
    pub idle: u32,
    pub max_connections: u32,
    pub connection_errors: u64,
    pub total_queries: u64,
}
