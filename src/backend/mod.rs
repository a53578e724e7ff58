//! Pooled IRIS backend executor (spec §4.8).
mod connection;
mod pool;

pub use connection::{IrisConnection, TxStatus};
pub use pool::{BackendPool, PooledConnection};

use std::time::Duration;

use crate::types::{Oid, Value};

/// Connection parameters for the IRIS backend (spec §6 CLI/env vars).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub namespace: String,
    pub pool_size: usize,
    /// Per-query timeout enforced by the pool (spec §5).
    pub query_timeout: Duration,
}

/// One output column of a [`QueryResult`] (spec §4.8).
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_oid: Oid,
    pub type_len: i16,
}

/// The result of `execute(sql, params)` (spec §4.8): column descriptors, the
/// (buffered) row set, and a row-count hint for `CommandComplete`'s tag.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<Value>>,
    pub command_tag: String,
    pub row_count_hint: Option<u64>,
}
