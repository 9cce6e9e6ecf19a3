//! Remote relational store.
//!
//! The pipeline only relies on a row-oriented CRUD contract, [`RemoteStore`]:
//! select everything, select a few rows, delete with a single filter, insert
//! a batch. There is no truncate, upsert or transaction primitive.
//!
//! - [`client`] - PostgREST (Supabase) implementation over HTTP
//! - [`memory`] - in-process implementation for dry runs and tests
//! - [`sync`] - whole-table replacement built on the contract

pub mod client;
pub mod memory;
pub mod sync;

use serde_json::{Map, Value};

use crate::error::RemoteResult;

pub use client::RestClient;
pub use memory::{MemoryStore, StoreCall};
pub use sync::{normalize_payload, sync_table, ClearOutcome, SyncOptions, SyncReport};

/// A flat row as exchanged with the store: column name → JSON value.
pub type Record = Map<String, Value>;

/// Comparison operator of a delete filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    /// PostgREST operator name.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
        }
    }
}

/// Row-oriented CRUD contract of the remote store.
///
/// Every call is awaited before the next one is issued; implementations
/// need not support concurrent use.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// All rows of `table`.
    async fn select_all(&self, table: &str) -> RemoteResult<Vec<Record>>;

    /// At most `limit` rows of `table`.
    async fn select_limited(&self, table: &str, limit: usize) -> RemoteResult<Vec<Record>>;

    /// Delete rows where `column <op> value`; returns the number of rows deleted.
    async fn delete_where(
        &self,
        table: &str,
        column: &str,
        op: FilterOp,
        value: &str,
    ) -> RemoteResult<usize>;

    /// Insert `rows`; returns the number of rows the store acknowledged.
    async fn insert_batch(&self, table: &str, rows: &[Record]) -> RemoteResult<usize>;
}
