//! Whole-table replacement on a [`RemoteStore`].
//!
//! The store offers no truncate, so a table is replaced in three steps:
//!
//! 1. **Discover** the columns of the remote table from one of its rows.
//! 2. **Clear** it with a `neq` filter on the first discovered column against
//!    a sentinel no real row holds.
//! 3. **Insert** the new rows in fixed-size batches, in order.
//!
//! Steps 1 and 2 are best-effort: a failure is logged and the sync goes on
//! to the insert. Step 3 stops at the first failed or short batch.

use serde::Serialize;

use super::{FilterOp, Record, RemoteStore};
use crate::error::{SyncError, SyncResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::Table;

/// Rows per insert request.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Value compared against with `neq` to match every non-null row.
pub const DEFAULT_CLEAR_SENTINEL: &str = "-999999999";

/// Options of a table sync
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Rows per insert request; `0` is treated as `1`.
    pub batch_size: usize,
    pub clear_sentinel: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            clear_sentinel: DEFAULT_CLEAR_SENTINEL.to_string(),
        }
    }
}

/// What happened to the rows already in the remote table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClearOutcome {
    /// No column could be discovered, so no delete was sent.
    Skipped,
    Cleared { rows: usize },
    /// The delete succeeded but matched nothing.
    NothingDeleted,
    Failed { error: String },
}

/// Result of a successful table sync
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub table: String,
    /// Remote columns found during discovery (empty if none).
    pub columns: Vec<String>,
    pub clear: ClearOutcome,
    pub batches: usize,
    pub rows_inserted: usize,
}

/// Replace the contents of the remote table named after `table`.
pub async fn sync_table<S: RemoteStore>(
    store: &S,
    table: &Table,
    options: &SyncOptions,
) -> SyncResult<SyncReport> {
    let name = table.name();
    log_info(format!("Syncing '{}' ({} rows)", name, table.len()));

    let columns = discover_columns(store, name).await;
    let clear = match columns.first() {
        Some(first) => clear_table(store, name, first, &options.clear_sentinel).await,
        None => {
            log_info_indent(format!("No columns discovered on '{}', skipping clear", name), 1);
            ClearOutcome::Skipped
        }
    };

    let payload = normalize_payload(table);
    let batch_size = options.batch_size.max(1);
    let total_batches = payload.len().div_ceil(batch_size);
    let mut rows_inserted = 0;

    for (index, chunk) in payload.chunks(batch_size).enumerate() {
        let batch = index + 1;
        let start = index * batch_size;
        let rows = start..start + chunk.len();

        let acknowledged = store
            .insert_batch(name, chunk)
            .await
            .map_err(|source| SyncError::Remote {
                table: name.to_string(),
                batch,
                total_batches,
                rows: rows.clone(),
                source,
            })?;

        if acknowledged != chunk.len() {
            return Err(SyncError::BatchMismatch {
                table: name.to_string(),
                batch,
                total_batches,
                rows,
                sent: chunk.len(),
                acknowledged,
            });
        }

        rows_inserted += acknowledged;
        log_info_indent(format!("Batch {}/{}: {} rows", batch, total_batches, acknowledged), 1);
    }

    log_success(format!("Synced {} rows to '{}'", rows_inserted, name));
    Ok(SyncReport {
        table: name.to_string(),
        columns,
        clear,
        batches: total_batches,
        rows_inserted,
    })
}

/// Column names of one remote row, in the order the store returns them.
async fn discover_columns<S: RemoteStore>(store: &S, table: &str) -> Vec<String> {
    match store.select_limited(table, 1).await {
        Ok(rows) => rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default(),
        Err(e) => {
            log_warning(format!("Could not read columns of '{}': {}", table, e));
            Vec::new()
        }
    }
}

async fn clear_table<S: RemoteStore>(
    store: &S,
    table: &str,
    column: &str,
    sentinel: &str,
) -> ClearOutcome {
    match store.delete_where(table, column, FilterOp::Neq, sentinel).await {
        Ok(0) => {
            log_warning(format!("Clearing '{}' deleted no rows", table));
            ClearOutcome::NothingDeleted
        }
        Ok(rows) => {
            log_info_indent(format!("Cleared {} existing rows from '{}'", rows, table), 1);
            ClearOutcome::Cleared { rows }
        }
        Err(e) => {
            log_warning(format!("Could not clear '{}', inserting anyway: {}", table, e));
            ClearOutcome::Failed { error: e.to_string() }
        }
    }
}

/// Convert every row of `table` into a store record.
///
/// Keys follow the table's column order; missing values become `null` and
/// dates become `YYYY-MM-DD` strings.
pub fn normalize_payload(table: &Table) -> Vec<Record> {
    table
        .rows()
        .iter()
        .map(|row| {
            table
                .columns()
                .iter()
                .zip(row)
                .map(|(column, cell)| (column.clone(), cell.to_json()))
                .collect()
        })
        .collect()
}
