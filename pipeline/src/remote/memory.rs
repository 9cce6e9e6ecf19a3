//! In-process [`RemoteStore`] for dry runs and tests.
//!
//! Tables are created on first insert. Every call is recorded, and faults
//! can be injected per table to exercise the partial-failure paths of a
//! sync without a network.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{FilterOp, Record, RemoteStore};
use crate::error::{RemoteError, RemoteResult};

/// A call received by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    SelectAll { table: String },
    SelectLimited { table: String, limit: usize },
    Delete {
        table: String,
        column: String,
        op: FilterOp,
        value: String,
    },
    Insert { table: String, rows: usize },
}

impl StoreCall {
    pub fn table(&self) -> &str {
        match self {
            StoreCall::SelectAll { table }
            | StoreCall::SelectLimited { table, .. }
            | StoreCall::Delete { table, .. }
            | StoreCall::Insert { table, .. } => table,
        }
    }
}

/// A column filled by the store when an inserted row leaves it empty
#[derive(Debug, Clone)]
struct Serial {
    column: String,
    next: i64,
}

#[derive(Debug, Default)]
struct Faults {
    unreachable: HashSet<String>,
    failing_selects: HashSet<String>,
    failing_deletes: HashSet<String>,
    /// table -> (1-based insert number, rows dropped)
    short_acks: HashMap<String, (usize, usize)>,
    /// table -> 1-based insert number
    failing_inserts: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Vec<Record>>,
    serials: HashMap<String, Serial>,
    inserts_seen: HashMap<String, usize>,
    calls: Vec<StoreCall>,
    faults: Faults,
}

/// Remote store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with existing rows
    pub fn with_table(self, table: &str, rows: Vec<Record>) -> Self {
        self.lock().tables.insert(table.to_string(), rows);
        self
    }

    /// Let the store assign increasing ids to `column` of `table`
    pub fn with_serial_column(self, table: &str, column: &str) -> Self {
        self.lock().serials.insert(
            table.to_string(),
            Serial {
                column: column.to_string(),
                next: 1,
            },
        );
        self
    }

    /// Every call on `table` fails as if the store could not be reached
    pub fn unreachable(self, table: &str) -> Self {
        self.lock().faults.unreachable.insert(table.to_string());
        self
    }

    /// Selects on `table` time out; deletes and inserts still work
    pub fn failing_selects(self, table: &str) -> Self {
        self.lock().faults.failing_selects.insert(table.to_string());
        self
    }

    /// Deletes on `table` are refused
    pub fn failing_deletes(self, table: &str) -> Self {
        self.lock().faults.failing_deletes.insert(table.to_string());
        self
    }

    /// The `nth` insert on `table` stores and acknowledges `missing` fewer rows
    pub fn short_ack(self, table: &str, nth: usize, missing: usize) -> Self {
        self.lock().faults.short_acks.insert(table.to_string(), (nth, missing));
        self
    }

    /// The `nth` insert on `table` is rejected
    pub fn failing_insert(self, table: &str, nth: usize) -> Self {
        self.lock().faults.failing_inserts.insert(table.to_string(), nth);
        self
    }

    /// Current rows of `table`
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Row counts of each insert on `table`, in order
    pub fn insert_sizes(&self, table: &str) -> Vec<usize> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::Insert { table: t, rows } if t == table => Some(*rows),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: StoreCall) -> RemoteResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        let table = call.table().to_string();
        state.calls.push(call);
        if state.faults.unreachable.contains(&table) {
            return Err(RemoteError::Unavailable(format!(
                "connection to '{}' refused",
                table
            )));
        }
        Ok(state)
    }
}

impl RemoteStore for MemoryStore {
    async fn select_all(&self, table: &str) -> RemoteResult<Vec<Record>> {
        let state = self.record(StoreCall::SelectAll {
            table: table.to_string(),
        })?;
        check_select(&state, table)?;
        Ok(state.tables.get(table).cloned().unwrap_or_default())
    }

    async fn select_limited(&self, table: &str, limit: usize) -> RemoteResult<Vec<Record>> {
        let state = self.record(StoreCall::SelectLimited {
            table: table.to_string(),
            limit,
        })?;
        check_select(&state, table)?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_where(
        &self,
        table: &str,
        column: &str,
        op: FilterOp,
        value: &str,
    ) -> RemoteResult<usize> {
        let mut state = self.record(StoreCall::Delete {
            table: table.to_string(),
            column: column.to_string(),
            op,
            value: value.to_string(),
        })?;
        if state.faults.failing_deletes.contains(table) {
            return Err(RemoteError::AuthFailure(format!(
                "permission denied for table {}",
                table
            )));
        }

        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches_filter(row.get(column), op, value));
        Ok(before - rows.len())
    }

    async fn insert_batch(&self, table: &str, rows: &[Record]) -> RemoteResult<usize> {
        let mut state = self.record(StoreCall::Insert {
            table: table.to_string(),
            rows: rows.len(),
        })?;

        let nth = {
            let seen = state.inserts_seen.entry(table.to_string()).or_insert(0);
            *seen += 1;
            *seen
        };
        if state.faults.failing_inserts.get(table) == Some(&nth) {
            return Err(RemoteError::Rejected {
                status: 409,
                message: format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    table
                ),
            });
        }
        let keep = match state.faults.short_acks.get(table) {
            Some(&(at, missing)) if at == nth => rows.len().saturating_sub(missing),
            _ => rows.len(),
        };

        let mut stored: Vec<Record> = rows[..keep].to_vec();
        if let Some(serial) = state.serials.get_mut(table) {
            for row in &mut stored {
                if row.get(&serial.column).map_or(true, Value::is_null) {
                    row.insert(serial.column.clone(), Value::from(serial.next));
                    serial.next += 1;
                }
            }
        }

        state.tables.entry(table.to_string()).or_default().extend(stored);
        Ok(keep)
    }
}

fn check_select(state: &State, table: &str) -> RemoteResult<()> {
    if state.faults.failing_selects.contains(table) {
        return Err(RemoteError::Unavailable(format!(
            "timed out reading '{}'",
            table
        )));
    }
    Ok(())
}

/// SQL-style filter: a missing or null cell never matches.
fn matches_filter(cell: Option<&Value>, op: FilterOp, value: &str) -> bool {
    let Some(cell) = cell.filter(|v| !v.is_null()) else {
        return false;
    };

    let ordering = match (cell.as_f64(), value.parse::<f64>().ok()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => {
            let text = match cell {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(text.as_str().cmp(value))
        }
    };
    let Some(ordering) = ordering else {
        return false;
    };

    match op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Neq => ordering != Ordering::Equal,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Lte => ordering != Ordering::Greater,
    }
}
