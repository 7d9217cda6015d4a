//! Run-global mutable state shared by generation workers: unique value
//! pools, sequential counters for uncontrolled composite-unique columns, and
//! per-table primary-key sequences. Each is an owned map behind a mutex;
//! nothing here is a process-wide singleton.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::generate::value::Value;
use crate::schema::types::TableRef;

/// Pre-allocated unique values for a single column, consumed by a shared
/// cursor. The pool itself is immutable after creation; only the cursor
/// moves, under its own mutex.
struct Pool {
    values: Vec<Value>,
    cursor: Mutex<usize>,
}

/// Global unique value pools keyed by `schema.table.column`.
#[derive(Default)]
pub struct UniquePools {
    inner: Mutex<HashMap<String, Arc<Pool>>>,
}

impl UniquePools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_key(table: &TableRef, column: &str) -> String {
        format!("{}.{}", table, column)
    }

    /// Register a pool unless one already exists for the key.
    pub fn insert(&self, key: String, values: Vec<Value>) {
        let mut inner = self.inner.lock().expect("unique pool map poisoned");
        inner.entry(key).or_insert_with(|| {
            Arc::new(Pool {
                values,
                cursor: Mutex::new(0),
            })
        });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("unique pool map poisoned")
            .contains_key(key)
    }

    /// Total size of a pool, regardless of cursor position.
    pub fn size(&self, key: &str) -> Option<usize> {
        self.inner
            .lock()
            .expect("unique pool map poisoned")
            .get(key)
            .map(|p| p.values.len())
    }

    /// Take the next value. `None` once the pool is exhausted; the caller
    /// records a null and downstream NOT NULL validation surfaces the gap.
    pub fn next(&self, key: &str) -> Option<Value> {
        let pool = {
            let inner = self.inner.lock().expect("unique pool map poisoned");
            inner.get(key)?.clone()
        };
        let mut cursor = pool.cursor.lock().expect("pool cursor poisoned");
        if *cursor < pool.values.len() {
            let value = pool.values[*cursor].clone();
            *cursor += 1;
            Some(value)
        } else {
            warn!("exhausted unique value pool for {}", key);
            None
        }
    }
}

/// How many values a worker reserves from a sequential counter at a time.
/// Threads that end early leave gaps in the sequence; the values only need
/// to be unique, not contiguous.
pub const COUNTER_LEASE: u64 = 100;

/// Monotonic counters for uncontrolled columns of composite unique indexes,
/// keyed by `schema.table.column`. Workers take leases of [`COUNTER_LEASE`]
/// values and consume them locally to keep the mutex cold.
#[derive(Default)]
pub struct SequentialCounters {
    inner: Mutex<HashMap<String, u64>>,
}

impl SequentialCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `span` consecutive values and return the first.
    pub fn reserve(&self, key: &str, span: u64) -> u64 {
        let mut inner = self.inner.lock().expect("sequential counter map poisoned");
        let next = inner.entry(key.to_string()).or_insert(0);
        let start = *next;
        *next += span;
        start
    }
}

/// A worker's local view of the sequential counters: one in-flight lease per
/// column, refilled from the shared map when drained.
pub struct CounterLease<'a> {
    counters: &'a SequentialCounters,
    windows: HashMap<String, (u64, u64)>,
}

impl<'a> CounterLease<'a> {
    pub fn new(counters: &'a SequentialCounters) -> Self {
        Self {
            counters,
            windows: HashMap::new(),
        }
    }

    pub fn next(&mut self, key: &str) -> u64 {
        if let Some((next, end)) = self.windows.get_mut(key) {
            if next < end {
                let value = *next;
                *next += 1;
                return value;
            }
        }
        let start = self.counters.reserve(key, COUNTER_LEASE);
        self.windows
            .insert(key.to_string(), (start + 1, start + COUNTER_LEASE));
        start
    }
}

/// Primary-key sequences for tables that must emit explicit PK values,
/// seeded from `max(1, AUTO_INCREMENT, MAX(pk) + 1)` at introspection time.
#[derive(Default)]
pub struct PkSequences {
    inner: Mutex<HashMap<TableRef, i64>>,
}

impl PkSequences {
    pub fn from_starts(starts: HashMap<TableRef, i64>) -> Self {
        Self {
            inner: Mutex::new(starts),
        }
    }

    pub fn has(&self, table: &TableRef) -> bool {
        self.inner
            .lock()
            .expect("pk sequence map poisoned")
            .contains_key(table)
    }

    pub fn next(&self, table: &TableRef) -> Option<i64> {
        let mut inner = self.inner.lock().expect("pk sequence map poisoned");
        let next = inner.get_mut(table)?;
        let value = *next;
        *next += 1;
        Some(value)
    }
}

/// All shared generation state for one run.
pub struct GenerationState {
    pub pools: UniquePools,
    pub counters: SequentialCounters,
    pub pk_sequences: PkSequences,
}

impl GenerationState {
    pub fn new(pk_starts: HashMap<TableRef, i64>) -> Self {
        Self {
            pools: UniquePools::new(),
            counters: SequentialCounters::new(),
            pk_sequences: PkSequences::from_starts(pk_starts),
        }
    }
}
