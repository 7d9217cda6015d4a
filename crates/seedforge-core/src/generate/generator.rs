//! Per-table row generation. Produces candidate rows in which FK columns are
//! deliberately left null (the FK resolver fills them afterwards) while every
//! other column already satisfies its type, NOT NULL, UNIQUE, and enum/set
//! constraints.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::config::{ColumnSpec, TableConfig};
use crate::error::{Result, SeedForgeError};
use crate::generate::defaults::{default_value, generate_with_spec, suffix_unique};
use crate::generate::pools::{CounterLease, GenerationState, UniquePools};
use crate::generate::value::{tuple_key, Value};
use crate::resolve::constraints::build_unique_pool;
use crate::schema::types::{
    ColumnKind, ColumnMeta, CompositeFk, ForeignKey, SchemaSet, StaticKey, TableMeta, TableRef,
    UniqueIndex,
};

pub type Row = IndexMap<String, Value>;

/// Everything a worker needs to generate rows for one table, computed once
/// per `(table, batch)` before any chunk is spawned.
pub struct GenPlan<'a> {
    pub node: &'a TableRef,
    pub meta: &'a TableMeta,
    pub schema: &'a SchemaSet,
    pub cfg: Option<&'a TableConfig>,
    /// Normalized populate_columns; `None` when the config entry had no
    /// `populate_columns` key.
    pub populate: Option<HashMap<String, ColumnSpec>>,
    pub fk_columns: &'a BTreeSet<String>,
    pub explicit_pk: bool,
    pub single_unique: BTreeSet<String>,
    pub composite_uniques: Vec<&'a UniqueIndex>,
    pub all_unique: BTreeSet<String>,
    /// Uncontrolled columns of composite uniques; receive monotonic values.
    pub sequential: BTreeSet<String>,
    /// Columns named by conditional FK predicates.
    pub discriminators: BTreeSet<String>,
    pub static_cols: HashMap<String, StaticKey>,
}

/// Classify a table's columns by generation strategy.
pub fn classify<'a>(
    meta: &'a TableMeta,
    schema: &'a SchemaSet,
    cfg: Option<&'a TableConfig>,
    uniques: &'a [UniqueIndex],
    fk_columns: &'a BTreeSet<String>,
    fks: &[ForeignKey],
    composite_fks: &[CompositeFk],
) -> GenPlan<'a> {
    let node = &meta.table;
    let populate = cfg.and_then(|c| c.populate_map());

    let mut single_unique = BTreeSet::new();
    let mut composite_uniques = Vec::new();
    for uc in uniques {
        if uc.is_composite() {
            composite_uniques.push(uc);
        } else {
            single_unique.insert(uc.columns[0].clone());
        }
    }
    let mut all_unique = single_unique.clone();
    for uc in &composite_uniques {
        all_unique.extend(uc.columns.iter().cloned());
    }

    let mut discriminators = BTreeSet::new();
    for fk in fks {
        if &fk.child == node {
            if let Some(cond) = &fk.condition {
                discriminators.insert(cond.column.clone());
            }
        }
    }
    for comp in composite_fks {
        if &comp.child == node {
            if let Some(cond) = &comp.condition {
                discriminators.insert(cond.column.clone());
            }
        }
    }

    // A composite-unique column with no value source of its own would
    // collide under random generation, so it switches to a counter — but
    // only when the index also has controlled columns to combine with.
    let mut sequential = BTreeSet::new();
    for uc in &composite_uniques {
        let mut controlled = Vec::new();
        let mut uncontrolled = Vec::new();
        for col_name in &uc.columns {
            let spec_controlled = populate
                .as_ref()
                .and_then(|m| m.get(col_name))
                .map(|s| s.is_controlled())
                .unwrap_or(false);
            let enum_discriminator = discriminators.contains(col_name)
                && meta
                    .column(col_name)
                    .map(|c| c.kind == ColumnKind::Enum)
                    .unwrap_or(false);
            let is_fk = fk_columns.contains(col_name);
            let is_pk = meta.is_pk(col_name);

            if spec_controlled || enum_discriminator || is_fk || is_pk {
                controlled.push(col_name);
            } else {
                uncontrolled.push(col_name);
            }
        }
        if !controlled.is_empty() && !uncontrolled.is_empty() {
            debug!(
                "{}: composite unique {} uses sequential generation for {:?}",
                node, uc.name, uncontrolled
            );
            sequential.extend(uncontrolled.into_iter().cloned());
        }
    }

    let static_cols = cfg
        .map(|c| {
            c.static_fks
                .iter()
                .map(|sf| (sf.column.clone(), sf.key()))
                .collect()
        })
        .unwrap_or_default();

    GenPlan {
        node,
        meta,
        schema,
        cfg,
        populate,
        fk_columns,
        explicit_pk: schema.is_explicit_pk(node),
        single_unique,
        composite_uniques,
        all_unique,
        sequential,
        discriminators,
        static_cols,
    }
}

impl GenPlan<'_> {
    fn spec_for(&self, column: &str) -> Option<&ColumnSpec> {
        self.populate.as_ref().and_then(|m| m.get(column))
    }

    fn is_configured(&self, column: &str) -> bool {
        self.populate
            .as_ref()
            .map(|m| m.contains_key(column))
            .unwrap_or(false)
    }
}

/// Pre-allocate shared unique pools for the table's single-column uniques
/// that carry a `values` or `min`/`max` configuration. Runs once per table
/// before any worker starts; short pools warn and generation continues.
pub fn init_unique_pools(plan: &GenPlan, num_rows: u64, pools: &UniquePools, rng: &mut StdRng) {
    for col_name in &plan.single_unique {
        if plan.meta.is_pk(col_name) {
            continue;
        }
        let spec = match plan.spec_for(col_name) {
            Some(spec) if spec.is_controlled() => spec,
            _ => continue,
        };
        let key = UniquePools::pool_key(plan.node, col_name);
        if pools.contains(&key) {
            continue;
        }
        let col = match plan.meta.column(col_name) {
            Some(col) => col,
            None => continue,
        };
        let pool = build_unique_pool(col, spec, num_rows as usize, rng);
        if (pool.len() as u64) < num_rows {
            warn!(
                "{}: UNIQUE column {} has insufficient unique values ({} available, {} needed); \
                 expand the range or reduce the row count",
                plan.node,
                col_name,
                pool.len(),
                num_rows
            );
        }
        debug!(
            "{}: created global unique pool for {} with {} values",
            plan.node,
            col_name,
            pool.len()
        );
        pools.insert(key, pool);
    }
}

/// Generate all rows for one table, chunked across worker threads when the
/// request is large enough. Chunk results are concatenated in chunk order,
/// so a single-threaded run yields a stable row sequence.
pub fn generate_table(
    plan: &GenPlan,
    num_rows: u64,
    state: &GenerationState,
    seed: u64,
    threads: usize,
    orchestrator_rng: &mut StdRng,
) -> Result<Vec<Row>> {
    init_unique_pools(plan, num_rows, &state.pools, orchestrator_rng);

    let pooled = pooled_columns(plan, &state.pools);
    let threads = threads.max(1);

    // A unique column whose domain is smaller than the request caps the
    // table's row count.
    let mut num_rows = num_rows;
    for col in &pooled {
        if let Some(size) = state.pools.size(&UniquePools::pool_key(plan.node, col)) {
            if (size as u64) < num_rows {
                warn!(
                    "{}: unique column {} supports only {} rows of the {} requested; truncating",
                    plan.node, col, size, num_rows
                );
                num_rows = size as u64;
            }
        }
    }

    if num_rows < 1000 || threads < 2 {
        let mut rng = StdRng::seed_from_u64(chunk_seed(seed, plan.node, 0));
        return Ok(generate_chunk(plan, 0, num_rows, &pooled, &mut rng, state));
    }

    let chunk_size = (num_rows / (threads as u64 * 4)).max(100);
    let chunks: Vec<(u64, u64)> = (0..num_rows)
        .step_by(chunk_size as usize)
        .map(|start| (start, (start + chunk_size).min(num_rows)))
        .collect();

    let results: Vec<Mutex<Vec<Row>>> = chunks.iter().map(|_| Mutex::new(Vec::new())).collect();
    let next_chunk = AtomicUsize::new(0);

    let panicked = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| loop {
                    let idx = next_chunk.fetch_add(1, Ordering::SeqCst);
                    if idx >= chunks.len() {
                        break;
                    }
                    let (start, end) = chunks[idx];
                    let mut rng = StdRng::seed_from_u64(chunk_seed(seed, plan.node, start));
                    let rows = generate_chunk(plan, start, end, &pooled, &mut rng, state);
                    *results[idx].lock().expect("chunk slot poisoned") = rows;
                })
            })
            .collect();
        // Join every handle so the scope never re-panics on exit.
        handles
            .into_iter()
            .fold(false, |acc, h| h.join().is_err() || acc)
    });

    if panicked {
        return Err(SeedForgeError::WorkerPanic {
            table: plan.node.to_string(),
        });
    }

    let mut all_rows = Vec::with_capacity(num_rows as usize);
    for slot in results {
        all_rows.extend(slot.into_inner().expect("chunk slot poisoned"));
    }
    Ok(all_rows)
}

fn pooled_columns(plan: &GenPlan, pools: &UniquePools) -> BTreeSet<String> {
    plan.single_unique
        .iter()
        .filter(|col| {
            !plan.meta.is_pk(col)
                && plan
                    .spec_for(col)
                    .map(|s| s.is_controlled())
                    .unwrap_or(false)
                && pools.contains(&UniquePools::pool_key(plan.node, col))
        })
        .cloned()
        .collect()
}

/// Derive a chunk's random stream from the run seed, the table identity, and
/// the chunk's starting row, so regeneration is reproducible per table.
fn chunk_seed(seed: u64, node: &TableRef, chunk_start: u64) -> u64 {
    seed.wrapping_add(fnv64(&node.to_string()))
        .wrapping_add(chunk_start)
}

fn fnv64(s: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}

/// Generate rows for `[start, end)`. Composite-unique duplicates inside the
/// chunk are dropped with a warning.
fn generate_chunk(
    plan: &GenPlan,
    start: u64,
    end: u64,
    pooled: &BTreeSet<String>,
    rng: &mut StdRng,
    state: &GenerationState,
) -> Vec<Row> {
    let mut rows = Vec::with_capacity((end - start) as usize);
    let mut lease = CounterLease::new(&state.counters);
    let mut trackers: HashMap<&str, HashSet<String>> = plan
        .composite_uniques
        .iter()
        .map(|uc| (uc.name.as_str(), HashSet::new()))
        .collect();

    for batch_idx in start..end {
        let mut row = generate_row(plan, batch_idx, pooled, rng, state, &mut lease);

        if state.pk_sequences.has(plan.node) && plan.meta.pk_columns.len() == 1 {
            if let Some(value) = state.pk_sequences.next(plan.node) {
                row.insert(plan.meta.pk_columns[0].clone(), Value::Int(value));
            }
        }

        let mut valid = true;
        for uc in &plan.composite_uniques {
            let values: Vec<&Value> = uc
                .columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let key = tuple_key(&values);
            let seen = trackers.get_mut(uc.name.as_str()).expect("tracker exists");
            if !seen.insert(key) {
                warn!(
                    "{}: duplicate in unique index {} at row {}: ({}); dropping row",
                    plan.node,
                    uc.name,
                    batch_idx,
                    values
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                valid = false;
                break;
            }
        }

        if valid {
            rows.push(row);
        }
    }

    rows
}

fn generate_row(
    plan: &GenPlan,
    batch_idx: u64,
    pooled: &BTreeSet<String>,
    rng: &mut StdRng,
    state: &GenerationState,
    lease: &mut CounterLease,
) -> Row {
    let mut row = Row::with_capacity(plan.meta.columns.len());

    for col in &plan.meta.columns {
        let name = col.name.as_str();

        // Database-assigned PKs stay null unless the table is explicit-PK.
        if plan.meta.is_pk(name) && plan.meta.auto_increment && !plan.explicit_pk {
            row.insert(name.to_string(), Value::Null);
            continue;
        }

        if let Some(key) = plan.static_cols.get(name) {
            let value = plan
                .schema
                .static_samples
                .get(key)
                .and_then(|pool| pool.choose(rng))
                .cloned()
                .unwrap_or(Value::Null);
            row.insert(name.to_string(), value);
            continue;
        }

        // FK columns are resolved after generation; discriminators still
        // need a value so conditional predicates can be evaluated.
        if plan.fk_columns.contains(name) && !plan.discriminators.contains(name) {
            row.insert(name.to_string(), Value::Null);
            continue;
        }

        if plan.sequential.contains(name) {
            let counter_key = UniquePools::pool_key(plan.node, name);
            let counter_val = lease.next(&counter_key);
            row.insert(name.to_string(), sequential_value(col, counter_val));
            continue;
        }

        // Nullable columns outside every unique index stay null unless the
        // configuration asks for them (discriminators excepted).
        let in_unique = plan.all_unique.contains(name);
        if col.nullable
            && !in_unique
            && !plan.discriminators.contains(name)
            && !plan.is_configured(name)
        {
            row.insert(name.to_string(), Value::Null);
            continue;
        }

        if pooled.contains(name) {
            let key = UniquePools::pool_key(plan.node, name);
            row.insert(name.to_string(), state.pools.next(&key).unwrap_or(Value::Null));
            continue;
        }

        if let Some(spec) = plan.spec_for(name).filter(|s| s.is_controlled()) {
            let base = generate_with_spec(rng, col, spec);
            if plan.single_unique.contains(name) && col.kind.is_string() {
                if let Value::Str(s) = &base {
                    row.insert(
                        name.to_string(),
                        Value::Str(suffix_unique(s, batch_idx, col.max_chars())),
                    );
                    continue;
                }
            }
            row.insert(name.to_string(), base);
            continue;
        }

        let single = plan.single_unique.contains(name);
        let base = default_value(rng, col, batch_idx, single);
        if single && col.kind.is_string() {
            if let Value::Str(s) = &base {
                row.insert(
                    name.to_string(),
                    Value::Str(suffix_unique(s, batch_idx, col.max_chars())),
                );
                continue;
            }
        }
        row.insert(name.to_string(), base);
    }

    row
}

fn sequential_value(col: &ColumnMeta, counter_val: u64) -> Value {
    match col.kind {
        ColumnKind::Integer => Value::Int(counter_val as i64),
        _ => {
            let text = format!("seq_{:08}", counter_val);
            Value::Str(text.chars().take(col.max_chars()).collect())
        }
    }
}
