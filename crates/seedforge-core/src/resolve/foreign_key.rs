//! Post-generation foreign-key assignment.
//!
//! Runs once per table, in topological order, after the value generator has
//! produced rows with FK columns left null. Parent values are cached from
//! the already-resolved parent tables; composite FKs copy whole tuples from
//! a single parent row; PK-FK overlaps are pre-allocated so primary keys
//! assembled from parent references stay unique; fully-controlled composite
//! unique indexes are pre-allocated through Cartesian or stratified plans.

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::GeneratorConfig;
use crate::generate::generator::Row;
use crate::generate::value::{tuple_key, Value};
use crate::resolve::constraints::{
    cartesian_product, enumerate_domain, overlap_groups, sample_cartesian, select_tightest,
    shared_columns, shuffle, stratified_sample, Combination, SAMPLING_THRESHOLD,
};
use crate::schema::types::{CompositeFk, ForeignKey, SchemaSet, TableMeta, TableRef, UniqueIndex};
use crate::sql::last_insert_var;

/// Hard cap on materialized combination spaces for stratified balancing.
const STRATIFY_CAP: u128 = 5_000_000;

/// Shared, read-only inputs for FK resolution across the whole run.
pub struct FkResolveContext<'a> {
    pub schema: &'a SchemaSet,
    pub config: &'a GeneratorConfig,
    pub fks: &'a [ForeignKey],
    pub composite_fks: &'a [CompositeFk],
    pub fk_columns: &'a HashMap<TableRef, BTreeSet<String>>,
}

struct UniquePlan {
    cols: Vec<String>,
    tuples: Vec<Vec<Value>>,
}

/// Resolve every FK column of `node`'s rows against the rows already
/// produced for its parents. Returns the surviving rows; rows are only
/// dropped when a composite PK-FK overlap runs out of unique parent
/// combinations, and that is warned once per table.
pub fn resolve_table(
    ctx: &FkResolveContext,
    node: &TableRef,
    generated: &HashMap<TableRef, Vec<Row>>,
    rows: Vec<Row>,
    rng: &mut StdRng,
) -> Vec<Row> {
    let meta = match ctx.schema.table(node) {
        Some(meta) => meta,
        None => return rows,
    };
    if rows.is_empty() {
        return rows;
    }
    let cfg = ctx.config.table(node);
    let populate = cfg.and_then(|c| c.populate_map());

    let empty_cols = BTreeSet::new();
    let all_fk_columns = ctx.fk_columns.get(node).unwrap_or(&empty_cols);
    let pk_fk_columns: BTreeSet<String> = meta
        .pk_columns
        .iter()
        .filter(|c| all_fk_columns.contains(*c))
        .cloned()
        .collect();

    let uniques = ctx.schema.uniques(node);
    let all_unique_cols: BTreeSet<&str> = uniques
        .iter()
        .flat_map(|uc| uc.columns.iter().map(|c| c.as_str()))
        .collect();

    let child_fks: Vec<&ForeignKey> = ctx.fks.iter().filter(|fk| &fk.child == node).collect();

    // --- Parent caches -----------------------------------------------------

    let mut parent_caches: HashMap<String, Vec<Value>> = HashMap::new();
    let mut conditional_caches: HashMap<String, Vec<Value>> = HashMap::new();
    for fk in &child_fks {
        let parent_rows = match generated.get(&fk.parent) {
            Some(rows) => rows,
            None => continue,
        };
        let mut vals: Vec<Value> = parent_rows
            .iter()
            .filter_map(|r| r.get(&fk.parent_column))
            .filter(|v| !v.is_null())
            .cloned()
            .collect();
        if vals.is_empty() && !parent_rows.is_empty() {
            // Auto-assigned parents have no concrete PK values at generation
            // time; children bind to the LAST_INSERT_ID() capture variable.
            if let Some(var) = auto_parent_var(ctx.schema, &fk.parent, &fk.parent_column) {
                vals.push(var);
            }
        }
        if fk.condition.is_some() {
            conditional_caches.insert(fk.name.clone(), vals);
        } else {
            parent_caches.insert(fk.child_column.clone(), vals);
        }
    }

    let mut conditional_by_column: IndexMap<String, Vec<&ForeignKey>> = IndexMap::new();
    for fk in child_fks.iter().copied() {
        if fk.condition.is_some() {
            conditional_by_column
                .entry(fk.child_column.clone())
                .or_default()
                .push(fk);
        }
    }

    // A column served only by conditional FKs still needs a unified pool so
    // Cartesian planning can run over the union of its possible parents.
    for (fk_col, fk_list) in &conditional_by_column {
        if parent_caches.contains_key(fk_col) {
            continue;
        }
        let mut union = Vec::new();
        for fk in fk_list {
            if let Some(vals) = conditional_caches.get(&fk.name) {
                union.extend(vals.iter().cloned());
            }
        }
        let union = dedupe(&union);
        if !union.is_empty() {
            debug!(
                "{}: conditional FK column {} has {} unique parent values across {} FKs",
                node,
                fk_col,
                union.len(),
                fk_list.len()
            );
            parent_caches.insert(fk_col.clone(), union);
        }
    }

    // --- Composite FK caches ----------------------------------------------

    let composite_cfgs: Vec<&CompositeFk> = ctx
        .composite_fks
        .iter()
        .filter(|c| &c.child == node)
        .collect();
    let composite_columns_all: BTreeSet<String> = composite_cfgs
        .iter()
        .flat_map(|c| c.child_columns.iter().cloned())
        .collect();

    let mut filtered_parent_rows: HashMap<String, Vec<&Row>> = HashMap::new();
    for comp in &composite_cfgs {
        if let Some(parent_rows) = generated.get(&comp.parent) {
            let filtered = enum_filtered_rows(meta, comp, parent_rows);
            if filtered.is_empty() && !parent_rows.is_empty() {
                warn!(
                    "{}: no parent rows in {} satisfy the enum domains of {}",
                    node, comp.parent, comp.name
                );
            }
            filtered_parent_rows.insert(comp.name.clone(), filtered);
        }
    }

    // --- PK-FK overlap pre-allocation --------------------------------------

    let mut rows = rows;
    let mut pre_allocated_pk: Option<Vec<Value>> = None;
    let mut pre_allocated_pk_tuples: Option<Vec<Vec<Value>>> = None;
    let mut pre_allocated_pk_cols: Vec<String> = Vec::new();

    if !pk_fk_columns.is_empty() {
        debug!(
            "{}: PK columns {:?} are also FK columns, pre-allocating values",
            node, pk_fk_columns
        );
        if meta.pk_columns.len() == 1 && pk_fk_columns.contains(&meta.pk_columns[0]) {
            let pk_col = &meta.pk_columns[0];
            let mut unique_vals = dedupe(
                parent_caches
                    .get(pk_col)
                    .map(|v| v.as_slice())
                    .unwrap_or(&[]),
            );
            if unique_vals.len() < rows.len() {
                warn!(
                    "{}: requested {} rows but parent has only {} distinct values for PK-FK \
                     column {}; truncating",
                    node,
                    rows.len(),
                    unique_vals.len(),
                    pk_col
                );
                rows.truncate(unique_vals.len());
            }
            shuffle(&mut unique_vals, rng);
            unique_vals.truncate(rows.len());
            pre_allocated_pk = Some(unique_vals);
        } else if meta.pk_columns.len() > 1 {
            let (cols, tuples) = preallocate_composite_pk(
                node,
                meta,
                &composite_cfgs,
                &filtered_parent_rows,
                &parent_caches,
                &pk_fk_columns,
                &composite_columns_all,
                &mut rows,
                rng,
            );
            if !tuples.is_empty() {
                pre_allocated_pk_cols = cols;
                pre_allocated_pk_tuples = Some(tuples);
            }
        }
    }

    // --- Composite-unique pre-allocation -----------------------------------

    let pk_covered: BTreeSet<&str> = if pre_allocated_pk.is_some() {
        meta.pk_columns.iter().map(|c| c.as_str()).collect()
    } else {
        pre_allocated_pk_cols.iter().map(|c| c.as_str()).collect()
    };

    let pool_for = |col: &str| -> Option<Vec<Value>> {
        if all_fk_columns.contains(col) {
            let vals = dedupe(parent_caches.get(col)?.as_slice());
            (!vals.is_empty()).then_some(vals)
        } else {
            let spec = populate.as_ref()?.get(col).filter(|s| s.is_controlled())?;
            enumerate_domain(meta.column(col)?, spec)
        }
    };

    let unique_plans = preallocate_composite_uniques(
        node,
        uniques,
        &pk_covered,
        &pool_for,
        &mut rows,
        rng,
    );
    let unique_preassigned: BTreeSet<&str> = unique_plans
        .iter()
        .flat_map(|p| p.cols.iter().map(|c| c.as_str()))
        .collect();

    // --- Composite PK-FK overlap tracking (case 3) -------------------------

    let mut overlap_tracked: HashSet<&str> = HashSet::new();
    for comp in &composite_cfgs {
        let overlap: BTreeSet<&String> = comp
            .child_columns
            .iter()
            .filter(|c| meta.is_pk(c))
            .collect();
        if overlap.is_empty() || meta.pk_columns.len() <= 1 {
            continue;
        }
        if pre_allocated_pk_tuples.is_some() {
            let pre_set: BTreeSet<&String> = pre_allocated_pk_cols.iter().collect();
            let covered = overlap.iter().any(|c| pre_set.contains(*c));
            if covered || pre_set.len() >= 2 {
                debug!(
                    "{}: composite PK-FK overlap check skipped for {}; pre-assigned columns \
                     {:?} ensure uniqueness",
                    node, comp.name, pre_allocated_pk_cols
                );
                continue;
            }
        }
        overlap_tracked.insert(comp.name.as_str());
    }

    let mut used_pk_combos: HashSet<String> = HashSet::new();

    // --- Row processing ----------------------------------------------------

    let mut resolved = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    let mut logged_skips: HashSet<&str> = HashSet::new();

    for (row_idx, mut row) in rows.into_iter().enumerate() {
        if let Some(tuples) = &pre_allocated_pk_tuples {
            if let Some(tuple) = tuples.get(row_idx) {
                for (i, col) in pre_allocated_pk_cols.iter().enumerate() {
                    row.insert(col.clone(), tuple[i].clone());
                }
            }
        }
        for plan in &unique_plans {
            if let Some(tuple) = plan.tuples.get(row_idx) {
                for (i, col) in plan.cols.iter().enumerate() {
                    row.insert(col.clone(), tuple[i].clone());
                }
            }
        }

        let mut row_skipped = false;
        for comp in &composite_cfgs {
            let valid_parents = match filtered_parent_rows.get(&comp.name) {
                Some(parents) if !parents.is_empty() => parents,
                _ => continue,
            };
            if let Some(cond) = &comp.condition {
                if !cond.matches(&row) {
                    continue;
                }
            }

            // Deterministic unique integers (counter/batch-index values)
            // must not be overwritten.
            let keeps_unique_int = comp.child_columns.iter().any(|cc| {
                all_unique_cols.contains(cc.as_str())
                    && row.get(cc).map(|v| !v.is_null()).unwrap_or(false)
                    && meta
                        .column(cc)
                        .map(|m| m.kind.is_integer())
                        .unwrap_or(false)
                    && !unique_preassigned.contains(cc.as_str())
            });
            if keeps_unique_int {
                continue;
            }

            if comp
                .child_columns
                .iter()
                .any(|c| unique_preassigned.contains(c.as_str()))
            {
                if logged_skips.insert(comp.name.as_str()) {
                    debug!(
                        "{}: composite FK {} skipped; its columns are pre-assigned by a \
                         unique-index plan",
                        node, comp.name
                    );
                }
                continue;
            }

            if pre_allocated_pk_tuples.is_some() {
                let fk_pk_overlap: BTreeSet<&String> = comp
                    .child_columns
                    .iter()
                    .filter(|c| meta.is_pk(c))
                    .collect();
                let pre_set: BTreeSet<&String> = pre_allocated_pk_cols.iter().collect();
                if !fk_pk_overlap.is_empty() && fk_pk_overlap.iter().all(|c| pre_set.contains(*c))
                {
                    if logged_skips.insert(comp.name.as_str()) {
                        debug!(
                            "{}: composite FK {} skipped; PK columns already pre-assigned",
                            node, comp.name
                        );
                    }
                    continue;
                }
            }

            // Optional probabilistic population for fully nullable
            // composite FKs.
            if let Some(rate) = comp.population_rate {
                let all_nullable = comp
                    .child_columns
                    .iter()
                    .all(|c| meta.column(c).map(|m| m.nullable).unwrap_or(false));
                let touches_pk = comp.child_columns.iter().any(|c| meta.is_pk(c));
                if all_nullable && !touches_pk && rng.random::<f64>() >= rate {
                    continue;
                }
            }

            let has_pk_fk = comp
                .child_columns
                .iter()
                .any(|c| pk_fk_columns.contains(c));

            if has_pk_fk && pre_allocated_pk.is_some() {
                let pk_col = comp
                    .child_columns
                    .iter()
                    .find(|c| pk_fk_columns.contains(*c))
                    .expect("checked above");
                let idx_in_comp = comp
                    .child_columns
                    .iter()
                    .position(|c| c == pk_col)
                    .expect("column present");
                let parent_col = &comp.parent_columns[idx_in_comp];
                let target = pre_allocated_pk
                    .as_ref()
                    .and_then(|vals| vals.get(row_idx));
                if let Some(target) = target {
                    let matching: Vec<&&Row> = valid_parents
                        .iter()
                        .filter(|pr| pr.get(parent_col) == Some(target))
                        .collect();
                    if let Some(parent_row) = matching.choose(rng) {
                        copy_composite(&mut row, comp, parent_row);
                    }
                }
            } else if overlap_tracked.contains(comp.name.as_str()) {
                let mut shuffled: Vec<&Row> = valid_parents.clone();
                shuffle(&mut shuffled, rng);
                let mut found = false;
                for parent_row in shuffled {
                    let mut test_row = row.clone();
                    copy_composite(&mut test_row, comp, parent_row);
                    let pk_values: Vec<&Value> = meta
                        .pk_columns
                        .iter()
                        .map(|c| test_row.get(c).unwrap_or(&Value::Null))
                        .collect();
                    let key = tuple_key(&pk_values);
                    if !used_pk_combos.contains(&key) {
                        copy_composite(&mut row, comp, parent_row);
                        used_pk_combos.insert(key);
                        found = true;
                        break;
                    }
                }
                if !found {
                    row_skipped = true;
                    skipped += 1;
                    break;
                }
            } else if let Some(parent_row) = valid_parents.choose(rng) {
                copy_composite(&mut row, comp, parent_row);
            }
        }
        if row_skipped {
            continue;
        }

        // Conditional FKs: first predicate match per column wins.
        let mut assigned_by_conditional: HashSet<&str> = HashSet::new();
        for (fk_col, fk_list) in &conditional_by_column {
            if composite_columns_all.contains(fk_col)
                || unique_preassigned.contains(fk_col.as_str())
            {
                continue;
            }
            if cfg.map(|c| c.static_fk_for(fk_col).is_some()).unwrap_or(false) {
                continue;
            }
            if pre_allocated_pk_tuples.is_some() && pk_fk_columns.contains(fk_col) {
                continue;
            }
            for fk in fk_list {
                let cond = fk.condition.as_ref().expect("conditional FK");
                if !cond.matches(&row) {
                    continue;
                }
                match conditional_caches.get(&fk.name) {
                    Some(vals) if !vals.is_empty() => {
                        let value = vals.choose(rng).expect("non-empty").clone();
                        row.insert(fk_col.clone(), value);
                        assigned_by_conditional.insert(fk_col.as_str());
                    }
                    _ => {
                        debug!(
                            "{}: conditional FK {} matched but no parent values are available",
                            node, fk.name
                        );
                    }
                }
                break;
            }
        }

        // Remaining unconditional FKs.
        for fk in &child_fks {
            if fk.condition.is_some() {
                continue;
            }
            let fk_col = &fk.child_column;
            if assigned_by_conditional.contains(fk_col.as_str())
                || composite_columns_all.contains(fk_col)
                || unique_preassigned.contains(fk_col.as_str())
            {
                continue;
            }
            if cfg.map(|c| c.static_fk_for(fk_col).is_some()).unwrap_or(false) {
                continue;
            }
            if pre_allocated_pk_tuples.is_some() && pk_fk_columns.contains(fk_col) {
                continue;
            }
            let nullable = meta.column(fk_col).map(|m| m.nullable).unwrap_or(true);
            if !nullable {
                let value = if pre_allocated_pk.is_some() && pk_fk_columns.contains(fk_col) {
                    pre_allocated_pk
                        .as_ref()
                        .and_then(|vals| vals.get(row_idx))
                        .cloned()
                } else {
                    parent_caches
                        .get(fk_col)
                        .and_then(|vals| vals.choose(rng))
                        .cloned()
                };
                row.insert(fk_col.clone(), value.unwrap_or(Value::Null));
            } else if let Some(rate) = cfg.and_then(|c| c.fk_population_rate.get(fk_col)) {
                if rng.random::<f64>() < *rate {
                    if let Some(value) = parent_caches.get(fk_col).and_then(|v| v.choose(rng)) {
                        row.insert(fk_col.clone(), value.clone());
                    }
                }
            }
        }

        resolved.push(row);
    }

    if skipped > 0 {
        warn!(
            "{}: skipped {} rows; not enough unique parent combinations for the composite \
             PK-FK overlap",
            node, skipped
        );
    }

    resolved
}

/// The `@last_<schema>_<table>` singleton for children of auto-assigned,
/// non-explicit parents whose referenced column is the auto PK itself.
fn auto_parent_var(schema: &SchemaSet, parent: &TableRef, column: &str) -> Option<Value> {
    let meta = schema.table(parent)?;
    if schema.is_explicit_pk(parent) {
        return None;
    }
    (meta.auto_pk_column() == Some(column)).then(|| Value::Var(last_insert_var(parent)))
}

fn dedupe(values: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.unique_key()))
        .cloned()
        .collect()
}

fn copy_composite(row: &mut Row, comp: &CompositeFk, parent_row: &Row) {
    for (child_col, parent_col) in comp.child_columns.iter().zip(&comp.parent_columns) {
        let value = parent_row.get(parent_col).cloned().unwrap_or(Value::Null);
        row.insert(child_col.clone(), value);
    }
}

/// Keep only parent rows whose referenced values fall inside the child's
/// declared enum domains. Null parent values never qualify.
fn enum_filtered_rows<'a>(
    meta: &TableMeta,
    comp: &CompositeFk,
    parent_rows: &'a [Row],
) -> Vec<&'a Row> {
    let mut validators: Vec<(&String, HashSet<&str>)> = Vec::new();
    for (child_col, parent_col) in comp.child_columns.iter().zip(&comp.parent_columns) {
        if let Some(col) = meta.column(child_col) {
            if !col.allowed_values.is_empty() && col.kind == crate::schema::types::ColumnKind::Enum
            {
                validators.push((
                    parent_col,
                    col.allowed_values.iter().map(String::as_str).collect(),
                ));
            }
        }
    }
    if validators.is_empty() {
        return parent_rows.iter().collect();
    }
    parent_rows
        .iter()
        .filter(|r| {
            validators.iter().all(|(parent_col, allowed)| {
                matches!(r.get(*parent_col), Some(Value::Str(s)) if allowed.contains(s.as_str()))
            })
        })
        .collect()
}

/// Hybrid Cartesian pre-allocation for multi-column PKs whose columns are
/// single-column FKs and/or covered by composite FKs. Returns the ordered
/// PK columns and one tuple per row; empty when no plan is possible.
#[allow(clippy::too_many_arguments)]
fn preallocate_composite_pk(
    node: &TableRef,
    meta: &TableMeta,
    composite_cfgs: &[&CompositeFk],
    filtered_parent_rows: &HashMap<String, Vec<&Row>>,
    parent_caches: &HashMap<String, Vec<Value>>,
    pk_fk_columns: &BTreeSet<String>,
    composite_columns_all: &BTreeSet<String>,
    rows: &mut Vec<Row>,
    rng: &mut StdRng,
) -> (Vec<String>, Vec<Vec<Value>>) {
    let single_fk_pk_cols: Vec<String> = meta
        .pk_columns
        .iter()
        .filter(|c| pk_fk_columns.contains(*c) && !composite_columns_all.contains(*c))
        .cloned()
        .collect();
    let composite_with_pk: Vec<&CompositeFk> = composite_cfgs
        .iter()
        .filter(|c| c.child_columns.iter().any(|cc| meta.is_pk(cc)))
        .copied()
        .collect();

    debug!(
        "{}: PK {:?}; single-column FK-PK columns {:?}; composite FKs with PK overlap {:?}",
        node,
        meta.pk_columns,
        single_fk_pk_cols,
        composite_with_pk.iter().map(|c| &c.name).collect::<Vec<_>>()
    );

    if single_fk_pk_cols.is_empty() && composite_with_pk.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut pk_value_pools: Vec<Vec<Value>> = Vec::new();
    for pk_col in &single_fk_pk_cols {
        let unique_vals = dedupe(
            parent_caches
                .get(pk_col)
                .map(|v| v.as_slice())
                .unwrap_or(&[]),
        );
        if unique_vals.is_empty() {
            warn!(
                "{}: no parent values available for PK-FK column {}; cannot pre-allocate",
                node, pk_col
            );
            pk_value_pools.clear();
            break;
        }
        pk_value_pools.push(unique_vals);
    }

    // Unique parent tuples on the PK-overlapping subset of the first
    // composite FK that has one; later overlapping composite FKs would need
    // cross-FK merging and are resolved row-by-row instead.
    let mut comp_combo_cols: Vec<String> = Vec::new();
    let mut comp_combos: Vec<Vec<Value>> = Vec::new();
    for comp in &composite_with_pk {
        let parent_rows = match filtered_parent_rows.get(&comp.name) {
            Some(rows) if !rows.is_empty() => rows,
            _ => continue,
        };
        let pk_cols_in_fk: Vec<String> = meta
            .pk_columns
            .iter()
            .filter(|c| comp.child_columns.contains(c))
            .cloned()
            .collect();
        let child_to_parent: HashMap<&String, &String> = comp
            .child_columns
            .iter()
            .zip(&comp.parent_columns)
            .collect();
        let parent_cols_for_pk: Vec<&String> = pk_cols_in_fk
            .iter()
            .map(|c| *child_to_parent.get(c).expect("mapped column"))
            .collect();

        let mut seen = HashSet::new();
        let mut combos = Vec::new();
        for pr in parent_rows {
            let tuple: Vec<Value> = parent_cols_for_pk
                .iter()
                .map(|pc| pr.get(*pc).cloned().unwrap_or(Value::Null))
                .collect();
            if tuple.iter().any(|v| v.is_null()) {
                continue;
            }
            let key = tuple_key(&tuple.iter().collect::<Vec<_>>());
            if seen.insert(key) {
                combos.push(tuple);
            }
        }
        if !combos.is_empty() {
            debug!(
                "{}: composite FK {} contributes {} unique combinations for PK columns {:?}",
                node,
                comp.name,
                combos.len(),
                pk_cols_in_fk
            );
            comp_combos = combos;
            comp_combo_cols = pk_cols_in_fk;
            break;
        }
    }

    if pk_value_pools.is_empty() && comp_combos.is_empty() {
        debug!(
            "{}: cannot pre-allocate PK tuples; no parent values reachable",
            node
        );
        return (Vec::new(), Vec::new());
    }

    let mut max_combinations: u128 = 1;
    if !comp_combos.is_empty() {
        max_combinations = max_combinations.saturating_mul(comp_combos.len() as u128);
    }
    for pool in &pk_value_pools {
        max_combinations = max_combinations.saturating_mul(pool.len() as u128);
    }

    let mut needed = rows.len();
    if max_combinations < needed as u128 {
        warn!(
            "{}: requested {} rows but only {} unique PK combinations exist; truncating",
            node, needed, max_combinations
        );
        rows.truncate(max_combinations as usize);
        needed = rows.len();
    }

    // Only columns whose value source actually materialized take part;
    // tuple positions must line up with this list exactly.
    let all_pk_cols_in_order: Vec<String> = meta
        .pk_columns
        .iter()
        .filter(|c| {
            comp_combo_cols.contains(c)
                || (!pk_value_pools.is_empty() && single_fk_pk_cols.contains(c))
        })
        .cloned()
        .collect();

    let tuples = if !comp_combos.is_empty() && !pk_value_pools.is_empty() {
        hybrid_tuples(
            &all_pk_cols_in_order,
            &comp_combo_cols,
            &comp_combos,
            &single_fk_pk_cols,
            &pk_value_pools,
            needed,
            max_combinations,
            rng,
        )
    } else if !comp_combos.is_empty() {
        let mut combos = comp_combos;
        shuffle(&mut combos, rng);
        combos.truncate(needed);
        combos
    } else {
        sample_cartesian(&pk_value_pools, needed, rng)
    };

    debug!(
        "{}: pre-allocated {} unique PK tuples for columns {:?}",
        node,
        tuples.len(),
        all_pk_cols_in_order
    );
    (all_pk_cols_in_order, tuples)
}

/// Merge composite-FK tuples with single-column FK pools into full PK
/// tuples, sampling without replacement above the materialization threshold.
#[allow(clippy::too_many_arguments)]
fn hybrid_tuples(
    all_pk_cols: &[String],
    comp_cols: &[String],
    comp_combos: &[Vec<Value>],
    single_cols: &[String],
    single_pools: &[Vec<Value>],
    needed: usize,
    max_combinations: u128,
    rng: &mut StdRng,
) -> Vec<Vec<Value>> {
    let merge = |comp_combo: &[Value], single_combo: &[Value]| -> Vec<Value> {
        all_pk_cols
            .iter()
            .map(|pk_col| {
                if let Some(pos) = comp_cols.iter().position(|c| c == pk_col) {
                    comp_combo[pos].clone()
                } else {
                    let pos = single_cols
                        .iter()
                        .position(|c| c == pk_col)
                        .expect("column in one of the pools");
                    single_combo[pos].clone()
                }
            })
            .collect()
    };

    if (needed as u128) < max_combinations && max_combinations > SAMPLING_THRESHOLD {
        let mut seen = HashSet::new();
        let mut tuples = Vec::with_capacity(needed);
        let max_attempts = needed * 10;
        let mut attempts = 0;
        while tuples.len() < needed && attempts < max_attempts {
            let comp_combo = comp_combos.choose(rng).expect("non-empty");
            let single_combo: Vec<Value> = single_pools
                .iter()
                .map(|pool| pool.choose(rng).expect("non-empty").clone())
                .collect();
            let tuple = merge(comp_combo, &single_combo);
            let key = tuple_key(&tuple.iter().collect::<Vec<_>>());
            if seen.insert(key) {
                tuples.push(tuple);
            }
            attempts += 1;
        }
        if tuples.len() >= needed {
            return tuples;
        }
    }

    let mut all = Vec::new();
    for comp_combo in comp_combos {
        for single_combo in cartesian_product(single_pools) {
            all.push(merge(comp_combo, &single_combo));
        }
    }
    shuffle(&mut all, rng);
    all.truncate(needed);
    all
}

/// Pre-allocate value tuples for composite unique indexes whose every
/// column is controlled (an FK with a parent pool, or a configured domain).
/// Overlapping groups get stratified sampling so all members hold at once;
/// independent indexes get a plain Cartesian plan.
fn preallocate_composite_uniques(
    node: &TableRef,
    uniques: &[UniqueIndex],
    pk_covered: &BTreeSet<&str>,
    pool_for: &dyn Fn(&str) -> Option<Vec<Value>>,
    rows: &mut Vec<Row>,
    rng: &mut StdRng,
) -> Vec<UniquePlan> {
    let candidates: Vec<&UniqueIndex> = uniques
        .iter()
        .filter(|uc| uc.is_composite())
        .filter(|uc| !uc.columns.iter().any(|c| pk_covered.contains(c.as_str())))
        .filter(|uc| uc.columns.iter().all(|c| pool_for(c).is_some()))
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut plans = Vec::new();
    for group in overlap_groups(&candidates) {
        let plan = if group.len() == 1 {
            cartesian_plan(node, group[0], pool_for, rows, rng)
        } else {
            let shared = shared_columns(&group);
            match shared.iter().next() {
                Some(primary) => {
                    stratified_plan(node, &group, primary, pool_for, rows, rng)
                }
                None => {
                    // Pairwise overlap without a common column: satisfy the
                    // tightest member and let row validation police the rest.
                    let mut sizes = HashMap::new();
                    for uc in &group {
                        for col in &uc.columns {
                            if let Some(pool) = pool_for(col) {
                                sizes.insert(col.clone(), pool.len() as u128);
                            }
                        }
                    }
                    select_tightest(&group, &sizes)
                        .and_then(|(uc, _)| cartesian_plan(node, uc, pool_for, rows, rng))
                }
            }
        };
        if let Some(plan) = plan {
            plans.push(plan);
        }
    }
    plans
}

fn cartesian_plan(
    node: &TableRef,
    index: &UniqueIndex,
    pool_for: &dyn Fn(&str) -> Option<Vec<Value>>,
    rows: &mut Vec<Row>,
    rng: &mut StdRng,
) -> Option<UniquePlan> {
    let lists: Vec<Vec<Value>> = index
        .columns
        .iter()
        .map(|c| pool_for(c))
        .collect::<Option<_>>()?;
    let product: u128 = lists.iter().map(|l| l.len() as u128).product();
    if product < rows.len() as u128 {
        warn!(
            "{}: unique index {} admits only {} combinations but {} rows were requested; \
             truncating",
            node,
            index.name,
            product,
            rows.len()
        );
        rows.truncate(product as usize);
    }
    let tuples = sample_cartesian(&lists, rows.len(), rng);
    debug!(
        "{}: pre-allocated {} tuples for unique index {}",
        node,
        tuples.len(),
        index.name
    );
    Some(UniquePlan {
        cols: index.columns.clone(),
        tuples,
    })
}

fn stratified_plan(
    node: &TableRef,
    group: &[&UniqueIndex],
    primary: &str,
    pool_for: &dyn Fn(&str) -> Option<Vec<Value>>,
    rows: &mut Vec<Row>,
    rng: &mut StdRng,
) -> Option<UniquePlan> {
    let mut union_cols: Vec<String> = vec![primary.to_string()];
    for uc in group {
        for col in &uc.columns {
            if !union_cols.contains(col) {
                union_cols.push(col.clone());
            }
        }
    }
    let shared = shared_columns(group);
    let diversity_cols: Vec<String> = union_cols
        .iter()
        .filter(|c| !shared.contains(*c))
        .cloned()
        .collect();

    let shared_pool = pool_for(primary)?;
    let rest_cols = &union_cols[1..];
    let rest_pools: Vec<Vec<Value>> = rest_cols
        .iter()
        .map(|c| pool_for(c))
        .collect::<Option<_>>()?;

    let mut sizes: HashMap<String, u128> = HashMap::new();
    sizes.insert(primary.to_string(), shared_pool.len() as u128);
    for (col, pool) in rest_cols.iter().zip(&rest_pools) {
        sizes.insert(col.clone(), pool.len() as u128);
    }
    if let Some((tightest, estimate)) = select_tightest(group, &sizes) {
        debug!(
            "{}: overlapping unique indexes {:?}; tightest is {} ({:?})",
            node,
            group.iter().map(|u| &u.name).collect::<Vec<_>>(),
            tightest.name,
            estimate
        );
    }

    let total: u128 = rest_pools
        .iter()
        .fold(shared_pool.len() as u128, |acc, p| {
            acc.saturating_mul(p.len() as u128)
        });
    if total > STRATIFY_CAP {
        warn!(
            "{}: combination space of overlapping unique indexes is too large to balance \
             ({} combinations); sampling without stratification",
            node, total
        );
        let mut lists = vec![shared_pool];
        lists.extend(rest_pools);
        if total < rows.len() as u128 {
            rows.truncate(total as usize);
        }
        let tuples = sample_cartesian(&lists, rows.len(), rng);
        return Some(UniquePlan {
            cols: union_cols,
            tuples,
        });
    }

    let rest_product = cartesian_product(&rest_pools);
    let mut combinations: Vec<Combination> =
        Vec::with_capacity(shared_pool.len() * rest_product.len().max(1));
    for shared_val in &shared_pool {
        for rest_tuple in &rest_product {
            let mut combo = Combination::with_capacity(union_cols.len());
            combo.insert(primary.to_string(), shared_val.clone());
            for (col, value) in rest_cols.iter().zip(rest_tuple) {
                combo.insert(col.clone(), value.clone());
            }
            combinations.push(combo);
        }
    }

    if combinations.len() < rows.len() {
        warn!(
            "{}: overlapping unique indexes admit only {} combinations but {} rows were \
             requested; truncating",
            node,
            combinations.len(),
            rows.len()
        );
        rows.truncate(combinations.len());
    }

    let selected = stratified_sample(combinations, primary, &diversity_cols, rows.len(), rng);
    if selected.len() < rows.len() {
        rows.truncate(selected.len());
    }

    let tuples: Vec<Vec<Value>> = selected
        .into_iter()
        .map(|combo| {
            union_cols
                .iter()
                .map(|c| combo.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    debug!(
        "{}: stratified plan covers columns {:?} with {} tuples",
        node,
        union_cols,
        tuples.len()
    );
    Some(UniquePlan {
        cols: union_cols,
        tuples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::schema::types::{ColumnMeta, TableMeta};
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn table(schema_set: &mut SchemaSet, name: &str, cols: Vec<ColumnMeta>, pk: &[&str]) {
        let tref = TableRef::new("db", name);
        let mut meta = TableMeta::new(tref.clone());
        meta.columns = cols;
        meta.pk_columns = pk.iter().map(|s| s.to_string()).collect();
        schema_set.tables.insert(tref, meta);
    }

    fn not_null(name: &str, data_type: &str) -> ColumnMeta {
        let mut c = ColumnMeta::new(name, data_type, data_type);
        c.nullable = false;
        c
    }

    fn nullable(name: &str, data_type: &str) -> ColumnMeta {
        ColumnMeta::new(name, data_type, data_type)
    }

    fn int_row(pairs: &[(&str, i64)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Int(*v)))
            .collect()
    }

    fn fk(child: &str, child_col: &str, parent: &str, parent_col: &str) -> ForeignKey {
        ForeignKey {
            name: format!("fk_{}_{}", child, child_col),
            child: TableRef::new("db", child),
            child_column: child_col.to_string(),
            parent: TableRef::new("db", parent),
            parent_column: parent_col.to_string(),
            is_logical: false,
            condition: None,
        }
    }

    fn fk_columns_map(entries: &[(&str, &[&str])]) -> HashMap<TableRef, BTreeSet<String>> {
        entries
            .iter()
            .map(|(t, cols)| {
                (
                    TableRef::new("db", *t),
                    cols.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect()
    }

    fn empty_config(tables: &[&str]) -> GeneratorConfig {
        let entries: Vec<String> = tables
            .iter()
            .map(|t| format!(r#"{{"schema": "db", "table": "{}"}}"#, t))
            .collect();
        GeneratorConfig::from_json(&format!("[{}]", entries.join(","))).unwrap()
    }

    #[test]
    fn test_not_null_fk_assigned_from_parent_values() {
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "child",
            vec![not_null("id", "int"), not_null("p_id", "int")],
            &["id"],
        );
        table(&mut schema, "parent", vec![not_null("id", "int")], &["id"]);

        let config = empty_config(&["child", "parent"]);
        let fks = vec![fk("child", "p_id", "parent", "id")];
        let fk_cols = fk_columns_map(&[("child", &["p_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "parent"),
            (1..=5).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );

        let rows: Vec<Row> = (0..20)
            .map(|i| {
                let mut r = int_row(&[("id", i)]);
                r.insert("p_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        assert_eq!(resolved.len(), 20);
        for row in &resolved {
            let v = row.get("p_id").unwrap().as_int().unwrap();
            assert!((1..=5).contains(&v));
        }
    }

    #[test]
    fn test_nullable_fk_left_null_without_rate() {
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "child",
            vec![not_null("id", "int"), nullable("p_id", "int")],
            &["id"],
        );
        table(&mut schema, "parent", vec![not_null("id", "int")], &["id"]);

        let config = empty_config(&["child", "parent"]);
        let fks = vec![fk("child", "p_id", "parent", "id")];
        let fk_cols = fk_columns_map(&[("child", &["p_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "parent"),
            vec![int_row(&[("id", 1)])],
        );

        let rows: Vec<Row> = (0..5)
            .map(|i| {
                let mut r = int_row(&[("id", i)]);
                r.insert("p_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        assert!(resolved.iter().all(|r| r.get("p_id").unwrap().is_null()));
    }

    #[test]
    fn test_fk_population_rate_populates_nullable() {
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "child",
            vec![not_null("id", "int"), nullable("p_id", "int")],
            &["id"],
        );
        table(&mut schema, "parent", vec![not_null("id", "int")], &["id"]);

        let config = GeneratorConfig::from_json(
            r#"[{"schema": "db", "table": "child", "fk_population_rate": {"p_id": 1.0}},
                {"schema": "db", "table": "parent"}]"#,
        )
        .unwrap();
        let fks = vec![fk("child", "p_id", "parent", "id")];
        let fk_cols = fk_columns_map(&[("child", &["p_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "parent"),
            vec![int_row(&[("id", 7)])],
        );

        let rows: Vec<Row> = (0..10)
            .map(|i| {
                let mut r = int_row(&[("id", i)]);
                r.insert("p_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        // rate 1.0 populates every row
        assert!(resolved
            .iter()
            .all(|r| r.get("p_id").unwrap() == &Value::Int(7)));
    }

    #[test]
    fn test_single_pk_fk_preallocation_truncates_and_stays_unique() {
        let mut schema = SchemaSet::default();
        table(&mut schema, "child", vec![not_null("p_id", "int")], &["p_id"]);
        table(&mut schema, "parent", vec![not_null("id", "int")], &["id"]);

        let config = empty_config(&["child", "parent"]);
        let fks = vec![fk("child", "p_id", "parent", "id")];
        let fk_cols = fk_columns_map(&[("child", &["p_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "parent"),
            (1..=4).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );

        let rows: Vec<Row> = (0..10)
            .map(|_| {
                let mut r = Row::new();
                r.insert("p_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        // Only 4 distinct parent values exist.
        assert_eq!(resolved.len(), 4);
        let distinct: HashSet<i64> = resolved
            .iter()
            .map(|r| r.get("p_id").unwrap().as_int().unwrap())
            .collect();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_junction_table_enumerates_full_product() {
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "j",
            vec![not_null("a_id", "int"), not_null("b_id", "int")],
            &["a_id", "b_id"],
        );
        table(&mut schema, "a", vec![not_null("id", "int")], &["id"]);
        table(&mut schema, "b", vec![not_null("id", "int")], &["id"]);

        let config = empty_config(&["j", "a", "b"]);
        let fks = vec![fk("j", "a_id", "a", "id"), fk("j", "b_id", "b", "id")];
        let fk_cols = fk_columns_map(&[("j", &["a_id", "b_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "a"),
            (1..=10).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );
        generated.insert(
            TableRef::new("db", "b"),
            (1..=10).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );

        let rows: Vec<Row> = (0..100)
            .map(|_| {
                let mut r = Row::new();
                r.insert("a_id".to_string(), Value::Null);
                r.insert("b_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "j");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        assert_eq!(resolved.len(), 100);

        // The 100 tuples enumerate the full 10x10 product exactly once each.
        let pairs: HashSet<(i64, i64)> = resolved
            .iter()
            .map(|r| {
                (
                    r.get("a_id").unwrap().as_int().unwrap(),
                    r.get("b_id").unwrap().as_int().unwrap(),
                )
            })
            .collect();
        assert_eq!(pairs.len(), 100);
    }

    #[test]
    fn test_composite_fk_copies_from_single_parent_row() {
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "child",
            vec![
                not_null("id", "int"),
                nullable("px", "int"),
                nullable("py", "int"),
            ],
            &["id"],
        );
        table(
            &mut schema,
            "pair",
            vec![not_null("x", "int"), not_null("y", "int")],
            &["x", "y"],
        );

        let config = empty_config(&["child", "pair"]);
        let comp = CompositeFk {
            name: "LOGICAL_child_px_py".to_string(),
            child: TableRef::new("db", "child"),
            child_columns: vec!["px".to_string(), "py".to_string()],
            parent: TableRef::new("db", "pair"),
            parent_columns: vec!["x".to_string(), "y".to_string()],
            condition: None,
            population_rate: None,
        };
        let composite_fks = vec![comp];
        let fk_cols = fk_columns_map(&[("child", &["px", "py"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &[],
            composite_fks: &composite_fks,
            fk_columns: &fk_cols,
        };

        // Parent rows pair x with y = x * 100; a row-consistent copy must
        // preserve that relation.
        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "pair"),
            (1..=8)
                .map(|i| int_row(&[("x", i), ("y", i * 100)]))
                .collect::<Vec<_>>(),
        );

        let rows: Vec<Row> = (0..30)
            .map(|i| {
                let mut r = int_row(&[("id", i)]);
                r.insert("px".to_string(), Value::Null);
                r.insert("py".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        assert_eq!(resolved.len(), 30);
        for row in &resolved {
            let x = row.get("px").unwrap().as_int().unwrap();
            let y = row.get("py").unwrap().as_int().unwrap();
            assert_eq!(y, x * 100, "tuple must come from one parent row");
        }
    }

    #[test]
    fn test_composite_fk_enum_filtering() {
        let mut schema = SchemaSet::default();
        let mut kind_col = ColumnMeta::new("kind", "enum", "enum('W','H')");
        kind_col.nullable = true;
        table(
            &mut schema,
            "child",
            vec![not_null("id", "int"), kind_col, nullable("ref_id", "int")],
            &["id"],
        );
        table(
            &mut schema,
            "parent",
            vec![
                not_null("id", "int"),
                not_null("kind", "varchar"),
            ],
            &["id"],
        );

        let config = empty_config(&["child", "parent"]);
        let comp = CompositeFk {
            name: "LOGICAL_child_kind_ref".to_string(),
            child: TableRef::new("db", "child"),
            child_columns: vec!["kind".to_string(), "ref_id".to_string()],
            parent: TableRef::new("db", "parent"),
            parent_columns: vec!["kind".to_string(), "id".to_string()],
            condition: None,
            population_rate: None,
        };
        let composite_fks = vec![comp];
        let fk_cols = fk_columns_map(&[("child", &["kind", "ref_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &[],
            composite_fks: &composite_fks,
            fk_columns: &fk_cols,
        };

        // Parent kinds include 'M', outside the child's enum('W','H').
        let mut generated = HashMap::new();
        let parent_rows: Vec<Row> = [("W", 1), ("H", 2), ("M", 3)]
            .iter()
            .map(|(kind, id)| {
                let mut r = Row::new();
                r.insert("id".to_string(), Value::Int(*id));
                r.insert("kind".to_string(), Value::Str(kind.to_string()));
                r
            })
            .collect();
        generated.insert(TableRef::new("db", "parent"), parent_rows);

        let rows: Vec<Row> = (0..40)
            .map(|i| {
                let mut r = int_row(&[("id", i)]);
                r.insert("kind".to_string(), Value::Null);
                r.insert("ref_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        for row in &resolved {
            let kind = row.get("kind").unwrap().as_str().unwrap();
            let id = row.get("ref_id").unwrap().as_int().unwrap();
            assert!(kind == "W" || kind == "H");
            assert!(id == 1 || id == 2);
        }
    }

    #[test]
    fn test_conditional_fk_first_match_wins() {
        use crate::resolve::condition::FkPredicate;

        let mut schema = SchemaSet::default();
        let kind = not_null("kind", "enum");
        table(
            &mut schema,
            "child",
            vec![not_null("id", "int"), kind, not_null("ref_id", "int")],
            &["id"],
        );
        table(&mut schema, "w", vec![not_null("id", "int")], &["id"]);
        table(&mut schema, "h", vec![not_null("id", "int")], &["id"]);

        let config = empty_config(&["child", "w", "h"]);
        let mut fk_w = fk("child", "ref_id", "w", "id");
        fk_w.name = "fk_w".to_string();
        fk_w.condition = FkPredicate::parse("kind = 'W'");
        let mut fk_h = fk("child", "ref_id", "h", "id");
        fk_h.name = "fk_h".to_string();
        fk_h.condition = FkPredicate::parse("kind = 'H'");
        let fks = vec![fk_w, fk_h];
        let fk_cols = fk_columns_map(&[("child", &["ref_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "w"),
            (100..105).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );
        generated.insert(
            TableRef::new("db", "h"),
            (200..205).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );

        let rows: Vec<Row> = (0..30)
            .map(|i| {
                let mut r = int_row(&[("id", i)]);
                r.insert(
                    "kind".to_string(),
                    Value::Str(if i % 2 == 0 { "W" } else { "H" }.to_string()),
                );
                r.insert("ref_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        assert_eq!(resolved.len(), 30);
        for row in &resolved {
            let kind = row.get("kind").unwrap().as_str().unwrap();
            let id = row.get("ref_id").unwrap().as_int().unwrap();
            match kind {
                "W" => assert!((100..105).contains(&id)),
                "H" => assert!((200..205).contains(&id)),
                other => panic!("unexpected kind {}", other),
            }
        }
    }

    #[test]
    fn test_unique_plan_balances_fk_and_values() {
        // UNIQUE(a_id, pr) with a_id an FK over 30 parents and pr configured
        // values [0, 1]; 60 rows must pair each parent with both pr values.
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "ac",
            vec![
                not_null("id", "int"),
                not_null("a_id", "int"),
                not_null("pr", "tinyint"),
            ],
            &["id"],
        );
        table(&mut schema, "a", vec![not_null("id", "int")], &["id"]);
        schema.unique_indexes.insert(
            TableRef::new("db", "ac"),
            vec![UniqueIndex::new(
                "unique_a_pr",
                vec!["a_id".to_string(), "pr".to_string()],
            )],
        );

        let config = GeneratorConfig::from_json(
            r#"[{"schema": "db", "table": "ac",
                 "populate_columns": [{"column": "pr", "values": [0, 1]}]},
                {"schema": "db", "table": "a"}]"#,
        )
        .unwrap();
        let fks = vec![fk("ac", "a_id", "a", "id")];
        let fk_cols = fk_columns_map(&[("ac", &["a_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "a"),
            (1..=30).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );

        let rows: Vec<Row> = (0..60)
            .map(|i| {
                let mut r = int_row(&[("id", i), ("pr", 0)]);
                r.insert("a_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "ac");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        assert_eq!(resolved.len(), 60);

        let mut tuples = HashSet::new();
        let mut per_a: HashMap<i64, usize> = HashMap::new();
        for row in &resolved {
            let a = row.get("a_id").unwrap().as_int().unwrap();
            let pr = row.get("pr").unwrap().as_int().unwrap();
            assert!(tuples.insert((a, pr)), "duplicate ({}, {})", a, pr);
            assert!(pr == 0 || pr == 1);
            *per_a.entry(a).or_default() += 1;
        }
        // 60 rows over 30 parents x 2 pr values = the full product.
        assert_eq!(per_a.len(), 30);
        assert!(per_a.values().all(|&n| n == 2));
    }

    #[test]
    fn test_overlapping_unique_plans_hold_simultaneously() {
        // UNIQUE(a,c) and UNIQUE(a,p): stratified planning must satisfy both.
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "t",
            vec![
                not_null("id", "int"),
                not_null("a", "int"),
                not_null("c", "int"),
                not_null("p", "int"),
            ],
            &["id"],
        );
        table(&mut schema, "pa", vec![not_null("id", "int")], &["id"]);
        schema.unique_indexes.insert(
            TableRef::new("db", "t"),
            vec![
                UniqueIndex::new("u_a_c", vec!["a".to_string(), "c".to_string()]),
                UniqueIndex::new("u_a_p", vec!["a".to_string(), "p".to_string()]),
            ],
        );

        let config = GeneratorConfig::from_json(
            r#"[{"schema": "db", "table": "t",
                 "populate_columns": [
                     {"column": "c", "min": 1, "max": 10},
                     {"column": "p", "values": [0, 1]}
                 ]},
                {"schema": "db", "table": "pa"}]"#,
        )
        .unwrap();
        let fks = vec![fk("t", "a", "pa", "id")];
        let fk_cols = fk_columns_map(&[("t", &["a"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        let mut generated = HashMap::new();
        generated.insert(
            TableRef::new("db", "pa"),
            (1..=50).map(|i| int_row(&[("id", i)])).collect::<Vec<_>>(),
        );

        let rows: Vec<Row> = (0..100)
            .map(|i| {
                let mut r = int_row(&[("id", i), ("c", 0), ("p", 0)]);
                r.insert("a".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "t");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        assert_eq!(resolved.len(), 100);

        let mut ac = HashSet::new();
        let mut ap = HashSet::new();
        let mut per_a: HashMap<i64, usize> = HashMap::new();
        for row in &resolved {
            let a = row.get("a").unwrap().as_int().unwrap();
            let c = row.get("c").unwrap().as_int().unwrap();
            let p = row.get("p").unwrap().as_int().unwrap();
            assert!(ac.insert((a, c)), "duplicate (a,c) = ({}, {})", a, c);
            assert!(ap.insert((a, p)), "duplicate (a,p) = ({}, {})", a, p);
            *per_a.entry(a).or_default() += 1;
        }
        // 100 rows over 50 shared values: each appears exactly twice.
        assert_eq!(per_a.len(), 50);
        assert!(per_a.values().all(|&n| n == 2));
    }

    #[test]
    fn test_auto_parent_var_binding() {
        let mut schema = SchemaSet::default();
        table(
            &mut schema,
            "child",
            vec![not_null("id", "int"), not_null("p_id", "int")],
            &["id"],
        );
        let parent_ref = TableRef::new("db", "parent");
        let mut parent_meta = TableMeta::new(parent_ref.clone());
        parent_meta.columns = vec![not_null("id", "int")];
        parent_meta.pk_columns = vec!["id".to_string()];
        parent_meta.auto_increment = true;
        schema.tables.insert(parent_ref.clone(), parent_meta);

        let config = empty_config(&["child", "parent"]);
        let fks = vec![fk("child", "p_id", "parent", "id")];
        let fk_cols = fk_columns_map(&[("child", &["p_id"])]);
        let ctx = FkResolveContext {
            schema: &schema,
            config: &config,
            fks: &fks,
            composite_fks: &[],
            fk_columns: &fk_cols,
        };

        // Parent rows exist, but their auto PK is null at generation time.
        let mut generated = HashMap::new();
        let parent_rows: Vec<Row> = (0..3)
            .map(|_| {
                let mut r = Row::new();
                r.insert("id".to_string(), Value::Null);
                r
            })
            .collect();
        generated.insert(parent_ref, parent_rows);

        let rows: Vec<Row> = (0..5)
            .map(|i| {
                let mut r = int_row(&[("id", i)]);
                r.insert("p_id".to_string(), Value::Null);
                r
            })
            .collect();

        let node = TableRef::new("db", "child");
        let resolved = resolve_table(&ctx, &node, &generated, rows, &mut rng());
        for row in &resolved {
            assert_eq!(
                row.get("p_id").unwrap(),
                &Value::Var("@last_db_parent".to_string())
            );
        }
    }
}
