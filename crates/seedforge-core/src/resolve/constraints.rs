//! Combinatorial decisions about unique indexes: classification, overlap
//! grouping, tightest-constraint estimation, Cartesian product construction,
//! stratified sampling, and unique value pool building.
//!
//! Nothing in this module aborts a run. Insufficient combinations surface as
//! warnings and the caller truncates.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Duration;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::{parse_date, ColumnSpec};
use crate::generate::defaults::{config_value, rand_string};
use crate::generate::value::{tuple_key, Value};
use crate::schema::types::{ColumnKind, ColumnMeta, UniqueIndex};

/// Above this Cartesian product size, sampling without replacement is tried
/// before full materialization.
pub const SAMPLING_THRESHOLD: u128 = 100_000;

/// Domains larger than this are never enumerated into memory; a column with
/// such a range is treated as non-enumerable for pre-allocation planning.
const ENUMERATION_CAP: u128 = 1_000_000;

/// A table's unique indexes split by arity.
#[derive(Debug, Default)]
pub struct UniqueClassification<'a> {
    /// Columns under a single-column unique index.
    pub single: BTreeSet<&'a str>,
    /// Indexes spanning two or more columns.
    pub composite: Vec<&'a UniqueIndex>,
    /// Union of all composite index columns.
    pub composite_cols: BTreeSet<&'a str>,
}

pub fn classify_unique_indexes(indexes: &[UniqueIndex]) -> UniqueClassification<'_> {
    let mut out = UniqueClassification::default();
    for uc in indexes {
        if uc.is_composite() {
            out.composite.push(uc);
            out.composite_cols
                .extend(uc.columns.iter().map(|c| c.as_str()));
        } else {
            out.single.insert(uc.columns[0].as_str());
        }
    }
    out
}

/// Partition composite indexes into groups by transitive column overlap.
/// Every index lands in exactly one group; members are ordered by index name
/// so plans are stable across runs.
pub fn overlap_groups<'a>(composites: &[&'a UniqueIndex]) -> Vec<Vec<&'a UniqueIndex>> {
    let n = composites.len();
    let mut group_of: Vec<usize> = (0..n).collect();

    fn root(group_of: &mut Vec<usize>, i: usize) -> usize {
        let mut i = i;
        while group_of[i] != i {
            group_of[i] = group_of[group_of[i]];
            i = group_of[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let overlap = composites[i]
                .columns
                .iter()
                .any(|c| composites[j].columns.contains(c));
            if overlap {
                let (a, b) = (root(&mut group_of, i), root(&mut group_of, j));
                if a != b {
                    group_of[a] = b;
                }
            }
        }
    }

    let mut grouped: IndexMap<usize, Vec<&UniqueIndex>> = IndexMap::new();
    for i in 0..n {
        let r = root(&mut group_of, i);
        grouped.entry(r).or_default().push(composites[i]);
    }
    let mut groups: Vec<Vec<&UniqueIndex>> = grouped.into_values().collect();
    for group in &mut groups {
        group.sort_by(|a, b| a.name.cmp(&b.name));
    }
    groups.sort_by(|a, b| a[0].name.cmp(&b[0].name));
    groups
}

/// Columns present in every index of a group.
pub fn shared_columns(group: &[&UniqueIndex]) -> BTreeSet<String> {
    let mut iter = group.iter();
    let mut shared: BTreeSet<String> = match iter.next() {
        Some(uc) => uc.columns.iter().cloned().collect(),
        None => return BTreeSet::new(),
    };
    for uc in iter {
        shared.retain(|c| uc.columns.contains(c));
    }
    shared
}

/// Estimated combination count of an index; `Unknown` behaves as infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    Known(u128),
    Unknown,
}

impl Estimate {
    fn rank(&self) -> u128 {
        match self {
            Estimate::Known(n) => *n,
            Estimate::Unknown => u128::MAX,
        }
    }
}

impl PartialOrd for Estimate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Estimate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Estimate the combination count of an index as the product of per-column
/// domain sizes. A column absent from `sizes` makes the estimate `Unknown`.
pub fn estimate_combinations(index: &UniqueIndex, sizes: &HashMap<String, u128>) -> Estimate {
    let mut total: u128 = 1;
    for col in &index.columns {
        match sizes.get(col) {
            Some(size) => total = total.saturating_mul(*size),
            None => return Estimate::Unknown,
        }
    }
    Estimate::Known(total)
}

/// Pick the index with the fewest combinations; ties break by index name.
pub fn select_tightest<'a>(
    candidates: &[&'a UniqueIndex],
    sizes: &HashMap<String, u128>,
) -> Option<(&'a UniqueIndex, Estimate)> {
    candidates
        .iter()
        .map(|uc| (*uc, estimate_combinations(uc, sizes)))
        .min_by(|(a, ea), (b, eb)| ea.cmp(eb).then_with(|| a.name.cmp(&b.name)))
}

/// Size of a configured (non-FK) column's value domain: explicit `values`
/// length, `max - min + 1` for numeric ranges, day count for date ranges.
pub fn domain_size(col: &ColumnMeta, spec: &ColumnSpec) -> Option<u128> {
    if let Some(values) = &spec.values {
        return Some(values.len() as u128);
    }
    let (min, max) = match (&spec.min, &spec.max) {
        (Some(min), Some(max)) => (min, max),
        _ => return None,
    };
    if let (Some(lo), Some(hi)) = (min.as_i64(), max.as_i64()) {
        if hi >= lo {
            return Some((hi - lo) as u128 + 1);
        }
        return None;
    }
    if col.kind.is_temporal() {
        if let (Some(lo), Some(hi)) = (
            min.as_str().and_then(parse_date),
            max.as_str().and_then(parse_date),
        ) {
            let days = (hi.date() - lo.date()).num_days();
            if days >= 0 {
                return Some(days as u128 + 1);
            }
        }
    }
    None
}

/// Enumerate a configured column's full value domain, or `None` when the
/// domain is unbounded or too large to materialize.
pub fn enumerate_domain(col: &ColumnMeta, spec: &ColumnSpec) -> Option<Vec<Value>> {
    if let Some(values) = &spec.values {
        return Some(values.iter().map(|s| config_value(col, s)).collect());
    }
    let size = domain_size(col, spec)?;
    if size > ENUMERATION_CAP {
        return None;
    }
    let (min, max) = (spec.min.as_ref()?, spec.max.as_ref()?);
    if let (Some(lo), Some(hi)) = (min.as_i64(), max.as_i64()) {
        let make = |v: i64| match col.kind {
            ColumnKind::String => Value::Str(v.to_string()),
            ColumnKind::Decimal => Value::Decimal(v.to_string()),
            _ => Value::Int(v),
        };
        return Some((lo..=hi).map(make).collect());
    }
    if col.kind.is_temporal() {
        let lo = min.as_str().and_then(parse_date)?;
        let hi = max.as_str().and_then(parse_date)?;
        let days = (hi.date() - lo.date()).num_days();
        let mut out = Vec::with_capacity(days as usize + 1);
        for offset in 0..=days {
            let d = lo.date() + Duration::days(offset);
            out.push(if col.kind == ColumnKind::Date {
                Value::Date(d)
            } else {
                Value::DateTime(d.and_hms_opt(0, 0, 0).expect("valid time"))
            });
        }
        return Some(out);
    }
    None
}

/// Full Cartesian product of the given value pools, tuple per combination.
pub fn cartesian_product(lists: &[Vec<Value>]) -> Vec<Vec<Value>> {
    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return Vec::new();
    }
    let total: usize = lists.iter().map(|l| l.len()).product();
    let mut out = Vec::with_capacity(total);
    let mut indices = vec![0usize; lists.len()];
    loop {
        out.push(
            indices
                .iter()
                .zip(lists)
                .map(|(&i, list)| list[i].clone())
                .collect(),
        );
        let mut pos = lists.len();
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < lists[pos].len() {
                break;
            }
            indices[pos] = 0;
        }
    }
}

/// Draw `needed` distinct tuples from the product of `lists`, shuffled.
///
/// Large products (> [`SAMPLING_THRESHOLD`]) with fewer requested rows are
/// sampled without replacement, bounded at 10x attempts; on a shortfall the
/// product is fully materialized instead. Small products are materialized,
/// shuffled, and truncated.
pub fn sample_cartesian(lists: &[Vec<Value>], needed: usize, rng: &mut StdRng) -> Vec<Vec<Value>> {
    if needed == 0 || lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return Vec::new();
    }
    let product_size: u128 = lists.iter().map(|l| l.len() as u128).product();

    if (needed as u128) < product_size && product_size > SAMPLING_THRESHOLD {
        let mut seen = HashSet::new();
        let mut picked = Vec::with_capacity(needed);
        let max_attempts = needed * 10;
        let mut attempts = 0;
        while picked.len() < needed && attempts < max_attempts {
            let tuple: Vec<Value> = lists
                .iter()
                .map(|l| l.choose(rng).expect("non-empty pool").clone())
                .collect();
            let key = tuple_key(&tuple.iter().collect::<Vec<_>>());
            if seen.insert(key) {
                picked.push(tuple);
            }
            attempts += 1;
        }
        if picked.len() >= needed {
            return picked;
        }
        // Sampling fell short; fall back to full materialization.
    }

    let mut all = cartesian_product(lists);
    shuffle(&mut all, rng);
    all.truncate(needed);
    all
}

/// One candidate combination during stratified sampling: a column-to-value
/// mapping covering the shared column and every non-shared column.
pub type Combination = IndexMap<String, Value>;

/// Sample `target` combinations so that every shared-column value receives a
/// balanced quota (⌊N/K⌋, plus one for the first N mod K buckets in shuffled
/// order). Within a bucket, small selections prefer diversity across the
/// non-shared columns. The result is shuffled.
pub fn stratified_sample(
    combinations: Vec<Combination>,
    shared_col: &str,
    non_shared_cols: &[String],
    target: usize,
    rng: &mut StdRng,
) -> Vec<Combination> {
    if target == 0 || combinations.is_empty() {
        return Vec::new();
    }

    let mut buckets: IndexMap<String, Vec<Combination>> = IndexMap::new();
    for combo in combinations {
        let key = combo
            .get(shared_col)
            .map(|v| v.unique_key())
            .unwrap_or_default();
        buckets.entry(key).or_default().push(combo);
    }

    let bucket_count = buckets.len();
    let per_bucket = target / bucket_count;
    let remainder = target % bucket_count;

    let mut bucket_keys: Vec<String> = buckets.keys().cloned().collect();
    shuffle(&mut bucket_keys, rng);

    let mut selected = Vec::with_capacity(target);
    for (idx, key) in bucket_keys.iter().enumerate() {
        let available = buckets.shift_remove(key).unwrap_or_default();
        if available.is_empty() {
            continue;
        }
        let quota = per_bucket + usize::from(idx < remainder);
        selected.extend(select_diverse(available, non_shared_cols, quota, rng));
    }

    shuffle(&mut selected, rng);
    selected
}

/// Select up to `needed` combinations maximizing diversity across the
/// non-shared columns. Only worth the bookkeeping for small selections
/// (2..=10); everything else is a shuffle-and-truncate.
fn select_diverse(
    mut available: Vec<Combination>,
    constraint_cols: &[String],
    needed: usize,
    rng: &mut StdRng,
) -> Vec<Combination> {
    if needed <= 1 || needed > 10 || constraint_cols.is_empty() {
        shuffle(&mut available, rng);
        available.truncate(needed);
        return available;
    }

    let first_col = &constraint_cols[0];
    let mut by_first: IndexMap<String, Vec<Combination>> = IndexMap::new();
    for combo in available {
        let key = combo
            .get(first_col)
            .map(|v| v.unique_key())
            .unwrap_or_default();
        by_first.entry(key).or_default().push(combo);
    }

    if by_first.len() < needed {
        let mut flat: Vec<Combination> = by_first.into_values().flatten().collect();
        shuffle(&mut flat, rng);
        flat.truncate(needed);
        return flat;
    }

    let mut first_values: Vec<String> = by_first.keys().cloned().collect();
    shuffle(&mut first_values, rng);

    let mut selected = Vec::with_capacity(needed);
    let mut used: HashMap<&String, HashSet<String>> = HashMap::new();
    for first_val in first_values.into_iter().take(needed) {
        let candidates = by_first.shift_remove(&first_val).unwrap_or_default();
        let mut best: Option<&Combination> = None;
        for candidate in &candidates {
            let conflicts = constraint_cols[1..]
                .iter()
                .filter(|col| {
                    candidate
                        .get(*col)
                        .map(|v| {
                            used.get(col)
                                .map(|s| s.contains(&v.unique_key()))
                                .unwrap_or(false)
                        })
                        .unwrap_or(false)
                })
                .count();
            if conflicts == 0 {
                best = Some(candidate);
                break;
            }
            if best.is_none() {
                best = Some(candidate);
            }
        }
        let chosen = match best {
            Some(c) => c.clone(),
            None => match candidates.choose(rng) {
                Some(c) => c.clone(),
                None => continue,
            },
        };
        for col in constraint_cols {
            if let Some(v) = chosen.get(col) {
                used.entry(col).or_default().insert(v.unique_key());
            }
        }
        selected.push(chosen);
    }
    selected
}

/// Build a shuffled pool of up to `needed` distinct values for a column from
/// its configuration. Small domains enumerate fully; large numeric/date
/// ranges draw until distinct; draws are bounded at 10x attempts.
pub fn build_unique_pool(
    col: &ColumnMeta,
    spec: &ColumnSpec,
    needed: usize,
    rng: &mut StdRng,
) -> Vec<Value> {
    if needed == 0 {
        return Vec::new();
    }

    if let Some(values) = &spec.values {
        let mut pool: Vec<Value> = Vec::new();
        let mut seen = HashSet::new();
        for scalar in values {
            let v = config_value(col, scalar);
            if seen.insert(v.unique_key()) {
                pool.push(v);
            }
        }
        shuffle(&mut pool, rng);
        pool.truncate(needed);
        return pool;
    }

    if let (Some(min), Some(max)) = (&spec.min, &spec.max) {
        if let (Some(lo), Some(hi)) = (min.as_i64(), max.as_i64()) {
            return integer_pool(col, lo, hi, needed, rng);
        }
        if let (Some(lo), Some(hi)) = (min.as_f64(), max.as_f64()) {
            return float_pool(col, lo, hi, needed, rng);
        }
        if let (Some(lo), Some(hi)) = (
            min.as_str().and_then(parse_date),
            max.as_str().and_then(parse_date),
        ) {
            return temporal_pool(col, lo, hi, needed, rng);
        }
    }

    // Strings with no configured domain: random alphanumerics until distinct.
    let len = col.max_chars().min(24).max(4);
    let mut seen = HashSet::new();
    let mut pool = Vec::with_capacity(needed);
    let mut attempts = 0;
    while pool.len() < needed && attempts < needed * 10 {
        let s = rand_string(rng, len);
        if seen.insert(s.clone()) {
            pool.push(Value::Str(s));
        }
        attempts += 1;
    }
    pool
}

fn integer_pool(col: &ColumnMeta, lo: i64, hi: i64, needed: usize, rng: &mut StdRng) -> Vec<Value> {
    let make = |v: i64| match col.kind {
        ColumnKind::String => Value::Str(v.to_string()),
        ColumnKind::Decimal => Value::Decimal(v.to_string()),
        _ => Value::Int(v),
    };
    let domain = (hi - lo) as u128 + 1;

    if domain > SAMPLING_THRESHOLD && domain > 2 * needed as u128 {
        let mut seen = HashSet::new();
        let mut pool = Vec::with_capacity(needed);
        let mut attempts = 0;
        while pool.len() < needed && attempts < needed * 10 {
            let v = rng.random_range(lo..=hi);
            if seen.insert(v) {
                pool.push(make(v));
            }
            attempts += 1;
        }
        return pool;
    }

    let mut pool: Vec<Value> = (lo..=hi).map(make).collect();
    shuffle(&mut pool, rng);
    pool.truncate(needed);
    pool
}

fn float_pool(col: &ColumnMeta, lo: f64, hi: f64, needed: usize, rng: &mut StdRng) -> Vec<Value> {
    let scale = col.numeric_scale.unwrap_or(2) as usize;
    let mut seen = HashSet::new();
    let mut pool = Vec::with_capacity(needed);
    let mut attempts = 0;
    while pool.len() < needed && attempts < needed * 10 {
        let raw = lo + rng.random::<f64>() * (hi - lo).max(0.0);
        let rendered = format!("{:.*}", scale, raw);
        if seen.insert(rendered.clone()) {
            pool.push(match col.kind {
                ColumnKind::Float => Value::Float(rendered.parse().unwrap_or(raw)),
                _ => Value::Decimal(rendered),
            });
        }
        attempts += 1;
    }
    pool
}

fn temporal_pool(
    col: &ColumnMeta,
    lo: chrono::NaiveDateTime,
    hi: chrono::NaiveDateTime,
    needed: usize,
    rng: &mut StdRng,
) -> Vec<Value> {
    if col.kind == ColumnKind::Date {
        let days = (hi.date() - lo.date()).num_days().max(0) as u128 + 1;
        if days <= SAMPLING_THRESHOLD || days <= 2 * needed as u128 {
            let mut pool: Vec<Value> = (0..days as i64)
                .map(|offset| Value::Date(lo.date() + Duration::days(offset)))
                .collect();
            shuffle(&mut pool, rng);
            pool.truncate(needed);
            return pool;
        }
        let mut seen = HashSet::new();
        let mut pool = Vec::with_capacity(needed);
        let mut attempts = 0;
        while pool.len() < needed && attempts < needed * 10 {
            let d = lo.date() + Duration::days(rng.random_range(0..days as i64));
            if seen.insert(d) {
                pool.push(Value::Date(d));
            }
            attempts += 1;
        }
        return pool;
    }

    let span = (hi - lo).num_seconds().max(0);
    let mut seen = HashSet::new();
    let mut pool = Vec::with_capacity(needed);
    let mut attempts = 0;
    while pool.len() < needed && attempts < needed * 10 {
        let dt = lo + Duration::seconds(rng.random_range(0..=span));
        if seen.insert(dt) {
            pool.push(Value::DateTime(dt));
        }
        attempts += 1;
    }
    pool
}

/// Fisher-Yates over any slice; rand's shuffle trait is avoided here so one
/// code path covers `Vec<Value>`, tuples, and combination maps alike.
pub fn shuffle<T>(items: &mut [T], rng: &mut StdRng) {
    for i in (1..items.len()).rev() {
        items.swap(i, rng.random_range(0..=i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigScalar;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn idx(name: &str, cols: &[&str]) -> UniqueIndex {
        UniqueIndex::new(name, cols.iter().map(|c| c.to_string()).collect())
    }

    fn int_col(name: &str) -> ColumnMeta {
        ColumnMeta::new(name, "int", "int(11)")
    }

    fn spec_range(col: &str, lo: i64, hi: i64) -> ColumnSpec {
        ColumnSpec {
            column: col.into(),
            min: Some(ConfigScalar::Int(lo)),
            max: Some(ConfigScalar::Int(hi)),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_unique_indexes() {
        let indexes = vec![
            idx("u_email", &["email"]),
            idx("u_a_c", &["a", "c"]),
            idx("u_a_p", &["a", "p"]),
        ];
        let c = classify_unique_indexes(&indexes);
        assert_eq!(c.single.len(), 1);
        assert!(c.single.contains("email"));
        assert_eq!(c.composite.len(), 2);
        assert_eq!(c.composite_cols.len(), 3);
    }

    #[test]
    fn test_overlap_groups_transitive() {
        let a = idx("u1", &["a", "b"]);
        let b = idx("u2", &["b", "c"]);
        let c = idx("u3", &["c", "d"]);
        let d = idx("u4", &["x", "y"]);
        let composites = vec![&a, &b, &c, &d];
        let groups = overlap_groups(&composites);

        assert_eq!(groups.len(), 2);
        // u1-u2 overlap on b, u2-u3 on c: one transitive group of three.
        let big = groups.iter().find(|g| g.len() == 3).unwrap();
        let names: Vec<&str> = big.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["u1", "u2", "u3"]);
        assert!(groups.iter().any(|g| g.len() == 1 && g[0].name == "u4"));
    }

    #[test]
    fn test_shared_columns() {
        let a = idx("u1", &["a", "c"]);
        let b = idx("u2", &["a", "p"]);
        let shared = shared_columns(&[&a, &b]);
        assert_eq!(shared.into_iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_estimate_and_tightest_selection() {
        let a = idx("u_wide", &["x", "y"]);
        let b = idx("u_tight", &["x", "z"]);
        let mut sizes = HashMap::new();
        sizes.insert("x".to_string(), 100u128);
        sizes.insert("y".to_string(), 50u128);
        sizes.insert("z".to_string(), 2u128);

        assert_eq!(estimate_combinations(&a, &sizes), Estimate::Known(5000));
        let (selected, est) = select_tightest(&[&a, &b], &sizes).unwrap();
        assert_eq!(selected.name, "u_tight");
        assert_eq!(est, Estimate::Known(200));
    }

    #[test]
    fn test_estimate_unknown_when_column_missing() {
        let a = idx("u", &["x", "missing"]);
        let mut sizes = HashMap::new();
        sizes.insert("x".to_string(), 10u128);
        assert_eq!(estimate_combinations(&a, &sizes), Estimate::Unknown);
        assert!(Estimate::Known(u128::MAX - 1) < Estimate::Unknown);
    }

    #[test]
    fn test_tightest_tie_breaks_by_name() {
        let a = idx("u_b", &["x"]);
        let b = idx("u_a", &["y"]);
        let mut sizes = HashMap::new();
        sizes.insert("x".to_string(), 5u128);
        sizes.insert("y".to_string(), 5u128);
        let (selected, _) = select_tightest(&[&a, &b], &sizes).unwrap();
        assert_eq!(selected.name, "u_a");
    }

    #[test]
    fn test_domain_size() {
        let col = int_col("n");
        assert_eq!(domain_size(&col, &spec_range("n", 1, 10)), Some(10));

        let values = ColumnSpec {
            column: "n".into(),
            values: Some(vec![ConfigScalar::Int(0), ConfigScalar::Int(1)]),
            ..Default::default()
        };
        assert_eq!(domain_size(&col, &values), Some(2));

        let date_col = ColumnMeta::new("d", "date", "date");
        let date_spec = ColumnSpec {
            column: "d".into(),
            min: Some(ConfigScalar::Str("2024-01-01".into())),
            max: Some(ConfigScalar::Str("2024-01-10".into())),
            ..Default::default()
        };
        assert_eq!(domain_size(&date_col, &date_spec), Some(10));
    }

    #[test]
    fn test_enumerate_domain_int_range() {
        let col = int_col("n");
        let domain = enumerate_domain(&col, &spec_range("n", 1, 5)).unwrap();
        assert_eq!(domain.len(), 5);
        assert_eq!(domain[0], Value::Int(1));
        assert_eq!(domain[4], Value::Int(5));
    }

    #[test]
    fn test_enumerate_domain_rejects_huge_range() {
        let col = int_col("n");
        assert!(enumerate_domain(&col, &spec_range("n", 0, 10_000_000)).is_none());
    }

    #[test]
    fn test_cartesian_product() {
        let lists = vec![
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
            vec![Value::Int(10), Value::Int(20)],
        ];
        let product = cartesian_product(&lists);
        assert_eq!(product.len(), 6);
        assert_eq!(product[0], vec![Value::Int(1), Value::Int(10)]);
        assert_eq!(product[5], vec![Value::Int(3), Value::Int(20)]);
    }

    #[test]
    fn test_cartesian_product_empty_pool() {
        let lists = vec![vec![Value::Int(1)], vec![]];
        assert!(cartesian_product(&lists).is_empty());
    }

    #[test]
    fn test_sample_cartesian_small_product_truncates() {
        let lists = vec![
            (1..=3).map(Value::Int).collect::<Vec<_>>(),
            (1..=2).map(Value::Int).collect::<Vec<_>>(),
        ];
        let mut r = rng();
        let sampled = sample_cartesian(&lists, 4, &mut r);
        assert_eq!(sampled.len(), 4);
        let keys: HashSet<String> = sampled
            .iter()
            .map(|t| tuple_key(&t.iter().collect::<Vec<_>>()))
            .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_sample_cartesian_insufficient_product() {
        let lists = vec![(1..=2).map(Value::Int).collect::<Vec<_>>()];
        let mut r = rng();
        let sampled = sample_cartesian(&lists, 10, &mut r);
        assert_eq!(sampled.len(), 2);
    }

    #[test]
    fn test_sample_cartesian_large_product_samples_distinct() {
        // 600 * 600 = 360,000 > threshold, requesting far fewer.
        let lists = vec![
            (0..600).map(Value::Int).collect::<Vec<_>>(),
            (0..600).map(Value::Int).collect::<Vec<_>>(),
        ];
        let mut r = rng();
        let sampled = sample_cartesian(&lists, 500, &mut r);
        assert_eq!(sampled.len(), 500);
        let keys: HashSet<String> = sampled
            .iter()
            .map(|t| tuple_key(&t.iter().collect::<Vec<_>>()))
            .collect();
        assert_eq!(keys.len(), 500);
    }

    fn combo(pairs: &[(&str, i64)]) -> Combination {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Int(*v)))
            .collect()
    }

    #[test]
    fn test_stratified_sample_balances_shared_values() {
        // 100 shared values x 2 PR x 10 C = 2000 combos; request 200.
        let mut combos = Vec::new();
        for a in 0..100 {
            for pr in 0..2 {
                for c in 0..10 {
                    combos.push(combo(&[("A", a), ("PR", pr), ("C", c)]));
                }
            }
        }
        let mut r = rng();
        let non_shared = vec!["PR".to_string(), "C".to_string()];
        let selected = stratified_sample(combos, "A", &non_shared, 200, &mut r);
        assert_eq!(selected.len(), 200);

        let mut per_a: HashMap<String, usize> = HashMap::new();
        let mut apr: HashSet<String> = HashSet::new();
        let mut ac: HashSet<String> = HashSet::new();
        for c in &selected {
            let a = c.get("A").unwrap();
            *per_a.entry(a.unique_key()).or_default() += 1;
            assert!(apr.insert(format!("{}|{}", a, c.get("PR").unwrap())));
            assert!(ac.insert(format!("{}|{}", a, c.get("C").unwrap())));
        }
        // Every shared value appears exactly twice.
        assert_eq!(per_a.len(), 100);
        assert!(per_a.values().all(|&n| n == 2));
    }

    #[test]
    fn test_stratified_sample_remainder_distribution() {
        let mut combos = Vec::new();
        for a in 0..10 {
            for c in 0..5 {
                combos.push(combo(&[("A", a), ("C", c)]));
            }
        }
        let mut r = rng();
        // 23 = 2 per bucket + 3 extras.
        let selected = stratified_sample(combos, "A", &["C".to_string()], 23, &mut r);
        assert_eq!(selected.len(), 23);
        let mut per_a: HashMap<String, usize> = HashMap::new();
        for c in &selected {
            *per_a.entry(c.get("A").unwrap().unique_key()).or_default() += 1;
        }
        assert!(per_a.values().all(|&n| n == 2 || n == 3));
        assert_eq!(per_a.values().filter(|&&n| n == 3).count(), 3);
    }

    #[test]
    fn test_build_unique_pool_exact_range() {
        let col = int_col("code");
        let mut r = rng();
        let pool = build_unique_pool(&col, &spec_range("code", 1, 10), 10, &mut r);
        assert_eq!(pool.len(), 10);
        let distinct: HashSet<String> = pool.iter().map(|v| v.unique_key()).collect();
        assert_eq!(distinct.len(), 10);
        // Shuffled, not sorted.
        let ints: Vec<i64> = pool.iter().map(|v| v.as_int().unwrap()).collect();
        let mut sorted = ints.clone();
        sorted.sort_unstable();
        assert_ne!(ints, sorted);
    }

    #[test]
    fn test_build_unique_pool_insufficient_range() {
        let col = int_col("code");
        let mut r = rng();
        let pool = build_unique_pool(&col, &spec_range("code", 1, 5), 10, &mut r);
        assert_eq!(pool.len(), 5);
    }

    #[test]
    fn test_build_unique_pool_large_range_sampling() {
        let col = int_col("code");
        let mut r = rng();
        let pool = build_unique_pool(&col, &spec_range("code", 1, 10_000_000), 100, &mut r);
        assert_eq!(pool.len(), 100);
        let distinct: HashSet<String> = pool.iter().map(|v| v.unique_key()).collect();
        assert_eq!(distinct.len(), 100);
    }

    #[test]
    fn test_build_unique_pool_values_list() {
        let col = ColumnMeta::new("status", "varchar", "varchar(10)");
        let spec = ColumnSpec {
            column: "status".into(),
            values: Some(
                ["A", "B", "C"]
                    .iter()
                    .map(|s| ConfigScalar::Str(s.to_string()))
                    .collect(),
            ),
            ..Default::default()
        };
        let mut r = rng();
        let pool = build_unique_pool(&col, &spec, 5, &mut r);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_build_unique_pool_dates() {
        let col = ColumnMeta::new("d", "date", "date");
        let spec = ColumnSpec {
            column: "d".into(),
            min: Some(ConfigScalar::Str("2024-01-01".into())),
            max: Some(ConfigScalar::Str("2024-12-31".into())),
            ..Default::default()
        };
        let mut r = rng();
        let pool = build_unique_pool(&col, &spec, 100, &mut r);
        assert_eq!(pool.len(), 100);
        let distinct: HashSet<String> = pool.iter().map(|v| v.unique_key()).collect();
        assert_eq!(distinct.len(), 100);
    }

    #[test]
    fn test_build_unique_pool_decimals() {
        let mut col = ColumnMeta::new("price", "decimal", "decimal(10,2)");
        col.numeric_scale = Some(2);
        let spec = ColumnSpec {
            column: "price".into(),
            min: Some(ConfigScalar::Float(10.0)),
            max: Some(ConfigScalar::Float(1000.0)),
            ..Default::default()
        };
        let mut r = rng();
        let pool = build_unique_pool(&col, &spec, 50, &mut r);
        assert_eq!(pool.len(), 50);
        let distinct: HashSet<String> = pool.iter().map(|v| v.unique_key()).collect();
        assert_eq!(distinct.len(), 50);
    }

    #[test]
    fn test_build_unique_pool_strings_without_domain() {
        let mut col = ColumnMeta::new("code", "varchar", "varchar(20)");
        col.char_max_length = Some(20);
        let spec = ColumnSpec::named("code");
        let mut r = rng();
        let pool = build_unique_pool(&col, &spec, 50, &mut r);
        assert_eq!(pool.len(), 50);
    }

    #[test]
    fn test_build_unique_pool_zero_needed() {
        let col = int_col("code");
        let mut r = rng();
        assert!(build_unique_pool(&col, &spec_range("code", 1, 100), 0, &mut r).is_empty());
    }
}
