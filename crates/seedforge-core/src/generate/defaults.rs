//! Column value production: the semantic default rules and the extended
//! `populate_columns` configuration (`values`, `min`/`max`, `format`).

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::{parse_date, ColumnSpec, ConfigScalar};
use crate::generate::value::Value;
use crate::patterns::{AGE_PATTERN, FORMAT_PLACEHOLDER};
use crate::schema::types::{ColumnKind, ColumnMeta};

const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn rand_string(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| ALNUM[rng.random_range(0..ALNUM.len())] as char)
        .collect()
}

pub fn rand_email(rng: &mut impl Rng) -> String {
    SafeEmail().fake_with_rng(rng)
}

pub fn rand_name(rng: &mut impl Rng) -> String {
    let first: String = FirstName().fake_with_rng(rng);
    let last: String = LastName().fake_with_rng(rng);
    format!("{} {}", first, last)
}

pub fn rand_phone(rng: &mut impl Rng) -> String {
    format!(
        "{:03}-{:03}-{:04}",
        rng.random_range(0..1000),
        rng.random_range(0..1000),
        rng.random_range(0..10000)
    )
}

/// Decimal rendered at the column's declared precision and scale.
pub fn rand_decimal(rng: &mut impl Rng, precision: u32, scale: u32) -> String {
    let int_digits = precision.saturating_sub(scale).clamp(1, 15);
    let int_max = 10i64.pow(int_digits);
    let int_part = rng.random_range(0..int_max);
    if scale == 0 {
        int_part.to_string()
    } else {
        let frac_max = 10i64.pow(scale.min(15));
        let frac_part = rng.random_range(0..frac_max);
        format!("{}.{:0width$}", int_part, frac_part, width = scale as usize)
    }
}

/// Default temporal window: 2010-01-01 through the end of the current year.
pub fn default_datetime_range() -> (NaiveDateTime, NaiveDateTime) {
    let start = NaiveDate::from_ymd_opt(2010, 1, 1)
        .expect("valid date")
        .and_hms_opt(0, 0, 0)
        .expect("valid time");
    let end = NaiveDate::from_ymd_opt(Utc::now().year(), 12, 31)
        .expect("valid date")
        .and_hms_opt(23, 59, 59)
        .expect("valid time");
    (start, end)
}

pub fn datetime_between(rng: &mut impl Rng, lo: NaiveDateTime, hi: NaiveDateTime) -> NaiveDateTime {
    let span = (hi - lo).num_seconds().max(0);
    lo + Duration::seconds(rng.random_range(0..=span))
}

pub fn rand_datetime(rng: &mut impl Rng) -> NaiveDateTime {
    let (lo, hi) = default_datetime_range();
    datetime_between(rng, lo, hi)
}

/// Uniform SET value: a uniform subset size k in [0, n], then a uniform
/// k-subset, emitted comma-joined in declaration order. Empty is allowed.
pub fn rand_set_literal(rng: &mut impl Rng, declared: &[String]) -> String {
    if declared.is_empty() {
        return String::new();
    }
    let k = rng.random_range(0..=declared.len());
    if k == 0 {
        return String::new();
    }
    let mut indexes: Vec<usize> = (0..declared.len()).collect();
    for i in (1..indexes.len()).rev() {
        indexes.swap(i, rng.random_range(0..=i));
    }
    let mut chosen: Vec<usize> = indexes.into_iter().take(k).collect();
    chosen.sort_unstable();
    chosen
        .into_iter()
        .map(|i| declared[i].as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a SET literal back into members, validated against the declared
/// value list. `None` when a member is not declared.
pub fn parse_set_literal(literal: &str, declared: &[String]) -> Option<Vec<String>> {
    if literal.is_empty() {
        return Some(Vec::new());
    }
    let mut members = Vec::new();
    for part in literal.split(',') {
        if !declared.iter().any(|v| v == part) {
            return None;
        }
        members.push(part.to_string());
    }
    Some(members)
}

/// Substitute the single integer placeholder in a `format` string: `{}` or
/// a zero-padded `{:0N}` form. Extra placeholders were already warned about
/// at load; only the first is substituted.
pub fn apply_format(format: &str, value: i64) -> String {
    match FORMAT_PLACEHOLDER.captures(format) {
        Some(caps) => {
            let rendered = match caps.get(1) {
                Some(width) => {
                    let width: usize = width.as_str().parse().unwrap_or(0);
                    format!("{:0width$}", value, width = width)
                }
                None => value.to_string(),
            };
            format.replacen(caps.get(0).expect("match exists").as_str(), &rendered, 1)
        }
        None => format.to_string(),
    }
}

/// Convert a configuration scalar to a column value, honoring the column's
/// semantic category.
pub fn config_value(col: &ColumnMeta, scalar: &ConfigScalar) -> Value {
    match scalar {
        ConfigScalar::Int(i) => match col.kind {
            ColumnKind::Decimal => Value::Decimal(i.to_string()),
            ColumnKind::Float => Value::Float(*i as f64),
            ColumnKind::String | ColumnKind::Enum | ColumnKind::Set => Value::Str(i.to_string()),
            _ => Value::Int(*i),
        },
        ConfigScalar::Float(f) => match col.kind {
            ColumnKind::Decimal => {
                let scale = col.numeric_scale.unwrap_or(2) as usize;
                Value::Decimal(format!("{:.*}", scale, f))
            }
            ColumnKind::Integer => Value::Int(*f as i64),
            _ => Value::Float(*f),
        },
        ConfigScalar::Str(s) => match col.kind {
            ColumnKind::Date => match parse_date(s) {
                Some(dt) => Value::Date(dt.date()),
                None => Value::Str(s.clone()),
            },
            ColumnKind::DateTime | ColumnKind::Timestamp => match parse_date(s) {
                Some(dt) => Value::DateTime(dt),
                None => Value::Str(s.clone()),
            },
            ColumnKind::Set => Value::SetLiteral(s.clone()),
            _ => Value::Str(s.clone()),
        },
    }
}

/// Generate one value from an extended column spec (`values` takes
/// precedence, then `min`/`max`). Returns `Null` when the spec carries no
/// usable domain.
pub fn generate_with_spec(rng: &mut impl Rng, col: &ColumnMeta, spec: &ColumnSpec) -> Value {
    if let Some(values) = &spec.values {
        return match values.choose(rng) {
            Some(scalar) => config_value(col, scalar),
            None => Value::Null,
        };
    }

    let (min, max) = match (&spec.min, &spec.max) {
        (Some(min), Some(max)) => (min, max),
        _ => return Value::Null,
    };

    match col.kind {
        ColumnKind::Integer => {
            let lo = min.as_i64().unwrap_or(0);
            let hi = max.as_i64().unwrap_or(lo);
            Value::Int(rng.random_range(lo..=hi.max(lo)))
        }
        ColumnKind::Decimal | ColumnKind::Float => {
            let lo = min.as_f64().unwrap_or(0.0);
            let hi = max.as_f64().unwrap_or(lo);
            let raw = lo + rng.random::<f64>() * (hi - lo).max(0.0);
            match col.kind {
                ColumnKind::Decimal => {
                    let scale = col.numeric_scale.unwrap_or(2) as usize;
                    Value::Decimal(format!("{:.*}", scale, raw))
                }
                _ => Value::Float(raw),
            }
        }
        ColumnKind::Date | ColumnKind::DateTime | ColumnKind::Timestamp => {
            let lo = min.as_str().and_then(parse_date);
            let hi = max.as_str().and_then(parse_date);
            match (lo, hi) {
                (Some(lo), Some(hi)) => {
                    let dt = datetime_between(rng, lo, hi);
                    if col.kind == ColumnKind::Date {
                        Value::Date(dt.date())
                    } else {
                        Value::DateTime(dt)
                    }
                }
                _ => Value::Null,
            }
        }
        // String-typed columns draw from an integer range, optionally
        // through the format template.
        _ => {
            let lo = min.as_i64().unwrap_or(0);
            let hi = max.as_i64().unwrap_or(lo);
            let n = rng.random_range(lo..=hi.max(lo));
            let rendered = match &spec.format {
                Some(format) => apply_format(format, n),
                None => n.to_string(),
            };
            Value::Str(rendered.chars().take(col.max_chars()).collect())
        }
    }
}

/// The semantic default rules for columns with no other value source.
/// String suffixing for single-column uniques is the caller's
/// responsibility; integer uniques take the row's batch index here.
pub fn default_value(
    rng: &mut impl Rng,
    col: &ColumnMeta,
    batch_idx: u64,
    single_unique: bool,
) -> Value {
    match col.kind {
        ColumnKind::Integer => {
            if single_unique {
                Value::Int(batch_idx as i64)
            } else if AGE_PATTERN.is_match(&col.name) {
                Value::Int(rng.random_range(18..=80))
            } else {
                Value::Int(rng.random_range(0..=10000))
            }
        }
        ColumnKind::Decimal | ColumnKind::Float => Value::Decimal(rand_decimal(
            rng,
            col.numeric_precision.unwrap_or(10),
            col.numeric_scale.unwrap_or(0),
        )),
        ColumnKind::String => {
            let lname = col.name.to_lowercase();
            let base = if lname.contains("email") {
                rand_email(rng)
            } else if lname.contains("name") {
                rand_name(rng)
            } else if lname.contains("phone") {
                rand_phone(rng)
            } else {
                rand_string(rng, col.max_chars().min(24))
            };
            Value::Str(base.chars().take(col.max_chars()).collect())
        }
        ColumnKind::Date => Value::Date(rand_datetime(rng).date()),
        ColumnKind::DateTime | ColumnKind::Timestamp => Value::DateTime(rand_datetime(rng)),
        ColumnKind::Enum => match col.allowed_values.choose(rng) {
            Some(v) => Value::Str(v.clone()),
            None => Value::Null,
        },
        ColumnKind::Set => Value::SetLiteral(rand_set_literal(rng, &col.allowed_values)),
        ColumnKind::Other => {
            if col.nullable {
                Value::Null
            } else {
                Value::Str(rand_string(rng, 8))
            }
        }
    }
}

/// Append `_{batch_idx}` to a string destined for a single-column UNIQUE,
/// truncating the base so the result fits the column's character budget.
pub fn suffix_unique(base: &str, batch_idx: u64, max_chars: usize) -> String {
    let suffix = format!("_{}", batch_idx);
    if max_chars <= suffix.len() {
        return suffix.chars().skip(1).take(max_chars).collect();
    }
    let keep = max_chars - suffix.len();
    let truncated: String = base.chars().take(keep).collect();
    let combined = format!("{}{}", truncated, suffix);
    combined.chars().take(max_chars).collect()
}
