//! # Configuration File Parser
//!
//! Reads the driving configuration: a JSON array with one entry per table to
//! populate. Each entry selects the row count, value domains for specific
//! columns (`populate_columns`), read-only value sources (`static_fks`), and
//! foreign keys described in configuration rather than the catalog
//! (`logical_fks`).
//!
//! Example entry:
//!
//! ```json
//! {
//!   "schema": "shop", "table": "orders", "rows": 5000,
//!   "populate_columns": [
//!     "status",
//!     {"column": "amount", "min": 1.0, "max": 900.0},
//!     {"column": "code", "min": 1, "max": 99999, "format": "ORD-{:08}"}
//!   ],
//!   "static_fks": [
//!     {"column": "region_id", "static_schema": "ref", "static_table": "regions",
//!      "static_column": "id"}
//!   ],
//!   "logical_fks": [
//!     {"column": "owner_id", "referenced_schema": "shop",
//!      "referenced_table": "users", "referenced_column": "id",
//!      "condition": "owner_kind = 'user'"}
//!   ]
//! }
//! ```
//!
//! Semantic validation (mandatory keys, `min < max`, predicate grammar,
//! format placeholders) runs immediately after parse, before any catalog
//! work.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, SeedForgeError};
use crate::patterns::FORMAT_PLACEHOLDER;
use crate::resolve::condition::FkPredicate;
use crate::schema::types::{CompositeFk, ForeignKey, StaticKey, TableRef};

/// A scalar appearing in `values`/`min`/`max` configuration. Kept as its
/// JSON shape; conversion to a column [`crate::generate::value::Value`]
/// happens against the column's type at generation time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigScalar {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigScalar {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigScalar::Int(i) => Some(*i),
            ConfigScalar::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigScalar::Int(i) => Some(*i as f64),
            ConfigScalar::Float(f) => Some(*f),
            ConfigScalar::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigScalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Extended per-column value domain. Bare column names in `populate_columns`
/// normalize to a spec with every optional field unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub column: String,
    /// Explicit enumeration; takes precedence over `min`/`max`.
    pub values: Option<Vec<ConfigScalar>>,
    pub min: Option<ConfigScalar>,
    pub max: Option<ConfigScalar>,
    /// Format string applied when a string-typed column is generated from an
    /// integer range. Must contain exactly one integer placeholder.
    pub format: Option<String>,
}

impl ColumnSpec {
    pub fn named(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Default::default()
        }
    }

    /// A column is controlled when configuration fully determines its value
    /// domain.
    pub fn is_controlled(&self) -> bool {
        self.values.is_some() || self.min.is_some()
    }
}

/// One `populate_columns` element: a bare name or an extended spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PopulateColumn {
    Name(String),
    Spec(ColumnSpec),
}

impl PopulateColumn {
    fn into_spec(self) -> ColumnSpec {
        match self {
            PopulateColumn::Name(name) => ColumnSpec::named(name),
            PopulateColumn::Spec(spec) => spec,
        }
    }
}

/// Read-only value source for a column: distinct non-null values are sampled
/// once from an unchanged production table.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticFkConfig {
    pub column: String,
    pub static_schema: String,
    pub static_table: String,
    pub static_column: String,
}

impl StaticFkConfig {
    pub fn key(&self) -> StaticKey {
        StaticKey {
            schema: self.static_schema.clone(),
            table: self.static_table.clone(),
            column: self.static_column.clone(),
        }
    }
}

/// A foreign key described in configuration. The single form references one
/// column; the composite form references a tuple of columns that must be
/// taken from the same parent row.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LogicalFkConfig {
    Single {
        column: String,
        referenced_schema: String,
        referenced_table: String,
        referenced_column: String,
        #[serde(default)]
        condition: Option<String>,
        #[serde(default)]
        constraint_name: Option<String>,
    },
    Composite {
        child_columns: Vec<String>,
        referenced_schema: String,
        referenced_table: String,
        referenced_columns: Vec<String>,
        #[serde(default)]
        condition: Option<String>,
        #[serde(default)]
        population_rate: Option<f64>,
        #[serde(default)]
        constraint_name: Option<String>,
    },
}

/// One table entry of the JSON configuration array. Unknown keys are
/// ignored; `schema` and `table` are mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub rows: Option<u64>,
    #[serde(default)]
    pub populate_columns: Option<Vec<PopulateColumn>>,
    #[serde(default)]
    pub static_fks: Vec<StaticFkConfig>,
    #[serde(default)]
    pub logical_fks: Vec<LogicalFkConfig>,
    #[serde(default)]
    pub fk_population_rate: BTreeMap<String, f64>,
    #[serde(default)]
    pub ignore_self_referential_fks: bool,
    #[serde(default)]
    pub explicit_pk: bool,
}

impl TableConfig {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.schema.clone(), self.table.clone())
    }

    /// Normalized `populate_columns` map keyed by column name. `None` when
    /// the entry had no `populate_columns` key at all (the distinction
    /// matters: absent means nullable unconfigured columns stay null).
    pub fn populate_map(&self) -> Option<HashMap<String, ColumnSpec>> {
        self.populate_columns.as_ref().map(|cols| {
            let mut map = HashMap::new();
            for entry in cols {
                let spec = entry.clone().into_spec();
                if spec.column.is_empty() {
                    warn!("populate_columns entry without a column name, skipping");
                    continue;
                }
                map.insert(spec.column.clone(), spec);
            }
            map
        })
    }

    pub fn static_fk_for(&self, column: &str) -> Option<&StaticFkConfig> {
        self.static_fks.iter().find(|sf| sf.column == column)
    }
}

/// The whole parsed configuration array.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub tables: Vec<TableConfig>,
}

impl GeneratorConfig {
    /// Load and validate a configuration file. Invalid JSON, missing
    /// mandatory keys, malformed predicates, and inverted ranges are all
    /// fatal here, before any catalog connection is made.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SeedForgeError::ConfigIo {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            SeedForgeError::ConfigJson { source, .. } => SeedForgeError::ConfigJson {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let tables: Vec<TableConfig> =
            serde_json::from_str(content).map_err(|e| SeedForgeError::ConfigJson {
                path: "<inline>".to_string(),
                source: e,
            })?;
        let config = Self { tables };
        config.validate()?;
        Ok(config)
    }

    pub fn table(&self, table: &TableRef) -> Option<&TableConfig> {
        self.tables
            .iter()
            .find(|t| t.schema == table.schema && t.table == table.table)
    }

    pub fn table_refs(&self) -> Vec<TableRef> {
        self.tables.iter().map(|t| t.table_ref()).collect()
    }

    /// Extract logical FKs into runtime form, dropping self-referential ones
    /// for tables that opted out. Conditions are parsed strictly; a malformed
    /// predicate was already rejected by [`GeneratorConfig::validate`].
    pub fn logical_foreign_keys(&self) -> (Vec<ForeignKey>, Vec<CompositeFk>) {
        let mut singles = Vec::new();
        let mut composites = Vec::new();

        for cfg in &self.tables {
            let child = cfg.table_ref();
            for lfk in &cfg.logical_fks {
                match lfk {
                    LogicalFkConfig::Single {
                        column,
                        referenced_schema,
                        referenced_table,
                        referenced_column,
                        condition,
                        constraint_name,
                    } => {
                        let parent = TableRef::new(referenced_schema.clone(), referenced_table.clone());
                        if cfg.ignore_self_referential_fks && parent == child {
                            continue;
                        }
                        singles.push(ForeignKey {
                            name: constraint_name.clone().unwrap_or_else(|| {
                                format!("LOGICAL_{}_{}", cfg.table, column)
                            }),
                            child: child.clone(),
                            child_column: column.clone(),
                            parent,
                            parent_column: referenced_column.clone(),
                            is_logical: true,
                            condition: condition.as_deref().and_then(FkPredicate::parse),
                        });
                    }
                    LogicalFkConfig::Composite {
                        child_columns,
                        referenced_schema,
                        referenced_table,
                        referenced_columns,
                        condition,
                        population_rate,
                        constraint_name,
                    } => {
                        let parent = TableRef::new(referenced_schema.clone(), referenced_table.clone());
                        if cfg.ignore_self_referential_fks && parent == child {
                            continue;
                        }
                        composites.push(CompositeFk {
                            name: constraint_name.clone().unwrap_or_else(|| {
                                format!("LOGICAL_{}_{}", cfg.table, child_columns.join("_"))
                            }),
                            child: child.clone(),
                            child_columns: child_columns.clone(),
                            parent,
                            parent_columns: referenced_columns.clone(),
                            condition: condition.as_deref().and_then(FkPredicate::parse),
                            population_rate: *population_rate,
                        });
                    }
                }
            }
        }

        (singles, composites)
    }

    fn validate(&self) -> Result<()> {
        for cfg in &self.tables {
            let key = format!("{}.{}", cfg.schema, cfg.table);
            if cfg.schema.is_empty() || cfg.table.is_empty() {
                return Err(SeedForgeError::Config {
                    message: format!("entry '{}' has an empty schema or table name", key),
                });
            }

            if let Some(specs) = cfg.populate_map() {
                for spec in specs.values() {
                    validate_column_spec(&key, spec)?;
                }
            }

            for (column, rate) in &cfg.fk_population_rate {
                if !(0.0..=1.0).contains(rate) {
                    return Err(SeedForgeError::Config {
                        message: format!(
                            "{}: fk_population_rate for '{}' must be between 0 and 1, got {}",
                            key, column, rate
                        ),
                    });
                }
            }

            let mut conditional_cols: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for lfk in &cfg.logical_fks {
                match lfk {
                    LogicalFkConfig::Single {
                        column, condition, ..
                    } => {
                        if let Some(cond) = condition {
                            if FkPredicate::parse(cond).is_none() {
                                return Err(SeedForgeError::Config {
                                    message: format!(
                                        "{}: invalid condition syntax '{}' on logical FK for \
                                         column '{}'",
                                        key, cond, column
                                    ),
                                });
                            }
                            conditional_cols.entry(column).or_default().push(cond);
                        }
                    }
                    LogicalFkConfig::Composite {
                        child_columns,
                        referenced_columns,
                        condition,
                        population_rate,
                        ..
                    } => {
                        if child_columns.len() != referenced_columns.len() {
                            return Err(SeedForgeError::Config {
                                message: format!(
                                    "{}: composite logical FK has {} child columns but {} \
                                     referenced columns",
                                    key,
                                    child_columns.len(),
                                    referenced_columns.len()
                                ),
                            });
                        }
                        if child_columns.is_empty() {
                            return Err(SeedForgeError::Config {
                                message: format!("{}: composite logical FK has no columns", key),
                            });
                        }
                        if let Some(cond) = condition {
                            if FkPredicate::parse(cond).is_none() {
                                return Err(SeedForgeError::Config {
                                    message: format!(
                                        "{}: invalid condition syntax '{}' on composite logical FK",
                                        key, cond
                                    ),
                                });
                            }
                        }
                        if let Some(rate) = population_rate {
                            if !(0.0..=1.0).contains(rate) {
                                return Err(SeedForgeError::Config {
                                    message: format!(
                                        "{}: population_rate must be between 0 and 1, got {}",
                                        key, rate
                                    ),
                                });
                            }
                        }
                    }
                }
            }

            // Multiple conditional FKs on one column are legal; only the
            // first match fires per row. Surface the overlap once at load.
            for (column, conds) in conditional_cols {
                if conds.len() > 1 {
                    warn!(
                        "{}: column '{}' has {} conditional FKs; the first matching \
                         condition wins per row",
                        key,
                        column,
                        conds.len()
                    );
                }
            }
        }
        Ok(())
    }
}

fn validate_column_spec(table_key: &str, spec: &ColumnSpec) -> Result<()> {
    if let (Some(min), Some(max)) = (&spec.min, &spec.max) {
        let ordered = match (min.as_f64(), max.as_f64()) {
            (Some(lo), Some(hi)) => lo < hi,
            _ => match (min.as_str(), max.as_str()) {
                (Some(lo), Some(hi)) => match (parse_date(lo), parse_date(hi)) {
                    (Some(lo), Some(hi)) => lo < hi,
                    _ => {
                        return Err(SeedForgeError::Config {
                            message: format!(
                                "{}: column '{}' has an unparseable date bound \
                                 (expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)",
                                table_key, spec.column
                            ),
                        })
                    }
                },
                _ => {
                    return Err(SeedForgeError::Config {
                        message: format!(
                            "{}: column '{}' mixes numeric and string range bounds",
                            table_key, spec.column
                        ),
                    })
                }
            },
        };
        if !ordered {
            return Err(SeedForgeError::Config {
                message: format!(
                    "{}: column '{}' has min >= max",
                    table_key, spec.column
                ),
            });
        }
    }

    if let Some(format) = &spec.format {
        let placeholders = FORMAT_PLACEHOLDER.find_iter(format).count();
        if placeholders != 1 {
            warn!(
                "{}: column '{}' format string '{}' has {} integer placeholders, expected \
                 exactly one",
                table_key, spec.column, format, placeholders
            );
        }
        if spec.min.is_none() && spec.values.is_none() {
            warn!(
                "{}: column '{}' has a format string but no min/max range to feed it",
                table_key, spec.column
            );
        }
    }

    if let Some(values) = &spec.values {
        if values.is_empty() {
            warn!(
                "{}: column '{}' has an empty values list",
                table_key, spec.column
            );
        }
    }

    Ok(())
}

/// Parse a configuration date bound: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, or
/// the ISO `T` separator form. Returns `None` for anything else.
pub fn parse_date(input: &str) -> Option<NaiveDateTime> {
    if input.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}
