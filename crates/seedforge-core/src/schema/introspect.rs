//! Schema introspection: loads catalog metadata for every configured table,
//! samples static FK sources, detects tables that must emit explicit primary
//! keys, seeds PK sequences, and validates FK reachability. The catalog I/O
//! lives in [`crate::schema::mysql`]; everything that can be computed from
//! loaded metadata is a pure function here so it is testable without a
//! database.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{Result, SeedForgeError};
use crate::schema::mysql::MySqlCatalog;
use crate::schema::types::{
    CompositeFk, ForeignKey, SchemaSet, TableMeta, TableRef,
};

/// Everything the engine needs, produced once per run.
pub struct Introspection {
    pub schema: SchemaSet,
    pub fks: Vec<ForeignKey>,
    pub composite_fks: Vec<CompositeFk>,
    pub fk_columns: HashMap<TableRef, BTreeSet<String>>,
}

/// Load catalog metadata for the configured tables and prepare the run.
/// Fails fatally when a configured table does not exist, a static sample
/// fails, a NOT NULL FK has no reachable parent, or a conditional FK names
/// a missing discriminator column.
pub async fn introspect(
    catalog: &MySqlCatalog,
    config: &GeneratorConfig,
    sample_size: u64,
) -> Result<Introspection> {
    let mut schema_set = SchemaSet::default();

    // Declared FKs across every schema in play, then logical FKs from the
    // configuration, filtered down to configured children.
    let schemas: BTreeSet<&str> = config.tables.iter().map(|t| t.schema.as_str()).collect();
    let mut fk_list = Vec::new();
    for schema in schemas {
        fk_list.extend(catalog.load_declared_fks(schema).await?);
    }
    let (logical_singles, composite_fks) = config.logical_foreign_keys();
    fk_list.extend(logical_singles);
    let fks = filter_foreign_keys(fk_list, config);

    for table_ref in config.table_refs() {
        let columns = catalog.load_columns(&table_ref).await?;
        if columns.is_empty() {
            return Err(SeedForgeError::TableNotFound {
                table: table_ref.to_string(),
            });
        }
        let pk_columns = catalog.load_primary_key(&table_ref).await?;
        let (engine, auto_increment) = catalog.load_engine_and_auto_increment(&table_ref).await?;
        let unique_indexes = catalog.load_unique_indexes(&table_ref).await?;

        let mut meta = TableMeta::new(table_ref.clone());
        meta.auto_increment =
            auto_increment.is_some() || columns.iter().any(|c| c.auto_assigned);
        meta.columns = columns;
        meta.pk_columns = pk_columns;
        meta.engine = engine;

        if !unique_indexes.is_empty() {
            debug!(
                "{}: unique indexes {:?}",
                table_ref,
                unique_indexes
                    .iter()
                    .map(|u| (&u.name, &u.columns))
                    .collect::<Vec<_>>()
            );
        }
        schema_set.unique_indexes.insert(table_ref.clone(), unique_indexes);
        schema_set.tables.insert(table_ref, meta);
    }

    // Static FK sources, sampled once per distinct (schema, table, column).
    for table_cfg in &config.tables {
        for static_fk in &table_cfg.static_fks {
            let key = static_fk.key();
            if !schema_set.static_samples.contains_key(&key) {
                let values = catalog.sample_static_values(&key, sample_size).await?;
                debug!("sampled {} static values from {}", values.len(), key);
                schema_set.static_samples.insert(key, values);
            }
        }
    }

    let fk_columns = build_fk_columns(&fks, &composite_fks);
    schema_set.explicit_pk = detect_explicit_pk(&schema_set, config, &fks, &composite_fks);

    // PK sequences for single-column-PK tables that are non-auto-increment
    // or forced to emit explicit keys.
    let pk_work: Vec<(TableRef, String)> = schema_set
        .tables
        .iter()
        .filter(|(_, meta)| meta.pk_columns.len() == 1)
        .filter(|(table_ref, meta)| {
            !meta.auto_increment || schema_set.explicit_pk.contains(*table_ref)
        })
        .map(|(table_ref, meta)| (table_ref.clone(), meta.pk_columns[0].clone()))
        .collect();
    for (table_ref, pk_column) in pk_work {
        let (_, auto_next) = catalog.load_engine_and_auto_increment(&table_ref).await?;
        let current_max = catalog.current_max_pk(&table_ref, &pk_column).await.unwrap_or(0);
        let start = auto_next.unwrap_or(1).max(1).max(current_max + 1);
        debug!("{}: PK sequence starts at {}", table_ref, start);
        schema_set.pk_start.insert(table_ref, start);
    }

    validate_not_null_fks(&schema_set, config, &fks)?;
    validate_conditional_fks(&schema_set, &fks, &composite_fks)?;

    Ok(Introspection {
        schema: schema_set,
        fks,
        composite_fks,
        fk_columns,
    })
}

/// Keep FKs whose child is configured, dropping self-referential ones for
/// tables that opted out.
pub fn filter_foreign_keys(fks: Vec<ForeignKey>, config: &GeneratorConfig) -> Vec<ForeignKey> {
    fks.into_iter()
        .filter(|fk| {
            let cfg = match config.table(&fk.child) {
                Some(cfg) => cfg,
                None => return false,
            };
            !(cfg.ignore_self_referential_fks && fk.child == fk.parent)
        })
        .collect()
}

/// Map each child table to the set of its FK columns, composite included.
pub fn build_fk_columns(
    fks: &[ForeignKey],
    composite_fks: &[CompositeFk],
) -> HashMap<TableRef, BTreeSet<String>> {
    let mut map: HashMap<TableRef, BTreeSet<String>> = HashMap::new();
    for fk in fks {
        map.entry(fk.child.clone())
            .or_default()
            .insert(fk.child_column.clone());
    }
    for comp in composite_fks {
        let entry = map.entry(comp.child.clone()).or_default();
        for col in &comp.child_columns {
            entry.insert(col.clone());
        }
    }
    map
}

/// Tables whose primary keys the generator must assign itself:
/// - parents of a child holding NOT NULL FKs to two or more distinct
///   configured parents (the child must commit to concrete keys up front);
/// - parents whose PK columns are referenced by a composite logical FK;
/// - tables configured with `explicit_pk: true`.
pub fn detect_explicit_pk(
    schema: &SchemaSet,
    config: &GeneratorConfig,
    fks: &[ForeignKey],
    composite_fks: &[CompositeFk],
) -> HashSet<TableRef> {
    let mut explicit = HashSet::new();

    let mut child_to_parents: HashMap<&TableRef, Vec<&TableRef>> = HashMap::new();
    for fk in fks {
        let not_null = schema
            .table(&fk.child)
            .and_then(|meta| meta.column(&fk.child_column))
            .map(|col| !col.nullable)
            .unwrap_or(false);
        if not_null {
            child_to_parents.entry(&fk.child).or_default().push(&fk.parent);
        }
    }
    for parents in child_to_parents.values() {
        let configured: HashSet<&&TableRef> = parents
            .iter()
            .filter(|p| config.table(p).is_some())
            .collect();
        if configured.len() > 1 {
            for parent in configured {
                explicit.insert((**parent).clone());
            }
        }
    }

    for comp in composite_fks {
        if config.table(&comp.parent).is_none() {
            continue;
        }
        if let Some(parent_meta) = schema.table(&comp.parent) {
            let touches_pk = comp
                .parent_columns
                .iter()
                .any(|c| parent_meta.pk_columns.contains(c));
            if touches_pk {
                explicit.insert(comp.parent.clone());
            }
        }
    }

    for table_cfg in &config.tables {
        if table_cfg.explicit_pk {
            explicit.insert(table_cfg.table_ref());
        }
    }

    explicit
}

/// A NOT NULL FK column must have somewhere to draw values from: either a
/// configured parent table or a static value source.
pub fn validate_not_null_fks(
    schema: &SchemaSet,
    config: &GeneratorConfig,
    fks: &[ForeignKey],
) -> Result<()> {
    let mut errors = Vec::new();
    for fk in fks {
        let meta = match schema.table(&fk.child) {
            Some(meta) => meta,
            None => continue,
        };
        let not_null = meta
            .column(&fk.child_column)
            .map(|col| !col.nullable)
            .unwrap_or(false);
        if !not_null {
            continue;
        }
        let parent_configured = config.table(&fk.parent).is_some();
        let has_static = config
            .table(&fk.child)
            .map(|cfg| cfg.static_fk_for(&fk.child_column).is_some())
            .unwrap_or(false);
        if !parent_configured && !has_static {
            errors.push(format!(
                "  - {}.{} -> {}",
                fk.child, fk.child_column, fk.parent
            ));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SeedForgeError::UnresolvableNotNullFk {
            details: errors.join("\n"),
        })
    }
}

/// Every conditional FK predicate must name a column that exists in its
/// child table. The predicate shape itself was validated at config load.
pub fn validate_conditional_fks(
    schema: &SchemaSet,
    fks: &[ForeignKey],
    composite_fks: &[CompositeFk],
) -> Result<()> {
    let mut errors = Vec::new();

    let mut check = |child: &TableRef, column: &str, rendered: String| {
        if let Some(meta) = schema.table(child) {
            if meta.column(column).is_none() {
                let available: Vec<&str> =
                    meta.columns.iter().map(|c| c.name.as_str()).collect();
                errors.push(format!(
                    "  - {}: discriminator column '{}' in condition \"{}\" not found; \
                     available columns: {}",
                    child,
                    column,
                    rendered,
                    available.join(", ")
                ));
            }
        }
    };

    for fk in fks {
        if let Some(cond) = &fk.condition {
            check(&fk.child, &cond.column, cond.render());
        }
    }
    for comp in composite_fks {
        if let Some(cond) = &comp.condition {
            check(&comp.child, &cond.column, cond.render());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SeedForgeError::ConditionalFk {
            details: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ColumnMeta;

    fn config(json: &str) -> GeneratorConfig {
        GeneratorConfig::from_json(json).unwrap()
    }

    fn add_table(schema: &mut SchemaSet, name: &str, cols: Vec<(&str, &str, bool)>, pk: &[&str]) {
        let tref = TableRef::new("db", name);
        let mut meta = TableMeta::new(tref.clone());
        for (col_name, data_type, nullable) in cols {
            let mut c = ColumnMeta::new(col_name, data_type, data_type);
            c.nullable = nullable;
            meta.columns.push(c);
        }
        meta.pk_columns = pk.iter().map(|s| s.to_string()).collect();
        schema.tables.insert(tref, meta);
    }

    fn fk(child: &str, child_col: &str, parent: &str) -> ForeignKey {
        ForeignKey {
            name: format!("fk_{}_{}", child, child_col),
            child: TableRef::new("db", child),
            child_column: child_col.to_string(),
            parent: TableRef::new("db", parent),
            parent_column: "id".to_string(),
            is_logical: false,
            condition: None,
        }
    }

    #[test]
    fn test_filter_foreign_keys_drops_unconfigured_children() {
        let cfg = config(r#"[{"schema": "db", "table": "orders"}]"#);
        let fks = vec![fk("orders", "user_id", "users"), fk("other", "x", "users")];
        let kept = filter_foreign_keys(fks, &cfg);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].child.table, "orders");
    }

    #[test]
    fn test_filter_foreign_keys_self_referential_opt_out() {
        let cfg = config(
            r#"[{"schema": "db", "table": "emp", "ignore_self_referential_fks": true}]"#,
        );
        let fks = vec![fk("emp", "manager_id", "emp")];
        assert!(filter_foreign_keys(fks, &cfg).is_empty());
    }

    #[test]
    fn test_build_fk_columns_includes_composite() {
        let fks = vec![fk("child", "p_id", "parent")];
        let comp = CompositeFk {
            name: "c".to_string(),
            child: TableRef::new("db", "child"),
            child_columns: vec!["a".to_string(), "b".to_string()],
            parent: TableRef::new("db", "pair"),
            parent_columns: vec!["a".to_string(), "b".to_string()],
            condition: None,
            population_rate: None,
        };
        let map = build_fk_columns(&fks, &[comp]);
        let cols = &map[&TableRef::new("db", "child")];
        assert_eq!(cols.len(), 3);
        assert!(cols.contains("p_id") && cols.contains("a") && cols.contains("b"));
    }

    #[test]
    fn test_explicit_pk_two_not_null_parents() {
        let mut schema = SchemaSet::default();
        add_table(
            &mut schema,
            "child",
            vec![("a_id", "int", false), ("b_id", "int", false)],
            &[],
        );
        add_table(&mut schema, "a", vec![("id", "int", false)], &["id"]);
        add_table(&mut schema, "b", vec![("id", "int", false)], &["id"]);

        let cfg = config(
            r#"[{"schema": "db", "table": "child"},
                {"schema": "db", "table": "a"},
                {"schema": "db", "table": "b"}]"#,
        );
        let fks = vec![fk("child", "a_id", "a"), fk("child", "b_id", "b")];
        let explicit = detect_explicit_pk(&schema, &cfg, &fks, &[]);
        assert!(explicit.contains(&TableRef::new("db", "a")));
        assert!(explicit.contains(&TableRef::new("db", "b")));
        assert!(!explicit.contains(&TableRef::new("db", "child")));
    }

    #[test]
    fn test_explicit_pk_single_parent_not_marked() {
        let mut schema = SchemaSet::default();
        add_table(&mut schema, "child", vec![("a_id", "int", false)], &[]);
        add_table(&mut schema, "a", vec![("id", "int", false)], &["id"]);

        let cfg = config(
            r#"[{"schema": "db", "table": "child"}, {"schema": "db", "table": "a"}]"#,
        );
        let fks = vec![fk("child", "a_id", "a")];
        let explicit = detect_explicit_pk(&schema, &cfg, &fks, &[]);
        assert!(explicit.is_empty());
    }

    #[test]
    fn test_explicit_pk_nullable_fks_not_marked() {
        let mut schema = SchemaSet::default();
        add_table(
            &mut schema,
            "child",
            vec![("a_id", "int", true), ("b_id", "int", true)],
            &[],
        );
        add_table(&mut schema, "a", vec![("id", "int", false)], &["id"]);
        add_table(&mut schema, "b", vec![("id", "int", false)], &["id"]);

        let cfg = config(
            r#"[{"schema": "db", "table": "child"},
                {"schema": "db", "table": "a"},
                {"schema": "db", "table": "b"}]"#,
        );
        let fks = vec![fk("child", "a_id", "a"), fk("child", "b_id", "b")];
        assert!(detect_explicit_pk(&schema, &cfg, &fks, &[]).is_empty());
    }

    #[test]
    fn test_explicit_pk_composite_fk_touching_parent_pk() {
        let mut schema = SchemaSet::default();
        add_table(&mut schema, "child", vec![("x", "int", true)], &[]);
        add_table(
            &mut schema,
            "parent",
            vec![("id", "int", false), ("kind", "varchar", false)],
            &["id"],
        );

        let cfg = config(
            r#"[{"schema": "db", "table": "child"}, {"schema": "db", "table": "parent"}]"#,
        );
        let comp = CompositeFk {
            name: "c".to_string(),
            child: TableRef::new("db", "child"),
            child_columns: vec!["x".to_string(), "kind".to_string()],
            parent: TableRef::new("db", "parent"),
            parent_columns: vec!["id".to_string(), "kind".to_string()],
            condition: None,
            population_rate: None,
        };
        let explicit = detect_explicit_pk(&schema, &cfg, &[], &[comp]);
        assert!(explicit.contains(&TableRef::new("db", "parent")));
    }

    #[test]
    fn test_explicit_pk_config_flag() {
        let schema = SchemaSet::default();
        let cfg = config(r#"[{"schema": "db", "table": "t", "explicit_pk": true}]"#);
        let explicit = detect_explicit_pk(&schema, &cfg, &[], &[]);
        assert!(explicit.contains(&TableRef::new("db", "t")));
    }

    #[test]
    fn test_validate_not_null_fk_requires_reachable_parent() {
        let mut schema = SchemaSet::default();
        add_table(&mut schema, "child", vec![("p_id", "int", false)], &[]);

        let cfg = config(r#"[{"schema": "db", "table": "child"}]"#);
        let fks = vec![fk("child", "p_id", "unconfigured")];
        let err = validate_not_null_fks(&schema, &cfg, &fks);
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_not_null_fk_static_source_suffices() {
        let mut schema = SchemaSet::default();
        add_table(&mut schema, "child", vec![("p_id", "int", false)], &[]);

        let cfg = config(
            r#"[{"schema": "db", "table": "child",
                 "static_fks": [{"column": "p_id", "static_schema": "prod",
                                 "static_table": "users", "static_column": "id"}]}]"#,
        );
        let fks = vec![fk("child", "p_id", "unconfigured")];
        assert!(validate_not_null_fks(&schema, &cfg, &fks).is_ok());
    }

    #[test]
    fn test_validate_not_null_fk_nullable_ok() {
        let mut schema = SchemaSet::default();
        add_table(&mut schema, "child", vec![("p_id", "int", true)], &[]);
        let cfg = config(r#"[{"schema": "db", "table": "child"}]"#);
        let fks = vec![fk("child", "p_id", "unconfigured")];
        assert!(validate_not_null_fks(&schema, &cfg, &fks).is_ok());
    }

    #[test]
    fn test_validate_conditional_fk_missing_discriminator() {
        use crate::resolve::condition::FkPredicate;

        let mut schema = SchemaSet::default();
        add_table(&mut schema, "child", vec![("ref_id", "int", true)], &[]);

        let mut cond_fk = fk("child", "ref_id", "w");
        cond_fk.condition = FkPredicate::parse("kind = 'W'");
        let err = validate_conditional_fks(&schema, &[cond_fk], &[]);
        assert!(err.is_err());
        let msg = err.unwrap_err().to_string();
        assert!(msg.contains("kind"));
        assert!(msg.contains("ref_id"));
    }

    #[test]
    fn test_validate_conditional_fk_present_discriminator() {
        use crate::resolve::condition::FkPredicate;

        let mut schema = SchemaSet::default();
        add_table(
            &mut schema,
            "child",
            vec![("kind", "enum", false), ("ref_id", "int", true)],
            &[],
        );

        let mut cond_fk = fk("child", "ref_id", "w");
        cond_fk.condition = FkPredicate::parse("kind = 'W'");
        assert!(validate_conditional_fks(&schema, &[cond_fk], &[]).is_ok());
    }
}
