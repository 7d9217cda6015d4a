//! Fixture builders for SeedForge tests: in-memory schema metadata,
//! foreign keys, and configuration snippets, so pipeline behavior can be
//! exercised without a live MySQL catalog.

use seedforge_core::resolve::condition::FkPredicate;
use seedforge_core::schema::types::{
    ColumnMeta, CompositeFk, ForeignKey, SchemaSet, TableMeta, TableRef, UniqueIndex,
};

/// Builds one table's metadata and unique indexes.
pub struct TableBuilder {
    meta: TableMeta,
    uniques: Vec<UniqueIndex>,
}

impl TableBuilder {
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            meta: TableMeta::new(TableRef::new(schema, table)),
            uniques: Vec::new(),
        }
    }

    /// Nullable column. `column_type` carries enum/set literals when present.
    pub fn column(mut self, name: &str, data_type: &str, column_type: &str) -> Self {
        self.meta
            .columns
            .push(ColumnMeta::new(name, data_type, column_type));
        self
    }

    /// NOT NULL column.
    pub fn not_null(mut self, name: &str, data_type: &str, column_type: &str) -> Self {
        let mut col = ColumnMeta::new(name, data_type, column_type);
        col.nullable = false;
        self.meta.columns.push(col);
        self
    }

    /// Auto-increment integer primary key.
    pub fn auto_pk(mut self, name: &str) -> Self {
        let mut col = ColumnMeta::new(name, "int", "int(11)");
        col.nullable = false;
        col.auto_assigned = true;
        self.meta.columns.push(col);
        self.meta.pk_columns = vec![name.to_string()];
        self.meta.auto_increment = true;
        self
    }

    /// Explicit (non-auto) primary key over already-declared columns.
    pub fn pk(mut self, columns: &[&str]) -> Self {
        self.meta.pk_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Character budget of the most recently declared column.
    pub fn max_len(mut self, len: u32) -> Self {
        if let Some(col) = self.meta.columns.last_mut() {
            col.char_max_length = Some(len);
        }
        self
    }

    /// Precision and scale of the most recently declared column.
    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        if let Some(col) = self.meta.columns.last_mut() {
            col.numeric_precision = Some(precision);
            col.numeric_scale = Some(scale);
        }
        self
    }

    pub fn unique(mut self, name: &str, columns: &[&str]) -> Self {
        self.uniques.push(UniqueIndex::new(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }
}

/// Accumulates tables into a [`SchemaSet`].
#[derive(Default)]
pub struct SchemaBuilder {
    set: SchemaSet,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, builder: TableBuilder) -> Self {
        let table_ref = builder.meta.table.clone();
        self.set
            .unique_indexes
            .insert(table_ref.clone(), builder.uniques);
        self.set.tables.insert(table_ref, builder.meta);
        self
    }

    /// Seed an explicit PK sequence for a table.
    pub fn pk_start(mut self, schema: &str, table: &str, start: i64) -> Self {
        self.set
            .pk_start
            .insert(TableRef::new(schema, table), start);
        self
    }

    /// Mark a table as requiring generator-assigned primary keys.
    pub fn explicit_pk(mut self, schema: &str, table: &str) -> Self {
        self.set.explicit_pk.insert(TableRef::new(schema, table));
        self
    }

    pub fn build(self) -> SchemaSet {
        self.set
    }
}

/// A declared single-column FK.
pub fn declared_fk(
    child: (&str, &str),
    child_column: &str,
    parent: (&str, &str),
    parent_column: &str,
) -> ForeignKey {
    ForeignKey {
        name: format!("fk_{}_{}", child.1, child_column),
        child: TableRef::new(child.0, child.1),
        child_column: child_column.to_string(),
        parent: TableRef::new(parent.0, parent.1),
        parent_column: parent_column.to_string(),
        is_logical: false,
        condition: None,
    }
}

/// A logical conditional FK; `condition` must satisfy the predicate grammar.
pub fn conditional_fk(
    name: &str,
    child: (&str, &str),
    child_column: &str,
    parent: (&str, &str),
    parent_column: &str,
    condition: &str,
) -> ForeignKey {
    ForeignKey {
        name: name.to_string(),
        child: TableRef::new(child.0, child.1),
        child_column: child_column.to_string(),
        parent: TableRef::new(parent.0, parent.1),
        parent_column: parent_column.to_string(),
        is_logical: true,
        condition: Some(FkPredicate::parse(condition).expect("valid fixture condition")),
    }
}

/// A logical composite FK over parallel column tuples.
pub fn composite_fk(
    name: &str,
    child: (&str, &str),
    child_columns: &[&str],
    parent: (&str, &str),
    parent_columns: &[&str],
) -> CompositeFk {
    CompositeFk {
        name: name.to_string(),
        child: TableRef::new(child.0, child.1),
        child_columns: child_columns.iter().map(|c| c.to_string()).collect(),
        parent: TableRef::new(parent.0, parent.1),
        parent_columns: parent_columns.iter().map(|c| c.to_string()).collect(),
        condition: None,
        population_rate: None,
    }
}
