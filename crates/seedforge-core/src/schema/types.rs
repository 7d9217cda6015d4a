use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::generate::value::Value;
use crate::patterns::extract_quoted_literals;
use crate::resolve::condition::FkPredicate;

/// Qualified table name. Displays as `schema.table`, the key form used in
/// configuration, logging, and internal maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Semantic category of a MySQL column type, normalized from the catalog's
/// DATA_TYPE string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Decimal,
    Float,
    String,
    Date,
    DateTime,
    Timestamp,
    Enum,
    Set,
    Other,
}

impl ColumnKind {
    pub fn from_data_type(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "int" | "integer" | "bigint" | "smallint" | "mediumint" | "tinyint" => {
                ColumnKind::Integer
            }
            "decimal" | "numeric" => ColumnKind::Decimal,
            "float" | "double" => ColumnKind::Float,
            "varchar" | "char" | "text" | "tinytext" | "mediumtext" | "longtext" => {
                ColumnKind::String
            }
            "date" => ColumnKind::Date,
            "datetime" => ColumnKind::DateTime,
            "timestamp" => ColumnKind::Timestamp,
            "enum" => ColumnKind::Enum,
            "set" => ColumnKind::Set,
            _ => ColumnKind::Other,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnKind::Integer)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ColumnKind::String)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnKind::Date | ColumnKind::DateTime | ColumnKind::Timestamp
        )
    }
}

/// One column as loaded from information_schema.COLUMNS.
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub kind: ColumnKind,
    /// Full COLUMN_TYPE text, e.g. `enum('a','b')` or `varchar(50)`.
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// EXTRA contains `auto_increment`.
    pub auto_assigned: bool,
    pub char_max_length: Option<u32>,
    pub numeric_precision: Option<u32>,
    pub numeric_scale: Option<u32>,
    /// Declared literals for enum/set columns, in declaration order.
    pub allowed_values: Vec<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: &str, column_type: impl Into<String>) -> Self {
        let column_type = column_type.into();
        let kind = ColumnKind::from_data_type(data_type);
        let allowed_values = if matches!(kind, ColumnKind::Enum | ColumnKind::Set) {
            extract_quoted_literals(&column_type)
        } else {
            Vec::new()
        };
        Self {
            name: name.into(),
            kind,
            column_type,
            nullable: true,
            default: None,
            auto_assigned: false,
            char_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            allowed_values,
        }
    }

    /// Character budget for generated strings; MySQL text types without a
    /// declared maximum fall back to 255.
    pub fn max_chars(&self) -> usize {
        self.char_max_length.map(|v| v as usize).unwrap_or(255)
    }
}

/// One table's catalog metadata.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub table: TableRef,
    pub columns: Vec<ColumnMeta>,
    pub pk_columns: Vec<String>,
    pub auto_increment: bool,
    pub engine: Option<String>,
}

impl TableMeta {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
            pk_columns: Vec::new(),
            auto_increment: false,
            engine: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_pk(&self, name: &str) -> bool {
        self.pk_columns.iter().any(|c| c == name)
    }

    /// Single auto-assigned integer PK column, if the table has one.
    pub fn auto_pk_column(&self) -> Option<&str> {
        if self.auto_increment && self.pk_columns.len() == 1 {
            Some(self.pk_columns[0].as_str())
        } else {
            None
        }
    }
}

/// A unique index over one or more columns. PRIMARY is excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    pub name: String,
    pub columns: Vec<String>,
}

impl UniqueIndex {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.columns.len() >= 2
    }
}

/// A single-column foreign key, declared in the catalog or described in
/// configuration (`logical`). Conditional FKs carry a parsed predicate.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub name: String,
    pub child: TableRef,
    pub child_column: String,
    pub parent: TableRef,
    pub parent_column: String,
    pub is_logical: bool,
    pub condition: Option<FkPredicate>,
}

/// A configuration-described composite foreign key: child and parent column
/// tuples of equal length, always taken from the same parent row.
#[derive(Debug, Clone)]
pub struct CompositeFk {
    pub name: String,
    pub child: TableRef,
    pub child_columns: Vec<String>,
    pub parent: TableRef,
    pub parent_columns: Vec<String>,
    pub condition: Option<FkPredicate>,
    pub population_rate: Option<f64>,
}

/// Key of a static FK sample pool: `(schema, table, column)` of the
/// read-only source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaticKey {
    pub schema: String,
    pub table: String,
    pub column: String,
}

impl fmt::Display for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.schema, self.table, self.column)
    }
}

/// Everything the pipeline needs to know about the schemas it populates,
/// loaded once by the introspector and immutable afterwards.
#[derive(Debug, Default)]
pub struct SchemaSet {
    pub tables: IndexMap<TableRef, TableMeta>,
    pub unique_indexes: HashMap<TableRef, Vec<UniqueIndex>>,
    pub static_samples: HashMap<StaticKey, Vec<Value>>,
    /// Tables whose primary keys must be assigned by the generator.
    pub explicit_pk: HashSet<TableRef>,
    /// Starting PK value per single-column-PK table that needs a sequence.
    pub pk_start: HashMap<TableRef, i64>,
}

impl SchemaSet {
    pub fn table(&self, table: &TableRef) -> Option<&TableMeta> {
        self.tables.get(table)
    }

    pub fn uniques(&self, table: &TableRef) -> &[UniqueIndex] {
        self.unique_indexes
            .get(table)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_explicit_pk(&self, table: &TableRef) -> bool {
        self.explicit_pk.contains(table)
    }
}
