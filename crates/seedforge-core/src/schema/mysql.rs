//! MySQL catalog access: every `information_schema` query the introspector
//! needs, plus static-FK value sampling. All I/O happens here, on the
//! orchestrating task; the rest of the pipeline is pure.

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as _, Row as _, TypeInfo};

use crate::error::{Result, SeedForgeError};
use crate::generate::value::Value;
use crate::schema::types::{ColumnMeta, ForeignKey, StaticKey, TableRef, UniqueIndex};

pub struct MySqlCatalog {
    pool: MySqlPool,
}

impl MySqlCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(host: &str, port: u16, user: &str, password: &str) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(user)
            .password(password);
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(|e| SeedForgeError::Connection {
                host: host.to_string(),
                port,
                user: user.to_string(),
                source: e,
            })?;
        Ok(Self::new(pool))
    }

    pub async fn load_columns(&self, table: &TableRef) -> Result<Vec<ColumnMeta>> {
        let query = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                IS_NULLABLE,
                COLUMN_TYPE,
                COLUMN_KEY,
                EXTRA,
                CHARACTER_MAXIMUM_LENGTH,
                NUMERIC_PRECISION,
                NUMERIC_SCALE,
                COLUMN_DEFAULT
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;
        let rows = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SeedForgeError::Introspection {
                query: "fetch columns".to_string(),
                source: e,
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("COLUMN_NAME");
            let data_type: String = row.get("DATA_TYPE");
            let column_type: String = row.get("COLUMN_TYPE");
            let is_nullable: String = row.get("IS_NULLABLE");
            let extra: String = row.get("EXTRA");
            let max_length: Option<i64> = row.try_get("CHARACTER_MAXIMUM_LENGTH").ok().flatten();
            let precision: Option<i64> = row.try_get("NUMERIC_PRECISION").ok().flatten();
            let scale: Option<i64> = row.try_get("NUMERIC_SCALE").ok().flatten();
            let default: Option<String> = row.try_get("COLUMN_DEFAULT").ok().flatten();

            let mut col = ColumnMeta::new(name, &data_type, column_type);
            col.nullable = is_nullable == "YES";
            col.default = default;
            col.auto_assigned = extra.contains("auto_increment");
            col.char_max_length = max_length.map(|v| v as u32);
            col.numeric_precision = precision.map(|v| v as u32);
            col.numeric_scale = scale.map(|v| v as u32);
            columns.push(col);
        }
        Ok(columns)
    }

    pub async fn load_primary_key(&self, table: &TableRef) -> Result<Vec<String>> {
        let query = r#"
            SELECT COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;
        let rows = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SeedForgeError::Introspection {
                query: "fetch primary key".to_string(),
                source: e,
            })?;
        Ok(rows.iter().map(|r| r.get("COLUMN_NAME")).collect())
    }

    pub async fn load_engine_and_auto_increment(
        &self,
        table: &TableRef,
    ) -> Result<(Option<String>, Option<i64>)> {
        let query = r#"
            SELECT ENGINE, AUTO_INCREMENT
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;
        let row = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.table)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SeedForgeError::Introspection {
                query: "fetch engine".to_string(),
                source: e,
            })?;
        Ok(match row {
            Some(row) => (
                row.try_get("ENGINE").ok().flatten(),
                row.try_get::<Option<i64>, _>("AUTO_INCREMENT").ok().flatten(),
            ),
            None => (None, None),
        })
    }

    /// Unique indexes, PRIMARY excluded, columns in index order.
    pub async fn load_unique_indexes(&self, table: &TableRef) -> Result<Vec<UniqueIndex>> {
        let query = r#"
            SELECT INDEX_NAME, COLUMN_NAME, SEQ_IN_INDEX
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND NON_UNIQUE = 0
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#;
        let rows = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SeedForgeError::Introspection {
                query: "fetch unique indexes".to_string(),
                source: e,
            })?;

        let mut indexes: Vec<UniqueIndex> = Vec::new();
        for row in rows {
            let index_name: String = row.get("INDEX_NAME");
            if index_name == "PRIMARY" {
                continue;
            }
            let column_name: String = row.get("COLUMN_NAME");
            match indexes.iter_mut().find(|u| u.name == index_name) {
                Some(index) => index.columns.push(column_name),
                None => indexes.push(UniqueIndex::new(index_name, vec![column_name])),
            }
        }
        Ok(indexes)
    }

    /// Declared foreign keys across one schema, one entry per column pair.
    pub async fn load_declared_fks(&self, schema: &str) -> Result<Vec<ForeignKey>> {
        let query = r#"
            SELECT
                CONSTRAINT_NAME,
                TABLE_SCHEMA,
                TABLE_NAME,
                COLUMN_NAME,
                REFERENCED_TABLE_SCHEMA,
                REFERENCED_TABLE_NAME,
                REFERENCED_COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND REFERENCED_TABLE_NAME IS NOT NULL
        "#;
        let rows = sqlx::query(query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SeedForgeError::Introspection {
                query: "fetch foreign keys".to_string(),
                source: e,
            })?;

        Ok(rows
            .iter()
            .map(|row| ForeignKey {
                name: row.get("CONSTRAINT_NAME"),
                child: TableRef::new(
                    row.get::<String, _>("TABLE_SCHEMA"),
                    row.get::<String, _>("TABLE_NAME"),
                ),
                child_column: row.get("COLUMN_NAME"),
                parent: TableRef::new(
                    row.get::<String, _>("REFERENCED_TABLE_SCHEMA"),
                    row.get::<String, _>("REFERENCED_TABLE_NAME"),
                ),
                parent_column: row.get("REFERENCED_COLUMN_NAME"),
                is_logical: false,
                condition: None,
            })
            .collect())
    }

    /// Sample up to `sample_size` distinct non-null values from a static FK
    /// source. Small samples are randomly ordered server-side.
    pub async fn sample_static_values(
        &self,
        key: &StaticKey,
        sample_size: u64,
    ) -> Result<Vec<Value>> {
        let mut query = format!(
            "SELECT DISTINCT `{col}` FROM `{schema}`.`{table}` WHERE `{col}` IS NOT NULL",
            col = key.column,
            schema = key.schema,
            table = key.table,
        );
        if sample_size <= 500 {
            query.push_str(" ORDER BY RAND()");
        }
        query.push_str(&format!(" LIMIT {}", sample_size));

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SeedForgeError::StaticSample {
                schema: key.schema.clone(),
                table: key.table.clone(),
                column: key.column.clone(),
                source: e,
            })?;

        Ok(rows.iter().filter_map(decode_scalar).collect())
    }

    /// Current `MAX(pk)`, used to seed explicit PK sequences.
    pub async fn current_max_pk(&self, table: &TableRef, pk_column: &str) -> Result<i64> {
        let query = format!(
            "SELECT MAX(`{pk}`) FROM `{schema}`.`{table}`",
            pk = pk_column,
            schema = table.schema,
            table = table.table,
        );
        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SeedForgeError::Introspection {
                query: "fetch max pk".to_string(),
                source: e,
            })?;
        Ok(row
            .and_then(|r| r.try_get::<Option<i64>, _>(0).ok().flatten())
            .unwrap_or(0))
    }
}

/// Decode the single column of a sampled row into a [`Value`] by its MySQL
/// type. Unsupported types are skipped rather than failing the run.
fn decode_scalar(row: &MySqlRow) -> Option<Value> {
    let column = row.columns().first()?;
    let type_name = column.type_info().name().to_uppercase();
    match type_name.as_str() {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "TINYINT UNSIGNED"
        | "SMALLINT UNSIGNED" | "INT UNSIGNED" | "BIGINT UNSIGNED" => {
            row.try_get::<i64, _>(0).ok().map(Value::Int)
        }
        "FLOAT" | "DOUBLE" => row.try_get::<f64, _>(0).ok().map(Value::Float),
        "DECIMAL" | "NEWDECIMAL" => row.try_get::<String, _>(0).ok().map(Value::Decimal),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(0)
            .ok()
            .map(Value::Date),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(0)
            .ok()
            .map(Value::DateTime),
        _ => row.try_get::<String, _>(0).ok().map(Value::Str),
    }
}
