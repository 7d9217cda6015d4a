//! SQL text rendering: INSERT and DELETE statement construction and literal
//! quoting. Identifiers are backtick-quoted; string literals single-quoted
//! with internal quotes doubled; user-variable references pass through
//! unquoted so `LAST_INSERT_ID()` captures survive.

use crate::generate::generator::Row;
use crate::generate::value::Value;
use crate::schema::types::{TableMeta, TableRef};

pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Render one value as a SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            if f.is_finite() {
                format!("{}", f)
            } else {
                "NULL".to_string()
            }
        }
        Value::Decimal(s) => s.clone(),
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
        Value::SetLiteral(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Var(s) => {
            if value.is_variable() {
                s.clone()
            } else {
                format!("'{}'", s.replace('\'', "''"))
            }
        }
    }
}

/// The per-table user variable that captures `LAST_INSERT_ID()` between an
/// auto-assigned parent's insert and its children's inserts.
pub fn last_insert_var(table: &TableRef) -> String {
    format!("@last_{}_{}", slug(&table.schema), slug(&table.table))
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Render INSERT statements for the given rows. With `multi_row`, rows are
/// grouped into statements of at most `max_rows_per_statement` tuples;
/// otherwise each row becomes its own statement.
pub fn render_insert(
    table: &TableRef,
    columns: &[String],
    rows_values: &[Vec<Value>],
    multi_row: bool,
    max_rows_per_statement: usize,
) -> String {
    if rows_values.is_empty() || columns.is_empty() {
        return String::new();
    }
    let target = format!(
        "INSERT INTO {}.{} ({})",
        quote_ident(&table.schema),
        quote_ident(&table.table),
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let tuple = |values: &Vec<Value>| -> String {
        format!(
            "({})",
            values
                .iter()
                .map(sql_literal)
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    let mut out = String::new();
    if multi_row {
        let chunk_size = max_rows_per_statement.max(1);
        for chunk in rows_values.chunks(chunk_size) {
            let tuples: Vec<String> = chunk.iter().map(tuple).collect();
            out.push_str(&format!("{} VALUES\n{};\n", target, tuples.join(",\n")));
        }
    } else {
        for values in rows_values {
            out.push_str(&format!("{} VALUES {};\n", target, tuple(values)));
        }
    }
    out
}

/// Render a DELETE for one generated row: by primary key when the table has
/// a single-column PK with a concrete value, otherwise by the conjunction of
/// all non-null columns. Variable-valued columns never appear in predicates.
pub fn render_delete(meta: &TableMeta, row: &Row) -> Option<String> {
    let table = &meta.table;
    if meta.pk_columns.len() == 1 {
        let pk = &meta.pk_columns[0];
        if let Some(value) = row.get(pk) {
            if !value.is_null() && !value.is_variable() {
                return Some(format!(
                    "DELETE FROM {}.{} WHERE {} = {};\n",
                    quote_ident(&table.schema),
                    quote_ident(&table.table),
                    quote_ident(pk),
                    sql_literal(value)
                ));
            }
        }
    }

    let clauses: Vec<String> = meta
        .columns
        .iter()
        .filter_map(|col| {
            let value = row.get(&col.name)?;
            if value.is_null() || value.is_variable() {
                return None;
            }
            Some(format!("{} = {}", quote_ident(&col.name), sql_literal(value)))
        })
        .collect();
    if clauses.is_empty() {
        return None;
    }
    Some(format!(
        "DELETE FROM {}.{} WHERE {};\n",
        quote_ident(&table.schema),
        quote_ident(&table.table),
        clauses.join(" AND ")
    ))
}
