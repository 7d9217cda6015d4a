//! The orchestrator: walks tables in topological order, generates candidate
//! rows, resolves foreign keys against already-produced parents, and renders
//! the INSERT and reverse-order DELETE streams.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{Result, SeedForgeError};
use crate::generate::generator::{classify, generate_table, Row};
use crate::generate::pools::GenerationState;
use crate::generate::value::Value;
use crate::graph::dag::DependencyGraph;
use crate::graph::topo::topological_order;
use crate::resolve::foreign_key::{resolve_table, FkResolveContext};
use crate::schema::introspect::Introspection;
use crate::schema::types::{CompositeFk, ForeignKey, SchemaSet, TableRef};
use crate::sql::{last_insert_var, render_delete, render_insert};

/// Knobs of a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub seed: u64,
    pub threads: usize,
    pub batch_size: usize,
    pub default_rows: u64,
    pub scale: Option<f64>,
    pub sample_size: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            threads: 4,
            batch_size: 100,
            default_rows: 100,
            scale: None,
            sample_size: 1000,
        }
    }
}

impl RunOptions {
    /// Default row count with the scale factor applied. Per-table `rows`
    /// overrides are not scaled.
    pub fn scaled_default_rows(&self) -> u64 {
        match self.scale {
            Some(scale) => ((self.default_rows as f64 * scale) as u64).max(1),
            None => self.default_rows,
        }
    }
}

/// The produced dataset: resolved rows per table plus the rendered SQL.
pub struct Dataset {
    pub order: Vec<TableRef>,
    pub rows: HashMap<TableRef, Vec<Row>>,
    pub insert_lines: Vec<String>,
    pub delete_lines: Vec<String>,
}

impl Dataset {
    pub fn table_rows(&self, table: &TableRef) -> &[Row] {
        self.rows.get(table).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn write_inserts<W: Write>(&self, out: &mut W, header: &str) -> Result<()> {
        let write = |out: &mut W, text: &str| {
            out.write_all(text.as_bytes())
                .map_err(|e| SeedForgeError::Output {
                    message: "failed to write INSERT stream".to_string(),
                    source: e,
                })
        };
        write(out, header)?;
        for line in &self.insert_lines {
            write(out, line)?;
        }
        write(out, "\n-- End of inserts\n")
    }

    pub fn write_deletes<W: Write>(&self, out: &mut W) -> Result<()> {
        let write = |out: &mut W, text: &str| {
            out.write_all(text.as_bytes())
                .map_err(|e| SeedForgeError::Output {
                    message: "failed to write DELETE stream".to_string(),
                    source: e,
                })
        };
        write(
            out,
            "-- DELETE statements (reverse order)\n-- WARNING: review before running!\n\n",
        )?;
        for line in &self.delete_lines {
            write(out, line)?;
        }
        write(out, "\n-- End of deletes\n")
    }
}

/// Drives one full generation run over a loaded schema.
pub struct Engine {
    schema: SchemaSet,
    config: GeneratorConfig,
    fks: Vec<ForeignKey>,
    composite_fks: Vec<CompositeFk>,
    fk_columns: HashMap<TableRef, BTreeSet<String>>,
    options: RunOptions,
}

impl Engine {
    pub fn from_introspection(
        introspection: Introspection,
        config: GeneratorConfig,
        options: RunOptions,
    ) -> Self {
        Self {
            schema: introspection.schema,
            config,
            fks: introspection.fks,
            composite_fks: introspection.composite_fks,
            fk_columns: introspection.fk_columns,
            options,
        }
    }

    /// Assemble an engine from already-loaded parts; the FK column map is
    /// derived here.
    pub fn new(
        schema: SchemaSet,
        config: GeneratorConfig,
        fks: Vec<ForeignKey>,
        composite_fks: Vec<CompositeFk>,
        options: RunOptions,
    ) -> Self {
        let fk_columns = crate::schema::introspect::build_fk_columns(&fks, &composite_fks);
        Self {
            schema,
            config,
            fks,
            composite_fks,
            fk_columns,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    fn rows_for(&self, node: &TableRef) -> u64 {
        self.config
            .table(node)
            .and_then(|cfg| cfg.rows)
            .unwrap_or_else(|| self.options.scaled_default_rows())
    }

    /// Run the pipeline: generate, resolve, render.
    pub fn run(&self) -> Result<Dataset> {
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let graph =
            DependencyGraph::from_parts(&self.config.table_refs(), &self.fks, &self.composite_fks);
        let order = topological_order(&graph);

        let state = GenerationState::new(self.schema.pk_start.clone());
        let empty_fk_cols = BTreeSet::new();
        let mut rows_map: HashMap<TableRef, Vec<Row>> = HashMap::new();

        // Phase 1: per-table row generation, parents-first so constraint
        // planning can see parent cardinalities later.
        for node in &order {
            let meta = match self.schema.table(node) {
                Some(meta) => meta,
                None => continue,
            };
            let cfg = self.config.table(node);
            let num_rows = self.rows_for(node);
            let fk_cols = self.fk_columns.get(node).unwrap_or(&empty_fk_cols);
            let plan = classify(
                meta,
                &self.schema,
                cfg,
                self.schema.uniques(node),
                fk_cols,
                &self.fks,
                &self.composite_fks,
            );
            let rows = generate_table(
                &plan,
                num_rows,
                &state,
                self.options.seed,
                self.options.threads,
                &mut rng,
            )?;
            debug!("{}: generated {} rows", node, rows.len());
            rows_map.insert(node.clone(), rows);
        }

        // Phase 2: FK resolution and INSERT rendering, in the same order.
        let ctx = FkResolveContext {
            schema: &self.schema,
            config: &self.config,
            fks: &self.fks,
            composite_fks: &self.composite_fks,
            fk_columns: &self.fk_columns,
        };
        let mut insert_lines = Vec::new();
        for node in &order {
            let meta = match self.schema.table(node) {
                Some(meta) => meta,
                None => continue,
            };
            let rows = rows_map.remove(node).unwrap_or_default();
            let resolved = resolve_table(&ctx, node, &rows_map, rows, &mut rng);

            if !resolved.is_empty() {
                let explicit = self.schema.is_explicit_pk(node);
                let interleave = meta.auto_pk_column().is_some() && !explicit;

                let columns: Vec<String> = meta
                    .columns
                    .iter()
                    .filter(|col| {
                        let auto_pk_skipped = meta.is_pk(&col.name)
                            && meta.auto_increment
                            && !explicit
                            && resolved
                                .iter()
                                .all(|r| r.get(&col.name).map(|v| v.is_null()).unwrap_or(true));
                        !auto_pk_skipped
                            && resolved
                                .iter()
                                .any(|r| r.get(&col.name).map(|v| !v.is_null()).unwrap_or(false))
                    })
                    .map(|col| col.name.clone())
                    .collect();

                insert_lines.push(format!(
                    "\n-- Inserting {} rows into {}\n",
                    resolved.len(),
                    node
                ));
                if interleave {
                    let var = last_insert_var(node);
                    for row in &resolved {
                        let values: Vec<_> = columns
                            .iter()
                            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                            .collect();
                        insert_lines.push(render_insert(
                            node,
                            &columns,
                            &[values],
                            false,
                            self.options.batch_size,
                        ));
                        insert_lines.push(format!("SET {} = LAST_INSERT_ID();\n", var));
                    }
                } else {
                    let values: Vec<Vec<_>> = resolved
                        .iter()
                        .map(|row| {
                            columns
                                .iter()
                                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                                .collect()
                        })
                        .collect();
                    insert_lines.push(render_insert(
                        node,
                        &columns,
                        &values,
                        true,
                        self.options.batch_size,
                    ));
                }
            }

            rows_map.insert(node.clone(), resolved);
        }

        // Phase 3: DELETEs in strict reverse insert order.
        let mut delete_lines = Vec::new();
        for node in order.iter().rev() {
            let meta = match self.schema.table(node) {
                Some(meta) => meta,
                None => continue,
            };
            let rows = rows_map.get(node).map(|r| r.as_slice()).unwrap_or(&[]);
            if rows.is_empty() {
                continue;
            }
            delete_lines.push(format!("\n-- Deleting rows from {}\n", node));
            for row in rows {
                if let Some(statement) = render_delete(meta, row) {
                    delete_lines.push(statement);
                }
            }
        }

        Ok(Dataset {
            order,
            rows: rows_map,
            insert_lines,
            delete_lines,
        })
    }
}
