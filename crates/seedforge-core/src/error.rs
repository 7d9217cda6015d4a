//! # Error Types
//!
//! Defines `SeedForgeError`, the unified error enum for every fatal failure
//! mode in the pipeline. Infeasibility and data-quality conditions are not
//! errors — they are `tracing::warn!` events and generation continues with
//! truncation. Every variant here carries enough context (table, column,
//! condition text) to diagnose without re-running under debug logging.

use thiserror::Error;

/// All fatal errors that can occur in a SeedForge run.
#[derive(Error, Debug)]
pub enum SeedForgeError {
    #[error("Database connection failed ({host}:{port} as {user}): {source}")]
    Connection {
        host: String,
        port: u16,
        user: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema introspection failed on query '{query}': {source}")]
    Introspection {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Table {table} not found in catalog (configured but has no columns)")]
    TableNotFound { table: String },

    #[error("Failed to sample static values from {schema}.{table}.{column}: {source}")]
    StaticSample {
        schema: String,
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(
        "NOT NULL FK columns reference parents not in config:\n{details}\n  \
         Configure the parent tables or add static_fks entries for these columns"
    )]
    UnresolvableNotNullFk { details: String },

    #[error(
        "Conditional FK validation failed:\n{details}\n  \
         Conditions must have the shape <column> = '<literal>' and the column must exist"
    )]
    ConditionalFk { details: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON in {path}: {source}")]
    ConfigJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Output error: {message}: {source}")]
    Output {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker thread panicked while generating rows for {table}")]
    WorkerPanic { table: String },
}

pub type Result<T> = std::result::Result<T, SeedForgeError>;
