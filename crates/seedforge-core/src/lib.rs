pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod graph;
pub mod patterns;
pub mod resolve;
pub mod schema;
pub mod sql;

// Re-export key types for convenience
pub use engine::{Dataset, Engine, RunOptions};
pub use error::{Result, SeedForgeError};
pub use generate::value::Value;
pub use schema::types::{SchemaSet, TableRef};
