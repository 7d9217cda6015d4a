use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "seedforge",
    about = "Generate constraint-faithful synthetic data for a MySQL schema",
    version,
    after_help = "Examples:\n  \
        seedforge --host db.internal --user reader --ask-pass \\\n      \
        --config tables.json --out-sql inserts.sql --out-delete deletes.sql\n  \
        seedforge --host 127.0.0.1 --user root --config tables.json \\\n      \
        --out-sql inserts.sql --rows 500 --seed 7 --threads 8"
)]
pub struct Cli {
    /// MySQL host to introspect
    #[arg(long, env = "MYSQL_HOST")]
    pub host: String,

    /// MySQL port
    #[arg(long, default_value_t = 3306)]
    pub port: u16,

    /// MySQL user
    #[arg(long, env = "MYSQL_USER")]
    pub user: String,

    /// MySQL password (falls back to MYSQL_PWD or .env)
    #[arg(long, env = "MYSQL_PWD", default_value = "")]
    pub password: String,

    /// Prompt for the password instead of passing it on the command line
    #[arg(long)]
    pub ask_pass: bool,

    /// JSON configuration file selecting tables and value domains
    #[arg(long)]
    pub config: PathBuf,

    /// Output file for the INSERT stream
    #[arg(long)]
    pub out_sql: PathBuf,

    /// Optional output file for the reverse-order DELETE stream
    #[arg(long)]
    pub out_delete: Option<PathBuf>,

    /// Default rows per table when an entry has no explicit count
    #[arg(long)]
    pub rows: Option<u64>,

    /// Scale factor applied to the default row count
    #[arg(long)]
    pub scale: Option<f64>,

    /// Distinct values sampled per static FK source
    #[arg(long, default_value_t = 1000)]
    pub sample_size: u64,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Worker threads for row generation
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Rows per multi-row INSERT statement
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Enable debug logging (full planning trace on stderr)
    #[arg(long)]
    pub debug: bool,
}
