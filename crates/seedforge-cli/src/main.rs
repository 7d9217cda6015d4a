use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod run;

use args::Cli;

#[tokio::main]
async fn main() {
    // Load .env first so MYSQL_* fallbacks are visible to clap.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let debug = cli.debug;
    if let Err(err) = run::run(cli).await {
        if debug {
            eprintln!("Error: {:?}", err);
        } else {
            eprintln!("Error: {:#}", err);
        }
        std::process::exit(1);
    }
}
