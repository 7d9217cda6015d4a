use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Context;
use chrono::Utc;

use seedforge_core::config::GeneratorConfig;
use seedforge_core::engine::{Engine, RunOptions};
use seedforge_core::schema::introspect::introspect;
use seedforge_core::schema::mysql::MySqlCatalog;

use crate::args::Cli;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let password = if cli.ask_pass && cli.password.is_empty() {
        prompt_password(&cli.user, &cli.host)?
    } else {
        cli.password.clone()
    };

    let config = GeneratorConfig::load(&cli.config)?;
    let options = RunOptions {
        seed: cli.seed,
        threads: cli.threads,
        batch_size: cli.batch_size,
        default_rows: cli.rows.unwrap_or(100),
        scale: cli.scale,
        sample_size: cli.sample_size,
    };

    let catalog = MySqlCatalog::connect(&cli.host, cli.port, &cli.user, &password).await?;
    let introspection = introspect(&catalog, &config, options.sample_size).await?;

    let table_count = config.tables.len();
    let engine = Engine::from_introspection(introspection, config, options);
    let dataset = engine.run()?;

    let header = format!(
        "-- Synthetic data generated {}Z\n-- Host: {}, Seed: {}, Threads: {}, Batch: {}\n\n",
        Utc::now().format("%Y-%m-%dT%H:%M:%S"),
        cli.host,
        cli.seed,
        cli.threads,
        cli.batch_size,
    );

    let mut insert_out = BufWriter::new(
        File::create(&cli.out_sql)
            .with_context(|| format!("failed to create {}", cli.out_sql.display()))?,
    );
    dataset.write_inserts(&mut insert_out, &header)?;
    insert_out.flush().context("failed to flush INSERT stream")?;
    println!("Wrote INSERT statements to {}", cli.out_sql.display());

    if let Some(delete_path) = &cli.out_delete {
        let mut delete_out = BufWriter::new(
            File::create(delete_path)
                .with_context(|| format!("failed to create {}", delete_path.display()))?,
        );
        dataset.write_deletes(&mut delete_out)?;
        delete_out.flush().context("failed to flush DELETE stream")?;
        println!("Wrote DELETE statements to {}", delete_path.display());
    }

    println!(
        "Generated data for {} table(s) using {} threads with batch size {}",
        table_count, cli.threads, cli.batch_size,
    );
    Ok(())
}

fn prompt_password(user: &str, host: &str) -> anyhow::Result<String> {
    eprint!("Password for {}@{}: ", user, host);
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
