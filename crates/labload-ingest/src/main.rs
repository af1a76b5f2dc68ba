//! labload - probe data bulk loader

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use labload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use labload_ingest::catalog::{IdentifierCatalog, KeyCatalog};
use labload_ingest::driver::RunDriver;
use labload_ingest::loader::{BulkLoader, CommandLoader, NoopLoader};
use labload_ingest::Cli;

fn main() -> ExitCode {
    // A missing .env file is not an error
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("labload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Load failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.into_config()?;
    config.validate()?;

    let references = IdentifierCatalog::open(&config.reference_dir)?;
    let key_source = KeyCatalog::open(&config.reference_dir)?;
    let loader: Box<dyn BulkLoader> = match &config.bulk_command {
        Some(template) => Box::new(CommandLoader::new(template)?),
        None => Box::new(NoopLoader::new()),
    };

    let mut driver = RunDriver::new(config, references, key_source, loader);
    let summary = driver.run_file()?;

    if let Some(path) = &cli.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        info!(path = %path.display(), "Wrote run summary");
    }

    println!(
        "{} ({}): {} lines read, {} accepted, {} rejected",
        summary.load_type, summary.mode, summary.lines_read, summary.accepted, summary.rejected
    );
    Ok(())
}
