mod commands;
mod logging;
mod operator;
mod progress;

use anyhow::Context;
use clap::Parser;
use colored::*;
use commands::{Cli, Commands, RunArgs};
use dotenv::dotenv;
use operator::PromptOperator;
use progress::CliReporter;
use std::process;
use sweep_core::oracle::RetryPolicy;
use sweep_core::{
    AppConfig, CancelToken, ChatCompletionsOracle, OracleClient, RunOutcome, SweepEngine,
};
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match sweep_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Run(run_args)) => run_cleanup(config, &run_args),
        Some(Commands::Scan(run_args)) => run_scan(config, &run_args),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => run_cleanup(config, &RunArgs::default()),
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run_cleanup(mut config: AppConfig, args: &RunArgs) -> anyhow::Result<()> {
    args.apply(&mut config);

    info!("Starting system data cleanup");
    info!(
        "Dry run is {}",
        if config.dry_run { "enabled" } else { "disabled" }
    );
    if config.oracle.resolved_api_key().is_none() {
        warn!("No API key configured (oracle.api_key / OPENAI_API_KEY); requests will be unauthenticated");
    }

    let oracle = ChatCompletionsOracle::new(&config.oracle)
        .context("building the classification client")?;
    let client = OracleClient::new(oracle, RetryPolicy::from_config(&config.oracle));

    let engine = SweepEngine::new(config);
    let reporter = CliReporter::new();
    let operator = PromptOperator::stdio();

    let outcome = engine.run(&client, &operator, &reporter, &CancelToken::new())?;

    match outcome {
        RunOutcome::NoFilesFound => println!("No files found to process."),
        RunOutcome::NothingToReview => println!("No non-important files found."),
        RunOutcome::NothingSelected => println!("No files selected for cleanup."),
        RunOutcome::AbortedByOperator => println!("Cleanup aborted."),
        RunOutcome::Relocated(report) => {
            let verb = if report.dry_run { "would be moved" } else { "moved" };
            println!(
                "{} files {} to {}, {} already gone, {} failed",
                format!("{}", report.relocated.len()).green(),
                verb,
                engine.config().backup_root().display(),
                format!("{}", report.missing.len()).yellow(),
                format!("{}", report.failed.len()).red(),
            );
            for (path, reason) in &report.failed {
                println!("  {} {}: {}", "✗".red(), path.display(), reason);
            }
        }
    }

    info!("Cleanup complete");
    Ok(())
}

fn run_scan(mut config: AppConfig, args: &RunArgs) -> anyhow::Result<()> {
    args.apply(&mut config);

    let engine = SweepEngine::new(config);
    let records = engine.scan(&CliReporter::new());

    let mut total_mb = 0.0;
    for record in &records {
        total_mb += record.size_mb();
        println!("{:>10.2} MB  {}", record.size_mb(), record.path.display());
    }
    println!(
        "Total: {} files, {} MB",
        format!("{}", records.len()).cyan(),
        format!("{:.2}", total_mb).cyan()
    );
    Ok(())
}
