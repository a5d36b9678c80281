use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sweep")]
#[command(about = "Classify system data files and move the safe-to-remove ones to a backup area", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan, classify, review and relocate (default)
    Run(RunArgs),
    /// Scan configured roots and list the candidates without classifying
    Scan(RunArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Rehearse the relocation without moving anything
    #[arg(long)]
    pub dry_run: bool,

    /// Number of concurrent classification workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum number of files to collect from the scan
    #[arg(long)]
    pub max_files: Option<usize>,
}

impl RunArgs {
    pub fn apply(&self, config: &mut sweep_core::AppConfig) {
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(max_files) = self.max_files {
            config.max_files = max_files;
        }
    }
}
