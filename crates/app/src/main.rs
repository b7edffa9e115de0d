use backoffice_import::TieBreakKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod aging;
mod config;
#[cfg(test)]
mod fixtures;
mod inputs;
mod reconcile;
mod statements;
mod worker;

use config::RunConfig;
use worker::Reporter;

#[derive(Parser)]
#[command(name = "backoffice")]
#[command(about = "Finance back-office workbook pipelines")]
#[command(version)]
struct Cli {
    /// TOML file with per-pipeline settings
    #[arg(long, global = true, env = "BACKOFFICE_CONFIG")]
    config: Option<PathBuf>,

    /// Run the pipeline on a worker task and stream its progress
    #[arg(long, global = true)]
    background: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Pivot aged-payables workbooks into a supplier by month report
    Aging {
        /// Folder searched for aged-payables workbooks
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Folder the report is written to
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Workbooks to read instead of searching the input folder
        files: Vec<PathBuf>,
    },
    /// Match a bank export against a GL extract
    Reconcile {
        /// GL extract (default: first gl*.xlsx in the working folder)
        #[arg(long)]
        gl: Option<PathBuf>,

        /// Bank export (default: first bank*.xls in the working folder)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Combined output workbook
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// How to choose among equal-amount ledger lines: first, nearest-date
        #[arg(long)]
        tie_break: Option<TieBreakKind>,
    },
    /// Split receipt exports into per-supplier statements
    Statements {
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Workbook whose leading rows head every statement
        #[arg(long)]
        letterhead: Option<PathBuf>,

        /// Receipt exports to split
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Commands {
    /// Folds command-line flags over the loaded config.
    fn apply(&self, cfg: &mut RunConfig) {
        match self {
            Commands::Aging {
                input_dir,
                output_dir,
                ..
            } => {
                if let Some(dir) = input_dir {
                    cfg.aging.input_dir = dir.clone();
                }
                if let Some(dir) = output_dir {
                    cfg.aging.output_dir = dir.clone();
                }
            }
            Commands::Reconcile {
                gl,
                bank,
                output,
                tie_break,
            } => {
                if gl.is_some() {
                    cfg.reconcile.gl_file = gl.clone();
                }
                if bank.is_some() {
                    cfg.reconcile.bank_file = bank.clone();
                }
                if let Some(output) = output {
                    cfg.reconcile.output = output.clone();
                }
                if let Some(kind) = tie_break {
                    cfg.reconcile.tie_break = *kind;
                }
            }
            Commands::Statements {
                output_dir,
                archive_dir,
                letterhead,
                ..
            } => {
                if let Some(dir) = output_dir {
                    cfg.statements.output_dir = dir.clone();
                }
                if let Some(dir) = archive_dir {
                    cfg.statements.archive_dir = dir.clone();
                }
                if let Some(path) = letterhead {
                    cfg.statements.letterhead = path.clone();
                }
            }
        }
    }
}

fn execute(command: &Commands, cfg: &RunConfig, log: &Reporter) -> anyhow::Result<()> {
    match command {
        Commands::Aging { files, .. } => {
            aging::run(&cfg.aging, files, log)?;
        }
        Commands::Reconcile { .. } => {
            reconcile::run(&cfg.reconcile, log)?;
        }
        Commands::Statements { files, .. } => {
            statements::run(&cfg.statements, files, log)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut cfg = match RunConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    cli.command.apply(&mut cfg);

    let ok = if cli.background {
        let command = cli.command.clone();
        worker::run_in_background(move |log| execute(&command, &cfg, log), worker::forward).await
    } else {
        match execute(&cli.command, &cfg, &Reporter::Tracing) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{e:#}");
                false
            }
        }
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
