// caseflow CLI - pull-dated bronze -> silver -> gold runs

mod discover;
mod exit_codes;
mod paths;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{recon_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_INPUT, EXIT_SUCCESS, EXIT_USAGE, EXIT_WRITE};

#[derive(Parser)]
#[command(name = "cflow")]
#[command(about = "Reconcile case-management exports into client readiness facts")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one pull date
    #[command(after_help = "\
Examples:
  cflow run --pull-date 2025-01-31
  cflow run --pull-date 2025-01-31 --base /srv/staging --json
  CASEFLOW_BASE=/srv/staging cflow run --pull-date 2025-01-31 --config recon.toml")]
    Run {
        /// Reference date of the bronze pull (YYYY-MM-DD)
        #[arg(long)]
        pull_date: String,

        /// Staging root holding "Bronze Stage", "Silver Stage" and "Gold Stage"
        #[arg(long, env = "CASEFLOW_BASE")]
        base: Option<PathBuf>,

        /// Config file (defaults to <base>/_ops/caseflow.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the latest pull date found in the bronze ProgramClientData folder
    Latest {
        /// Staging root
        #[arg(long, env = "CASEFLOW_BASE")]
        base: Option<PathBuf>,
    },

    /// Parse and validate a config file without running
    CheckConfig {
        /// Path to the TOML config
        file: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  caseflow-recon ", env!("CARGO_PKG_VERSION"),
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { pull_date, base, config, json } => run::cmd_run(&pull_date, base, config, json),
        Commands::Latest { base } => run::cmd_latest(base),
        Commands::CheckConfig { file } => paths::cmd_check_config(&file),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT, message: msg.into(), hint: None }
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self { code: EXIT_WRITE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn recon(err: caseflow_recon::ReconError) -> Self {
        Self { code: recon_exit_code(&err), message: err.to_string(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
