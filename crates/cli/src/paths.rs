//! Staging folder layout and config resolution.

use std::path::{Path, PathBuf};

use caseflow_recon::ReconConfig;

use crate::CliError;

pub const BRONZE: &str = "Bronze Stage";
pub const SILVER: &str = "Silver Stage";
pub const GOLD: &str = "Gold Stage";
pub const OPS: &str = "_ops";
pub const CONFIG_FILE: &str = "caseflow.toml";

/// Folder layout under one staging root.
#[derive(Debug, Clone)]
pub struct Layout {
    pub base: PathBuf,
}

impl Layout {
    /// `--base` / `CASEFLOW_BASE` when given, else the current directory.
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base: base.unwrap_or_else(|| PathBuf::from(".")) }
    }

    pub fn bronze(&self) -> PathBuf {
        self.base.join(BRONZE)
    }

    pub fn silver_out(&self, pull_date: &str) -> PathBuf {
        self.base.join(SILVER).join(format!("pull_date={pull_date}"))
    }

    pub fn gold_out(&self, pull_date: &str) -> PathBuf {
        self.base.join(GOLD).join(format!("pull_date={pull_date}"))
    }

    pub fn gold_current(&self) -> PathBuf {
        self.base.join(GOLD).join("current")
    }

    pub fn default_config(&self) -> PathBuf {
        self.base.join(OPS).join(CONFIG_FILE)
    }
}

/// Load the run config: an explicit file, else `<base>/_ops/caseflow.toml`
/// when it exists, else defaults. Returns the file actually used.
pub fn load_config(explicit: Option<&Path>, layout: &Layout) -> Result<(ReconConfig, Option<PathBuf>), CliError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = layout.default_config();
            if !fallback.is_file() {
                log::debug!("no config at {}, using defaults", fallback.display());
                return Ok((ReconConfig::default(), None));
            }
            fallback
        }
    };
    let config = read_config(&path)?;
    Ok((config, Some(path)))
}

fn read_config(path: &Path) -> Result<ReconConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::config(format!("cannot read config {}: {e}", path.display())))?;
    ReconConfig::from_toml(&text).map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

pub fn cmd_check_config(path: &Path) -> Result<(), CliError> {
    let config = read_config(path)?;
    eprintln!(
        "config ok: {} ({} excluded programs, assessment expiry {} days)",
        config.name,
        config.excluded_programs.len(),
        config.rules.assessment_expiry_days
    );
    Ok(())
}
