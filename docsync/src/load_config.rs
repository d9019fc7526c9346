/// `load_config` module: loads the static YAML config file and resolves the
/// BookStack credentials from the environment.
///
/// The file never carries secrets. `BOOKSTACK_TOKEN_ID` and
/// `BOOKSTACK_TOKEN_SECRET` are read only when a command needs the remote,
/// see [`Credentials::from_env`].
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use docsync_core::migrate::MigrationPaths;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::bookstack::{DEFAULT_TIMEOUT, TOKEN_ID_ENV, TOKEN_SECRET_ENV};

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Root of the markdown tree.
    pub docs_root: PathBuf,
    /// Structure definition YAML.
    pub structure: PathBuf,
    /// Where the validation report is written, if anywhere.
    #[serde(default)]
    pub report: Option<PathBuf>,
    #[serde(default)]
    pub bookstack: Option<BookStackSection>,
    #[serde(default)]
    pub migrate: Option<MigrateSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookStackSection {
    pub url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl BookStackSection {
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrateSection {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub moved_dir: PathBuf,
    pub log: PathBuf,
    /// Custom routing table; the built-in one is used otherwise.
    #[serde(default)]
    pub rules: Option<PathBuf>,
}

impl MigrateSection {
    pub fn paths(&self) -> MigrationPaths {
        MigrationPaths {
            source_dir: self.source_dir.clone(),
            target_dir: self.target_dir.clone(),
            moved_dir: self.moved_dir.clone(),
            log: self.log.clone(),
        }
    }
}

/// BookStack API token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token_id: String,
    pub token_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token_id", &self.token_id)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let read = |key: &str| {
            env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    error!(variable = key, "Required environment variable missing");
                    anyhow::anyhow!("{key} must be set (environment or .env)")
                })
        };
        Ok(Credentials {
            token_id: read(TOKEN_ID_ENV)?,
            token_secret: read(TOKEN_SECRET_ENV)?,
        })
    }
}

/// Loads a static YAML config file (no secrets).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            e
        })
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}
