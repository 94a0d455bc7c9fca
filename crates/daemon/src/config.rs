// Daemon configuration: optional file layered under ADMIT_* environment variables

use admit_core::application::service::constants::DEFAULT_CYCLE_INTERVAL;
use admit_core::AdmissionConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "ADMIT";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    #[default]
    Pretty,
    /// Production: JSON structured logging
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub cycle_interval_ms: u64,
    /// JSON file with initial queues and units
    pub seed_path: Option<String>,
    pub log_format: LogFormat,
    /// Adds a daily rolling log file when set
    pub log_dir: Option<String>,
    /// Priority class name -> value
    pub priority_classes: HashMap<String, i32>,
    pub admission: AdmissionConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: DEFAULT_CYCLE_INTERVAL.as_millis() as u64,
            seed_path: None,
            log_format: LogFormat::default(),
            log_dir: None,
            priority_classes: HashMap::new(),
            admission: AdmissionConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from an optional file, then apply `ADMIT_*` overrides
    /// (`ADMIT_ADMISSION__STRICT_HEAD_OF_LINE=true`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let cfg: DaemonConfig = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.cycle_interval_ms == 0 {
            anyhow::bail!("cycle_interval_ms must be positive");
        }
        if self.admission.backoff.factor < 1.0 {
            anyhow::bail!("admission.backoff.factor must be >= 1.0");
        }
        Ok(())
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn seed_path(&self) -> Option<PathBuf> {
        self.seed_path.as_deref().map(expand)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(expand)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
