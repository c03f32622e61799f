//! `webhookd.toml` loading and CLI overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use warpgrid_webhooks::ControllerConfig;

pub const DEFAULT_DATA_DIR: &str = "/var/lib/webhookd";

/// Daemon settings as written in `webhookd.toml`.
///
/// ```toml
/// data_dir = "/var/lib/webhookd"
/// signing_key = "..."
///
/// [controller]
/// scan_interval = "30s"
/// probe_interval = "10s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub signing_key: Option<String>,
    pub controller: ControllerConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            signing_key: None,
            controller: ControllerConfig::default(),
        }
    }
}

/// Values given on the command line; each one replaces the file's.
#[derive(Debug, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub scan_interval: Option<Duration>,
    pub signing_key: Option<String>,
}

impl DaemonConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(s)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Read `path` if given, otherwise start from defaults, then apply
    /// `overrides` and validate the controller settings.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(data_dir) = overrides.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(scan_interval) = overrides.scan_interval {
            config.controller.scan_interval = scan_interval;
        }
        if let Some(key) = overrides.signing_key {
            config.signing_key = Some(key);
        }
        config.controller.validate()?;
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("webhooks.redb")
    }
}

/// clap value parser for duration flags.
pub fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    warpgrid_webhooks::config::parse_duration(s)
        .ok_or_else(|| format!("invalid duration {s:?} (expected e.g. 30s, 500ms, 2m)"))
}
