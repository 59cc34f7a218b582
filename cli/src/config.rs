use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pantry_core::scale::ZeroTargetPolicy;
use pantry_core::session::SessionPolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScalingSettings {
    #[serde(default)]
    pub zero_target: ZeroTargetPolicy,
}

/// User-tunable settings, from `config.toml` then `PANTRY__*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub log_level: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub session: SessionPolicy,
    #[serde(default)]
    pub scaling: ScalingSettings,
}

impl Settings {
    /// Defaults, overridden by `file` when it exists, overridden by the
    /// environment (`PANTRY__API_URL`, `PANTRY__SESSION__TTL_HOURS`, ...).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("log_level", "warn")?
            .set_default("timeout_secs", 10)?
            .set_default("session.ttl_hours", 24)?
            .set_default("session.refresh_window_minutes", 60)?
            .set_default("scaling.zero_target", "fallback")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("PANTRY")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub struct Config {
    pub settings: Settings,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "pantry").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_file = proj_dirs.config_dir().join("config.toml");
        let settings = Settings::load(Some(&config_file))
            .with_context(|| format!("Failed to load {}", config_file.display()))?;

        Ok(Config {
            settings,
            data_dir,
            config_file,
        })
    }
}
