use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::PcmFormat;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub uploads: UploadsConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

#[derive(Debug, Deserialize)]
pub struct UploadsConfig {
    pub path: String,
}

impl Config {
    /// Load `path` (extension optional), then apply `HEARME_*` environment overrides
    ///
    /// Nested keys use `__`, e.g. `HEARME_SERVICE__HTTP__PORT=9000`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("HEARME")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        let config: Config = settings.try_deserialize()?;
        config
            .audio
            .format()
            .validate()
            .with_context(|| format!("Invalid [audio] format in {}", path))?;

        Ok(config)
    }
}

impl AudioConfig {
    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels, self.bits_per_sample)
    }

    pub fn recordings_dir(&self) -> PathBuf {
        expand_path(&self.recordings_path)
    }
}

impl UploadsConfig {
    pub fn dir(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
