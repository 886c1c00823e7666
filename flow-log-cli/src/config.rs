//! Configuration loading and parsing

use anyhow::{Context, Result};
use flow_log_decoder::{FieldMask, FormatConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Logs to read when none are given on the command line
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Field mask spec, e.g. "brief", "all" or "tag,src_addr,dst_addr"
    #[serde(default = "default_fields")]
    pub fields: FieldMask,
    #[serde(default)]
    pub utc: bool,
    /// Write records here instead of stdout
    pub file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            fields: default_fields(),
            utc: false,
            file: None,
        }
    }
}

fn default_fields() -> FieldMask {
    FieldMask::BRIEF
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputConfig {
    pub fn format_config(&self) -> FormatConfig {
        FormatConfig::new()
            .with_field_mask(self.fields)
            .with_utc(self.utc)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
