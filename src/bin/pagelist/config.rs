use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Values read from the CLI config file. Every field is optional; command
/// line flags take precedence.
#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        validate(&data)?;
        Ok(Self { path, data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn store(&self) -> &StoreSection {
        &self.data.store
    }

    pub fn list(&self) -> &ListSection {
        &self.data.list
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate(data: &RawConfig) -> Result<(), ConfigError> {
    if let Some(page_size) = data.store.page_size {
        if !page_size.is_power_of_two() {
            return Err(ConfigError::InvalidValue {
                key: "store.page_size",
                value: page_size.to_string(),
            });
        }
    }
    if data.list.max_stripes_per_bucket == Some(0) {
        return Err(ConfigError::InvalidValue {
            key: "list.max_stripes_per_bucket",
            value: "0".to_string(),
        });
    }
    if data.list.stripe_contention_threshold == Some(0) {
        return Err(ConfigError::InvalidValue {
            key: "list.stripe_contention_threshold",
            value: "0".to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    store: StoreSection,
    #[serde(default)]
    list: ListSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StoreSection {
    pub page_size: Option<u32>,
    pub verify_checksums: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListSection {
    pub name: Option<String>,
    pub group: Option<u32>,
    pub cache_pages_per_bucket: Option<usize>,
    pub cache_limit_pages: Option<usize>,
    pub max_stripes_per_bucket: Option<usize>,
    pub stripe_contention_threshold: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config value {key} = '{value}' is invalid")]
    InvalidValue { key: &'static str, value: String },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("pagelist").join("config.toml"))
}
