//! Loading [`PipelineConfig`] from TOML and the environment.

use std::path::{Path, PathBuf};

use crime_pipeline_ingest_models::PipelineConfig;

/// Config file read from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "crime_pipeline.toml";

/// Environment variable overriding `api.url`.
pub const ENV_API_URL: &str = "CRIME_PIPELINE_API_URL";
/// Environment variable overriding `api.app_token`.
pub const ENV_APP_TOKEN: &str = "CRIME_PIPELINE_APP_TOKEN";
/// Environment variable overriding `storage.document_db`.
pub const ENV_DOCUMENT_DB: &str = "CRIME_PIPELINE_DOCUMENT_DB";
/// Environment variable overriding `storage.warehouse_db`.
pub const ENV_WAREHOUSE_DB: &str = "CRIME_PIPELINE_WAREHOUSE_DB";
/// Environment variable overriding `boundaries.path`.
pub const ENV_BOUNDARIES: &str = "CRIME_PIPELINE_BOUNDARIES";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Parses a TOML document. Missing sections and fields take defaults.
///
/// # Errors
///
/// Returns the TOML error if the document does not parse.
pub fn parse_config(text: &str) -> Result<PipelineConfig, toml::de::Error> {
    toml::de::from_str(text)
}

/// Loads configuration.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
/// read if present, otherwise the built-in defaults apply.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                log::debug!("No {DEFAULT_CONFIG_FILE} found; using defaults");
                return Ok(PipelineConfig::default());
            }
            default
        }
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&text).map_err(|source| ConfigError::Toml {
        path: path.clone(),
        source,
    })?;

    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Applies `CRIME_PIPELINE_*` overrides looked up through `lookup`.
///
/// Empty values are ignored.
pub fn apply_env_overrides(config: &mut PipelineConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

    if let Some(url) = get(ENV_API_URL) {
        config.api.url = url;
    }
    if let Some(token) = get(ENV_APP_TOKEN) {
        config.api.app_token = Some(token);
    }
    if let Some(path) = get(ENV_DOCUMENT_DB) {
        config.storage.document_db = PathBuf::from(path);
    }
    if let Some(path) = get(ENV_WAREHOUSE_DB) {
        config.storage.warehouse_db = PathBuf::from(path);
    }
    if let Some(path) = get(ENV_BOUNDARIES) {
        config.boundaries.path = PathBuf::from(path);
    }
}

/// Loads configuration and applies overrides from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_config_with_env(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}
