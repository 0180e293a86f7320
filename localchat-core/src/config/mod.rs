//! Configuration module for localchat
//!
//! This module provides the configuration schema and validation for local
//! model construction. The weights cache and allocator tuning are plain
//! fields handed to the model loader; nothing here touches the process
//! environment.

mod env;
mod error;
mod schema;
mod validator;

pub use env::interpolate_env_vars;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{Device, LocalModelConfig, Quantization};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;
use tracing::debug;

/// Location and message of a parse failure
type ParseFailure = (Option<usize>, Option<usize>, String);

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<LocalModelConfig> {
    load(path.as_ref(), "YAML", |text| {
        serde_yaml::from_str(text).map_err(|e| {
            let at = e.location();
            (at.as_ref().map(|l| l.line()), at.map(|l| l.column()), e.to_string())
        })
    })
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<LocalModelConfig> {
    load(path.as_ref(), "JSON", |text| {
        serde_json::from_str(text).map_err(|e| (Some(e.line()), Some(e.column()), e.to_string()))
    })
}

/// Load a configuration, picking the format from the file extension
/// (`.json`, anything else is read as YAML)
pub fn load_from_path<P: AsRef<Path>>(path: P) -> ConfigResult<LocalModelConfig> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_from_json(path),
        _ => load_from_yaml(path),
    }
}

/// Read, interpolate `${VAR}` references, parse, then validate
fn load<F>(path: &Path, format: &'static str, parse: F) -> ConfigResult<LocalModelConfig>
where
    F: FnOnce(&str) -> Result<LocalModelConfig, ParseFailure>,
{
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let interpolated = env::interpolate_env_vars(&content)?;

    let config = parse(&interpolated).map_err(|(line, column, message)| ConfigError::Parse {
        path: path.to_path_buf(),
        format,
        line,
        column,
        message,
    })?;

    ConfigValidator::new().validate(&config)?;
    debug!(model_id = %config.model_id, "Loaded {} model config from {}", format, path.display());
    Ok(config)
}
