// crates/secure-broadcast-config/src/properties.rs
// ============================================================================
// Module: Property File Loading
// Description: TOML property file loading with path resolution and limits.
// Purpose: Flatten the `[broadcaster]` table into the flat key space.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Property files are TOML documents whose `[broadcaster]` table is flattened
//! into dotted keys: nested tables extend the key prefix and arrays of scalars
//! are joined with commas. Other top-level tables are ignored.
//! Path resolution: explicit path, then [`CONFIG_ENV_VAR`], then
//! [`DEFAULT_CONFIG_NAME`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use toml::Table;
use toml::Value;

use crate::settings::ConfigError;
use crate::settings::MAX_PATH_COMPONENT_LENGTH;
use crate::settings::MAX_TOTAL_PATH_LENGTH;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default property filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "secure-broadcast.toml";
/// Environment variable overriding the property file path.
pub const CONFIG_ENV_VAR: &str = "SECURE_BROADCAST_CONFIG";
/// Maximum property file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Root table flattened into the `broadcaster.` key prefix.
const ROOT_TABLE: &str = "broadcaster";
/// Maximum table nesting below the root table.
const MAX_TABLE_DEPTH: usize = 8;

// ============================================================================
// SECTION: File Model
// ============================================================================

/// Top-level property file layout.
#[derive(Debug, Deserialize)]
struct PropertyFile {
    /// Broadcaster settings table.
    #[serde(default)]
    broadcaster: Table,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads and flattens a property file using the default resolution rules.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, exceeds limits, or is
/// not valid TOML.
pub fn load_properties(path: Option<&Path>) -> Result<BTreeMap<String, String>, ConfigError> {
    let resolved = resolve_path(path)?;
    validate_path(&resolved)?;
    let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
    parse_properties(content)
}

/// Parses TOML text and flattens its `[broadcaster]` table.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for invalid TOML and
/// [`ConfigError::Invalid`] for values that cannot be flattened.
pub fn parse_properties(content: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let file: PropertyFile =
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
    let mut flat = BTreeMap::new();
    flatten_table(ROOT_TABLE, &file.broadcaster, 0, &mut flat)?;
    Ok(flat)
}

// ============================================================================
// SECTION: Flattening
// ============================================================================

/// Flattens a table into dotted keys under `prefix`.
fn flatten_table(
    prefix: &str,
    table: &Table,
    depth: usize,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    if depth > MAX_TABLE_DEPTH {
        return Err(ConfigError::Invalid(format!("{prefix} nests too deeply")));
    }
    for (name, value) in table {
        let key = format!("{prefix}.{name}");
        match value {
            Value::Table(inner) => flatten_table(&key, inner, depth + 1, out)?,
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(|item| scalar_text(&key, item))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(",");
                out.insert(key, joined);
            }
            other => {
                let text = scalar_text(&key, other)?;
                out.insert(key, text);
            }
        }
    }
    Ok(())
}

/// Renders a scalar TOML value as property text.
fn scalar_text(key: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Integer(number) => Ok(number.to_string()),
        Value::Float(number) => Ok(number.to_string()),
        Value::Boolean(flag) => Ok(flag.to_string()),
        Value::Datetime(stamp) => Ok(stamp.to_string()),
        Value::Array(_) | Value::Table(_) => {
            Err(ConfigError::Invalid(format!("{key} must hold scalar values")))
        }
    }
}

// ============================================================================
// SECTION: Path Helpers
// ============================================================================

/// Resolves the property file path from the caller or environment defaults.
pub(crate) fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
