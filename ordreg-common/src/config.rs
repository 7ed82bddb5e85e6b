//! Configuration loading and root folder resolution
//!
//! Root folder resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents
///
/// Lives at `~/.config/ordreg/ordreg.toml` (platform equivalent elsewhere).
/// All fields optional; absent values fall through to the next resolution
/// tier or compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root data folder (database lives here)
    pub root_folder: Option<String>,
    /// Path to the master catalog JSON file
    pub catalog_path: Option<String>,
    /// Base URL of the remote extraction service (None = built-in extractor)
    pub extraction_service_url: Option<String>,
}

/// Resolve the root data folder
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_toml_config() {
        if let Some(root_folder) = config.root_folder {
            return PathBuf::from(root_folder);
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Load the TOML config file from the platform config directory
pub fn load_toml_config() -> Result<TomlConfig> {
    let path = toml_config_path()
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    read_toml_config(&path)
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Platform config file path (`~/.config/ordreg/ordreg.toml` on Linux)
pub fn toml_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ordreg").join("ordreg.toml"))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("ordreg"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ordreg"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("ordreg"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/ordreg"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("ordreg"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ordreg"))
    } else {
        PathBuf::from("./ordreg_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_arg_wins() {
        let root = resolve_root_folder(Some("/tmp/from-cli"), "ORDREG_TEST_UNSET_VAR");
        assert_eq!(root, PathBuf::from("/tmp/from-cli"));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ordreg.toml");

        let config = TomlConfig {
            root_folder: Some("/data/ordreg".to_string()),
            catalog_path: Some("/data/catalog.json".to_string()),
            extraction_service_url: None,
        };
        write_toml_config(&config, &path).unwrap();

        let loaded = read_toml_config(&path).unwrap();
        assert_eq!(loaded.root_folder.as_deref(), Some("/data/ordreg"));
        assert_eq!(loaded.catalog_path.as_deref(), Some("/data/catalog.json"));
        assert!(loaded.extraction_service_url.is_none());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(read_toml_config(&path).is_err());
    }
}
