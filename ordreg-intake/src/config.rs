//! Configuration resolution for the intake service
//!
//! Multi-tier resolution: ENV → TOML → compiled default. Pipeline
//! tuning parameters live in the settings table instead (see `params`);
//! this module resolves the values needed before the database exists.

use ordreg_common::config::TomlConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the root data folder
pub const ROOT_FOLDER_ENV: &str = "ORDREG_ROOT_FOLDER";
/// Environment variable naming the catalog JSON file
pub const CATALOG_PATH_ENV: &str = "ORDREG_CATALOG_PATH";
/// Environment variable naming the extraction service base URL
pub const EXTRACTION_URL_ENV: &str = "ORDREG_EXTRACTION_URL";

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Root data folder (database lives here)
    pub root_folder: PathBuf,
    /// Master catalog JSON file
    pub catalog_path: PathBuf,
    /// Remote extraction service base URL (None = built-in extractor)
    pub extraction_service_url: Option<String>,
}

impl IntakeConfig {
    /// Resolve configuration from environment and TOML
    pub fn resolve(cli_root: Option<&str>) -> Self {
        let toml_config = ordreg_common::config::load_toml_config().unwrap_or_default();

        let root_folder = ordreg_common::config::resolve_root_folder(cli_root, ROOT_FOLDER_ENV);

        let catalog_path = std::env::var(CATALOG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(|| toml_config.catalog_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| root_folder.join("catalog.json"));

        let extraction_service_url = std::env::var(EXTRACTION_URL_ENV)
            .ok()
            .or_else(|| toml_config.extraction_service_url.clone());

        let config = Self {
            root_folder,
            catalog_path,
            extraction_service_url,
        };
        info!(
            root = %config.root_folder.display(),
            catalog = %config.catalog_path.display(),
            extraction = config.extraction_service_url.as_deref().unwrap_or("<built-in>"),
            "Configuration resolved"
        );
        config
    }

    /// Database file path under the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("ordreg.db")
    }

    /// Ensure the root folder exists
    pub fn ensure_root_folder(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root_folder)
    }
}

/// Resolve which extractor to use from the configured URL
pub fn build_extractor(
    config: &IntakeConfig,
) -> std::sync::Arc<dyn crate::types::CandidateExtractor> {
    match &config.extraction_service_url {
        Some(url) => match crate::extract::RemoteExtractor::new(url) {
            Ok(remote) => {
                info!(url = %url, "Using remote extraction service");
                std::sync::Arc::new(remote)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote extractor init failed, using built-in");
                std::sync::Arc::new(crate::extract::PatternExtractor::new())
            }
        },
        None => {
            info!("Using built-in pattern extractor");
            std::sync::Arc::new(crate::extract::PatternExtractor::new())
        }
    }
}

/// Load the catalog, or start with an empty index when the file is
/// missing (every lookup then blocks on missing_match until a reload)
pub fn load_catalog_or_empty(path: &Path) -> Vec<crate::catalog::CatalogEntry> {
    match crate::catalog::load_entries(path) {
        Ok(entries) => {
            info!(count = entries.len(), path = %path.display(), "Catalog loaded");
            entries
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Catalog unavailable, starting with empty index"
            );
            Vec::new()
        }
    }
}
