use crate::{
    app::{backend::AppBackend, local::AppLocal, remote::AppRemote},
    config::Config,
    semantic::ModelResources,
    storage,
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

pub const BASE_PATH_ENV: &str = "HISTAG_BASE_PATH";
pub const ADDR_ENV: &str = "HISTAG_ADDR";

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Backend for CLI commands: the daemon at `HISTAG_ADDR` if set,
    /// otherwise the local data directory.
    pub fn create_backend(paths: &AppPaths) -> Result<Box<dyn AppBackend>> {
        match std::env::var(ADDR_ENV) {
            Ok(addr) => {
                log::info!("Using remote backend: {}", addr);
                Ok(Box::new(AppRemote::new(&addr)))
            }
            Err(_) => Ok(Box::new(Self::create_local_app(paths)?)),
        }
    }

    /// Create a local application instance
    pub fn create_local_app(paths: &AppPaths) -> Result<AppLocal> {
        let config = Self::create_config(&paths.base_path)?;
        Self::create_local_app_with(paths, config)
    }

    pub fn create_local_app_with(paths: &AppPaths, config: Arc<RwLock<Config>>) -> Result<AppLocal> {
        let kv = storage::BackendLocal::new(&paths.data_path)
            .context("Failed to create data directory")?;

        let resources = {
            let config = config
                .read()
                .map_err(|err| anyhow::anyhow!("config lock poisoned: {err}"))?;
            ModelResources::new(
                config.semantic_search.clone(),
                config.classifier.clone(),
                PathBuf::from(config.base_path()),
            )
        };

        Ok(AppLocal::new(config, Arc::new(kv), Arc::new(resources))?)
    }

    /// Get application paths with validation
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        Ok(AppPaths::new(base_path))
    }

    /// Load (or create) `config.yaml` in the base directory
    pub fn create_config(base_path: &str) -> Result<Arc<RwLock<Config>>> {
        let config = Config::load_with(base_path)
            .with_context(|| format!("Failed to load config from {base_path}"))?;

        Ok(Arc::new(RwLock::new(config)))
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var(BASE_PATH_ENV) {
            return Ok(base_path);
        }

        let home = my_home()
            .map_err(|err| anyhow::anyhow!("Could not determine home directory: {err:?}"))?
            .context("Home directory path is empty")?;
        Ok(format!("{}/.local/share/histag", home.to_string_lossy()))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: String,
    /// One json file per store key
    pub data_path: String,
}

impl AppPaths {
    pub fn new(base_path: String) -> Self {
        let data_path = format!("{base_path}/data");
        Self {
            base_path,
            data_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths() {
        let paths = AppPaths::new("/test/base".to_string());

        assert_eq!(paths.base_path, "/test/base");
        assert_eq!(paths.data_path, "/test/base/data");
    }

    #[test]
    fn test_create_config_in_fresh_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("nested");
        let config = AppFactory::create_config(base.to_str().unwrap()).unwrap();

        assert!(base.join("config.yaml").exists());
        assert_eq!(config.read().unwrap().classifier.top_n, 3);
    }
}
