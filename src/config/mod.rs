// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. CLI arguments (highest, applied by the caller)
    /// 2. Well-known deployment variables (`REDIS_URL`, `REDIS_HOST`, `PORT`, ...)
    /// 3. Prefixed environment variables (`AGROCACHE__SECTION__KEY`)
    /// 4. Config file
    /// 5. Defaults (lowest)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name(&Self::default_config_path()).required(false),
        };

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix("AGROCACHE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut loaded: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        loaded.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(loaded)
    }

    /// Apply the conventional unprefixed variables used by deployment platforms.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("REDIS_URL") {
            self.cache.url = Some(url);
        }
        if let Some(host) = lookup("REDIS_HOST") {
            self.cache.host = Some(host);
        }
        if let Some(port) = lookup("REDIS_PORT") {
            self.cache.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("REDIS_PORT is not a valid port: {}", port)))?;
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.cache.password = Some(password);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("PORT is not a valid port: {}", port)))?;
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agrocache")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
