//! Application configuration management.
//!
//! Configuration is stored at `~/.config/pointsboard/config.json`. A few
//! settings can be overridden from the environment (or a `.env` file the
//! binary loads): `POINTSBOARD_BASE_URL` and `POINTSBOARD_CACHE_NAME`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::worker::{CacheStrategy, RevalidatePolicy, WorkerOptions};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "pointsboard";

const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:4200/";

/// Bump to invalidate every cached response
pub const DEFAULT_CACHE_NAME: &str = "static_site_cache_v1";

pub const BASE_URL_ENV: &str = "POINTSBOARD_BASE_URL";
pub const CACHE_NAME_ENV: &str = "POINTSBOARD_CACHE_NAME";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site root the asset paths are resolved against
    pub base_url: String,
    pub cache_name: String,
    pub strategy: CacheStrategy,
    pub revalidate: RevalidatePolicy,
    /// URLs stored when the worker installs
    pub precache: Vec<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            strategy: CacheStrategy::default(),
            revalidate: RevalidatePolicy::default(),
            precache: Vec::new(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from the user's config directory, then apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Non-empty values from `lookup` replace the stored settings.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = set(BASE_URL_ENV) {
            self.base_url = base_url;
        }
        if let Some(cache_name) = set(CACHE_NAME_ENV) {
            self.cache_name = cache_name;
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Directory holding every cache generation.
    pub fn cache_root(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            strategy: self.strategy,
            revalidate: self.revalidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_from(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_name, "static_site_cache_v1");
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = Config {
            base_url: "https://example.org/points/".to_string(),
            strategy: CacheStrategy::NetworkFirst,
            revalidate: RevalidatePolicy::OncePerSession,
            precache: vec!["https://example.org/points/index.html".to_string()],
            request_timeout_secs: Some(30),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(loaded.worker_options().strategy, CacheStrategy::NetworkFirst);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"revalidate": "once-per-session"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.revalidate, RevalidatePolicy::OncePerSession);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides_skip_blank_values() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            BASE_URL_ENV => Some("https://example.org/".to_string()),
            CACHE_NAME_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://example.org/");
        assert_eq!(config.cache_name, DEFAULT_CACHE_NAME);
    }
}
