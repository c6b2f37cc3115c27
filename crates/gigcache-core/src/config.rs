//! Application configuration management.
//!
//! Settings come from `~/.config/gigcache/config.json` and can be overridden
//! by environment variables (a `.env` file is loaded by the frontend first):
//! `API_BASE_URL`, `SHOWS_ENDPOINT`, `SHOWS_PROXY_ENDPOINT`,
//! `GIGCACHE_ORIGIN`, `GIGCACHE_LAT`, `GIGCACHE_LON`, `GIGCACHE_TOKEN` and
//! `GIGCACHE_REMOTE_DOC`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::CACHE_TTL;
use crate::endpoint::EndpointOverrides;
use crate::geo::GEOLOCATION_TIMEOUT;
use crate::models::Location;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "gigcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub shows_endpoint: Option<String>,
    pub default_endpoint: Option<String>,
    /// Origin the frontend is served from, if any.
    pub origin: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cache_ttl_hours: Option<u64>,
    pub geolocation_timeout_secs: Option<u64>,
    /// Keychain account holding the bearer token.
    pub auth_username: Option<String>,
    pub remote_document_url: Option<String>,
    /// Only ever taken from the environment.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// File settings with environment overrides applied. A broken config
    /// file is logged and replaced by defaults.
    pub fn load_with_env() -> Self {
        let mut config = match Self::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where cached events, saved state and the session live.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Overlay values from `lookup` (normally the process environment).
    /// Blank values are ignored; unparsable coordinates are logged and
    /// ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("API_BASE_URL") {
            self.api_base_url = Some(v);
        }
        if let Some(v) = get("SHOWS_ENDPOINT") {
            self.shows_endpoint = Some(v);
        }
        if let Some(v) = get("SHOWS_PROXY_ENDPOINT") {
            self.default_endpoint = Some(v);
        }
        if let Some(v) = get("GIGCACHE_ORIGIN") {
            self.origin = Some(v);
        }
        if let Some(v) = get("GIGCACHE_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = get("GIGCACHE_REMOTE_DOC") {
            self.remote_document_url = Some(v);
        }
        for (key, slot) in [("GIGCACHE_LAT", &mut self.latitude), ("GIGCACHE_LON", &mut self.longitude)] {
            if let Some(v) = get(key) {
                match v.parse::<f64>() {
                    Ok(parsed) if parsed.is_finite() => *slot = Some(parsed),
                    _ => warn!(key, value = %v, "Ignoring unparsable coordinate"),
                }
            }
        }
    }

    /// The API base: the explicit setting, else the origin the frontend is
    /// served from.
    pub fn base_url(&self) -> &str {
        fn non_blank(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }
        non_blank(&self.api_base_url)
            .or_else(|| non_blank(&self.origin))
            .unwrap_or("")
    }

    /// Only an explicitly configured API base counts as an override.
    pub fn endpoint_overrides(&self) -> EndpointOverrides {
        EndpointOverrides {
            shows_endpoint: self.shows_endpoint.clone(),
            api_base_url: self.api_base_url.clone(),
            default_endpoint: self.default_endpoint.clone(),
        }
    }

    /// Configured search origin, when both coordinates are set.
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Location::new(lat, lon)),
            _ => None,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl_hours
            .map(|hours| Duration::from_secs(hours * 60 * 60))
            .unwrap_or(CACHE_TTL)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        self.geolocation_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(GEOLOCATION_TIMEOUT)
    }
}
