//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Environment variable overriding `storage.url`.
pub const ENV_STORAGE_URL: &str = "SUPABASE_URL";
/// Environment variable overriding `storage.service_key`.
pub const ENV_SERVICE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Analysis service location.
    pub api: ApiCfg,
    /// Object storage used to stage uploads.
    pub storage: StorageCfg,
    /// Cosmetic progress cadence.
    #[serde(default)]
    pub progress: ProgressCfg,
}

/// Analysis API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCfg {
    /// Base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
}

/// Supabase Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCfg {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Bucket receiving the staged CSV files.
    pub bucket: String,
    /// Service role key. Usually left empty and supplied via the environment.
    #[serde(default)]
    pub service_key: String,
}

/// Progress indicator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCfg {
    /// Milliseconds between cosmetic progress steps.
    pub tick_ms: u64,
}

impl Default for ProgressCfg {
    fn default() -> Self {
        Self { tick_ms: 3000 }
    }
}

impl ProgressCfg {
    /// Tick period, never zero.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Copy with `SUPABASE_URL` / `SUPABASE_SERVICE_ROLE_KEY` applied.
    /// The result is handed to the worker and never saved.
    pub fn with_env_overrides(&self) -> Self {
        self.with_overrides(
            std::env::var(ENV_STORAGE_URL).ok(),
            std::env::var(ENV_SERVICE_KEY).ok(),
        )
    }

    /// Apply storage overrides; empty values are ignored.
    pub fn with_overrides(&self, url: Option<String>, service_key: Option<String>) -> Self {
        let mut cfg = self.clone();
        if let Some(url) = url.filter(|v| !v.trim().is_empty()) {
            cfg.storage.url = url;
        }
        if let Some(key) = service_key.filter(|v| !v.trim().is_empty()) {
            cfg.storage.service_key = key;
        }
        cfg
    }

    /// Whether staging to storage can be attempted at all.
    pub fn storage_configured(&self) -> bool {
        !self.storage.url.is_empty()
            && !self.storage.bucket.is_empty()
            && !self.storage.service_key.is_empty()
    }
}

impl Default for Config {
    /// Defaults point at a locally running analysis service.
    fn default() -> Self {
        Self {
            api: ApiCfg {
                base_url: "http://localhost:8000".into(),
            },
            storage: StorageCfg {
                url: "".into(),
                bucket: "csv-uploads".into(),
                service_key: "".into(),
            },
            progress: ProgressCfg::default(),
        }
    }
}
