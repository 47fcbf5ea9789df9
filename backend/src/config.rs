//! # Settlement Configuration
//!
//! Runtime configuration read from an optional YAML file.
//!
//! ## YAML Format
//!
//! ```yaml
//! server:
//!   bind_addr: "127.0.0.1:3000"
//!   allowed_origin: "http://localhost:8080"
//! store:
//!   kind: http
//!   base_url: "http://localhost:4000/api"
//!   timeout_secs: 30
//! cache:
//!   reference_ttl_ms: 60000
//! ```
//!
//! Every key is optional. The file path comes from `SETTLEMENT_CONFIG`;
//! `SETTLEMENT_STORE_URL` overrides `store.base_url` and selects the HTTP store.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "SETTLEMENT_CONFIG";
pub const STORE_URL_ENV: &str = "SETTLEMENT_STORE_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Origin allowed by the CORS layer
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            allowed_origin: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Http,
    #[default]
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub reference_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reference_ttl_ms: 60_000,
        }
    }
}

impl CacheConfig {
    pub fn reference_ttl(&self) -> Duration {
        Duration::from_millis(self.reference_ttl_ms)
    }
}

impl SettlementConfig {
    /// Load from `SETTLEMENT_CONFIG` if set, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                debug!("{} not set, using default configuration", CONFIG_PATH_ENV);
                Self::default()
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml_content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: SettlementConfig = serde_yaml::from_str(&yaml_content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(STORE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            info!("Using store at {} from {}", url, STORE_URL_ENV);
            self.store.base_url = Some(url);
            self.store.kind = StoreKind::Http;
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.server.bind_addr))
    }
}
