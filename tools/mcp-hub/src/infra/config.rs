use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shared::utils::join_under;

const CONFIG_DIR_ENV: &str = "APP_CONFIG_DIR";
const CONFIG_PROFILE_ENV: &str = "APP_CONFIG_PROFILE";
const DEFAULT_CONFIG_DIR: &str = "config";
const DEFAULT_PROFILE: &str = "default";

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_DISCOVERY_PATH: &str = "/api/mcp/discover";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub backend_url: Option<String>,
    pub discovery_path: Option<String>,
    pub persistence_url: Option<String>,
    pub listen_addr: Option<String>,
    pub handshake_timeout_ms: Option<u64>,
    pub metrics_auth_token: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let base_dir = env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));
        Self::load_from_dir(&base_dir)
    }

    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut config = AppConfig::default();
        let mut overlays = Vec::new();

        if dir.exists() {
            let mut profiles = vec![DEFAULT_PROFILE.to_string()];
            if let Ok(active_profile) = env::var(CONFIG_PROFILE_ENV) {
                if !active_profile.trim().is_empty() && active_profile != DEFAULT_PROFILE {
                    profiles.push(active_profile);
                }
            }
            profiles.push("local".to_string());

            for profile in profiles {
                let candidate = dir.join(format!("{profile}.toml"));
                if let Some(overlay) = ConfigOverlay::from_file(&candidate)? {
                    overlays.push(overlay);
                }
            }
        }

        overlays.push(ConfigOverlay::from_env());

        for overlay in overlays {
            config.apply_overlay(overlay);
        }

        Ok(config)
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(value) = overlay.backend_url {
            self.backend_url = Some(value);
        }
        if let Some(value) = overlay.discovery_path {
            self.discovery_path = Some(value);
        }
        if let Some(value) = overlay.persistence_url {
            self.persistence_url = Some(value);
        }
        if let Some(value) = overlay.listen_addr {
            self.listen_addr = Some(value);
        }
        if let Some(value) = overlay.handshake_timeout_ms {
            self.handshake_timeout_ms = Some(value);
        }
        if let Some(value) = overlay.metrics_auth_token {
            self.metrics_auth_token = Some(value);
        }
    }

    pub fn backend_url(&self) -> Result<Url> {
        let raw = self.backend_url.as_deref().unwrap_or(DEFAULT_BACKEND_URL);
        Url::parse(raw).with_context(|| format!("parse MCP_HUB_BACKEND_URL '{}'", raw))
    }

    pub fn discovery_path(&self) -> String {
        let path = self
            .discovery_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_DISCOVERY_PATH);
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }

    /// Full URL the discovery client posts to.
    pub fn discovery_endpoint(&self) -> Result<Url> {
        join_under(&self.backend_url()?, &self.discovery_path())
    }

    pub fn persistence_url(&self) -> Result<Url> {
        match self.persistence_url.as_deref() {
            Some(raw) => {
                Url::parse(raw).with_context(|| format!("parse MCP_HUB_PERSISTENCE_URL '{}'", raw))
            }
            None => self.backend_url(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let raw = self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR);
        raw.parse::<SocketAddr>()
            .with_context(|| format!("parse MCP_HUB_LISTEN_ADDR '{}'", raw))
    }

    pub fn handshake_timeout(&self) -> Result<Duration> {
        match self.handshake_timeout_ms.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_MS) {
            0 => Err(anyhow!("handshake_timeout_ms must be greater than zero")),
            ms => Ok(Duration::from_millis(ms)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    backend_url: Option<String>,
    discovery_path: Option<String>,
    persistence_url: Option<String>,
    listen_addr: Option<String>,
    handshake_timeout_ms: Option<u64>,
    metrics_auth_token: Option<String>,
}

impl ConfigOverlay {
    fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let overlay: Self = toml::from_str(&contents)
            .with_context(|| format!("parse config file {}", path.display()))?;
        Ok(Some(overlay))
    }

    fn from_env() -> Self {
        let handshake_timeout_ms = env::var("MCP_HUB_HANDSHAKE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            backend_url: env::var("MCP_HUB_BACKEND_URL").ok(),
            discovery_path: env::var("MCP_HUB_DISCOVERY_PATH").ok(),
            persistence_url: env::var("MCP_HUB_PERSISTENCE_URL").ok(),
            listen_addr: env::var("MCP_HUB_LISTEN_ADDR").ok(),
            handshake_timeout_ms,
            metrics_auth_token: env::var("METRICS_AUTH_TOKEN").ok(),
        }
    }
}
