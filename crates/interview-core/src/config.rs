use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENV_BASE_URL: &str = "INTERVIEW_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "INTERVIEW_TIMEOUT_SECS";

/// How the floating chat overlay relates to the primary Chat view.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMode {
    /// Independent scratch conversation.
    #[default]
    Separate,
    /// Presents the primary Chat conversation.
    Shared,
    Off,
}

impl OverlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayMode::Separate => "separate",
            OverlayMode::Shared => "shared",
            OverlayMode::Off => "off",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "separate" => Ok(OverlayMode::Separate),
            "shared" => Ok(OverlayMode::Shared),
            "off" | "none" => Ok(OverlayMode::Off),
            _ => Err(ConfigError::InvalidOverlayMode(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub candidate_name: Option<String>,
    pub overlay_mode: OverlayMode,
    pub resume_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            candidate_name: None,
            overlay_mode: OverlayMode::Separate,
            resume_extensions: vec!["pdf".to_string()],
        }
    }

    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        config.validated()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply `INTERVIEW_*` environment overrides.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(
            std::env::var(ENV_BASE_URL).ok(),
            std::env::var(ENV_TIMEOUT_SECS).ok(),
        )
    }

    pub fn apply_overrides(
        mut self,
        base_url: Option<String>,
        timeout_secs: Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        if let Some(raw) = timeout_secs {
            self.request_timeout_secs = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
        }
        self.validated()
    }

    /// Check the base URL and normalise it (no trailing slash).
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("0".to_string()));
        }
        self.base_url = trimmed;
        self.resume_extensions = self
            .resume_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join("interview-assistant").join("config.json"))
    }
}
