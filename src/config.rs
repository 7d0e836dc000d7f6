use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Value shipped in sample configs; treated the same as no key at all
pub const PLACEHOLDER_API_KEY: &str = "your-api-key-here";

pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key stored in the config file. The environment wins when both are set.
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Model name inserted into the endpoint path
    pub model: String,

    /// API root, without trailing slash
    pub base_url: String,

    /// Request timeout; unset leaves the HTTP client default in place
    pub request_timeout_secs: Option<u64>,

    /// UI preferences
    pub ui: UiConfig,

    /// NovaGem home directory (config, logs)
    #[serde(skip)]
    pub home: PathBuf,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_welcome: bool,
    pub tick_rate_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_welcome: true,
            tick_rate_ms: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".novagem");

        Config {
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            ui: UiConfig::default(),
            home,
        }
    }
}

impl Config {
    /// Load `~/.novagem/config.toml`, falling back to defaults when it is missing
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir()
            .context("Could not find home directory")?
            .join(".novagem");
        let mut config = Self::load_from(&home.join("config.toml"))?;
        config.home = home;
        Ok(config)
    }

    /// Load a specific config file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            info!(path = %path.display(), "loaded config");
            config
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        };

        if let Some(parent) = path.parent() {
            config.home = parent.to_path_buf();
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Make sure the home directory exists (log file lives there)
    pub fn ensure_home(&self) -> Result<()> {
        fs::create_dir_all(&self.home)
            .with_context(|| format!("Failed to create {}", self.home.display()))
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join("novagem.log")
    }

    /// Resolve the API key right now.
    ///
    /// Read on every call so a key exported after startup is picked up.
    /// Blank values and [`PLACEHOLDER_API_KEY`] are treated as missing.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| is_usable_key(key))
            .or_else(|| self.api_key.clone().filter(|key| is_usable_key(key)))
            .map(|key| key.trim().to_string())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Full `generateContent` URL for the configured model
    pub fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != PLACEHOLDER_API_KEY
}
