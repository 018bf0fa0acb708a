use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::provider::Provider;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_BASE_URL: &str = "http://localhost:8080/v1";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub ollama_url: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some("ollama".to_string()),
            model: None,
            ollama_url: None,
            openai_base_url: None,
            openai_api_key: None,
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_key(std::env::var("OPENAI_API_KEY").ok());
        Ok(config)
    }

    /// An API key from the environment wins over the stored one.
    fn apply_env_key(&mut self, env_key: Option<String>) {
        if let Some(key) = env_key.filter(|key| !key.is_empty()) {
            self.openai_api_key = Some(key);
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Provider named in the config, falling back to Ollama.
    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Ollama)
    }

    /// Model to load, falling back to the provider's default.
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    pub fn openai_base_url(&self) -> &str {
        self.openai_base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL)
    }

    /// Base URL of whichever server the current provider talks to.
    pub fn server_url(&self) -> &str {
        match self.provider() {
            Provider::Ollama => self.ollama_url(),
            Provider::OpenAI => self.openai_base_url(),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("localchat").join("config.json"))
    }
}
