//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for scribe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Chat-completions base URL
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// System prompt for every conversation
    pub system_prompt: Option<String>,
    /// Directory for conversation logs
    pub data_dir: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scribe")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for SCRIBE_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("SCRIBE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Create the config file with defaults if it does not exist yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }
}

/// Example config shown by `--init-config`
pub fn example_config() -> &'static str {
    r#"# scribe configuration
# model = "qwen-plus"
# base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
# api_key_env = "DASHSCOPE_API_KEY"
# system_prompt = "You are an interactive report-writing assistant."
# data_dir = "/path/to/conversation/logs"
"#
}
