//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the operator-defined models file
    #[serde(default = "default_models_file")]
    pub models_file: PathBuf,

    /// Path of the caller API-key file
    #[serde(default = "default_api_keys_file")]
    pub api_keys_file: PathBuf,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl GatewayConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(models) = &cli.models {
            config.models_file = models.clone();
        }
        if let Some(keys) = &cli.api_keys {
            config.api_keys_file = keys.clone();
        }

        Ok(config)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            models_file: default_models_file(),
            api_keys_file: default_api_keys_file(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_models_file() -> PathBuf {
    PathBuf::from("./models.json")
}

fn default_api_keys_file() -> PathBuf {
    PathBuf::from("./api_keys.json")
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}
