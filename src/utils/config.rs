use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Documentation gate configuration
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Configuration slice owned by the documentation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwaggerConfig {
    /// Guarded URI prefix; the gate falls back to `/swagger` when unset.
    pub uri: Option<String>,
    pub username: String,
    pub password: String,
    /// `role:key` entries; empty disables the access-key check.
    pub access_keys: Vec<String>,
    pub local_bypass_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3001".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid PORT value"))?,
            },
            swagger: SwaggerConfig {
                uri: env::var("SWAGGER_URI").ok().filter(|uri| !uri.is_empty()),
                username: env::var("SWAGGER_USERNAME")
                    .map_err(|_| anyhow::anyhow!("SWAGGER_USERNAME is required"))?,
                password: env::var("SWAGGER_PASSWORD")
                    .map_err(|_| anyhow::anyhow!("SWAGGER_PASSWORD is required"))?,
                access_keys: env::var("SWAGGER_ACCESS_KEYS")
                    .map(|keys| {
                        keys.split(',')
                            .map(|entry| entry.trim().to_string())
                            .filter(|entry| !entry.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                local_bypass_enabled: env::var("SWAGGER_LOCAL_BYPASS_ENABLED")
                    .map(|flag| flag == "true")
                    .unwrap_or(false),
            },
        };

        Ok(config)
    }
}
