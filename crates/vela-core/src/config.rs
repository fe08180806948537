//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct VelaConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub softphone: SoftphoneConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma-separated allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9040
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Session token provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    /// Endpoint that issues telephony access tokens, e.g.
    /// `https://crm.example.com/api/token`. Empty means calling is
    /// unprovisioned and the softphone degrades to disabled.
    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_token_timeout")]
    pub timeout_secs: u64,
}

fn default_token_timeout() -> u64 {
    10
}

/// Softphone engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SoftphoneConfig {
    /// Run a scripted call through the lifecycle engine against the
    /// simulated device at startup (smoke-test mode for deployments
    /// without a telephony provider)
    #[serde(default)]
    pub simulate: bool,

    /// Identity used by the simulate mode
    #[serde(default = "default_simulate_identity")]
    pub simulate_identity: String,
}

fn default_simulate_identity() -> String {
    "agent-demo".to_string()
}

impl Default for SoftphoneConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            simulate_identity: default_simulate_identity(),
        }
    }
}

impl VelaConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9040)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default(
                "server.cors_origins",
                "http://localhost:3000,http://127.0.0.1:3000",
            )?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("token.url", "")?
            .set_default("token.timeout_secs", 10)?
            .set_default("softphone.simulate", false)?
            .set_default("softphone.simulate_identity", "agent-demo")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with VELA_ prefix
            .add_source(
                Environment::with_prefix("VELA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("VELA").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_softphone_config() {
        let config = SoftphoneConfig::default();
        assert!(!config.simulate);
        assert_eq!(config.simulate_identity, "agent-demo");
    }

    #[test]
    fn test_server_addr() {
        let config = VelaConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 9040,
                workers: 2,
                cors_origins: default_cors_origins(),
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/vela".to_string(),
                max_connections: 10,
                acquire_timeout_secs: 30,
                idle_timeout_secs: 600,
            },
            token: TokenConfig {
                url: String::new(),
                timeout_secs: 10,
            },
            softphone: SoftphoneConfig::default(),
        };
        assert_eq!(config.server_addr(), "127.0.0.1:9040");
    }
}
