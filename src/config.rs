//! Configuration management for Storemind
//!
//! Loads configuration from environment variables (with `.env` support).

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;

/// PostgreSQL database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: SecretString,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,
    /// Port
    pub port: u16,
}

/// Ranking configuration for hybrid search
///
/// The boost weights and the abstention threshold are deliberate product
/// constants; they live here so callers can tune them without touching the
/// ranking logic.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Added to the score when the document category equals the query
    pub category_boost: f64,
    /// Added to the score when the query is a substring of the title
    pub title_boost: f64,
    /// Vector distance above which a QA lookup abstains from answering
    pub abstention_threshold: f64,
    /// How many nearest candidates to pull before boosts are applied.
    /// Boosts can promote a document past nearer neighbours, so this must
    /// exceed any reasonable top_k.
    pub candidate_pool: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            category_boost: 0.3,
            title_boost: 0.1,
            abstention_threshold: 1.5,
            candidate_pool: 50,
        }
    }
}

/// Forecast model persistence configuration
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Directory holding one persisted model artifact per product
    pub model_dir: PathBuf,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            model_dir: PathBuf::from("models"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter
    pub level: String,
    /// Log format (pretty, json)
    pub format: String,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL database settings
    pub database: DatabaseConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Hybrid search ranking settings
    pub search: SearchConfig,
    /// Forecast model persistence settings
    pub forecast: ForecastConfig,
    /// Logging settings
    pub log: LogConfig,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = SearchConfig::default();

        Ok(Config {
            database: DatabaseConfig {
                url: SecretString::from(
                    std::env::var("DATABASE_URL")
                        .map_err(|_| Error::Config("DATABASE_URL is required".to_string()))?,
                ),
                max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 10),
                connect_timeout_secs: env_parsed("DATABASE_CONNECT_TIMEOUT", 30),
            },
            server: ServerConfig {
                bind: std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env_parsed("PORT", 8000),
            },
            search: SearchConfig {
                category_boost: env_parsed("SEARCH_CATEGORY_BOOST", defaults.category_boost),
                title_boost: env_parsed("SEARCH_TITLE_BOOST", defaults.title_boost),
                abstention_threshold: env_parsed(
                    "SEARCH_ABSTENTION_THRESHOLD",
                    defaults.abstention_threshold,
                ),
                candidate_pool: env_parsed("SEARCH_CANDIDATE_POOL", defaults.candidate_pool),
            },
            forecast: ForecastConfig {
                model_dir: PathBuf::from(
                    std::env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string()),
                ),
            },
            log: LogConfig {
                level: std::env::var("RUST_LOG")
                    .unwrap_or_else(|_| "info,storemind=debug".to_string()),
                format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            },
        })
    }

    /// Validate that all required configuration is present
    pub fn validate(&self) -> Result<()> {
        if self.database.url.expose_secret().is_empty() {
            return Err(Error::Config("DATABASE_URL is required".to_string()));
        }
        if self.search.candidate_pool == 0 {
            return Err(Error::Config(
                "SEARCH_CANDIDATE_POOL must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_defaults_match_product_constants() {
        let cfg = SearchConfig::default();
        assert_eq!(cfg.category_boost, 0.3);
        assert_eq!(cfg.title_boost, 0.1);
        assert_eq!(cfg.abstention_threshold, 1.5);
        assert!(cfg.candidate_pool > 0);
    }

    #[test]
    fn test_validate_rejects_empty_database_url() {
        let config = Config {
            database: DatabaseConfig {
                url: SecretString::from(""),
                max_connections: 5,
                connect_timeout_secs: 30,
            },
            server: ServerConfig {
                bind: "127.0.0.1".to_string(),
                port: 8000,
            },
            search: SearchConfig::default(),
            forecast: ForecastConfig::default(),
            log: LogConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };
        assert!(config.validate().is_err());
    }
}
