//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `GO_MARKET_STORAGE_KEY` - Storage slot holding the cart (default: `@GoMarket:products`)
//! - `GO_MARKET_STORAGE_DIR` - Directory for file-backed storage (default: `.go-market`)
//! - `GO_MARKET_PERSIST_RETRIES` - Retries after a failed write (default: 1, max: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;

use thiserror::Error;

/// Storage key the cart has always been persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "@GoMarket:products";

const DEFAULT_STORAGE_DIR: &str = ".go-market";
const DEFAULT_PERSIST_RETRIES: u32 = 1;
const MAX_PERSIST_RETRIES: u32 = 5;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Key of the single storage slot holding the serialized cart
    pub storage_key: String,
    /// Directory used by file-backed storage
    pub storage_dir: PathBuf,
    /// How many times a failed write is retried before it is reported
    pub persist_retries: u32,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            persist_retries: DEFAULT_PERSIST_RETRIES,
            sentry_dsn: None,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_key = get_or_default(&lookup, "GO_MARKET_STORAGE_KEY", DEFAULT_STORAGE_KEY);
        if storage_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "GO_MARKET_STORAGE_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let storage_dir =
            PathBuf::from(get_or_default(&lookup, "GO_MARKET_STORAGE_DIR", DEFAULT_STORAGE_DIR));

        let persist_retries = get_or_default(
            &lookup,
            "GO_MARKET_PERSIST_RETRIES",
            &DEFAULT_PERSIST_RETRIES.to_string(),
        )
        .parse::<u32>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("GO_MARKET_PERSIST_RETRIES".to_string(), e.to_string())
        })?;
        if persist_retries > MAX_PERSIST_RETRIES {
            return Err(ConfigError::InvalidEnvVar(
                "GO_MARKET_PERSIST_RETRIES".to_string(),
                format!("must be at most {MAX_PERSIST_RETRIES} (got {persist_retries})"),
            ));
        }

        let sentry_dsn = lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty());

        Ok(Self {
            storage_key,
            storage_dir,
            persist_retries,
            sentry_dsn,
        })
    }

    /// Use a different storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Use a different retry count.
    #[must_use]
    pub const fn with_persist_retries(mut self, retries: u32) -> Self {
        self.persist_retries = retries;
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a variable with a default value.
fn get_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}
