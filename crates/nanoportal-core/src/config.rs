//! Portal configuration
//!
//! Values are read from `NANOPORTAL_*` environment variables, optionally
//! seeded from a `.env` file.
//!
//! ```rust,no_run
//! use nanoportal_core::{load_dotenv, ConfigError, PortalConfig};
//!
//! fn main() -> Result<(), ConfigError> {
//!     load_dotenv();
//!     // NANOPORTAL_DEFAULT_CONTROLLER=blog NANOPORTAL_COMPRESSION=false
//!     let config = PortalConfig::from_env()?;
//!     println!("default route: /{}/{}", config.default_controller, config.default_method);
//!     Ok(())
//! }
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable deserialization failed
    #[error("Configuration error: {0}")]
    Env(#[from] envy::Error),

    /// A value was present but out of range
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Settings consumed by the router and the response pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Controller used when the path has no segments
    #[serde(default = "default_controller")]
    pub default_controller: String,
    /// Method used when the path names only a controller
    #[serde(default = "default_method")]
    pub default_method: String,
    /// How many times explicit route maps may be chained
    #[serde(default = "default_max_map_depth")]
    pub max_map_depth: usize,
    /// Enable gzip output compression
    #[serde(default = "default_true")]
    pub compression: bool,
    /// Bodies smaller than this are sent as-is
    #[serde(default = "default_compression_min_size")]
    pub compression_min_size: usize,
    /// Default `Cache-Control` max-age applied to successful responses
    #[serde(default)]
    pub cache_duration: Option<u64>,
    /// Value of the `X-Served-By` header, if set
    #[serde(default)]
    pub server_name: Option<String>,
}

fn default_controller() -> String {
    "home".to_string()
}

fn default_method() -> String {
    "index".to_string()
}

fn default_max_map_depth() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_compression_min_size() -> usize {
    1024
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            default_controller: default_controller(),
            default_method: default_method(),
            max_map_depth: default_max_map_depth(),
            compression: true,
            compression_min_size: default_compression_min_size(),
            cache_duration: None,
            server_name: None,
        }
    }
}

impl PortalConfig {
    /// Load configuration from `NANOPORTAL_*` environment variables.
    ///
    /// Missing variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed into its field type
    /// or a value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = envy::prefixed("NANOPORTAL_").from_env()?;
        config.validate()
    }

    /// Load configuration from an explicit list of key/value pairs
    /// (keys without the `NANOPORTAL_` prefix).
    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.default_controller.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_controller",
                reason: "must not be empty".to_string(),
            });
        }
        if self.default_method.is_empty() || self.default_method.starts_with('_') {
            return Err(ConfigError::Invalid {
                field: "default_method",
                reason: "must be a routable method name".to_string(),
            });
        }
        Ok(self)
    }
}

/// Load environment variables from a `.env` file in the working directory.
///
/// Missing files are ignored and existing variables are not overridden.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Load environment variables from a specific file path.
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    let _ = dotenvy::from_path(path);
}
