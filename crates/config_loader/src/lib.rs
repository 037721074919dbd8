//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Inline `<key>-file` includes
//! - Validate configuration legality
//! - Produce a [`RelayConfig`]
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("relay.json")).unwrap();
//! let settings = config.relay_settings().unwrap();
//! println!("queue capacity: {}", settings.queue_capacity);
//! ```

mod config;
mod parser;
mod validator;

pub use config::{RelayConfig, RELAY_KEY, SINKS_KEY};
pub use contracts::RelaySettings;
pub use parser::{ConfigFormat, INCLUDE_SUFFIX};
pub use validator::sink_warnings;

use contracts::ContractError;
use std::path::Path;
use tracing::{debug, warn};

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Format is detected from the extension (.json / .toml). Includes are
    /// resolved relative to the file's directory. A missing file yields an
    /// empty configuration.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayConfig, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using empty configuration");
                return Ok(RelayConfig::default());
            }
            Err(e) => return Err(e.into()),
        };
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        debug!(path = %path.display(), ?format, "Loading configuration");
        Self::load_from_str_in(&content, format, base_dir)
    }

    /// Load configuration from string, resolving includes against the
    /// working directory
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<RelayConfig, ContractError> {
        Self::load_from_str_in(content, format, Path::new("."))
    }

    /// Load configuration from string, resolving includes against `base_dir`
    pub fn load_from_str_in(
        content: &str,
        format: ConfigFormat,
        base_dir: &Path,
    ) -> Result<RelayConfig, ContractError> {
        let root = parser::parse(content, format)?;
        let config = RelayConfig::new(parser::resolve_includes(root, base_dir)?);
        validator::validate(&config)?;
        Ok(config)
    }

    /// Serialize RelayConfig to TOML string
    pub fn to_toml(config: &RelayConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RelayConfig to JSON string
    pub fn to_json(config: &RelayConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}
