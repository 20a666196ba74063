//! Broker configuration.
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! listen = "0.0.0.0:10011"
//! resolution = "nested"      # or "start-within"
//! log_filter = "info,attest_core=debug"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};
use crate::resolver::ResolutionPolicy;

/// Port the metadata service has always listened on.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:10011";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Socket address the HTTP transport binds to.
    pub listen: String,

    /// How overlapping principal ranges are narrowed.
    pub resolution: ResolutionPolicy,

    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            resolution: ResolutionPolicy::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl BrokerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| BrokerError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| BrokerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BrokerConfig::from_toml_str("").unwrap();
        assert_eq!(config, BrokerConfig::default());
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.resolution, ResolutionPolicy::Nested);
    }

    #[test]
    fn test_parse_full_config() {
        let config = BrokerConfig::from_toml_str(
            r#"
            listen = "127.0.0.1:7777"
            resolution = "start-within"
            log_filter = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:7777");
        assert_eq!(config.resolution, ResolutionPolicy::StartWithin);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_reject_unknown_policy_and_keys() {
        assert!(matches!(
            BrokerConfig::from_toml_str(r#"resolution = "widest""#),
            Err(BrokerError::Config(_))
        ));
        assert!(matches!(
            BrokerConfig::from_toml_str(r#"port = 1"#),
            Err(BrokerError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"listen = "127.0.0.1:9999""#).unwrap();

        let config = BrokerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9999");

        assert!(BrokerConfig::from_file("/definitely/not/here.toml").is_err());
    }
}
