//! Schema configuration.
//!
//! This module provides deserializable settings for schema assembly.
//! Applications that load configuration from a file can place these under
//! their own section and convert them with
//! [`assembler_config`](SchemaConfig::assembler_config).
//!
//! # Example Configuration
//!
//! ```toml
//! [schema]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! ```

use serde::{Deserialize, Serialize};

use crate::schema::AssemblerConfig;

/// Schema assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Maximum query depth allowed.
    /// Limits nesting of fields; cyclic schemas are queryable to any depth
    /// without a limit.
    /// Default: unlimited
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Maximum query complexity allowed.
    /// Each field has a complexity cost; complex queries are rejected.
    /// Default: unlimited
    #[serde(default)]
    pub max_complexity: Option<usize>,

    /// Enable introspection queries.
    /// Allows clients to query the schema itself.
    /// Default: true (development-friendly)
    #[serde(default = "default_introspection")]
    pub introspection: bool,
}

fn default_introspection() -> bool {
    true
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_complexity: None,
            introspection: default_introspection(),
        }
    }
}

impl SchemaConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == Some(0) {
            return Err("schema.max_depth must be > 0 when set".into());
        }
        if self.max_complexity == Some(0) {
            return Err("schema.max_complexity must be > 0 when set".into());
        }
        Ok(())
    }

    /// Converts this config into the assembler's options.
    #[must_use]
    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            max_depth: self.max_depth,
            max_complexity: self.max_complexity,
            introspection_enabled: self.introspection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert_eq!(config.max_depth, None);
        assert_eq!(config.max_complexity, None);
        assert!(config.introspection);
    }

    #[test]
    fn test_valid_config() {
        let config = SchemaConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_max_depth() {
        let mut config = SchemaConfig::default();
        config.max_depth = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_max_complexity() {
        let mut config = SchemaConfig::default();
        config.max_complexity = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml = r#"
            max_depth = 20
            max_complexity = 1000
            introspection = false
        "#;

        let config: SchemaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_depth, Some(20));
        assert_eq!(config.max_complexity, Some(1000));
        assert!(!config.introspection);
    }

    #[test]
    fn test_omitted_limits_stay_unlimited() {
        let config: SchemaConfig = toml::from_str("introspection = true").unwrap();
        assert_eq!(config.max_depth, None);
        assert_eq!(config.max_complexity, None);
    }

    #[test]
    fn test_conversion_to_assembler_config() {
        let config = SchemaConfig {
            max_depth: Some(8),
            max_complexity: Some(64),
            introspection: false,
        };
        let assembler = config.assembler_config();
        assert_eq!(assembler.max_depth, Some(8));
        assert_eq!(assembler.max_complexity, Some(64));
        assert!(!assembler.introspection_enabled);
    }
}
