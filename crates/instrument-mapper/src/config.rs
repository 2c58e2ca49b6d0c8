//! Mapper configuration.

use crate::diagnostic::ErrorLogWriter;
use crate::error::{MapperError, MapperResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default worker thread name.
pub const DEFAULT_THREAD_NAME: &str = "instrument-mapper";

/// Mapper loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Directory receiving diagnostic records when the loop fails.
    pub error_dir: PathBuf,
    /// Yield the processor after every forwarded report.
    pub yield_between_iterations: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            error_dir: ErrorLogWriter::default_dir(),
            yield_between_iterations: true,
        }
    }
}

impl MapperConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread name is empty or contains a NUL byte, or
    /// if the error directory is empty.
    pub fn validate(&self) -> MapperResult<()> {
        if self.thread_name.trim().is_empty() {
            return Err(MapperError::invalid_configuration(
                "thread_name must not be empty",
            ));
        }
        if self.thread_name.contains('\0') {
            return Err(MapperError::invalid_configuration(
                "thread_name must not contain NUL bytes",
            ));
        }
        if self.error_dir.as_os_str().is_empty() {
            return Err(MapperError::invalid_configuration(
                "error_dir must not be empty",
            ));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> MapperConfigBuilder {
        MapperConfigBuilder::default()
    }
}

/// Builder for `MapperConfig`.
#[derive(Debug, Default)]
pub struct MapperConfigBuilder {
    config: MapperConfig,
}

impl MapperConfigBuilder {
    /// Set the worker thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set the diagnostic record directory.
    #[must_use]
    pub fn error_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.error_dir = dir.into();
        self
    }

    /// Enable or disable the cooperative yield between iterations.
    #[must_use]
    pub fn yield_between_iterations(mut self, enabled: bool) -> Self {
        self.config.yield_between_iterations = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> MapperResult<MapperConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() -> MapperResult<()> {
        let config = MapperConfig::default();
        config.validate()?;
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
        assert!(config.error_dir.ends_with("errors"));
        assert!(config.yield_between_iterations);
        Ok(())
    }

    #[test]
    fn test_builder_rejects_bad_thread_names() {
        let result = MapperConfig::builder().thread_name("   ").build();
        assert!(matches!(result, Err(MapperError::InvalidConfiguration(_))));

        let result = MapperConfig::builder().thread_name("map\0per").build();
        assert!(matches!(result, Err(MapperError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_builder_rejects_empty_error_dir() {
        let result = MapperConfig::builder().error_dir("").build();
        assert!(matches!(result, Err(MapperError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_builder_sets_fields() -> MapperResult<()> {
        let config = MapperConfig::builder()
            .thread_name("guitar-mapper")
            .error_dir("/var/tmp/mapper-errors")
            .yield_between_iterations(false)
            .build()?;

        assert_eq!(config.thread_name, "guitar-mapper");
        assert_eq!(config.error_dir, PathBuf::from("/var/tmp/mapper-errors"));
        assert!(!config.yield_between_iterations);
        Ok(())
    }

    #[test]
    fn test_config_deserializes_from_json() -> Result<(), Box<dyn std::error::Error>> {
        let json = r#"{
            "thread_name": "drums-mapper",
            "error_dir": "crash-logs",
            "yield_between_iterations": false
        }"#;
        let config: MapperConfig = serde_json::from_str(json)?;
        config.validate()?;

        assert_eq!(config.thread_name, "drums-mapper");
        assert_eq!(config.error_dir, PathBuf::from("crash-logs"));
        assert_eq!(serde_json::from_str::<MapperConfig>(&serde_json::to_string(&config)?)?, config);
        Ok(())
    }
}
