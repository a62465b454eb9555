//! Configuration file loading for coderun
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};
use crate::language::SupportedLanguage;
use crate::types::ResourceLimits;

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_runs == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_runs must be at least 1".to_owned(),
            ));
        }
        validate_limits("default_limits", &self.default_limits)?;
        validate_limits("compile_limits", &self.compile_limits)?;

        for (id, toolchain) in &self.languages {
            if id.parse::<SupportedLanguage>().is_err() {
                return Err(ConfigError::UnknownLanguage(id.clone()));
            }
            if toolchain.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(ref limits) = toolchain.run.limits {
                validate_limits(&format!("languages.{id}.run.limits"), limits)?;
            }
            if let Some(ref compile) = toolchain.compile {
                if compile.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty compile command"
                    )));
                }
                if let Some(ref limits) = compile.limits {
                    validate_limits(&format!("languages.{id}.compile.limits"), limits)?;
                }
            }
        }

        Ok(())
    }
}

fn validate_limits(section: &str, limits: &ResourceLimits) -> Result<(), ConfigError> {
    if let Some(wall) = limits.wall_time_limit
        && !(wall.is_finite() && wall > 0.0)
    {
        return Err(ConfigError::Invalid(format!(
            "{section}: wall_time_limit must be a positive number of seconds"
        )));
    }
    if limits.memory_limit == Some(0) {
        return Err(ConfigError::Invalid(format!(
            "{section}: memory_limit must be positive"
        )));
    }
    Ok(())
}
