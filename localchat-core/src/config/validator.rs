//! Configuration validation utilities

use super::error::ValidationError;
use super::schema::LocalModelConfig;
use regex::Regex;
use tracing::warn;

/// Configuration validator with additional validation rules
pub struct ConfigValidator {
    /// Pattern for allocator settings: `key:value[,key:value]*`
    allocator_pattern: Regex,
    /// Pattern for unresolved `${VAR}` placeholders
    env_var_pattern: Regex,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self {
            allocator_pattern: Regex::new(r"^[a-z_]+:[A-Za-z0-9_.]+(,[a-z_]+:[A-Za-z0-9_.]+)*$")
                .unwrap(),
            env_var_pattern: Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap(),
        }
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &LocalModelConfig) -> Result<(), ValidationError> {
        // First run the built-in validation
        config.validate()?;

        self.validate_placeholders(config)?;
        self.validate_allocator_config(config)?;
        self.check_quantization(config);

        Ok(())
    }

    /// Placeholders must have been interpolated before validation
    fn validate_placeholders(&self, config: &LocalModelConfig) -> Result<(), ValidationError> {
        let mut fields = vec![("model_id", config.model_id.clone())];
        if let Some(dir) = &config.cache_dir {
            fields.push(("cache_dir", dir.to_string_lossy().into_owned()));
        }

        for (field, value) in fields {
            if let Some(cap) = self.env_var_pattern.captures(&value) {
                return Err(ValidationError::unresolved(field, &cap[0]));
            }
        }

        Ok(())
    }

    fn validate_allocator_config(&self, config: &LocalModelConfig) -> Result<(), ValidationError> {
        if let Some(allocator) = &config.allocator_config {
            if !self.allocator_pattern.is_match(allocator) {
                return Err(ValidationError::malformed(
                    "allocator_config",
                    format!("expected key:value pairs separated by commas, got '{}'", allocator),
                )
                .with_hint("e.g. expandable_segments:True"));
            }
        }

        Ok(())
    }

    /// Both quantization flags set is allowed, 4-bit wins
    fn check_quantization(&self, config: &LocalModelConfig) {
        if config.load_in_4bit && config.load_in_8bit {
            warn!(
                model_id = %config.model_id,
                "Both load_in_4bit and load_in_8bit are set; using 4-bit"
            );
        }
    }
}
