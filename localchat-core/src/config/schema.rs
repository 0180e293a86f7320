//! Configuration schema structures with serde support

use super::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Construction parameters for a local model
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LocalModelConfig {
    /// Model identifier or local path
    pub model_id: String,

    /// Maximum number of new tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature; zero disables sampling
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Device to run on
    #[serde(default)]
    pub device: Device,

    /// Load weights in 8-bit precision
    #[serde(default)]
    pub load_in_8bit: bool,

    /// Load weights in 4-bit NF4 precision (takes precedence over 8-bit)
    #[serde(default = "default_true")]
    pub load_in_4bit: bool,

    /// Role renames applied before prompt assembly
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_role_conversions: HashMap<String, String>,

    /// Where the loader caches downloaded weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Allocator tuning handed to the loader, e.g. `expandable_segments:True`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocator_config: Option<String>,
}

/// Target device
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Device {
    /// Accelerator when available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
    /// Any other backend-specific device name
    Other(String),
}

/// Weight quantization requested from the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    None,
    Int8,
    Nf4,
}

impl From<String> for Device {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Device::Auto,
            "cpu" => Device::Cpu,
            "cuda" => Device::Cuda,
            _ => Device::Other(name),
        }
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Auto => f.write_str("auto"),
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda => f.write_str("cuda"),
            Device::Other(name) => f.write_str(name),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_temperature() -> f64 { 0.5 }
fn default_max_tokens() -> usize { 2048 }

impl LocalModelConfig {
    /// Create a configuration with default settings
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            device: Device::default(),
            load_in_8bit: false,
            load_in_4bit: default_true(),
            custom_role_conversions: HashMap::new(),
            cache_dir: None,
            allocator_config: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Select quantization; `Nf4` and `Int8` map onto the two load flags
    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.load_in_4bit = quantization == Quantization::Nf4;
        self.load_in_8bit = quantization == Quantization::Int8;
        self
    }

    pub fn with_role_conversion(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.custom_role_conversions.insert(from.into(), to.into());
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn with_allocator_config(mut self, allocator_config: impl Into<String>) -> Self {
        self.allocator_config = Some(allocator_config.into());
        self
    }

    /// Effective quantization; 4-bit wins when both flags are set
    pub fn quantization(&self) -> Quantization {
        if self.load_in_4bit {
            Quantization::Nf4
        } else if self.load_in_8bit {
            Quantization::Int8
        } else {
            Quantization::None
        }
    }

    /// Whether generation samples at all
    pub fn do_sample(&self) -> bool {
        self.temperature > 0.0
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model_id.trim().is_empty() {
            return Err(ValidationError::missing("model_id"));
        }

        if self.max_tokens == 0 {
            return Err(ValidationError::out_of_range(
                "max_tokens",
                "max_tokens must be greater than zero",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::out_of_range(
                "temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", self.temperature),
            ));
        }

        if let Device::Other(name) = &self.device {
            if name.trim().is_empty() {
                return Err(ValidationError::missing("device")
                    .with_hint("auto, cpu, cuda or a device name"));
            }
        }

        for (from, to) in &self.custom_role_conversions {
            if from.is_empty() || to.is_empty() {
                return Err(ValidationError::malformed(
                    format!("custom_role_conversions.{}", from),
                    "role names must not be empty",
                ));
            }
        }

        Ok(())
    }
}
