//! Errors raised while loading and checking model configuration

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration could not be produced
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read model config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} in '{}'{}: {message}", .path.display(), location(.line, .column))]
    Parse {
        path: PathBuf,
        format: &'static str,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Environment variable '{var}' referenced by the config is not set")]
    MissingEnvVar { var: String },
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" at line {line}, column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

/// A configuration field holding an unusable value
#[derive(Debug, Error)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `custom_role_conversions.tool`
    pub field: String,
    pub kind: ValidationErrorKind,
    /// Example of an accepted value
    pub hint: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid model config field '{}': {}", self.field, self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationErrorKind {
    #[error("a value is required")]
    Missing,

    #[error("out of range, {0}")]
    OutOfRange(String),

    #[error("malformed, {0}")]
    Malformed(String),

    /// A `${VAR}` reference survived interpolation
    #[error("unresolved environment reference {0}")]
    UnresolvedReference(String),
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
            hint: None,
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, ValidationErrorKind::Missing)
    }

    pub fn out_of_range(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, ValidationErrorKind::OutOfRange(message.into()))
    }

    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, ValidationErrorKind::Malformed(message.into()))
    }

    pub fn unresolved(field: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::new(field, ValidationErrorKind::UnresolvedReference(reference.into()))
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
