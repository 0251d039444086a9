//! Errors of configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;
use validator::ValidationErrors;

/// Errors raised while loading a [`crate::CosimConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// A value is out of range, such as an unknown scheduling strategy or a
    /// malformed log filter. Nested sections are reported by name.
    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    /// The merged YAML and `COSIM_*` environment layers could not be
    /// extracted.
    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),

    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    for (field, errors) in errors.field_errors() {
        let _ = writeln!(output, "Field '{}':", field);
        for error in errors {
            let message = match &error.message {
                Some(msg) => msg.to_string(),
                None => error.code.to_string(),
            };
            let _ = writeln!(output, "  - {}", message);
        }
    }
    for (section, nested) in errors.errors() {
        if let validator::ValidationErrorsKind::Struct(inner) = nested {
            let _ = write!(output, "Section '{}':\n{}", section, format_validation_errors(inner));
        }
    }
    output
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CosimConfig;
    use validator::Validate;

    #[test]
    fn nested_sections_are_named() {
        let mut config = CosimConfig::default();
        config.engine.strategy = "round-robin".into();
        let err = ConfigError::from(config.validate().unwrap_err());
        let message = err.to_string();
        assert!(message.starts_with("Invalid configuration:"));
        assert!(message.contains("Section 'engine':"));
        assert!(message.contains("Field 'strategy':"));
    }
}
