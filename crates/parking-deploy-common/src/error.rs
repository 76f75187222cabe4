//! Configuration and input validation errors

use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value is empty or the `-` placeholder
    #[error("{name} is not set (got '{value}')")]
    Missing { name: &'static str, value: String },

    /// The environment file does not exist
    #[error("environment file '{path}' not found")]
    EnvFileMissing { path: String },

    /// An operation needs environment variables but none were configured
    #[error("no function environment configured")]
    EnvironmentNotConfigured,

    /// A non-comment line without `=`
    #[error("line {line} of the environment file is not KEY=VALUE: {content}")]
    InvalidEnvLine { line: usize, content: String },

    /// A `=VALUE` line
    #[error("line {line} of the environment file has an empty key")]
    EmptyEnvKey { line: usize },

    /// Failed to read a file
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reject empty (or whitespace-only) values and the literal `-`.
///
/// `-` is what unset variables expand to in the shell automation this tool
/// replaces, so it is treated as unset too.
pub fn require_value<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return Err(ConfigError::Missing {
            name,
            value: value.to_string(),
        });
    }
    Ok(trimmed)
}
