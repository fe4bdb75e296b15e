//! Configuration error types with actionable operator messages.

use std::fmt;

/// Configuration errors detected before any cleanup pass begins.
///
/// Each variant carries enough context for an operator to fix the flag or
/// environment variable at fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Invalid configuration value.
    Invalid {
        /// What is wrong.
        message: String,
        /// How to fix it.
        fix_hint: String,
    },
    /// A required setting is missing.
    MissingRequired {
        /// The missing setting name.
        setting: String,
        /// Flag or environment variable to set.
        env_var: String,
    },
    /// A duration string could not be parsed.
    InvalidDuration {
        /// The offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Multiple errors occurred.
    Multiple(Vec<ConfigurationError>),
}

impl std::error::Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { message, fix_hint } => {
                write!(
                    f,
                    "Invalid configuration: {message}\n\nHow to fix: {fix_hint}"
                )
            }
            Self::MissingRequired { setting, env_var } => {
                write!(
                    f,
                    "Missing required configuration: {setting}\n\nSet via: {env_var}"
                )
            }
            Self::InvalidDuration { input, reason } => {
                write!(
                    f,
                    "Invalid duration '{input}': {reason} (expected e.g. 90s, 5m, 2h, 1h30m)"
                )
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple configuration errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "\n{}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl ConfigurationError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid(message: impl Into<String>, fix_hint: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            fix_hint: fix_hint.into(),
        }
    }

    /// Create a missing required configuration error.
    #[must_use]
    pub fn missing_required(setting: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self::MissingRequired {
            setting: setting.into(),
            env_var: env_var.into(),
        }
    }

    /// Create an invalid duration error.
    #[must_use]
    pub fn invalid_duration(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of errors: `Ok` when empty, the error itself when
    /// there is only one, [`Self::Multiple`] otherwise.
    pub fn from_list(mut errors: Vec<ConfigurationError>) -> ConfigResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// Get the number of errors (1 for single errors, N for multiple).
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigurationError>;
