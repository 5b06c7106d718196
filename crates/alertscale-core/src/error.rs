//! Error types shared across alertscale.

use thiserror::Error;

/// Provider error codes that signal rate limiting.
pub const THROTTLE_CODES: &[&str] = &["Throttling", "RequestLimitExceeded"];

/// Result type alias for provider client calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for group and policy operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Errors reported by a provider client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Rate limited. The only kind the retry wrapper retries.
    #[error("request throttled: {code}")]
    Throttled { code: String },

    #[error("provider api error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a raw provider error code.
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        if THROTTLE_CODES.contains(&code.as_str()) {
            ProviderError::Throttled { code }
        } else {
            ProviderError::Api {
                code,
                message: message.into(),
            }
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, ProviderError::Throttled { .. })
    }
}

/// A group could not be scaled, or its scaling state could not be read.
///
/// Always scoped to one group: callers log it and move on to the next.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaleError {
    #[error("unable to resize group {group}: {source}")]
    Resize { group: String, source: ProviderError },

    #[error("unable to read scaling history of group {group}: {source}")]
    Cooldown { group: String, source: ProviderError },

    #[error("unable to look up policy {policy} for group {group}: {source}")]
    PolicyLookup {
        group: String,
        policy: String,
        source: ProviderError,
    },

    #[error("unable to execute policy {policy} on group {group}: {source}")]
    PolicyExecution {
        group: String,
        policy: String,
        source: ProviderError,
    },
}

impl ScaleError {
    /// Name of the group the failure is scoped to.
    pub fn group(&self) -> &str {
        match self {
            ScaleError::Resize { group, .. }
            | ScaleError::Cooldown { group, .. }
            | ScaleError::PolicyLookup { group, .. }
            | ScaleError::PolicyExecution { group, .. } => group,
        }
    }
}

/// Invalid policy or scaler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("adjustment {0:?} matches no known form")]
    InvalidAdjustment(String),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
