//! Error types for the VANTAGE client.
//!
//! The taxonomy mirrors how the orchestrator treats failures: transient
//! errors are retry-eligible, terminal errors surface immediately, and
//! `ExhaustedRetries` wraps the last transient error once the retry bound
//! is hit. A cache miss is control flow, not an error.

use crate::config::ConfigError;
use vantage_core::{ErrorCode, ErrorInfo};

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failure likely to clear on its own (timeout, connect failure, 5xx).
    #[error("transient failure ({code}): {message}")]
    Transient { code: ErrorCode, message: String },

    /// Failure that will repeat on every attempt (4xx, validation,
    /// malformed payload). Never retried.
    #[error("terminal failure ({code}): {message}")]
    Terminal { code: ErrorCode, message: String },

    /// Synthesized after the retry bound; wraps the last underlying error.
    #[error("retries exhausted after {attempts} attempts")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn transient(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Transient {
            code,
            message: message.into(),
        }
    }

    pub fn terminal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Terminal {
            code,
            message: message.into(),
        }
    }

    /// Classify a structured backend error by its envelope code.
    pub fn from_error_info(info: ErrorInfo) -> Self {
        if info.code.is_transient() {
            Self::Transient {
                code: info.code,
                message: info.message,
            }
        } else {
            Self::Terminal {
                code: info.code,
                message: info.message,
            }
        }
    }

    /// Classify a reqwest transport error.
    ///
    /// Timeouts and connect failures are transient; body-decode failures
    /// mean the response did not match the schema and are terminal.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient {
                code: ErrorCode::Timeout,
                message: err.to_string(),
            }
        } else if err.is_connect() {
            Self::Transient {
                code: ErrorCode::Unavailable,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::Terminal {
                code: ErrorCode::MalformedResponse,
                message: err.to_string(),
            }
        } else {
            Self::Terminal {
                code: ErrorCode::Internal,
                message: err.to_string(),
            }
        }
    }

    /// Whether the retry controller may re-attempt after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Envelope-level code for this error, for surfacing on shared state.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transient { code, .. } | Self::Terminal { code, .. } => *code,
            Self::ExhaustedRetries { last, .. } => last.code(),
            Self::Config(_) => ErrorCode::ValidationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_code_drives_classification() {
        let transient = ClientError::from_error_info(ErrorInfo::new(ErrorCode::Unavailable, "down"));
        assert!(transient.is_transient());

        let terminal = ClientError::from_error_info(ErrorInfo::new(ErrorCode::InvalidInput, "bad"));
        assert!(!terminal.is_transient());
    }

    #[test]
    fn test_config_errors_surface_as_validation_failures() {
        let err = ClientError::from(ConfigError::MissingConfigPath);
        assert!(!err.is_transient());
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_exhausted_retries_is_not_transient() {
        let last = ClientError::transient(ErrorCode::Timeout, "timeout");
        let exhausted = ClientError::ExhaustedRetries {
            attempts: 4,
            last: Box::new(last),
        };
        assert!(!exhausted.is_transient());
        assert_eq!(exhausted.code(), ErrorCode::Timeout);
    }
}
