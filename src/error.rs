//! Error types for the financing advisor

use crate::models::DenialReason;
use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Local Validation Errors
    // =============================

    #[error("Invalid number for '{field}': {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("Unsupported product: {0}")]
    UnsupportedProduct(String),

    #[error("Invalid investment horizon: {0} years")]
    InvalidHorizon(f64),

    #[error("Invalid principal: {0}")]
    InvalidPrincipal(f64),

    #[error("Portfolio allocation sums to {0:.2}%, expected 100%")]
    AllocationMismatch(f64),

    #[error("Unknown input field: {0}")]
    UnknownField(String),

    #[error("Portfolio item not found: {0}")]
    ItemNotFound(String),

    // =============================
    // Advisory Pipeline Errors
    // =============================

    #[error("Rate limited ({reason}), retry after {retry_after_seconds:?}s")]
    RateLimited {
        reason: String,
        retry_after_seconds: Option<f64>,
    },

    #[error("Transient advisory service error: {0}")]
    TransientService(String),

    #[error("Advisory service rejected the request (status {status:?}): {message}")]
    ClientService {
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed advisory response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Advisory request cancelled")]
    Cancelled,

    #[error("An analysis for the same inputs is already running")]
    AnalysisInProgress,

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AdvisorError {
    pub fn invalid_number(field: &str, value: impl Into<String>) -> Self {
        AdvisorError::InvalidNumber {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Only transport-level and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdvisorError::TransientService(_))
    }

    /// Whether this failure says something about the remote service's health.
    pub fn counts_against_circuit(&self) -> bool {
        matches!(
            self,
            AdvisorError::TransientService(_) | AdvisorError::MalformedResponse(_)
        )
    }

    /// Local validation failures, reported synchronously and never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AdvisorError::InvalidNumber { .. }
                | AdvisorError::UnsupportedProduct(_)
                | AdvisorError::InvalidHorizon(_)
                | AdvisorError::InvalidPrincipal(_)
                | AdvisorError::AllocationMismatch(_)
                | AdvisorError::UnknownField(_)
                | AdvisorError::ItemNotFound(_)
        )
    }

    /// Short message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            AdvisorError::InvalidNumber { field, .. } => {
                format!("Please enter a valid value for {}.", field)
            }
            AdvisorError::UnsupportedProduct(p) => {
                format!("Calculation is not available for product '{}'.", p)
            }
            AdvisorError::InvalidHorizon(_) => {
                "The time horizon must be at least one year.".to_string()
            }
            AdvisorError::InvalidPrincipal(_) => {
                "The amount must be greater than zero.".to_string()
            }
            AdvisorError::AllocationMismatch(_) => {
                "Portfolio allocation must add up to 100%.".to_string()
            }
            AdvisorError::UnknownField(f) => format!("Unknown field '{}'.", f),
            AdvisorError::ItemNotFound(_) => "That portfolio item no longer exists.".to_string(),
            AdvisorError::RateLimited { reason, .. }
                if *reason == DenialReason::RequestTooLarge.to_string() =>
            {
                "The analysis request is too large to send. Shorten asset names or remove some portfolio items."
                    .to_string()
            }
            AdvisorError::RateLimited {
                retry_after_seconds: Some(secs),
                ..
            } => format!(
                "Too many advisory requests. Try again in {} seconds.",
                secs.ceil() as u64
            ),
            AdvisorError::RateLimited { .. } => {
                "Too many advisory requests. Try again later.".to_string()
            }
            AdvisorError::TransientService(_) => {
                "The advisory service could not be reached. Check your connection and try again."
                    .to_string()
            }
            AdvisorError::ClientService { .. } => {
                "The advisory service rejected the request.".to_string()
            }
            AdvisorError::MalformedResponse(_) => {
                "The advisory service returned a malformed answer.".to_string()
            }
            AdvisorError::Configuration(_) => {
                "The advisory service is not configured.".to_string()
            }
            AdvisorError::Cancelled => "The analysis was cancelled.".to_string(),
            AdvisorError::AnalysisInProgress => {
                "An analysis for these inputs is already running.".to_string()
            }
            AdvisorError::SerializationError(_) | AdvisorError::IoError(_) => {
                "An internal error occurred during the analysis.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(AdvisorError::TransientService("503".into()).is_retryable());
        assert!(!AdvisorError::MalformedResponse("x".into()).is_retryable());
        assert!(AdvisorError::MalformedResponse("x".into()).counts_against_circuit());

        let client = AdvisorError::ClientService {
            status: Some(400),
            message: "bad".into(),
        };
        assert!(!client.is_retryable());
        assert!(!client.counts_against_circuit());

        let limited = AdvisorError::RateLimited {
            reason: "rate limit".into(),
            retry_after_seconds: Some(12.2),
        };
        assert!(!limited.counts_against_circuit());
        assert!(limited.user_message().contains("13"));
    }

    #[test]
    fn test_oversized_request_has_its_own_message() {
        let too_large = AdvisorError::RateLimited {
            reason: DenialReason::RequestTooLarge.to_string(),
            retry_after_seconds: None,
        };
        let message = too_large.user_message();
        assert!(message.contains("too large"));
        assert!(!message.contains("Too many"));

        let throttled = AdvisorError::RateLimited {
            reason: DenialReason::RateLimit.to_string(),
            retry_after_seconds: None,
        };
        assert!(throttled.user_message().contains("Too many"));
    }

    #[test]
    fn test_validation_errors_are_flagged() {
        assert!(AdvisorError::InvalidHorizon(0.0).is_validation());
        assert!(AdvisorError::invalid_number("principal", "abc").is_validation());
        assert!(!AdvisorError::Cancelled.is_validation());
    }
}
