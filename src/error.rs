//! Cubby Error Types

use thiserror::Error;

/// Result type alias for Cubby operations
pub type Result<T> = std::result::Result<T, Error>;

/// Cubby error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Request errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    // Namespace errors
    #[error("Key allocation failed: {0}")]
    Allocation(String),

    #[error("Key space exhausted for {name} after {attempts} attempts")]
    AllocationExhausted { name: String, attempts: u32 },

    #[error("Listing failed: {0}")]
    Listing(String),

    // Object store errors
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    // User record errors
    #[error("User store error: {0}")]
    UserStore(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if the caller may retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_) | Error::Allocation(_) | Error::Listing(_)
        )
    }

    /// Check if this error should be reported as an authorization failure
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_) | Error::IdentityResolution(_)
        )
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG_ERROR",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Authentication(_) => "UNAUTHENTICATED",
            Error::IdentityResolution(_) => "INVALID_IDENTITY",
            Error::Allocation(_) => "ALLOCATION_FAILED",
            Error::AllocationExhausted { .. } => "KEY_SPACE_EXHAUSTED",
            Error::Listing(_) => "LISTING_FAILED",
            Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Error::UserStore(_) => "USER_STORE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::StoreUnavailable("timeout".into()).is_retryable());
        assert!(Error::Allocation("head failed".into()).is_retryable());
        assert!(!Error::InvalidInput("empty".into()).is_retryable());

        assert!(Error::Authentication("no token".into()).is_unauthorized());
        assert!(Error::IdentityResolution("empty id".into()).is_unauthorized());
        assert!(!Error::Listing("boom".into()).is_unauthorized());
    }

    #[test]
    fn test_exhausted_message() {
        let err = Error::AllocationExhausted {
            name: "report.pdf".into(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Key space exhausted for report.pdf after 3 attempts"
        );
        assert_eq!(err.code(), "KEY_SPACE_EXHAUSTED");
    }
}
