//! Unified error types for the clonify capture core.
//!
//! Per-resource failures during interception never surface here; they are
//! absorbed at the interceptor boundary. Only whole-attempt failures
//! (launch, navigation) and total retry exhaustion reach callers.

/// Unified error types for the capture pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The target URL could not be parsed or uses an unsupported scheme.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Cache I/O failed in a way `store` cannot recover from.
    #[error("CACHE_ERROR: {0}")]
    CacheIo(#[from] std::io::Error),

    /// The browser engine could not be started.
    #[error("LAUNCH_FAILED: {0}")]
    LaunchFailed(String),

    /// Navigation to the target URL failed (timeout, DNS, TLS, ...).
    #[error("NAVIGATION_FAILED: {0}")]
    NavigationFailed(String),

    /// The rendered document could not be read back from the page.
    #[error("CONTENT_FAILED: {0}")]
    ContentRetrieval(String),

    /// Every attempt in the retry budget failed.
    #[error("CAPTURE_FAILED: {attempts} attempts exhausted, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl Error {
    /// Attempt count carried by a retry-exhaustion error, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RetriesExhausted { attempts: 3, last_error: "net::ERR_NAME_NOT_RESOLVED".into() };
        assert!(err.to_string().contains("CAPTURE_FAILED"));
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[test]
    fn test_attempts_accessor() {
        let err = Error::RetriesExhausted { attempts: 3, last_error: "timeout".into() };
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(Error::InvalidUrl("x".into()).attempts(), None);
    }
}
