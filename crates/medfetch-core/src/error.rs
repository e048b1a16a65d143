//! Common error type for remote fetch operations

/// Error from fetching one remote page or archive.
///
/// Wraps either an HTTP-level failure (with status when the server answered)
/// or a local I/O error. Per-record normalization problems are never errors;
/// they surface as skipped-record counts instead.
#[derive(Debug)]
pub enum FetchError {
    Http {
        status: Option<u16>,
        message: String,
    },
    Io(std::io::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl FetchError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// 429 and 5xx are transient, as are network faults without a status.
    /// Other 4xx responses mean the request itself is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                matches!(status, None | Some(429) | Some(500..=599))
            }
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    fn http_err(status: u16) -> FetchError {
        FetchError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_429_retryable() {
        assert!(http_err(429).is_retryable());
    }

    #[test]
    fn http_500_retryable() {
        assert!(http_err(500).is_retryable());
    }

    #[test]
    fn http_404_not_retryable() {
        assert!(!http_err(404).is_retryable());
    }

    #[test]
    fn http_400_not_retryable() {
        assert!(!http_err(400).is_retryable());
    }

    #[test]
    fn http_no_status_retryable() {
        let err = FetchError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn io_timeout_retryable() {
        let err = FetchError::Io(std::io::Error::new(ErrorKind::TimedOut, "timeout"));
        assert!(err.is_retryable());
    }

    #[test]
    fn io_storage_full_not_retryable() {
        let err = FetchError::Io(std::io::Error::new(ErrorKind::StorageFull, "disk full"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(503)), "HTTP 503: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = FetchError::Http {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: timeout");
    }

    #[test]
    fn display_io() {
        let err = FetchError::Io(std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert!(format!("{err}").contains("IO error"));
    }
}
