//! Error types for the retrieval backends

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors that can occur when resolving, describing or downloading a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The remote service does not know this reference (HTTP 404)
    #[error("Source not found: {0}")]
    NotFound(String),

    /// The remote service asked us to slow down (HTTP 429)
    #[error("Rate limited by remote service: {0}")]
    RateLimited(String),

    /// Temporary failure (HTTP 5xx, connection reset); may be retried
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Download aborted by the initiating group
    #[error("Download cancelled")]
    Cancelled,

    /// No backend recognizes this input
    #[error("Unrecognized source reference: {0}")]
    Unrecognized(String),

    /// Response decoded but its content is unusable
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Unexpected HTTP status
    #[error("HTTP status {code} for {url}")]
    Status { code: u16, url: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error while writing the staged file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Maps an HTTP status code to an error
    ///
    /// - 404 → `NotFound`
    /// - 429 → `RateLimited`
    /// - 5xx → `Transient`
    /// - anything else → `Status`
    pub fn from_status_code(code: u16, url: &str) -> Self {
        match code {
            404 => Self::NotFound(url.to_string()),
            429 => Self::RateLimited(url.to_string()),
            500..=599 => Self::Transient(format!("HTTP {} for {}", code, url)),
            _ => Self::Status {
                code,
                url: url.to_string(),
            },
        }
    }

    /// Vrai si une nouvelle tentative a une chance d'aboutir
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Create an invalid metadata error
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_code() {
        assert!(matches!(
            SourceError::from_status_code(404, "/x"),
            SourceError::NotFound(_)
        ));
        assert!(matches!(
            SourceError::from_status_code(429, "/x"),
            SourceError::RateLimited(_)
        ));
        assert!(SourceError::from_status_code(503, "/x").is_transient());
        assert!(matches!(
            SourceError::from_status_code(403, "/x"),
            SourceError::Status { code: 403, .. }
        ));
        assert!(!SourceError::Cancelled.is_transient());
    }
}
