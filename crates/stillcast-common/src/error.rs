//! Unified error type for stillcast.
//!
//! Every failure a request can run into ends up here, with enough context
//! for the HTTP layer to pick a status code via [`Error::http_status`].

use std::time::Duration;

/// Unified error type covering all failure modes of a stream request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request descriptor is malformed or out of bounds.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote asset could not be downloaded.
    #[error("Failed to download: {url} ({message})")]
    Fetch {
        /// The URL that failed.
        url: String,
        /// Human-readable cause.
        message: String,
    },

    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "search result").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The encoder process could not be started.
    #[error("Launch error: {0}")]
    Launch(String),

    /// The encoder exited before it wrote a playable manifest.
    #[error("Encoder for stream {key} exited before the playlist was ready: {status}")]
    EncoderExited {
        /// Stream key of the job.
        key: String,
        /// Exit status as reported by the OS.
        status: String,
    },

    /// The job was evicted to make room before its manifest was ready.
    #[error("Stream {key} was evicted before the playlist was ready")]
    Evicted {
        /// Stream key of the job.
        key: String,
    },

    /// The manifest did not become ready within the wait ceiling.
    #[error("Stream {key} was not ready after {waited:?}")]
    ReadinessTimeout {
        /// Stream key of the job.
        key: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// An upstream service (search, random list) failed.
    #[error("Upstream error [{service}]: {message}")]
    Upstream {
        /// Name of the upstream service.
        service: String,
        /// Human-readable cause.
        message: String,
    },

    /// A feature is not configured on this server.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Fetch { .. } => 400,
            Error::NotFound { .. } => 404,
            Error::Launch(_) => 500,
            Error::EncoderExited { .. } => 502,
            Error::Evicted { .. } => 503,
            Error::ReadinessTimeout { .. } => 504,
            Error::Upstream { .. } => 502,
            Error::Unavailable(_) => 503,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Fetch { .. } => "fetch_failed",
            Error::NotFound { .. } => "not_found",
            Error::Launch(_) => "launch_error",
            Error::EncoderExited { .. } => "encoder_exited",
            Error::Evicted { .. } => "evicted",
            Error::ReadinessTimeout { .. } => "readiness_timeout",
            Error::Upstream { .. } => "upstream_error",
            Error::Unavailable(_) => "unavailable",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Convenience constructor for [`Error::Fetch`].
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Launch`].
    pub fn launch(msg: impl Into<String>) -> Self {
        Error::Launch(msg.into())
    }

    /// Convenience constructor for [`Error::Upstream`].
    pub fn upstream(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Upstream {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::fetch("https://example.com/a.jpg", "404 Not Found");
        assert_eq!(
            err.to_string(),
            "Failed to download: https://example.com/a.jpg (404 Not Found)"
        );

        let err = Error::not_found("search result", 7);
        assert_eq!(err.to_string(), "search result not found: 7");

        let err = Error::validation("too many images");
        assert_eq!(err.to_string(), "Validation error: too many images");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Error::validation("x").http_status(), 400);
        assert_eq!(Error::fetch("u", "m").http_status(), 400);
        assert_eq!(Error::launch("spawn failed").http_status(), 500);
        assert_eq!(
            Error::ReadinessTimeout {
                key: "k".into(),
                waited: Duration::from_secs(30),
            }
            .http_status(),
            504
        );
        assert_eq!(Error::Unavailable("search".into()).http_status(), 503);
        assert_eq!(Error::Evicted { key: "k".into() }.http_status(), 503);
        assert_eq!(Error::Evicted { key: "k".into() }.code(), "evicted");
    }

    #[test]
    fn test_launch_and_timeout_are_distinct() {
        let launch = Error::launch("no ffmpeg");
        let timeout = Error::ReadinessTimeout {
            key: "k".into(),
            waited: Duration::from_secs(1),
        };
        assert_ne!(launch.code(), timeout.code());
        assert_ne!(launch.http_status(), timeout.http_status());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.code(), "io_error");
    }
}
