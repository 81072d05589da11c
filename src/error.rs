//! Error types for the listing watcher

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the listing watcher
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // HTTP errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    // Venue errors
    #[error("Venue {venue} unavailable: {reason}")]
    Venue { venue: String, reason: String },

    // State errors
    #[error("State persistence failed: {0}")]
    StatePersistence(String),
}

impl Error {
    /// Build a venue error from anything printable
    pub fn venue(venue: &str, reason: impl std::fmt::Display) -> Self {
        Error::Venue {
            venue: venue.to_string(),
            reason: reason.to_string(),
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::MissingEnvVar("TG_BOT_TOKEN".into()).to_string(),
            "Missing environment variable: TG_BOT_TOKEN"
        );
        assert_eq!(
            Error::HttpStatus { status: 502, body: "bad gateway".into() }.to_string(),
            "HTTP 502: bad gateway"
        );
    }

    #[test]
    fn test_venue_error_display() {
        let e = Error::venue("kraken", "timed out");
        assert_eq!(e.to_string(), "Venue kraken unavailable: timed out");
    }

    #[test]
    fn test_venue_error_wraps_status() {
        let inner = Error::HttpStatus { status: 404, body: "missing".into() };
        assert_eq!(
            Error::venue("okx", inner).to_string(),
            "Venue okx unavailable: HTTP 404: missing"
        );
    }
}
