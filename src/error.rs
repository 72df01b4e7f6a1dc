//! Error types for reddit-media-dl
//!
//! Every public operation returns either a value or one of these errors; nothing
//! here is meant to abort a batch. The split mirrors the failure taxonomy of the
//! pipeline:
//! - [`FetchError`] for transport failures (network, status, empty body)
//! - [`ResolveError`] for provider resolution, validation and post-processing
//! - [`ScrapeError`] for listing pagination
//! - [`Error`] as the umbrella type for session setup and the batch driver

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reddit-media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for reddit-media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "http.user_agent")
        key: Option<String>,
    },

    /// Transport failure outside of a resolver
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Provider resolution failed
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Listing pagination failed or produced nothing
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Transport-level failure
///
/// Callers may treat every variant as "unavailable". The status code stays
/// inspectable because RedGifs needs to react to 401 specifically.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-2xx status
    #[error("HTTP status {0}")]
    Status(u16),

    /// DNS, TLS, connect, timeout or redirect failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered 2xx with no body
    #[error("empty response body")]
    EmptyBody,

    /// Writing the destination file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response body was not the expected JSON shape
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The session was cancelled while the request was waiting or in flight
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// HTTP status code, if the failure was a status failure
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status(code) => Some(*code),
            FetchError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Provider resolution failure
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The provider answered but yielded no media
    #[error("no media found")]
    NoMedia,

    /// The link is a shape the resolver deliberately does not handle
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The link could not be parsed into the provider's URL shape
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Metadata or media request failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// RedGifs rejected the request again after one token refresh
    #[error("unauthorized after token refresh")]
    Unauthorized,

    /// Downloaded bytes were not media (HTML error page, empty, unknown type)
    #[error("content rejected for {url}")]
    Rejected {
        /// The media URL whose body was rejected
        url: String,
    },

    /// Destination already exists and the collision action is skip
    #[error("destination exists: {}", path.display())]
    Exists {
        /// The existing destination path
        path: PathBuf,
    },

    /// PNG to JPEG transcode failed
    #[error("transcode failed for {}: {reason}", path.display())]
    Transcode {
        /// The PNG file that could not be transcoded
        path: PathBuf,
        /// Decoder or encoder message
        reason: String,
    },

    /// Creating directories or writing the links sink failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Listing pagination failure
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Pages were read but no usable post entry was found
    #[error("listing produced no entries")]
    NoEntries,

    /// The first page could not be fetched or parsed
    #[error("listing unavailable: {0}")]
    Unavailable(#[source] FetchError),
}
