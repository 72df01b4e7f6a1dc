//! Configuration types for reddit-media-dl

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User agent sent with every outbound request
pub const DEFAULT_USER_AGENT: &str =
    "RipMe:github.com/RipMeApp/ripme:1.0 (by /u/metaprime and /u/ineedmorealts)";

/// Outbound HTTP behavior (throttle, timeouts, redirects)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent string for listing, API and media requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Minimum gap between the start of two outbound requests (default: 2000 ms)
    #[serde(default = "default_min_request_interval", with = "millis_serde")]
    pub min_request_interval: Duration,

    /// Timeout for listing and metadata requests (default: 30 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata_timeout: Duration,

    /// Timeout for media downloads (default: 60 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,

    /// Maximum number of redirects followed per request (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            min_request_interval: default_min_request_interval(),
            metadata_timeout: default_metadata_timeout(),
            download_timeout: default_download_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// Retry behavior for transient transport failures
///
/// Only timeouts, connection errors, 429 and 5xx responses are retried. A 401
/// from RedGifs is handled by the token refresh path instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Upstream service locations and credentials
///
/// Every base is overridable so the resolvers can be pointed at a mock server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Listing site base (default: "https://www.reddit.com")
    #[serde(default = "default_reddit_base")]
    pub reddit_base: String,

    /// Imgur API base (default: "https://api.imgur.com")
    #[serde(default = "default_imgur_api_base")]
    pub imgur_api_base: String,

    /// Imgur website base, used for the album noscript fallback (default: "https://imgur.com")
    #[serde(default = "default_imgur_web_base")]
    pub imgur_web_base: String,

    /// Imgur media CDN base (default: "https://i.imgur.com")
    #[serde(default = "default_imgur_cdn_base")]
    pub imgur_cdn_base: String,

    /// Imgur application client ID sent as `Authorization: Client-ID <id>`
    #[serde(default = "default_imgur_client_id")]
    pub imgur_client_id: String,

    /// RedGifs API base (default: "https://api.redgifs.com")
    #[serde(default = "default_redgifs_api_base")]
    pub redgifs_api_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            reddit_base: default_reddit_base(),
            imgur_api_base: default_imgur_api_base(),
            imgur_web_base: default_imgur_web_base(),
            imgur_cdn_base: default_imgur_cdn_base(),
            imgur_client_id: default_imgur_client_id(),
            redgifs_api_base: default_redgifs_api_base(),
        }
    }
}

/// Where and how resolved media are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Name of the per-directory sink for unsupported links (default: "links.txt")
    #[serde(default = "default_links_file_name")]
    pub links_file_name: String,

    /// What to do when a destination file already exists (default: overwrite)
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            links_file_name: default_links_file_name(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename
    Rename,
    /// Overwrite existing file (default)
    #[default]
    Overwrite,
    /// Skip the file, keep existing
    Skip,
}

/// Post-download processing steps
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Re-encode PNG downloads as JPEG and delete the PNG (default: true)
    ///
    /// This is lossy. Disable it to keep provider bytes untouched.
    #[serde(default = "default_true")]
    pub transcode_png: bool,

    /// JPEG quality used by the transcode step, 1-100 (default: 100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            transcode_png: true,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Main configuration for a [`Session`](crate::Session)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Outbound HTTP behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Upstream service locations
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Output layout
    #[serde(default)]
    pub output: OutputConfig,

    /// Post-download processing
    #[serde(default)]
    pub post_process: PostProcessConfig,
}

// Default value functions
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_min_request_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_redirects() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_reddit_base() -> String {
    "https://www.reddit.com".into()
}

fn default_imgur_api_base() -> String {
    "https://api.imgur.com".into()
}

fn default_imgur_web_base() -> String {
    "https://imgur.com".into()
}

fn default_imgur_cdn_base() -> String {
    "https://i.imgur.com".into()
}

fn default_imgur_client_id() -> String {
    "546c25a59c58ad7".into()
}

fn default_redgifs_api_base() -> String {
    "https://api.redgifs.com".into()
}

fn default_links_file_name() -> String {
    "links.txt".into()
}

fn default_jpeg_quality() -> u8 {
    100
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond variant, the request interval is sub-second in tests
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
