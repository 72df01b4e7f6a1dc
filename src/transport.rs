//! Rate-limited HTTP transport
//!
//! All network access in the crate goes through [`Transport`]. Each call:
//! 1. waits on the shared [`RequestGate`] (the start time is reserved before sending)
//! 2. sends the request with the configured user agent, timeout and redirect limit
//! 3. maps transport errors, non-2xx statuses and empty bodies to [`FetchError`]
//!
//! Transient failures are retried through [`with_retry`], and every retry passes
//! the gate again. Waiting and in-flight requests race the session's
//! [`CancellationToken`].

use crate::config::{HttpConfig, RetryConfig};
use crate::error::FetchError;
use crate::rate_limiter::RequestGate;
use crate::retry::with_retry;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const ACCEPT_TEXT: &str = "application/json, text/html, */*";
const ACCEPT_JSON: &str = "application/json";
const ACCEPT_MEDIA: &str = "image/*, video/*, */*";

/// Raw reply from [`Transport::get_with_status`] and [`Transport::post_with_status`]
///
/// Unlike the other calls, a non-2xx status is not an error here, so callers
/// that need to react to a specific code (RedGifs on 401) can inspect it.
#[derive(Debug, Clone)]
pub struct HttpReply {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl HttpReply {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// A file written by [`Transport::fetch_binary`]
#[derive(Debug, Clone)]
pub struct Downloaded {
    /// Where the bytes were written
    pub path: PathBuf,
    /// Declared `Content-Type` of the response, if any
    pub content_type: Option<String>,
    /// Number of bytes written
    pub bytes: u64,
}

/// Rate-limited HTTP client shared by the scraper and every resolver
pub struct Transport {
    /// Client for listing pages and metadata APIs
    api_client: reqwest::Client,
    /// Client for media bytes (longer timeout)
    download_client: reqwest::Client,
    /// Shared minimum-interval gate
    gate: Arc<dyn RequestGate>,
    /// Backoff policy for transient failures
    retry: RetryConfig,
    /// Session-wide cancellation
    cancel: CancellationToken,
}

impl Transport {
    /// Build a transport from HTTP settings
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP clients cannot be created
    pub fn new(
        http: &HttpConfig,
        retry: RetryConfig,
        gate: Arc<dyn RequestGate>,
        cancel: CancellationToken,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let build = |timeout: std::time::Duration| {
            reqwest::Client::builder()
                .user_agent(http.user_agent.clone())
                .default_headers(headers.clone())
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(http.max_redirects))
                .build()
        };

        Ok(Self {
            api_client: build(http.metadata_timeout)?,
            download_client: build(http.download_timeout)?,
            gate,
            retry,
            cancel,
        })
    }

    /// The session cancellation token this transport honors
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// GET a page or API document as text
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-2xx status, or an empty body
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .execute(|| self.api_client.get(url).header(header::ACCEPT, ACCEPT_TEXT), true)
            .await?;
        let body = self.cancellable(response.text()).await??;

        if body.is_empty() {
            debug!(url = %url, "empty response body");
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }

    /// GET a JSON document with extra request headers and deserialize it
    ///
    /// # Errors
    ///
    /// Fails like [`fetch_text`](Self::fetch_text), or with
    /// [`FetchError::InvalidJson`] if the body has the wrong shape
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let response = self
            .execute(
                || with_headers(self.api_client.get(url).header(header::ACCEPT, ACCEPT_JSON), headers),
                true,
            )
            .await?;
        let body = self.cancellable(response.text()).await??;

        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// GET without mapping the status code to an error
    ///
    /// # Errors
    ///
    /// Fails only on transport-level errors or cancellation
    pub async fn get_with_status(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpReply, FetchError> {
        let response = self
            .execute(
                || with_headers(self.api_client.get(url).header(header::ACCEPT, ACCEPT_JSON), headers),
                false,
            )
            .await?;
        self.into_reply(response).await
    }

    /// POST with an empty body without mapping the status code to an error
    ///
    /// # Errors
    ///
    /// Fails only on transport-level errors or cancellation
    pub async fn post_with_status(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpReply, FetchError> {
        let response = self
            .execute(
                || with_headers(self.api_client.post(url).header(header::ACCEPT, ACCEPT_JSON), headers),
                false,
            )
            .await?;
        self.into_reply(response).await
    }

    /// Stream a media response straight into `dest`
    ///
    /// The body is written chunk by chunk, never buffered whole. On any failure
    /// (status, network, empty body, write error, cancellation) the partially
    /// written file is removed, so callers never see a truncated artifact.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-2xx status, empty body, or I/O errors
    pub async fn fetch_binary(&self, url: &str, dest: &Path) -> Result<Downloaded, FetchError> {
        let mut response = self
            .execute(
                || self.download_client.get(url).header(header::ACCEPT, ACCEPT_MEDIA),
                true,
            )
            .await?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match self.stream_to_file(&mut response, dest).await {
            Ok(0) => {
                remove_partial(dest).await;
                debug!(url = %url, "media response was empty");
                Err(FetchError::EmptyBody)
            }
            Ok(bytes) => {
                debug!(url = %url, path = %dest.display(), bytes, "media downloaded");
                Ok(Downloaded {
                    path: dest.to_path_buf(),
                    content_type,
                    bytes,
                })
            }
            Err(e) => {
                remove_partial(dest).await;
                warn!(url = %url, error = %e, "media download failed");
                Err(e)
            }
        }
    }

    async fn stream_to_file(
        &self,
        response: &mut reqwest::Response,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = self.cancellable(response.chunk()).await?? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn into_reply(&self, response: reqwest::Response) -> Result<HttpReply, FetchError> {
        let status = response.status().as_u16();
        let body = self.cancellable(response.text()).await??;
        Ok(HttpReply { status, body })
    }

    /// Gate, send and (optionally) check the status, with retry
    async fn execute<B>(&self, build: B, check_status: bool) -> Result<reqwest::Response, FetchError>
    where
        B: Fn() -> reqwest::RequestBuilder,
    {
        let build = &build;
        let this = self;

        with_retry(&self.retry, &self.cancel, move || async move {
            this.cancellable(this.gate.acquire()).await?;

            let response = this.cancellable(build().send()).await??;
            let status = response.status();
            debug!(url = %response.url(), status = status.as_u16(), "response received");

            if check_status && !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            Ok(response)
        })
        .await
    }

    async fn cancellable<F, T>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

fn with_headers(
    mut builder: reqwest::RequestBuilder,
    headers: &[(&str, &str)],
) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove partial download");
    }
}

#[cfg(test)]
mod tests;
