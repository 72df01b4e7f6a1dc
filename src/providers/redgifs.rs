//! RedGifs resolver
//!
//! RedGifs needs a bearer token from its temporary-auth endpoint. The token has
//! no known lifetime; it is considered expired only when the API answers 401.
//! [`RedgifsAuth`] holds the token for the whole session and serializes
//! refreshes, so concurrent callers that hit the same 401 trigger one refresh
//! between them, and a single metadata call refreshes at most once.

use super::{MediaFetcher, MediaResolver, PostStep};
use crate::error::{FetchError, ResolveError};
use crate::transport::{HttpReply, Transport};
use crate::types::ResolvedMedia;
use crate::utils::{clean_file_name, ensure_destination};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DEFAULT_EXTENSION: &str = ".mp4";

#[allow(clippy::unwrap_used)]
fn amp_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/amp(/|\?|$)").unwrap())
}

#[allow(clippy::unwrap_used)]
fn watch_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"redgifs\.com/(?:watch|ifr)/([a-zA-Z0-9_-]+)").unwrap())
}

#[allow(clippy::unwrap_used)]
fn extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.([a-zA-Z0-9]+)(?:\?|$)").unwrap())
}

/// Normalize a RedGifs or gifdeliverynetwork URL to `redgifs.com/watch/<slug>`
///
/// # Examples
///
/// ```
/// use reddit_media_dl::providers::redgifs::normalize_redgifs_url;
///
/// assert_eq!(
///     normalize_redgifs_url("https://thumbs.redgifs.com/watch/myslug/amp"),
///     "https://redgifs.com/watch/myslug"
/// );
/// assert_eq!(
///     normalize_redgifs_url("https://gifdeliverynetwork.com/myslug"),
///     "https://redgifs.com/watch/myslug"
/// );
/// ```
#[must_use]
pub fn normalize_redgifs_url(url: &str) -> String {
    let url = url
        .replace("thumbs.", "")
        .replace("/gifs/detail", "")
        .replace("gifdeliverynetwork.com", "redgifs.com/watch");
    amp_segment_re().replace_all(&url, "$1").into_owned()
}

/// Extract the gif ID: the watch-path slug up to its first `-`
#[must_use]
pub fn extract_redgifs_id(url: &str) -> Option<String> {
    let caps = watch_id_re().captures(url)?;
    let id = caps[1].split('-').next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

/// File extension of a media URL, including the dot, defaulting to `.mp4`
#[must_use]
pub fn media_extension(media_url: &str) -> String {
    extension_re()
        .captures(media_url)
        .map_or_else(|| DEFAULT_EXTENSION.to_string(), |caps| format!(".{}", &caps[1]))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthState {
    NoToken,
    Authorized(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Session-wide RedGifs bearer token
///
/// States: no token, token requested (the lock is held while the auth call is
/// in flight), authorized. A 401 moves an authorized token back to no token
/// and exactly one re-authorization follows.
pub struct RedgifsAuth {
    transport: Arc<Transport>,
    auth_url: String,
    state: Mutex<AuthState>,
}

impl RedgifsAuth {
    /// Create an empty token holder for the API at `api_base`
    pub fn new(transport: Arc<Transport>, api_base: &str) -> Self {
        Self {
            transport,
            auth_url: format!("{}/v2/auth/temporary", api_base.trim_end_matches('/')),
            state: Mutex::new(AuthState::NoToken),
        }
    }

    /// The cached token, requesting one first if there is none
    ///
    /// # Errors
    ///
    /// Fails if the auth endpoint is unreachable or returns no token
    pub async fn token(&self) -> Result<String, ResolveError> {
        let mut state = self.state.lock().await;
        if let AuthState::Authorized(token) = &*state {
            return Ok(token.clone());
        }
        let token = self.request_token().await?;
        *state = AuthState::Authorized(token.clone());
        Ok(token)
    }

    /// Replace `stale` with a fresh token
    ///
    /// If another caller already replaced `stale`, its token is returned
    /// without a second auth request.
    ///
    /// # Errors
    ///
    /// Fails like [`token`](Self::token); the state is left without a token
    pub async fn refresh(&self, stale: &str) -> Result<String, ResolveError> {
        let mut state = self.state.lock().await;
        if let AuthState::Authorized(token) = &*state
            && token != stale
        {
            return Ok(token.clone());
        }

        *state = AuthState::NoToken;
        let token = self.request_token().await?;
        *state = AuthState::Authorized(token.clone());
        info!("refreshed redgifs token");
        Ok(token)
    }

    /// The cached token, if any
    pub async fn current(&self) -> Option<String> {
        match &*self.state.lock().await {
            AuthState::Authorized(token) => Some(token.clone()),
            AuthState::NoToken => None,
        }
    }

    async fn request_token(&self) -> Result<String, ResolveError> {
        debug!(url = %self.auth_url, "requesting redgifs token");
        let reply = self.transport.post_with_status(&self.auth_url, &[]).await?;
        if !reply.is_success() {
            return Err(FetchError::Status(reply.status).into());
        }
        let body: TokenResponse = reply.json()?;
        body.token
            .filter(|t| !t.is_empty())
            .ok_or(ResolveError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
struct GifResponse {
    gif: Option<Gif>,
}

#[derive(Debug, Deserialize)]
struct Gif {
    urls: Option<GifUrls>,
    gallery: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GifUrls {
    hd: Option<String>,
    sd: Option<String>,
}

fn is_present(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
    }
}

/// RedGifs resolver
pub struct RedgifsResolver {
    fetcher: Arc<MediaFetcher>,
    auth: Arc<RedgifsAuth>,
    api_base: String,
}

impl RedgifsResolver {
    /// Create a resolver sharing the session token holder
    pub fn new(fetcher: Arc<MediaFetcher>, auth: Arc<RedgifsAuth>, api_base: &str) -> Self {
        Self {
            fetcher,
            auth,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_gif(&self, url: &str, token: &str) -> Result<HttpReply, ResolveError> {
        let bearer = format!("Bearer {token}");
        Ok(self
            .fetcher
            .transport()
            .get_with_status(url, &[("Authorization", bearer.as_str())])
            .await?)
    }

    /// Media URL for a gif ID, HD preferred
    ///
    /// # Errors
    ///
    /// [`ResolveError::Unauthorized`] after a second 401,
    /// [`ResolveError::Unsupported`] for galleries, [`ResolveError::NoMedia`]
    /// when neither HD nor SD is present
    pub async fn media_url(&self, gif_id: &str) -> Result<String, ResolveError> {
        let url = format!("{}/v2/gifs/{}", self.api_base, gif_id);
        let token = self.auth.token().await?;

        let mut reply = self.get_gif(&url, &token).await?;
        if reply.status == 401 {
            warn!(gif = %gif_id, "redgifs token rejected, refreshing once");
            let fresh = self.auth.refresh(&token).await?;
            reply = self.get_gif(&url, &fresh).await?;
            if reply.status == 401 {
                return Err(ResolveError::Unauthorized);
            }
        }
        if !reply.is_success() {
            return Err(FetchError::Status(reply.status).into());
        }

        let body: GifResponse = reply.json()?;
        let gif = body.gif.ok_or(ResolveError::NoMedia)?;
        if gif.gallery.as_ref().is_some_and(is_present) {
            return Err(ResolveError::Unsupported(format!("redgifs gallery {gif_id}")));
        }

        let urls = gif.urls.ok_or(ResolveError::NoMedia)?;
        urls.hd
            .filter(|u| !u.is_empty())
            .or(urls.sd.filter(|u| !u.is_empty()))
            .ok_or(ResolveError::NoMedia)
    }
}

#[async_trait]
impl MediaResolver for RedgifsResolver {
    fn name(&self) -> &'static str {
        "redgifs"
    }

    async fn resolve(
        &self,
        url: &str,
        save_dir: &Path,
        username: Option<&str>,
    ) -> Result<Vec<ResolvedMedia>, ResolveError> {
        let normalized = normalize_redgifs_url(url);
        let gif_id = extract_redgifs_id(&normalized)
            .ok_or_else(|| ResolveError::InvalidUrl(url.to_string()))?;

        let media_url = self.media_url(&gif_id).await?;
        let dir = ensure_destination(save_dir, username).await?;
        let file_name = format!("{}{}", clean_file_name(&gif_id), media_extension(&media_url));

        let media = self
            .fetcher
            .download(&media_url, &dir, &file_name, PostStep::Keep)
            .await?;
        Ok(vec![media])
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mp4_bytes() -> Vec<u8> {
        let mut mp4 = vec![0, 0, 0, 0x18];
        mp4.extend_from_slice(b"ftypmp42");
        mp4
    }

    fn resolver(server: &MockServer) -> (RedgifsResolver, Arc<RedgifsAuth>) {
        let auth = Arc::new(RedgifsAuth::new(transport(), &server.uri()));
        (
            RedgifsResolver::new(fetcher(), auth.clone(), &server.uri()),
            auth,
        )
    }

    async fn mount_token(server: &MockServer, token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/v2/auth/temporary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": token })))
            .up_to_n_times(times)
            .mount(server)
            .await;
    }

    fn gif_body(server: &MockServer, name: &str) -> serde_json::Value {
        serde_json::json!({
            "gif": {
                "urls": {
                    "hd": format!("{}/media/{name}.mp4", server.uri()),
                    "sd": format!("{}/media/{name}-mobile.mp4", server.uri()),
                },
                "gallery": null
            }
        })
    }

    #[test]
    fn normalize_strips_variants() {
        assert_eq!(
            normalize_redgifs_url("https://thumbs.redgifs.com/watch/myslug/amp"),
            "https://redgifs.com/watch/myslug"
        );
        assert_eq!(
            normalize_redgifs_url("https://www.gifdeliverynetwork.com/myslug"),
            "https://www.redgifs.com/watch/myslug"
        );
        assert_eq!(
            normalize_redgifs_url("https://redgifs.com/watch/ampleslug"),
            "https://redgifs.com/watch/ampleslug"
        );
    }

    #[test]
    fn id_is_slug_before_first_dash() {
        assert_eq!(
            extract_redgifs_id("https://redgifs.com/watch/myslug-title").as_deref(),
            Some("myslug")
        );
        assert_eq!(
            extract_redgifs_id("https://www.redgifs.com/ifr/other").as_deref(),
            Some("other")
        );
        assert_eq!(extract_redgifs_id("https://redgifs.com/users/someone"), None);
    }

    #[test]
    fn extension_comes_from_media_path() {
        assert_eq!(media_extension("https://media.redgifs.com/Foo.webm?x=1"), ".webm");
        assert_eq!(media_extension("https://media.redgifs.com/Foo"), ".mp4");
    }

    #[tokio::test]
    async fn resolves_hd_and_names_file_by_id() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 10).await;
        Mock::given(method("GET"))
            .and(path("/v2/gifs/myslug"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gif_body(&server, "MySlug")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/MySlug.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mp4_bytes(), "video/mp4"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&server);
        let media = resolver
            .resolve("https://redgifs.com/watch/myslug-some-title", dir.path(), Some("bob"))
            .await
            .unwrap();

        assert_eq!(media[0].local_path, dir.path().join("bob").join("myslug.mp4"));
    }

    #[tokio::test]
    async fn falls_back_to_sd() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 10).await;
        Mock::given(method("GET"))
            .and(path("/v2/gifs/sdonly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "gif": { "urls": { "sd": "https://media.example/sdonly-mobile.mp4" } }
            })))
            .mount(&server)
            .await;

        let (resolver, _) = resolver(&server);
        let url = resolver.media_url("sdonly").await.unwrap();

        assert_eq!(url, "https://media.example/sdonly-mobile.mp4");
    }

    #[tokio::test]
    async fn token_is_requested_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/auth/temporary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "tok" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/gifs/cached"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gif_body(&server, "cached")))
            .expect(2)
            .mount(&server)
            .await;

        let (resolver, auth) = resolver(&server);
        assert_eq!(auth.current().await, None);

        resolver.media_url("cached").await.unwrap();
        resolver.media_url("cached").await.unwrap();

        assert_eq!(auth.current().await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn unauthorized_refreshes_token_once_and_retries() {
        let server = MockServer::start().await;
        mount_token(&server, "old", 1).await;
        mount_token(&server, "new", 1).await;
        Mock::given(method("GET"))
            .and(path("/v2/gifs/expired"))
            .and(header("authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/gifs/expired"))
            .and(header("authorization", "Bearer new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gif_body(&server, "expired")))
            .expect(1)
            .mount(&server)
            .await;

        let (resolver, auth) = resolver(&server);
        let url = resolver.media_url("expired").await.unwrap();

        assert!(url.ends_with("/media/expired.mp4"));
        assert_eq!(auth.current().await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn second_unauthorized_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/auth/temporary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "tok" })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/gifs/locked"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let (resolver, _) = resolver(&server);
        let err = resolver.media_url("locked").await.unwrap_err();

        assert!(matches!(err, ResolveError::Unauthorized), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_skips_auth_when_token_already_replaced() {
        let server = MockServer::start().await;
        mount_token(&server, "first", 1).await;
        Mock::given(method("POST"))
            .and(path("/v2/auth/temporary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "second" })))
            .expect(1)
            .mount(&server)
            .await;

        let (_, auth) = resolver(&server);
        let first = auth.token().await.unwrap();
        assert_eq!(first, "first");

        let second = auth.refresh(&first).await.unwrap();
        let again = auth.refresh(&first).await.unwrap();

        assert_eq!(second, "second");
        assert_eq!(again, "second");
    }

    #[tokio::test]
    async fn galleries_are_unsupported() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 10).await;
        Mock::given(method("GET"))
            .and(path("/v2/gifs/album"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "gif": { "urls": { "hd": "https://media.example/a.mp4" }, "gallery": "g123" }
            })))
            .mount(&server)
            .await;

        let (resolver, _) = resolver(&server);
        let err = resolver.media_url("album").await.unwrap_err();

        assert!(matches!(err, ResolveError::Unsupported(_)));
    }

    #[tokio::test]
    async fn non_watch_url_is_invalid() {
        let server = MockServer::start().await;
        let (resolver, _) = resolver(&server);
        let dir = TempDir::new().unwrap();

        let err = resolver
            .resolve("https://redgifs.com/users/someone", dir.path(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::InvalidUrl(_)));
    }
}
