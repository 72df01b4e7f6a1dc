//! Imgur resolver: direct files, `.gifv`, albums and single posts

use super::{MediaFetcher, MediaResolver, PostStep};
use crate::config::EndpointConfig;
use crate::error::{FetchError, ResolveError};
use crate::types::ResolvedMedia;
use crate::utils::{clean_file_name, ensure_destination, file_name_from_url};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        #[allow(clippy::unwrap_used)]
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

static_regex!(gallery_re, r"imgur\.com/gallery/");
static_regex!(subdomain_re, r"https?://(?:m|i)\.imgur\.com");
static_regex!(direct_re, r"imgur\.com/([A-Za-z0-9]+\.[A-Za-z0-9]+)(?:[?/]|$)");
static_regex!(album_re, r"imgur\.com/(?:a|gallery)/([A-Za-z0-9-]+)");
static_regex!(single_re, r"imgur\.com/([A-Za-z0-9]{5,})");
static_regex!(
    noscript_re,
    r"(?:https?:)?//i\.imgur\.com/([a-zA-Z0-9]+)(\.[a-zA-Z0-9]+)?"
);

/// Normalize an Imgur URL to its canonical form
///
/// Drops the fragment, maps `gallery/` to `a/`, and maps the `m.` and `i.`
/// subdomains to `https://imgur.com`. Applying it twice changes nothing.
///
/// # Examples
///
/// ```
/// use reddit_media_dl::providers::imgur::sanitize_imgur_url;
///
/// assert_eq!(
///     sanitize_imgur_url("http://m.imgur.com/gallery/xyz#comments"),
///     "https://imgur.com/a/xyz"
/// );
/// ```
#[must_use]
pub fn sanitize_imgur_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let canonical = gallery_re().replace_all(without_fragment, "imgur.com/a/");
    subdomain_re()
        .replace_all(&canonical, "https://imgur.com")
        .into_owned()
}

/// The three Imgur URL shapes, in the order they are recognized
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImgurLink {
    /// A media file with an extension, served from the CDN
    Direct {
        /// File name, e.g. `xyz.png`
        file: String,
    },
    /// An album (`/a/<id>`, or `/gallery/<id>` before sanitizing)
    Album {
        /// Album ID
        id: String,
    },
    /// A single post, `imgur.com/<id>` with an ID of at least five characters
    Single {
        /// Post ID
        id: String,
    },
}

impl ImgurLink {
    /// Classify a sanitized Imgur URL
    ///
    /// Returns `None` for shapes that are not downloadable (user pages, tags).
    #[must_use]
    pub fn classify(sanitized: &str) -> Option<Self> {
        if let Some(caps) = direct_re().captures(sanitized) {
            return Some(ImgurLink::Direct {
                file: caps[1].to_string(),
            });
        }
        if let Some(caps) = album_re().captures(sanitized) {
            // Newer gallery slugs look like `title-words-ID`
            let slug = &caps[1];
            let id = slug.rsplit('-').next().unwrap_or(slug);
            if !id.is_empty() {
                return Some(ImgurLink::Album { id: id.to_string() });
            }
            return None;
        }
        single_re().captures(sanitized).map(|caps| ImgurLink::Single {
            id: caps[1].to_string(),
        })
    }
}

/// Which entry point of the resolver is used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImgurVariant {
    /// Direct files, albums and single posts
    Standard,
    /// `.gifv` links, fetched as MP4 from the CDN
    Gifv,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    data: Option<AlbumData>,
}

#[derive(Debug, Deserialize)]
struct AlbumData {
    #[serde(default)]
    images: Vec<AlbumImage>,
}

#[derive(Debug, Deserialize)]
struct AlbumImage {
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    #[serde(default)]
    media: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    id: Option<String>,
    ext: Option<String>,
    mp4: Option<String>,
}

/// Imgur resolver
pub struct ImgurResolver {
    fetcher: Arc<MediaFetcher>,
    variant: ImgurVariant,
    api_base: String,
    web_base: String,
    cdn_base: String,
    client_id: String,
}

impl ImgurResolver {
    /// Resolver for direct files, albums and single posts
    pub fn new(fetcher: Arc<MediaFetcher>, endpoints: &EndpointConfig) -> Self {
        Self::with_variant(fetcher, endpoints, ImgurVariant::Standard)
    }

    /// Resolver for `.gifv` links
    pub fn gifv(fetcher: Arc<MediaFetcher>, endpoints: &EndpointConfig) -> Self {
        Self::with_variant(fetcher, endpoints, ImgurVariant::Gifv)
    }

    fn with_variant(
        fetcher: Arc<MediaFetcher>,
        endpoints: &EndpointConfig,
        variant: ImgurVariant,
    ) -> Self {
        Self {
            fetcher,
            variant,
            api_base: endpoints.imgur_api_base.trim_end_matches('/').to_string(),
            web_base: endpoints.imgur_web_base.trim_end_matches('/').to_string(),
            cdn_base: endpoints.imgur_cdn_base.trim_end_matches('/').to_string(),
            client_id: endpoints.imgur_client_id.clone(),
        }
    }

    /// Which entry point this resolver serves
    pub fn variant(&self) -> ImgurVariant {
        self.variant
    }

    fn auth_header(&self) -> String {
        format!("Client-ID {}", self.client_id)
    }

    async fn direct(&self, file: &str, dir: &Path) -> Result<Vec<ResolvedMedia>, ResolveError> {
        let (file, step) = match (self.variant, file.strip_suffix(".gifv")) {
            (ImgurVariant::Gifv, Some(stem)) => (format!("{stem}.mp4"), PostStep::Keep),
            _ => (file.to_string(), PostStep::Normalize),
        };
        let media_url = format!("{}/{}", self.cdn_base, file);
        let media = self
            .fetcher
            .download(&media_url, dir, &clean_file_name(&file), step)
            .await?;
        Ok(vec![media])
    }

    /// Image links of an album: API first, then the noscript page
    async fn album_links(&self, id: &str) -> Result<Vec<String>, ResolveError> {
        let api_url = format!("{}/3/album/{}", self.api_base, id);
        let auth = self.auth_header();

        let from_api = match self
            .fetcher
            .transport()
            .fetch_json::<AlbumResponse>(&api_url, &[("Authorization", auth.as_str())])
            .await
        {
            Ok(response) => response
                .data
                .map(|data| data.images.into_iter().filter_map(|i| i.link).collect())
                .unwrap_or_default(),
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled.into()),
            Err(e) => {
                warn!(album = %id, error = %e, "imgur album API failed, trying noscript page");
                Vec::new()
            }
        };

        if !from_api.is_empty() {
            return Ok(from_api);
        }

        let noscript_url = format!("{}/a/{}/noscript", self.web_base, id);
        let page = self.fetcher.transport().fetch_text(&noscript_url).await?;
        Ok(self.links_from_noscript(&page))
    }

    fn links_from_noscript(&self, page: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        noscript_re()
            .captures_iter(page)
            .map(|caps| {
                let ext = caps.get(2).map_or("", |m| m.as_str());
                format!("{}/{}{}", self.cdn_base, &caps[1], ext)
            })
            .filter(|link| seen.insert(link.clone()))
            .collect()
    }

    async fn album(&self, id: &str, dir: &Path) -> Result<Vec<ResolvedMedia>, ResolveError> {
        let links = self.album_links(id).await?;
        if links.is_empty() {
            return Err(ResolveError::NoMedia);
        }
        debug!(album = %id, count = links.len(), "resolved imgur album");

        let mut saved = Vec::new();
        let mut last_error = None;
        for link in &links {
            match self
                .fetcher
                .download(link, dir, &file_name_from_url(link), PostStep::Normalize)
                .await
            {
                Ok(media) => saved.push(media),
                Err(ResolveError::Fetch(FetchError::Cancelled)) => {
                    return Err(FetchError::Cancelled.into());
                }
                Err(e) => {
                    warn!(album = %id, url = %link, error = %e, "album item failed");
                    last_error = Some(e);
                }
            }
        }

        if saved.is_empty() {
            return Err(last_error.unwrap_or(ResolveError::NoMedia));
        }
        info!(album = %id, saved = saved.len(), total = links.len(), "imgur album saved");
        Ok(saved)
    }

    /// Final media URL of a single post
    async fn single_media_url(&self, id: &str) -> Result<String, ResolveError> {
        let api_url = format!(
            "{}/post/v1/media/{}?include=media,adconfig,account",
            self.api_base, id
        );
        let auth = self.auth_header();
        let response: MediaResponse = self
            .fetcher
            .transport()
            .fetch_json(&api_url, &[("Authorization", auth.as_str())])
            .await?;

        let item = response.media.into_iter().next().ok_or(ResolveError::NoMedia)?;
        let ext = item.ext.filter(|e| !e.is_empty()).ok_or(ResolveError::NoMedia)?;
        let ext = if ext.starts_with('.') {
            ext
        } else {
            format!(".{ext}")
        };

        if ext == ".gif"
            && let Some(mp4) = item.mp4.filter(|m| !m.is_empty())
        {
            return Ok(mp4);
        }

        let media_id = item.id.unwrap_or_else(|| id.to_string());
        Ok(format!("{}/{}{}", self.cdn_base, media_id, ext))
    }

    async fn single(&self, id: &str, dir: &Path) -> Result<Vec<ResolvedMedia>, ResolveError> {
        let media_url = self.single_media_url(id).await?;
        let media = self
            .fetcher
            .download(
                &media_url,
                dir,
                &file_name_from_url(&media_url),
                PostStep::Normalize,
            )
            .await?;
        Ok(vec![media])
    }
}

#[async_trait]
impl MediaResolver for ImgurResolver {
    fn name(&self) -> &'static str {
        match self.variant {
            ImgurVariant::Standard => "imgur",
            ImgurVariant::Gifv => "imgur-gifv",
        }
    }

    async fn resolve(
        &self,
        url: &str,
        save_dir: &Path,
        username: Option<&str>,
    ) -> Result<Vec<ResolvedMedia>, ResolveError> {
        let sanitized = sanitize_imgur_url(url);
        let link = ImgurLink::classify(&sanitized)
            .ok_or_else(|| ResolveError::InvalidUrl(url.to_string()))?;
        debug!(url = %url, link = ?link, "classified imgur link");

        let dir = ensure_destination(save_dir, username).await?;
        match link {
            ImgurLink::Direct { file } => self.direct(&file, &dir).await,
            ImgurLink::Album { id } => self.album(&id, &dir).await,
            ImgurLink::Single { id } => self.single(&id, &dir).await,
        }
    }
}
