//! Listing pagination
//!
//! Walks a paginated listing (`<base>/r/<name>.json`, `<base>/user/<name>.json`)
//! and turns its link posts into [`PostEntry`] values. Page 0 is requested
//! verbatim, later pages carry the `after` cursor of the previous page.
//! Pagination ends at `max_pages`, at the first page without a cursor, or at
//! the first page that cannot be fetched or parsed.

use crate::error::{FetchError, ScrapeError};
use crate::transport::Transport;
use crate::types::PostEntry;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Page count used when the configured value is negative or not a number
pub const DEFAULT_PAGE_COUNT: u32 = 1;

/// Parse a page-count bound, mapping negative or non-integer input to 1
///
/// # Examples
///
/// ```
/// use reddit_media_dl::listing::normalize_page_count;
///
/// assert_eq!(normalize_page_count("3"), 3);
/// assert_eq!(normalize_page_count("0"), 0);
/// assert_eq!(normalize_page_count("-2"), 1);
/// assert_eq!(normalize_page_count("two"), 1);
/// ```
#[must_use]
pub fn normalize_page_count(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(DEFAULT_PAGE_COUNT)
}

/// URL of the page following `cursor`
#[must_use]
pub fn page_url(base_url: &str, cursor: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}after={}", urlencoding::encode(cursor))
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostData {
    url: Option<String>,
    title: Option<String>,
    author: Option<String>,
    id: Option<String>,
    is_self: Option<bool>,
    gallery_data: Option<GalleryData>,
    media_metadata: Option<HashMap<String, MediaMetadata>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GalleryData {
    items: Vec<GalleryItem>,
}

#[derive(Debug, Deserialize)]
struct GalleryItem {
    media_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    s: Option<MediaSource>,
}

#[derive(Debug, Deserialize)]
struct MediaSource {
    u: Option<String>,
    gif: Option<String>,
}

/// Entries contributed by one listing child
fn entries_from_post(post: PostData) -> Vec<PostEntry> {
    let has_gallery = post
        .gallery_data
        .as_ref()
        .is_some_and(|g| !g.items.is_empty());
    if post.is_self == Some(true) && !has_gallery {
        return Vec::new();
    }

    let id = post.id.unwrap_or_default();

    if let (Some(gallery), Some(metadata)) = (post.gallery_data, post.media_metadata) {
        let title = post.title.unwrap_or_default();
        let author = post.author.unwrap_or_default();
        return gallery
            .items
            .into_iter()
            .filter_map(|item| {
                let media = metadata.get(&item.media_id?)?;
                let source = media.s.as_ref()?;
                let url = source.gif.as_deref().or(source.u.as_deref())?;
                Some(PostEntry {
                    url: url.replace("&amp;", "&"),
                    title: title.clone(),
                    author: author.clone(),
                    id: id.clone(),
                })
            })
            .collect();
    }

    match (post.url, post.title, post.author) {
        (Some(url), Some(title), Some(author)) => vec![PostEntry {
            url,
            title,
            author,
            id,
        }],
        _ => Vec::new(),
    }
}

/// Paginated listing scraper
pub struct ListingScraper {
    transport: Arc<Transport>,
    reddit_base: String,
}

impl ListingScraper {
    /// Create a scraper for the listing site at `reddit_base`
    pub fn new(transport: Arc<Transport>, reddit_base: &str) -> Self {
        Self {
            transport,
            reddit_base: reddit_base.trim_end_matches('/').to_string(),
        }
    }

    /// Scrape up to `max_pages + 1` pages starting at `base_url`
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Unavailable`] if the first page fails or the session is
    /// cancelled, [`ScrapeError::NoEntries`] if no usable entry was found
    pub async fn scrape(&self, base_url: &str, max_pages: u32) -> Result<Vec<PostEntry>, ScrapeError> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..=max_pages {
            let url = match &cursor {
                Some(after) => page_url(base_url, after),
                None => base_url.to_string(),
            };

            let listing: Listing = match self.transport.fetch_json(&url, &[]).await {
                Ok(listing) => listing,
                Err(e) if page == 0 || matches!(e, FetchError::Cancelled) => {
                    return Err(ScrapeError::Unavailable(e));
                }
                Err(e) => {
                    warn!(url = %url, page, error = %e, "listing page failed, ending pagination");
                    break;
                }
            };

            let before = entries.len();
            for child in listing.data.children {
                if child.kind != "t3" {
                    continue;
                }
                match serde_json::from_value::<PostData>(child.data) {
                    Ok(post) => entries.extend(entries_from_post(post)),
                    Err(e) => debug!(url = %url, error = %e, "skipping malformed post"),
                }
            }
            debug!(url = %url, page, added = entries.len() - before, "listing page scraped");

            cursor = listing.data.after.filter(|after| !after.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        if entries.is_empty() {
            return Err(ScrapeError::NoEntries);
        }
        info!(url = %base_url, entries = entries.len(), "listing scraped");
        Ok(entries)
    }

    /// Listing URL of a subreddit
    pub fn subreddit_url(&self, name: &str) -> String {
        format!("{}/r/{}.json", self.reddit_base, name)
    }

    /// Listing URL of a user
    pub fn user_url(&self, name: &str) -> String {
        format!("{}/user/{}.json", self.reddit_base, name)
    }

    /// Scrape a subreddit listing
    ///
    /// # Errors
    ///
    /// See [`scrape`](Self::scrape)
    pub async fn scrape_subreddit(&self, name: &str, max_pages: u32) -> Result<Vec<PostEntry>, ScrapeError> {
        self.scrape(&self.subreddit_url(name), max_pages).await
    }

    /// Scrape a user listing
    ///
    /// # Errors
    ///
    /// See [`scrape`](Self::scrape)
    pub async fn scrape_user(&self, name: &str, max_pages: u32) -> Result<Vec<PostEntry>, ScrapeError> {
        self.scrape(&self.user_url(name), max_pages).await
    }
}
