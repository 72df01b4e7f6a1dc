//! Resolution dispatcher
//!
//! Routing is an ordered table of host predicates over the parsed URL. The
//! first matching entry wins, so the `.gifv` check has to come before the
//! general Imgur check. Anything unmatched, including URLs that do not parse,
//! goes to the links sink.

use crate::error::ResolveError;
use crate::providers::{DirectResolver, ImgurResolver, LinkSink, MediaResolver, RedgifsResolver};
use crate::types::{Outcome, Route};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Host predicate of one routing entry
pub type HostPredicate = fn(&Url) -> bool;

fn host_is(url: &Url, domain: &str) -> bool {
    url.host_str().is_some_and(|host| {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        host == domain || host.strip_suffix(domain).is_some_and(|sub| sub.ends_with('.'))
    })
}

fn is_imgur_gifv(url: &Url) -> bool {
    is_imgur(url) && url.path().to_ascii_lowercase().ends_with(".gifv")
}

fn is_imgur(url: &Url) -> bool {
    host_is(url, "imgur.com")
}

fn is_reddit_direct(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case("i.redd.it"))
}

fn is_redgifs(url: &Url) -> bool {
    host_is(url, "redgifs.com") || host_is(url, "gifdeliverynetwork.com")
}

/// Routing table, evaluated top to bottom
pub const ROUTES: &[(HostPredicate, Route)] = &[
    (is_imgur_gifv, Route::ImgurGifv),
    (is_imgur, Route::Imgur),
    (is_reddit_direct, Route::RedditDirect),
    (is_redgifs, Route::Redgifs),
];

/// Pick the route for a post URL
///
/// # Examples
///
/// ```
/// use reddit_media_dl::dispatcher::classify;
/// use reddit_media_dl::Route;
///
/// assert_eq!(classify("https://i.imgur.com/xyz.gifv"), Route::ImgurGifv);
/// assert_eq!(classify("https://imgur.com/a/xyz"), Route::Imgur);
/// assert_eq!(classify("https://i.redd.it/abc.jpg"), Route::RedditDirect);
/// assert_eq!(classify("https://www.redgifs.com/watch/slug"), Route::Redgifs);
/// assert_eq!(classify("https://youtube.com/watch?v=1"), Route::Link);
/// ```
#[must_use]
pub fn classify(url: &str) -> Route {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return Route::Link;
    };
    ROUTES
        .iter()
        .find(|(matches, _)| matches(&parsed))
        .map_or(Route::Link, |(_, route)| *route)
}

/// Routes post URLs to resolvers or the links sink
pub struct Dispatcher {
    imgur: ImgurResolver,
    imgur_gifv: ImgurResolver,
    direct: DirectResolver,
    redgifs: RedgifsResolver,
    links: LinkSink,
}

impl Dispatcher {
    /// Assemble a dispatcher from its resolvers
    pub fn new(
        imgur: ImgurResolver,
        imgur_gifv: ImgurResolver,
        direct: DirectResolver,
        redgifs: RedgifsResolver,
        links: LinkSink,
    ) -> Self {
        Self {
            imgur,
            imgur_gifv,
            direct,
            redgifs,
            links,
        }
    }

    /// The resolver serving `route`, `None` for [`Route::Link`]
    pub fn resolver_for(&self, route: Route) -> Option<&dyn MediaResolver> {
        match route {
            Route::ImgurGifv => Some(&self.imgur_gifv),
            Route::Imgur => Some(&self.imgur),
            Route::RedditDirect => Some(&self.direct),
            Route::Redgifs => Some(&self.redgifs),
            Route::Link => None,
        }
    }

    /// Resolve `url` into `save_dir[/username]`
    ///
    /// # Errors
    ///
    /// Propagates the resolver's error, or an I/O error from the links sink
    pub async fn dispatch(
        &self,
        url: &str,
        save_dir: &Path,
        username: Option<&str>,
    ) -> Result<Outcome, ResolveError> {
        let route = classify(url);
        match self.resolver_for(route) {
            Some(resolver) => {
                debug!(url = %url, resolver = resolver.name(), "dispatching");
                let media = resolver.resolve(url, save_dir, username).await?;
                info!(url = %url, files = media.len(), "resolved");
                Ok(Outcome::Downloaded(media))
            }
            None => {
                let sink = self.links.record(url, save_dir, username).await?;
                Ok(Outcome::Recorded { sink })
            }
        }
    }
}
