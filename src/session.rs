//! Session: the owner of all shared state
//!
//! A [`Session`] owns the rate-limit state, the RedGifs token, the cancellation
//! token and the event channel, and hands references to them to the transport
//! and resolvers. Nothing is global; two sessions share nothing.

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, ResolveError, Result, ScrapeError};
use crate::listing::ListingScraper;
use crate::providers::{
    DirectResolver, ImgurResolver, LinkSink, MediaFetcher, RedgifsAuth, RedgifsResolver,
};
use crate::rate_limiter::{IntervalLimiter, RequestGate};
use crate::transport::Transport;
use crate::types::{BatchReport, Event, Layout, Outcome, PostEntry};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// A scrape-and-resolve session
pub struct Session {
    config: Arc<Config>,
    transport: Arc<Transport>,
    scraper: ListingScraper,
    dispatcher: Dispatcher,
    auth: Arc<RedgifsAuth>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session with the configured minimum request interval
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings, or a fetch error if the
    /// HTTP clients cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let gate = Arc::new(IntervalLimiter::new(config.http.min_request_interval));
        Self::with_gate(config, gate)
    }

    /// Create a session with a custom request gate
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new)
    pub fn with_gate(config: Config, gate: Arc<dyn RequestGate>) -> Result<Self> {
        validate_config(&config)?;

        let cancel = CancellationToken::new();
        let transport = Arc::new(Transport::new(
            &config.http,
            config.retry.clone(),
            gate,
            cancel.clone(),
        )?);

        let endpoints = &config.endpoints;
        let fetcher = Arc::new(MediaFetcher::new(
            transport.clone(),
            config.output.clone(),
            config.post_process.clone(),
        ));
        let auth = Arc::new(RedgifsAuth::new(transport.clone(), &endpoints.redgifs_api_base));

        let dispatcher = Dispatcher::new(
            ImgurResolver::new(fetcher.clone(), endpoints),
            ImgurResolver::gifv(fetcher.clone(), endpoints),
            DirectResolver::new(fetcher.clone()),
            RedgifsResolver::new(fetcher.clone(), auth.clone(), &endpoints.redgifs_api_base),
            LinkSink::new(fetcher.links_file_name()),
        );
        let scraper = ListingScraper::new(transport.clone(), &endpoints.reddit_base);
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            transport,
            scraper,
            dispatcher,
            auth,
            event_tx,
            cancel,
        })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// The session configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The shared transport
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// The session's RedGifs token holder
    pub fn redgifs_auth(&self) -> &Arc<RedgifsAuth> {
        &self.auth
    }

    /// The routing dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Token that cancels every in-flight and future request of this session
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the session
    pub fn cancel(&self) {
        info!("cancelling session");
        self.cancel.cancel();
    }

    /// Scrape a listing URL
    ///
    /// # Errors
    ///
    /// See [`ListingScraper::scrape`]
    pub async fn scrape(&self, base_url: &str, max_pages: u32) -> std::result::Result<Vec<PostEntry>, ScrapeError> {
        let entries = self.scraper.scrape(base_url, max_pages).await?;
        self.emit_event(Event::Scraped {
            url: base_url.to_string(),
            entries: entries.len(),
        });
        Ok(entries)
    }

    /// Scrape `/r/<name>.json`
    ///
    /// # Errors
    ///
    /// See [`ListingScraper::scrape`]
    pub async fn scrape_subreddit(&self, name: &str, max_pages: u32) -> std::result::Result<Vec<PostEntry>, ScrapeError> {
        self.scrape(&self.scraper.subreddit_url(name), max_pages).await
    }

    /// Scrape `/user/<name>.json`
    ///
    /// # Errors
    ///
    /// See [`ListingScraper::scrape`]
    pub async fn scrape_user(&self, name: &str, max_pages: u32) -> std::result::Result<Vec<PostEntry>, ScrapeError> {
        self.scrape(&self.scraper.user_url(name), max_pages).await
    }

    /// Resolve one post URL into `save_dir[/username]`
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`]
    pub async fn dispatch(
        &self,
        url: &str,
        save_dir: &Path,
        username: Option<&str>,
    ) -> std::result::Result<Outcome, ResolveError> {
        self.dispatcher.dispatch(url, save_dir, username).await
    }

    /// Dispatch every entry in order, logging and counting failures
    ///
    /// A failing entry never stops the batch. Cancellation does: the entries
    /// after it are not attempted.
    pub async fn process_entries(&self, entries: &[PostEntry], base_dir: &Path, layout: Layout) -> BatchReport {
        let mut report = BatchReport::default();
        let total = entries.len();

        for (index, entry) in entries.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining = total - index, "session cancelled, stopping batch");
                break;
            }

            let result = match layout {
                Layout::PerAuthor => {
                    let dir = crate::utils::destination_dir(base_dir, Some(&entry.author));
                    self.dispatch(&entry.url, &dir, None).await
                }
                Layout::Flat => self.dispatch(&entry.url, base_dir, None).await,
            };

            match result {
                Ok(Outcome::Downloaded(media)) => {
                    report.downloaded += 1;
                    self.emit_event(Event::Downloaded {
                        url: entry.url.clone(),
                        files: media.into_iter().map(|m| m.local_path).collect(),
                    });
                }
                Ok(Outcome::Recorded { sink }) => {
                    report.recorded += 1;
                    self.emit_event(Event::Recorded {
                        url: entry.url.clone(),
                        sink,
                    });
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(url = %entry.url, title = %entry.title, error = %e, "entry failed");
                    self.emit_event(Event::Failed {
                        url: entry.url.clone(),
                        error: e.to_string(),
                    });
                }
            }

            let done = index + 1;
            info!(
                progress = %format!("{:.1}%", done as f64 * 100.0 / total as f64),
                done,
                total,
                "batch progress"
            );
        }

        info!(
            downloaded = report.downloaded,
            recorded = report.recorded,
            failed = report.failed,
            "batch finished"
        );
        report
    }
}

fn validate_config(config: &Config) -> Result<()> {
    if config.http.user_agent.trim().is_empty() {
        return Err(Error::Config {
            message: "user agent must not be empty".into(),
            key: Some("http.user_agent".into()),
        });
    }
    if !(1..=100).contains(&config.post_process.jpeg_quality) {
        return Err(Error::Config {
            message: format!(
                "JPEG quality must be between 1 and 100, got {}",
                config.post_process.jpeg_quality
            ),
            key: Some("post_process.jpeg_quality".into()),
        });
    }
    let sink = &config.output.links_file_name;
    if sink.is_empty() || sink.contains(['/', '\\']) || sink == "." || sink == ".." {
        return Err(Error::Config {
            message: format!("links file name must be a plain file name, got {sink:?}"),
            key: Some("output.links_file_name".into()),
        });
    }
    Ok(())
}
