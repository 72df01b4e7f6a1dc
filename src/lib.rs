//! # reddit-media-dl
//!
//! Resolve links found in Reddit listings into downloaded, verified media files.
//!
//! ## Design Philosophy
//!
//! reddit-media-dl is designed to be:
//! - **Polite** - every outbound request passes one shared minimum-interval gate
//! - **Honest about failure** - "found nothing" and "something broke" are distinct results
//! - **Library-first** - no CLI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to events, no polling required
//!
//! ## Pipeline
//!
//! The [`ListingScraper`] walks a listing and yields [`PostEntry`] values. The
//! [`Dispatcher`] classifies each entry's URL by host and hands it to a
//! provider resolver (Imgur, RedGifs, `i.redd.it`) or appends it to a links
//! file. Resolvers fetch metadata and media through the rate-limited
//! [`Transport`]; every download is checked by the [`validator`] and may be
//! normalized by [`postprocess`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use reddit_media_dl::{Config, Layout, Session};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(Config::default())?;
//!
//!     let mut events = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let entries = session.scrape_subreddit("pics", 1).await?;
//!     let report = session
//!         .process_entries(&entries, Path::new("downloads"), Layout::PerAuthor)
//!         .await;
//!     println!("{} saved, {} failed", report.downloaded, report.failed);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Host routing
pub mod dispatcher;
/// Error types
pub mod error;
/// Listing pagination
pub mod listing;
/// Post-download processing
pub mod postprocess;
/// Provider resolvers
pub mod providers;
/// Minimum-interval request gate
pub mod rate_limiter;
/// Retry logic with exponential backoff
pub mod retry;
/// Session state and batch driver
pub mod session;
/// Rate-limited HTTP transport
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Downloaded-content validation
pub mod validator;

pub use config::Config;
pub use dispatcher::{Dispatcher, classify};
pub use error::{Error, FetchError, ResolveError, Result, ScrapeError};
pub use listing::{ListingScraper, normalize_page_count};
pub use providers::MediaResolver;
pub use rate_limiter::{IntervalLimiter, RequestGate};
pub use session::Session;
pub use transport::Transport;
pub use types::{BatchReport, Event, Layout, Outcome, PostEntry, ResolvedMedia, Route};
