//! Core types and events

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One downloadable item discovered in a listing
///
/// Gallery posts expand into several entries that share `title`, `author` and
/// `id` but carry distinct `url`s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    /// Link target of the post (or of one gallery item)
    pub url: String,
    /// Post title
    pub title: String,
    /// Author username
    pub author: String,
    /// Post ID (without the `t3_` kind prefix), may be empty
    pub id: String,
}

/// A media file that was downloaded, validated and post-processed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    /// The media URL the bytes came from
    pub source_url: String,
    /// Final location on disk
    pub local_path: PathBuf,
}

/// What happened to a dispatched entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// One or more media files were saved
    Downloaded(Vec<ResolvedMedia>),
    /// The link is not supported and was appended to the links sink
    Recorded {
        /// The sink file the link was appended to
        sink: PathBuf,
    },
}

/// Which resolver handles a URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Imgur `.gifv` link, fetched as MP4
    ImgurGifv,
    /// Any other Imgur link (direct, album, single post)
    Imgur,
    /// `i.redd.it` direct image
    RedditDirect,
    /// RedGifs or gifdeliverynetwork watch page
    Redgifs,
    /// Unsupported, appended to the links sink
    Link,
}

/// How downloads are laid out below the base directory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// `base/<author>/<file>`, one folder per author (default)
    #[default]
    PerAuthor,
    /// `base/<file>`, everything in one folder
    Flat,
}

/// Counters returned by the batch driver
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Entries for which at least one file was saved
    pub downloaded: usize,
    /// Entries appended to a links sink
    pub recorded: usize,
    /// Entries that failed
    pub failed: usize,
}

impl BatchReport {
    /// Total number of processed entries
    pub fn total(&self) -> usize {
        self.downloaded + self.recorded + self.failed
    }
}

/// Progress events emitted by a [`Session`](crate::Session)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A listing was scraped
    Scraped {
        /// The listing base URL
        url: String,
        /// Number of entries produced
        entries: usize,
    },
    /// An entry was resolved into files
    Downloaded {
        /// The post URL
        url: String,
        /// Saved files
        files: Vec<PathBuf>,
    },
    /// An unsupported link was recorded
    Recorded {
        /// The post URL
        url: String,
        /// The sink file
        sink: PathBuf,
    },
    /// An entry failed
    Failed {
        /// The post URL
        url: String,
        /// Error message
        error: String,
    },
}
