//! Direct-host downloads (`i.redd.it`)

use super::{MediaFetcher, MediaResolver, PostStep};
use crate::error::ResolveError;
use crate::types::ResolvedMedia;
use crate::utils::{ensure_destination, file_name_from_url};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Single-file download from a host that serves media at the post URL itself
pub struct DirectResolver {
    fetcher: Arc<MediaFetcher>,
}

impl DirectResolver {
    /// Create a direct resolver
    pub fn new(fetcher: Arc<MediaFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl MediaResolver for DirectResolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn resolve(
        &self,
        url: &str,
        save_dir: &Path,
        username: Option<&str>,
    ) -> Result<Vec<ResolvedMedia>, ResolveError> {
        let dir = ensure_destination(save_dir, username).await?;
        let media = self
            .fetcher
            .download(url, &dir, &file_name_from_url(url), PostStep::Normalize)
            .await?;
        Ok(vec![media])
    }
}
