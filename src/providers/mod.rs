//! Provider resolvers
//!
//! A resolver turns a post URL from one hosting provider into zero or more media
//! files on disk. All of them share [`MediaFetcher`] for the last mile:
//! download through the rate-limited transport, validate the bytes, apply
//! post-processing.

use crate::config::{OutputConfig, PostProcessConfig};
use crate::error::ResolveError;
use crate::postprocess;
use crate::transport::Transport;
use crate::types::ResolvedMedia;
use crate::utils::get_unique_path;
use crate::validator;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Direct-host (`i.redd.it`) resolver
pub mod direct;
/// Imgur resolver (direct, album, single post, gifv)
pub mod imgur;
/// Unsupported-link sink
pub mod links;
/// RedGifs resolver and bearer token state
pub mod redgifs;

pub use direct::DirectResolver;
pub use imgur::{ImgurLink, ImgurResolver};
pub use links::LinkSink;
pub use redgifs::{RedgifsAuth, RedgifsResolver};

/// Resolve a provider URL into media files
///
/// Implementations return at least one [`ResolvedMedia`] on success, or
/// [`ResolveError::NoMedia`] when the provider had nothing to offer. Every other
/// error variant means something actually went wrong.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &'static str;

    /// Resolve `url` into files under `save_dir[/username]`
    async fn resolve(
        &self,
        url: &str,
        save_dir: &Path,
        username: Option<&str>,
    ) -> Result<Vec<ResolvedMedia>, ResolveError>;
}

/// Whether a download gets the PNG normalization step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostStep {
    /// Keep bytes as downloaded
    Keep,
    /// Apply [`postprocess::apply`] (PNG to JPEG when enabled)
    Normalize,
}

/// Download, validate and post-process one media URL
pub struct MediaFetcher {
    transport: Arc<Transport>,
    output: OutputConfig,
    post_process: PostProcessConfig,
}

impl MediaFetcher {
    /// Create a fetcher on top of a shared transport
    pub fn new(
        transport: Arc<Transport>,
        output: OutputConfig,
        post_process: PostProcessConfig,
    ) -> Self {
        Self {
            transport,
            output,
            post_process,
        }
    }

    /// The shared transport, for metadata calls
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Name of the unsupported-links sink file
    pub fn links_file_name(&self) -> &str {
        &self.output.links_file_name
    }

    /// Save `media_url` as `dir/file_name`
    ///
    /// The file is removed again if validation rejects it, so a failed call
    /// never leaves an artifact behind. A validated file that cannot be
    /// post-processed is kept and returned as downloaded.
    ///
    /// # Errors
    ///
    /// Fails on collisions under `Skip`, transport failures, or rejected content
    pub async fn download(
        &self,
        media_url: &str,
        dir: &Path,
        file_name: &str,
        step: PostStep,
    ) -> Result<ResolvedMedia, ResolveError> {
        let dest = get_unique_path(&dir.join(file_name), self.output.file_collision)?;
        let downloaded = self.transport.fetch_binary(media_url, &dest).await?;

        if !validator::validate(&downloaded.path, downloaded.content_type.as_deref()).await {
            if let Err(e) = tokio::fs::remove_file(&downloaded.path).await {
                warn!(path = %downloaded.path.display(), error = %e, "failed to remove rejected file");
            }
            return Err(ResolveError::Rejected {
                url: media_url.to_string(),
            });
        }

        let local_path = match step {
            PostStep::Normalize => {
                let processed =
                    postprocess::apply(&downloaded.path, &self.post_process, self.output.file_collision).await;
                match processed {
                    Ok(path) => path,
                    // the download itself is valid, keep it as served
                    Err(e) => {
                        warn!(path = %downloaded.path.display(), error = %e, "post-processing failed, keeping original");
                        downloaded.path
                    }
                }
            }
            PostStep::Keep => downloaded.path,
        };

        Ok(ResolvedMedia {
            source_url: media_url.to_string(),
            local_path,
        })
    }
}


// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn html_page_served_as_image_is_rejected_and_removed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fake.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_string("<!DOCTYPE html><html>removed</html>"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = fetcher()
            .download(
                &format!("{}/fake.png", server.uri()),
                dir.path(),
                "fake.png",
                PostStep::Normalize,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Rejected { .. }));
        assert!(!dir.path().join("fake.png").exists());
    }

    #[tokio::test]
    async fn png_download_is_normalized_to_jpeg() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pic.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let media = fetcher()
            .download(
                &format!("{}/pic.png", server.uri()),
                dir.path(),
                "pic.png",
                PostStep::Normalize,
            )
            .await
            .unwrap();

        assert_eq!(media.local_path, dir.path().join("pic.jpg"));
        assert!(!dir.path().join("pic.png").exists());
        let head = std::fs::read(&media.local_path).unwrap();
        assert_eq!(&head[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn keep_step_leaves_png_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let media = fetcher()
            .download(
                &format!("{}/pic.png", server.uri()),
                dir.path(),
                "pic.png",
                PostStep::Keep,
            )
            .await
            .unwrap();

        assert_eq!(media.local_path, dir.path().join("pic.png"));
    }

    #[tokio::test]
    async fn undecodable_png_is_kept_as_downloaded() {
        let server = MockServer::start().await;
        let mut body = crate::validator::PNG_SIGNATURE.to_vec();
        body.extend_from_slice(b"truncated-garbage");
        Mock::given(method("GET"))
            .and(path("/broken.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "image/png"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let media = fetcher()
            .download(
                &format!("{}/broken.png", server.uri()),
                dir.path(),
                "broken.png",
                PostStep::Normalize,
            )
            .await
            .unwrap();

        assert_eq!(media.local_path, dir.path().join("broken.png"));
        assert_eq!(std::fs::read(&media.local_path).unwrap(), body);
        assert!(!dir.path().join("broken.jpg").exists());
    }

    #[tokio::test]
    async fn png_and_jpg_of_the_same_name_both_survive_under_rename() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JPEG_BYTES.to_vec(), "image/jpeg"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(png_bytes(), "image/png"))
            .mount(&server)
            .await;

        let fetcher = MediaFetcher::new(
            transport(),
            OutputConfig {
                file_collision: crate::config::FileCollisionAction::Rename,
                ..Default::default()
            },
            PostProcessConfig::default(),
        );
        let dir = TempDir::new().unwrap();

        let jpg = fetcher
            .download(&format!("{}/x.jpg", server.uri()), dir.path(), "x.jpg", PostStep::Normalize)
            .await
            .unwrap();
        let png = fetcher
            .download(&format!("{}/x.png", server.uri()), dir.path(), "x.png", PostStep::Normalize)
            .await
            .unwrap();

        assert_eq!(jpg.local_path, dir.path().join("x.jpg"));
        assert_eq!(png.local_path, dir.path().join("x (1).jpg"));
        assert_eq!(std::fs::read(&jpg.local_path).unwrap(), JPEG_BYTES);
        assert!(!dir.path().join("x.png").exists());
    }
}
