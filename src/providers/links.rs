//! Sink for links no resolver handles

use crate::utils::ensure_destination;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Append-only text file collecting links no resolver handles
#[derive(Clone, Debug)]
pub struct LinkSink {
    file_name: String,
}

impl LinkSink {
    /// Sink writing to `<dir>/<file_name>`
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Append `url` as one line to the sink in `save_dir[/username]`
    ///
    /// Returns the sink path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be written
    pub async fn record(
        &self,
        url: &str,
        save_dir: &Path,
        username: Option<&str>,
    ) -> std::io::Result<PathBuf> {
        let dir = ensure_destination(save_dir, username).await?;
        let sink = dir.join(&self.file_name);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sink)
            .await?;
        file.write_all(format!("{url}\n").as_bytes()).await?;
        file.flush().await?;

        debug!(url = %url, sink = %sink.display(), "recorded unsupported link");
        Ok(sink)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn appends_one_line_per_link() {
        let dir = TempDir::new().unwrap();
        let sink = LinkSink::new("links.txt");

        let first = sink
            .record("https://youtube.com/watch?v=1", dir.path(), Some("dave"))
            .await
            .unwrap();
        let second = sink
            .record("https://example.com/article", dir.path(), Some("dave"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("dave").join("links.txt"));
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            "https://youtube.com/watch?v=1\nhttps://example.com/article\n"
        );
    }
}
