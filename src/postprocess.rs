//! Post-download processing
//!
//! Currently a single step: PNG downloads are re-encoded as JPEG and the PNG is
//! deleted. This normalizes storage format at the cost of fidelity (JPEG is
//! lossy and drops alpha), so it is controlled by
//! [`PostProcessConfig::transcode_png`].

use crate::config::{FileCollisionAction, PostProcessConfig};
use crate::error::ResolveError;
use crate::utils::get_unique_path;
use crate::validator;
use image::codecs::jpeg::JpegEncoder;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the JPEG for a given PNG path is written
///
/// `foo.png` becomes `foo.jpg`. A PNG that was served under a `.jpg` name
/// becomes `foo.jpeg`, so the source is never overwritten before decoding.
#[must_use]
pub fn jpeg_path_for(png: &Path) -> PathBuf {
    let is_jpg_named = png
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg"));

    if is_jpg_named {
        png.with_extension("jpeg")
    } else {
        png.with_extension("jpg")
    }
}

/// Re-encode a PNG file as JPEG at `quality` and delete the source
///
/// Returns the path of the JPEG.
///
/// # Errors
///
/// Returns [`ResolveError::Transcode`] if decoding or encoding fails, or
/// [`ResolveError::Exists`] if the JPEG name is taken under
/// [`FileCollisionAction::Skip`]. The source PNG is left in place in both cases.
pub async fn transcode_png_to_jpeg(
    png: &Path,
    quality: u8,
    collision: FileCollisionAction,
) -> Result<PathBuf, ResolveError> {
    let source = png.to_path_buf();
    let target = get_unique_path(&jpeg_path_for(png), collision)?;
    let quality = quality.clamp(1, 100);

    let encode_target = target.clone();
    let encode_source = source.clone();
    tokio::task::spawn_blocking(move || encode(&encode_source, &encode_target, quality))
        .await
        .map_err(|e| ResolveError::Transcode {
            path: source.clone(),
            reason: e.to_string(),
        })??;

    tokio::fs::remove_file(&source).await?;
    info!(from = %source.display(), to = %target.display(), "transcoded PNG to JPEG");
    Ok(target)
}

fn encode(source: &Path, target: &Path, quality: u8) -> Result<(), ResolveError> {
    let fail = |reason: String| ResolveError::Transcode {
        path: source.to_path_buf(),
        reason,
    };

    let image = image::io::Reader::open(source)
        .map_err(|e| fail(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| fail(e.to_string()))?
        .decode()
        .map_err(|e| fail(e.to_string()))?;

    // JPEG has no alpha channel
    let rgb = image.to_rgb8();

    let file = std::fs::File::create(target)?;
    let mut writer = BufWriter::new(file);
    let encoded = JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(&rgb)
        .map_err(|e| fail(e.to_string()));
    let result = encoded.and_then(|()| writer.flush().map_err(ResolveError::from));

    if result.is_err() {
        drop(writer);
        let _ = std::fs::remove_file(target);
    }
    result
}

/// Apply the configured post-processing to a validated download
///
/// Returns the final path of the file, which differs from `path` when the file
/// was transcoded. The JPEG name is subject to `collision` like any download.
///
/// # Errors
///
/// Propagates transcode failures
pub async fn apply(
    path: &Path,
    config: &PostProcessConfig,
    collision: FileCollisionAction,
) -> Result<PathBuf, ResolveError> {
    if config.transcode_png && validator::is_png(path).await {
        return transcode_png_to_jpeg(path, config.jpeg_quality, collision).await;
    }
    debug!(path = %path.display(), "no post-processing needed");
    Ok(path.to_path_buf())
}
