//! Downloaded-content validation
//!
//! Providers sometimes answer a media URL with `200 OK` and an HTML error page,
//! or with an empty body. The validator reads the leading bytes of a finished
//! download and decides whether it is really media:
//!
//! 1. missing or zero-length files are rejected
//! 2. an HTML/XML prologue (`<!DOCTYPE`, `<html`, `<xml`, case-insensitive, after
//!    optional whitespace) is rejected, whatever the declared content type
//! 3. a known binary signature (JPEG, PNG, GIF, WebP, MP4) is accepted
//! 4. otherwise the declared `Content-Type` decides: `image/*` and `video/*` pass
//!
//! The signature check comes first because some CDNs omit or mis-set content types.

use regex::bytes::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::io::AsyncReadExt;

/// How many leading bytes are inspected
const SNIFF_LEN: usize = 512;

/// PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Media formats recognized by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSignature {
    /// `FF D8 FF`
    Jpeg,
    /// `89 50 4E 47`
    Png,
    /// `GIF8`
    Gif,
    /// `RIFF....WEBP`
    WebP,
    /// `ftyp` box at offset 4
    Mp4,
}

/// Identify a media format from leading bytes
#[must_use]
pub fn sniff(head: &[u8]) -> Option<MediaSignature> {
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(MediaSignature::Jpeg)
    } else if head.starts_with(&PNG_SIGNATURE[..4]) {
        Some(MediaSignature::Png)
    } else if head.starts_with(b"GIF8") {
        Some(MediaSignature::Gif)
    } else if head.starts_with(b"RIFF") && head.get(8..12) == Some(b"WEBP".as_slice()) {
        Some(MediaSignature::WebP)
    } else if head.get(4..8) == Some(b"ftyp".as_slice()) {
        Some(MediaSignature::Mp4)
    } else {
        None
    }
}

/// Whether leading bytes look like an HTML or XML document
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn looks_like_markup(head: &[u8]) -> bool {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP
        .get_or_init(|| Regex::new(r"(?i)\A\s*<(!DOCTYPE|html|xml)").unwrap())
        .is_match(head)
}

/// Decide from leading bytes and the declared content type
#[must_use]
pub fn validate_bytes(head: &[u8], declared_content_type: Option<&str>) -> bool {
    if head.is_empty() || looks_like_markup(head) {
        return false;
    }
    if sniff(head).is_some() {
        return true;
    }
    declared_content_type.is_some_and(|ct| {
        let ct = ct.trim().to_ascii_lowercase();
        ct.starts_with("image/") || ct.starts_with("video/")
    })
}

/// Validate a downloaded file
///
/// Returns `false` when the file is missing, empty, markup, or neither a known
/// signature nor declared as image/video.
pub async fn validate(path: &Path, declared_content_type: Option<&str>) -> bool {
    match read_head(path).await {
        Ok(head) => {
            let ok = validate_bytes(&head, declared_content_type);
            if !ok {
                tracing::debug!(
                    path = %path.display(),
                    content_type = declared_content_type.unwrap_or(""),
                    "content rejected"
                );
            }
            ok
        }
        Err(_) => false,
    }
}

/// Whether the file starts with the full 8-byte PNG signature
pub async fn is_png(path: &Path) -> bool {
    read_head(path)
        .await
        .is_ok_and(|head| head.starts_with(&PNG_SIGNATURE))
}

async fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}
