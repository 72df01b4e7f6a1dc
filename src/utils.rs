//! Utility functions for file naming and destination paths

use crate::config::FileCollisionAction;
use crate::error::ResolveError;
use std::path::{Path, PathBuf};

/// Maximum length of a generated file name, in bytes
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Fallback name when nothing usable survives cleaning
const FALLBACK_FILE_NAME: &str = "download";

/// Reduce a name to `[A-Za-z0-9.]`, without leading dots, at most
/// [`MAX_FILE_NAME_LEN`] bytes
///
/// Leading dots are dropped so traversal remnants and hidden-file names cannot
/// survive. When truncation is needed, a short extension is kept.
///
/// # Examples
///
/// ```
/// use reddit_media_dl::utils::clean_file_name;
///
/// assert_eq!(clean_file_name("../../etc/passwd"), "etcpasswd");
/// assert_eq!(clean_file_name("my photo (1).jpg"), "myphoto1.jpg");
/// assert_eq!(clean_file_name(""), "");
/// ```
#[must_use]
pub fn clean_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.len() <= MAX_FILE_NAME_LEN {
        return cleaned.to_string();
    }

    // Output is pure ASCII, so byte slicing is on char boundaries
    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot <= 16 => {
            let ext = &cleaned[dot..];
            let stem = &cleaned[..MAX_FILE_NAME_LEN - ext.len()];
            format!("{stem}{ext}")
        }
        _ => cleaned[..MAX_FILE_NAME_LEN].to_string(),
    }
}

/// Derive a cleaned file name from the last path segment of a URL
///
/// Query string and fragment are ignored. Falls back to `"download"` if the
/// segment is empty or cleans down to nothing.
///
/// # Examples
///
/// ```
/// use reddit_media_dl::utils::file_name_from_url;
///
/// assert_eq!(file_name_from_url("https://i.redd.it/abc123.jpg?width=640"), "abc123.jpg");
/// assert_eq!(file_name_from_url("https://i.imgur.com/"), "download");
/// ```
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next().unwrap_or("");
    let cleaned = clean_file_name(segment);

    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

/// Compose `save_dir[/username]`
///
/// The username is reduced to `[A-Za-z0-9_-]`; an empty result means no
/// subdirectory.
#[must_use]
pub fn destination_dir(save_dir: &Path, username: Option<&str>) -> PathBuf {
    let sub: Option<String> = username
        .map(|name| {
            name.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                .collect::<String>()
        })
        .filter(|name| !name.is_empty());

    match sub {
        Some(name) => save_dir.join(name),
        None => save_dir.to_path_buf(),
    }
}

/// Create `save_dir[/username]` recursively (mode 0755 on unix) and return it
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created
pub async fn ensure_destination(save_dir: &Path, username: Option<&str>) -> std::io::Result<PathBuf> {
    let dir = destination_dir(save_dir, username);

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(&dir).await?;

    Ok(dir)
}

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For `Rename`, a ` (n)` suffix is inserted before the extension. For `Skip`,
/// an existing file is an error. For `Overwrite`, the path is returned unchanged.
///
/// # Examples
///
/// ```
/// use reddit_media_dl::utils::get_unique_path;
/// use reddit_media_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/does-not-exist-abc.jpg");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(unique, path);
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf, ResolveError> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(ResolveError::Exists {
                    path: path.to_path_buf(),
                });
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(FALLBACK_FILE_NAME);
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().unwrap_or_else(|| Path::new("."));

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(ResolveError::Exists {
                path: path.to_path_buf(),
            })
        }
    }
}
