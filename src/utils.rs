//! Utility functions for hashing, file naming and file operations

use sha2::{Digest, Sha256};
use std::path::Path;

/// Longest file name produced by [`sanitize_filename`], in characters
const MAX_FILENAME_CHARS: usize = 120;

/// Lowercase hex SHA-256 of a string
///
/// Used for title hashes (bundle directories and names), cache keys,
/// thumbnail names and node ids.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Replace characters that are unsafe in file names
///
/// Keeps Unicode letters and digits plus `.`, `-` and `_`; everything else
/// becomes `_`. Leading dots are stripped so names never become hidden files,
/// and the result is capped in length while keeping the extension.
///
/// # Examples
///
/// ```
/// use kb_harvest::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
/// assert_eq!(sanitize_filename("../etc/passwd"), "_etc_passwd");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.chars().count() <= MAX_FILENAME_CHARS {
        return cleaned;
    }

    // Keep the extension, shorten the stem
    let path = Path::new(&cleaned);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().count() < 16)
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let keep = MAX_FILENAME_CHARS.saturating_sub(ext.chars().count());
    let stem: String = cleaned.chars().take(keep).collect();
    format!("{stem}{ext}")
}

/// Derive a local file name from the last path segment of a URL
///
/// The segment is percent-decoded and sanitized. Returns `None` when the URL
/// cannot be parsed or its path has no usable final segment.
#[must_use]
pub fn name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let name = sanitize_filename(&decoded);
    if name.is_empty() || name.chars().all(|c| c == '_') {
        None
    } else {
        Some(name)
    }
}

/// Lowercase extension of the last path segment of a URL, if any
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let name = name_from_url(url)?;
    Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
}

/// Extract a file name from a Content-Disposition header value
///
/// Tries the RFC 5987 `filename*=` form first, then `filename=`, and falls
/// back to the URL path. The extension is kept. The result is sanitized.
///
/// # Arguments
///
/// * `header` - Raw Content-Disposition value, if the response had one
/// * `url` - The requested URL (used as fallback)
///
/// # Returns
///
/// Returns the extracted file name or "download" as last resort
pub fn filename_from_content_disposition(header: Option<&str>, url: &str) -> String {
    if let Some(value) = header {
        // Format: attachment; filename="file.pdf" or filename*=UTF-8''file.pdf
        let mut plain = None;
        for part in value.split(';') {
            let part = part.trim();
            if let Some(encoded) = part.strip_prefix("filename*=") {
                // Format is: charset'lang'encoded-filename
                if let Some(idx) = encoded.rfind('\'')
                    && let Ok(decoded) = urlencoding::decode(encoded[idx + 1..].trim_matches('"'))
                {
                    let name = sanitize_filename(&decoded);
                    if !name.is_empty() {
                        return name;
                    }
                }
            } else if let Some(raw) = part.strip_prefix("filename=") {
                plain = Some(raw.trim_matches('"').to_string());
            }
        }
        if let Some(raw) = plain {
            let name = sanitize_filename(&raw);
            if !name.is_empty() {
                return name;
            }
        }
    }

    // Fall back to extracting from URL path
    name_from_url(url).unwrap_or_else(|| "download".to_string())
}

/// Truncate a string to at most `max_chars` characters
#[must_use]
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

/// Returns true if `path` is an existing regular file with non-zero length
pub async fn is_non_empty_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Write a file through a temporary sibling and rename it into place
///
/// Readers never observe a partially written file at `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
