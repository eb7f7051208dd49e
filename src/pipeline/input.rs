//! Input resolution: turn a user-supplied path or URL into an owned file.
//!
//! Each input becomes a [`SourceFile`] holding the whole file in memory. The
//! size ceiling is checked before the body is read whenever the size is known
//! up front (file metadata, `Content-Length`), so an oversized file is never
//! buffered.

use crate::config::ExtractionConfig;
use crate::error::IngestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_UNKNOWN: &str = "application/octet-stream";

/// Media types the extraction prompt is written for. Advisory: other types
/// are ingested but the model may not understand them.
pub const ACCEPTED_MEDIA_TYPES: [&str; 3] = [MIME_PNG, MIME_JPEG, MIME_PDF];

/// A selected file, read into memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name (file name without directories).
    pub name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    /// Wrap in-memory bytes, sniffing the media type from content and name.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        let media_type = sniff_media_type(&bytes, &name).to_string();
        Self {
            name,
            media_type,
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_accepted_type(&self) -> bool {
        ACCEPTED_MEDIA_TYPES.contains(&self.media_type.as_str())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve one input to a [`SourceFile`].
///
/// URLs are downloaded; anything else is treated as a local path.
pub async fn resolve_source(
    input: &str,
    config: &ExtractionConfig,
) -> Result<SourceFile, IngestError> {
    let source = if is_url(input) {
        download_url(input, config).await?
    } else {
        read_local(Path::new(input), config.max_file_bytes).await?
    };

    if !source.is_accepted_type() {
        debug!(
            "'{}' has media type {}; extraction may not understand it",
            source.name, source.media_type
        );
    }
    Ok(source)
}

/// Reject sizes at or over the ceiling.
pub fn check_size(name: &str, size: u64, limit: u64) -> Result<(), IngestError> {
    if size >= limit {
        return Err(IngestError::TooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

async fn read_local(path: &Path, limit: u64) -> Result<SourceFile, IngestError> {
    let map_io = |e: std::io::Error, path: PathBuf| match e.kind() {
        std::io::ErrorKind::NotFound => IngestError::NotFound { path },
        std::io::ErrorKind::PermissionDenied => IngestError::PermissionDenied { path },
        _ => IngestError::ReadFailed { path, source: e },
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| map_io(e, path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(IngestError::ReadFailed {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    check_size(&name, meta.len(), limit)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| map_io(e, path.to_path_buf()))?;
    // The file may have grown between stat and read.
    check_size(&name, bytes.len() as u64, limit)?;

    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceFile::from_bytes(name, bytes))
}

async fn download_url(url: &str, config: &ExtractionConfig) -> Result<SourceFile, IngestError> {
    info!("Downloading: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IngestError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            IngestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            IngestError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(IngestError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    if let Some(len) = response.content_length() {
        check_size(&name, len, config.max_file_bytes)?;
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| ACCEPTED_MEDIA_TYPES.contains(&v.as_str()));

    let bytes = response.bytes().await.map_err(map_err)?;
    check_size(&name, bytes.len() as u64, config.max_file_bytes)?;

    let mut source = SourceFile::from_bytes(name, bytes.to_vec());
    if let Some(media_type) = declared {
        source.media_type = media_type;
    }
    info!("Downloaded '{}' ({} bytes)", source.name, source.size());
    Ok(source)
}

/// Last non-empty path segment of the URL, or `downloaded`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).last() {
                return last.to_string();
            }
        }
    }
    "downloaded".to_string()
}

/// Guess the media type from magic bytes, then from the file extension.
pub fn sniff_media_type(bytes: &[u8], name: &str) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        return MIME_PDF;
    }
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }

    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => MIME_PNG,
        Some("jpg") | Some("jpeg") => MIME_JPEG,
        Some("pdf") => MIME_PDF,
        _ => MIME_UNKNOWN,
    }
}
