//! Input resolution: turn user input into a [`TransformationRequest`].
//!
//! ## Temporary uploads
//!
//! An upload the pipeline receives (an HTTP multipart file, a downloaded URL,
//! bytes handed over by a caller) is owned by an [`UploadedFile`] whose
//! `Drop` removes it. Because the request owns the file, every exit path of
//! [`crate::Adapter::adapt`] (rejection, model failure, panic unwinding,
//! success) releases it without explicit cleanup code. Files the user
//! pointed at on their own disk are never deleted.

use crate::error::AdaptError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// One transformation request: what to adapt and how.
#[derive(Debug)]
pub struct TransformationRequest {
    pub source: InputSource,
    /// Profile key; unknown or absent keys resolve to the default profile.
    pub profile: Option<String>,
    /// Free-form note on where the content came from (page title, URL…).
    pub origin: Option<String>,
    /// URLs of images that accompany the content. Filtered before use; see
    /// [`crate::pipeline::prompt::clamp_image_refs`].
    pub image_refs: Vec<String>,
}

impl TransformationRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            source: InputSource::Text(text.into()),
            profile: None,
            origin: None,
            image_refs: Vec::new(),
        }
    }

    pub fn file(file: UploadedFile) -> Self {
        Self {
            source: InputSource::File(file),
            profile: None,
            origin: None,
            image_refs: Vec::new(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_image_refs<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_refs.extend(urls.into_iter().map(Into::into));
        self
    }
}

/// Raw text or an uploaded file.
#[derive(Debug)]
pub enum InputSource {
    Text(String),
    File(UploadedFile),
}

/// What the cleanup guard owns.
#[derive(Debug)]
enum Cleanup {
    /// User-owned file; never deleted.
    Keep,
    /// Single temporary file, removed on drop.
    RemoveFile,
    /// File lives inside a temp directory removed on drop.
    Dir(#[allow(dead_code)] TempDir),
}

/// A file handed to the pipeline, with its declared media type.
#[derive(Debug)]
pub struct UploadedFile {
    path: PathBuf,
    file_name: String,
    declared_media_type: Option<String>,
    cleanup: Cleanup,
}

impl UploadedFile {
    /// A file the user owns. It is read but never deleted.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            file_name: file_name_of(&path),
            path,
            declared_media_type: None,
            cleanup: Cleanup::Keep,
        }
    }

    /// A temporary upload that the pipeline must delete when done.
    pub fn temporary(path: impl Into<PathBuf>, declared_media_type: Option<String>) -> Self {
        let path = path.into();
        Self {
            file_name: file_name_of(&path),
            path,
            declared_media_type,
            cleanup: Cleanup::RemoveFile,
        }
    }

    /// Write `bytes` to a fresh temp directory and own it.
    pub fn from_bytes(
        bytes: &[u8],
        file_name: &str,
        declared_media_type: Option<String>,
    ) -> Result<Self, AdaptError> {
        let temp_dir = TempDir::new().map_err(|e| AdaptError::Internal(format!("tempdir: {e}")))?;
        let safe_name = sanitize_file_name(file_name);
        let path = temp_dir.path().join(&safe_name);
        std::fs::write(&path, bytes)
            .map_err(|e| AdaptError::Internal(format!("Failed to write temp file: {e}")))?;
        Ok(Self {
            path,
            file_name: safe_name,
            declared_media_type,
            cleanup: Cleanup::Dir(temp_dir),
        })
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.declared_media_type = Some(media_type.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn declared_media_type(&self) -> Option<&str> {
        self.declared_media_type.as_deref()
    }

    /// True when the pipeline is responsible for deleting this file.
    pub fn is_temporary(&self) -> bool {
        !matches!(self.cleanup, Cleanup::Keep)
    }

    /// Classify the file from its declared type, magic bytes, then extension.
    pub fn media_kind(&self) -> Result<MediaKind, AdaptError> {
        let mut head = [0u8; 16];
        let n = match std::fs::File::open(&self.path) {
            Ok(mut f) => f.read(&mut head).map_err(|e| AdaptError::ExtractionFailed {
                detail: format!("cannot read '{}': {e}", self.file_name),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AdaptError::InputNotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                return Err(AdaptError::ExtractionFailed {
                    detail: format!("cannot open '{}': {e}", self.file_name),
                })
            }
        };
        Ok(MediaKind::detect(
            self.declared_media_type.as_deref(),
            &head[..n],
            &self.path,
        ))
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        if let Cleanup::RemoveFile = self.cleanup {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed temporary upload {}", self.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temporary upload {}: {}", self.path.display(), e),
            }
        }
        // `Cleanup::Dir` removes itself when the TempDir drops.
    }
}

/// Coarse content class that selects the extraction path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Text,
    Image,
    Pdf,
    /// Carries the best-known media type for the error message.
    Unsupported(String),
}

const GENERIC_TYPES: [&str; 2] = ["application/octet-stream", "binary/octet-stream"];

impl MediaKind {
    /// Classify content. A specific declared type wins; otherwise magic
    /// bytes, then the file extension decide.
    pub fn detect(declared: Option<&str>, head: &[u8], path: &Path) -> MediaKind {
        if let Some(declared) = declared.map(normalise_media_type) {
            if !declared.is_empty() && !GENERIC_TYPES.contains(&declared.as_str()) {
                return Self::from_media_type(&declared);
            }
        }

        if head.starts_with(b"%PDF") {
            return MediaKind::Pdf;
        }
        if image::guess_format(head).is_ok() {
            return MediaKind::Image;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self::from_media_type(media_type_for_extension(&ext))
    }

    fn from_media_type(media_type: &str) -> MediaKind {
        if media_type == "application/pdf" {
            MediaKind::Pdf
        } else if media_type.starts_with("image/") {
            MediaKind::Image
        } else if media_type.starts_with("text/") {
            MediaKind::Text
        } else {
            MediaKind::Unsupported(media_type.to_string())
        }
    }
}

/// Lower-case and drop parameters: `Text/Plain; charset=utf-8` → `text/plain`.
fn normalise_media_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

fn media_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "text" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

/// Keep the final path component and replace anything odd, so a hostile
/// upload name cannot escape the temp directory.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL into an [`UploadedFile`].
///
/// URLs are downloaded into a temp directory owned by the returned value.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<UploadedFile, AdaptError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<UploadedFile, AdaptError> {
    let path = PathBuf::from(path_str);
    if !path.is_file() {
        return Err(AdaptError::InputNotFound { path });
    }
    debug!("Resolved local input: {}", path.display());
    Ok(UploadedFile::local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, AdaptError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AdaptError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| AdaptError::DownloadFailed {
        url: url.to_string(),
        reason: if e.is_timeout() {
            format!("timed out after {timeout_secs}s")
        } else {
            e.to_string()
        },
    })?;

    if !response.status().is_success() {
        return Err(AdaptError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = extract_filename(url);

    let bytes = response.bytes().await.map_err(|e| AdaptError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let file = UploadedFile::from_bytes(&bytes, &filename, declared)?;
    info!("Downloaded {} bytes to: {}", bytes.len(), file.path().display());
    Ok(file)
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "download".to_string()
}
