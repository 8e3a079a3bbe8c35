//! Content extraction: normalise a request's source into [`ExtractedContent`].
//!
//! | Source        | Result                                   | Title prefix                     |
//! |---------------|------------------------------------------|----------------------------------|
//! | raw text      | trimmed, clamped text                    | `Accessible Text Input`          |
//! | `text/*` file | UTF-8 (lossy) text, same rules           | `Accessible Text File Content:`  |
//! | image file    | base64 [`InlineImage`], no text          | `Accessible Image Content:`      |
//! | PDF file      | first pages' text joined by blank lines  | `Accessible PDF Content:`        |
//!
//! PDF text comes from an injected [`PdfTextReader`] and is read on the
//! blocking pool.

use crate::error::AdaptError;
use crate::pipeline::encode::{encode_image, InlineImage};
use crate::pipeline::input::{InputSource, MediaKind, UploadedFile};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Normalised content ready for prompt construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    Text { text: String, title: String },
    ImageWithInstruction { image: InlineImage, title: String },
}

impl ExtractedContent {
    pub fn title(&self) -> &str {
        match self {
            ExtractedContent::Text { title, .. } => title,
            ExtractedContent::ImageWithInstruction { title, .. } => title,
        }
    }

    /// Short description for logs and progress events.
    pub fn summary(&self) -> String {
        match self {
            ExtractedContent::Text { text, .. } => format!("{} chars", text.chars().count()),
            ExtractedContent::ImageWithInstruction { image, .. } => image.mime_type.clone(),
        }
    }
}

/// Reads per-page text out of a PDF file.
///
/// Implementations are blocking; the extractor calls them from
/// `spawn_blocking`.
pub trait PdfTextReader: Send + Sync {
    /// Text of at most `max_pages` pages, in page order. Pages without text
    /// may be returned as empty strings.
    fn page_texts(&self, path: &Path, max_pages: usize) -> Result<Vec<String>, AdaptError>;
}

/// Marker appended when text is clamped.
const ELLIPSIS: &str = "...";

/// How far back from the limit a word boundary is searched for.
const WORD_BOUNDARY_WINDOW: usize = 100;

/// Truncate `text` to at most `limit` characters plus a trailing `...`.
///
/// The cut moves back to the last space if one lies within the final
/// hundred characters (the window start included), so words are not split.
/// Whitespace is kept as is; PDF text relies on its blank-line page joins.
pub fn clamp_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let byte_limit = text
        .char_indices()
        .nth(limit)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let mut cut = &text[..byte_limit];

    if let Some(space) = cut.rfind(' ') {
        let space_chars = cut[..space].chars().count();
        if space_chars >= limit.saturating_sub(WORD_BOUNDARY_WINDOW) {
            cut = &cut[..space];
        }
    }
    format!("{}{}", cut.trim_end(), ELLIPSIS)
}

/// Turns a request source into [`ExtractedContent`].
#[derive(Clone)]
pub struct Extractor {
    pdf_reader: Arc<dyn PdfTextReader>,
    max_text_chars: usize,
    max_pdf_pages: usize,
}

impl Extractor {
    pub fn new(pdf_reader: Arc<dyn PdfTextReader>, max_text_chars: usize, max_pdf_pages: usize) -> Self {
        Self {
            pdf_reader,
            max_text_chars,
            max_pdf_pages,
        }
    }

    pub async fn extract(&self, source: &InputSource) -> Result<ExtractedContent, AdaptError> {
        match source {
            InputSource::Text(raw) => {
                let text = raw.trim();
                if text.is_empty() {
                    return Err(AdaptError::EmptyInput);
                }
                Ok(ExtractedContent::Text {
                    text: clamp_text(text, self.max_text_chars),
                    title: "Accessible Text Input".to_string(),
                })
            }
            InputSource::File(file) => self.extract_file(file).await,
        }
    }

    async fn extract_file(&self, file: &UploadedFile) -> Result<ExtractedContent, AdaptError> {
        let kind = file.media_kind()?;
        info!("Extracting {} as {:?}", file.file_name(), kind);

        match kind {
            MediaKind::Text => {
                let bytes = read_bytes(file).await?;
                let decoded = String::from_utf8_lossy(&bytes);
                let text = decoded.trim();
                if text.is_empty() {
                    return Err(AdaptError::ExtractionFailed {
                        detail: format!("'{}' contains no text", file.file_name()),
                    });
                }
                Ok(ExtractedContent::Text {
                    text: clamp_text(text, self.max_text_chars),
                    title: format!("Accessible Text File Content: {}", file.file_name()),
                })
            }
            MediaKind::Image => {
                let bytes = read_bytes(file).await?;
                let image = encode_image(&bytes).map_err(|e| AdaptError::ExtractionFailed {
                    detail: format!("'{}' is not a readable image: {e}", file.file_name()),
                })?;
                Ok(ExtractedContent::ImageWithInstruction {
                    image,
                    title: format!("Accessible Image Content: {}", file.file_name()),
                })
            }
            MediaKind::Pdf => {
                let text = self.pdf_text(file.path()).await?;
                if text.is_empty() {
                    return Err(AdaptError::ExtractionFailed {
                        detail: format!("no text found in '{}'", file.file_name()),
                    });
                }
                Ok(ExtractedContent::Text {
                    text: clamp_text(&text, self.max_text_chars),
                    title: format!("Accessible PDF Content: {}", file.file_name()),
                })
            }
            MediaKind::Unsupported(media_type) => Err(AdaptError::UnsupportedMediaKind { media_type }),
        }
    }

    async fn pdf_text(&self, path: &Path) -> Result<String, AdaptError> {
        let reader = Arc::clone(&self.pdf_reader);
        let path = path.to_path_buf();
        let max_pages = self.max_pdf_pages;

        let pages = tokio::task::spawn_blocking(move || reader.page_texts(&path, max_pages))
            .await
            .map_err(|e| AdaptError::Internal(format!("PDF text task panicked: {}", e)))??;

        debug!("Read {} PDF pages", pages.len());
        Ok(join_pages(pages.iter().take(max_pages).map(String::as_str)))
    }
}

/// Trim each page and join the non-empty ones with a blank line.
fn join_pages<'a>(pages: impl Iterator<Item = &'a str>) -> String {
    pages
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn read_bytes(file: &UploadedFile) -> Result<Vec<u8>, AdaptError> {
    tokio::fs::read(file.path()).await.map_err(|e| AdaptError::ExtractionFailed {
        detail: format!("cannot read '{}': {e}", file.file_name()),
    })
}
