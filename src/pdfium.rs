//! pdfium-backed PDF text reader and artifact renderer.
//!
//! ## Binding
//!
//! pdfium is a C++ library loaded at runtime. [`PdfiumEngine::locate`] picks
//! the library once, in this order:
//!
//! 1. `PDFIUM_LIB_PATH`, when it names an existing file;
//! 2. the platform library file next to the running executable;
//! 3. the system library search path.
//!
//! If none binds, the adapter falls back to [`UnavailablePdfEngine`]: PDF
//! uploads are rejected and artifacts are skipped, but text and image
//! requests still work.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is CPU-bound and not async-aware. Both trait methods here are
//! blocking; the extractor and packager call them on tokio's blocking pool.

use crate::error::AdaptError;
use crate::pipeline::extract::PdfTextReader;
use crate::pipeline::package::{DocumentRenderer, LayoutBlock, LayoutDocument, TextRun, NOTES_HEADING};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
enum Library {
    File(PathBuf),
    System,
}

/// Reads and writes PDFs through one located pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumEngine {
    library: Library,
}

impl PdfiumEngine {
    /// Find a pdfium library and check that it binds.
    pub fn locate() -> Result<Self, AdaptError> {
        let library = if let Some(path) = std::env::var_os("PDFIUM_LIB_PATH")
            .map(PathBuf::from)
            .filter(|p| p.is_file())
        {
            Library::File(path)
        } else if let Some(path) = beside_executable().filter(|p| p.is_file()) {
            Library::File(path)
        } else {
            Library::System
        };

        let engine = Self { library };
        engine.bind()?;
        info!("pdfium bound from {:?}", engine.library);
        Ok(engine)
    }

    /// Use the library at `path`.
    pub fn from_library_path(path: impl Into<PathBuf>) -> Result<Self, AdaptError> {
        let engine = Self {
            library: Library::File(path.into()),
        };
        engine.bind()?;
        Ok(engine)
    }

    fn bind(&self) -> Result<Pdfium, AdaptError> {
        let bindings = match &self.library {
            Library::File(path) => Pdfium::bind_to_library(path),
            Library::System => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| AdaptError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

fn beside_executable() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    Some(Pdfium::pdfium_platform_library_name_at_path(dir))
}

impl PdfTextReader for PdfiumEngine {
    fn page_texts(&self, path: &Path, max_pages: usize) -> Result<Vec<String>, AdaptError> {
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            AdaptError::ExtractionFailed {
                detail: if err_str.contains("Password") || err_str.contains("password") {
                    "the PDF is password-protected".to_string()
                } else {
                    format!("not a readable PDF ({err_str})")
                },
            }
        })?;

        let pages = document.pages();
        debug!("PDF has {} pages, reading up to {}", pages.len(), max_pages);

        let mut texts = Vec::new();
        for (idx, page) in pages.iter().enumerate().take(max_pages) {
            let text = page.text().map_err(|e| AdaptError::ExtractionFailed {
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;
            texts.push(text.all());
        }
        Ok(texts)
    }
}

impl DocumentRenderer for PdfiumEngine {
    fn render(&self, layout: &LayoutDocument, dest: &Path) -> Result<(), AdaptError> {
        let failed = |e: PdfiumError| AdaptError::PackagingFailed {
            path: dest.to_path_buf(),
            detail: format!("{:?}", e),
        };

        let pdfium = self.bind()?;
        let mut document = pdfium.create_new_pdf().map_err(failed)?;
        let regular = document.fonts_mut().helvetica();
        let bold = document.fonts_mut().helvetica_bold();

        let pages = paginate(layout);
        for placed in &pages {
            let mut page = document
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::a4())
                .map_err(failed)?;
            for item in placed {
                page.objects_mut()
                    .create_text_object(
                        PdfPoints::new(item.x),
                        PdfPoints::new(item.y),
                        &item.text,
                        if item.bold { bold } else { regular },
                        PdfPoints::new(item.size),
                    )
                    .map_err(failed)?;
            }
        }

        document.save_to_file(dest).map_err(failed)?;
        debug!("Rendered {} page(s) to {}", pages.len(), dest.display());
        Ok(())
    }
}

/// Stand-in used when no pdfium library could be bound.
#[derive(Debug, Clone)]
pub struct UnavailablePdfEngine {
    reason: String,
}

impl UnavailablePdfEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl PdfTextReader for UnavailablePdfEngine {
    fn page_texts(&self, _path: &Path, _max_pages: usize) -> Result<Vec<String>, AdaptError> {
        Err(AdaptError::ExtractionFailed {
            detail: format!("PDF support is unavailable: {}", self.reason),
        })
    }
}

impl DocumentRenderer for UnavailablePdfEngine {
    fn render(&self, _layout: &LayoutDocument, dest: &Path) -> Result<(), AdaptError> {
        Err(AdaptError::PackagingFailed {
            path: dest.to_path_buf(),
            detail: format!("PDF rendering is unavailable: {}", self.reason),
        })
    }
}

// ── Page layout ──────────────────────────────────────────────────────────────

// A4 in points.
const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 56.0;
const LEADING: f32 = 1.35;
const LIST_INDENT: f32 = 18.0;

/// One text object at an absolute page position (baseline origin).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlacedText {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub bold: bool,
    pub size: f32,
}

/// Approximate Helvetica advance width in ems.
fn char_width(c: char, bold: bool) -> f32 {
    let w = match c {
        'i' | 'j' | 'l' | '.' | ',' | ';' | ':' | '\'' | '!' | '|' => 0.24,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' => 0.33,
        'm' | 'w' | 'M' | 'W' | '@' => 0.86,
        'A'..='Z' => 0.68,
        '0'..='9' => 0.56,
        _ => 0.54,
    };
    if bold {
        w * 1.07
    } else {
        w
    }
}

fn text_width(text: &str, bold: bool, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, bold)).sum::<f32>() * size
}

/// Greedy word wrap of `runs` into lines no wider than `max_width`.
fn wrap(runs: &[TextRun], size: f32, max_width: f32) -> Vec<Vec<TextRun>> {
    let mut lines: Vec<Vec<TextRun>> = Vec::new();
    let mut line: Vec<TextRun> = Vec::new();
    let mut width = 0.0;

    let words = runs
        .iter()
        .flat_map(|run| run.text.split_whitespace().map(move |w| (w, run.bold)));

    for (word, bold) in words {
        for piece in split_long_word(word, bold, size, max_width) {
            let sep = if line.is_empty() { "" } else { " " };
            let piece_width = text_width(sep, bold, size) + text_width(&piece, bold, size);

            if !line.is_empty() && width + piece_width > max_width {
                lines.push(std::mem::take(&mut line));
                width = 0.0;
                push_word(&mut line, "", &piece, bold);
                width += text_width(&piece, bold, size);
            } else {
                push_word(&mut line, sep, &piece, bold);
                width += piece_width;
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn push_word(line: &mut Vec<TextRun>, sep: &str, word: &str, bold: bool) {
    match line.last_mut() {
        Some(last) if last.bold == bold => {
            last.text.push_str(sep);
            last.text.push_str(word);
        }
        Some(last) => {
            last.text.push_str(sep);
            line.push(TextRun {
                text: word.to_string(),
                bold,
            });
        }
        None => line.push(TextRun {
            text: word.to_string(),
            bold,
        }),
    }
}

fn split_long_word(word: &str, bold: bool, size: f32, max_width: f32) -> Vec<String> {
    if text_width(word, bold, size) <= max_width {
        return vec![word.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        if !current.is_empty() && text_width(&current, bold, size) + char_width(c, bold) * size > max_width {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

struct Cursor {
    pages: Vec<Vec<PlacedText>>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn at_top(&self) -> bool {
        self.y >= PAGE_HEIGHT - MARGIN
    }

    fn gap(&mut self, space: f32) {
        if !self.at_top() {
            self.y -= space;
        }
    }

    /// Move to the next baseline, breaking the page when it would not fit.
    fn next_line(&mut self, size: f32) -> f32 {
        let advance = size * LEADING;
        if self.y - advance < MARGIN {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN;
        }
        self.y -= advance;
        self.y
    }

    fn place(&mut self, item: PlacedText) {
        if let Some(page) = self.pages.last_mut() {
            page.push(item);
        }
    }

    fn paragraph(&mut self, runs: &[TextRun], size: f32, indent: f32, marker: Option<&str>) {
        self.gap(size * 0.6);
        let left = MARGIN + indent;
        for (i, line) in wrap(runs, size, PAGE_WIDTH - MARGIN - left).iter().enumerate() {
            let y = self.next_line(size);
            if i == 0 {
                if let Some(marker) = marker.filter(|m| !m.is_empty()) {
                    self.place(PlacedText {
                        x: MARGIN + indent - LIST_INDENT,
                        y,
                        text: marker.to_string(),
                        bold: false,
                        size,
                    });
                }
            }
            let mut x = left;
            for run in line {
                self.place(PlacedText {
                    x,
                    y,
                    text: run.text.clone(),
                    bold: run.bold,
                    size,
                });
                x += text_width(&run.text, run.bold, size);
            }
        }
    }
}

fn heading_size(level: u8) -> f32 {
    match level {
        1 => 16.0,
        2 => 14.0,
        _ => 12.5,
    }
}

/// Lay out every block onto A4 pages; always returns at least one page.
pub(crate) fn paginate(layout: &LayoutDocument) -> Vec<Vec<PlacedText>> {
    let mut cursor = Cursor::new();
    for block in &layout.blocks {
        match block {
            LayoutBlock::Title(text) => {
                cursor.paragraph(&[TextRun::bold(text.as_str())], 20.0, 0.0, None);
                cursor.gap(8.0);
            }
            LayoutBlock::Heading { level, text } => {
                cursor.gap(6.0);
                cursor.paragraph(&[TextRun::bold(text.as_str())], heading_size(*level), 0.0, None);
            }
            LayoutBlock::Paragraph(runs) => cursor.paragraph(runs, 11.0, 0.0, None),
            LayoutBlock::ListItem { marker, runs } => {
                cursor.paragraph(runs, 11.0, LIST_INDENT, Some(marker.as_str()))
            }
            LayoutBlock::Notes(text) => {
                cursor.gap(12.0);
                cursor.paragraph(&[TextRun::bold(NOTES_HEADING)], 12.0, 0.0, None);
                cursor.paragraph(&[TextRun::plain(text.as_str())], 10.0, 0.0, None);
            }
        }
    }
    cursor.pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn wrap_respects_width() {
        let runs = vec![TextRun::plain(words(200))];
        let lines = wrap(&runs, 11.0, 300.0);
        assert!(lines.len() > 1);
        for line in &lines {
            let w: f32 = line.iter().map(|r| text_width(&r.text, r.bold, 11.0)).sum();
            assert!(w <= 300.0 + 0.01, "line too wide: {w}");
        }
    }

    #[test]
    fn wrap_keeps_every_word() {
        let runs = vec![TextRun::plain("alpha beta "), TextRun::bold("gamma"), TextRun::plain(" delta")];
        let lines = wrap(&runs, 11.0, 60.0);
        let rejoined: Vec<String> = lines
            .iter()
            .flat_map(|l| l.iter().flat_map(|r| r.text.split_whitespace().map(str::to_string)))
            .collect();
        assert_eq!(rejoined, vec!["alpha", "beta", "gamma", "delta"]);
    }

    #[test]
    fn long_words_are_split() {
        let long = "x".repeat(500);
        let lines = wrap(&[TextRun::plain(long.as_str())], 11.0, 200.0);
        assert!(lines.len() > 1);
        let total: usize = lines.iter().flat_map(|l| l.iter()).map(|r| r.text.len()).sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn long_documents_break_pages() {
        let mut blocks = vec![LayoutBlock::Title("T".into())];
        for _ in 0..80 {
            blocks.push(LayoutBlock::Paragraph(vec![TextRun::plain(words(40))]));
        }
        let pages = paginate(&LayoutDocument {
            title: "T".into(),
            blocks,
        });
        assert!(pages.len() > 1);
        for item in pages.iter().flatten() {
            assert!(item.y >= MARGIN && item.y <= PAGE_HEIGHT - MARGIN);
            assert!(item.x >= MARGIN - LIST_INDENT);
        }
    }

    #[test]
    fn list_items_carry_marker() {
        let pages = paginate(&LayoutDocument {
            title: "T".into(),
            blocks: vec![LayoutBlock::ListItem {
                marker: "1.".into(),
                runs: vec![TextRun::plain("first")],
            }],
        });
        let texts: Vec<_> = pages[0].iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["1.", "first"]);
    }

    #[test]
    fn continuation_items_have_no_marker() {
        let pages = paginate(&LayoutDocument {
            title: "T".into(),
            blocks: vec![
                LayoutBlock::ListItem {
                    marker: crate::pipeline::package::BULLET.into(),
                    runs: vec![TextRun::plain("first")],
                },
                LayoutBlock::ListItem {
                    marker: String::new(),
                    runs: vec![TextRun::plain("more")],
                },
            ],
        });
        let texts: Vec<_> = pages[0].iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec![crate::pipeline::package::BULLET, "first", "more"]);
    }

    #[test]
    fn empty_layout_still_has_a_page() {
        let pages = paginate(&LayoutDocument {
            title: String::new(),
            blocks: vec![],
        });
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn unavailable_engine_rejects_pdfs() {
        let engine = UnavailablePdfEngine::new("no library");
        let err = engine.page_texts(Path::new("x.pdf"), 25).unwrap_err();
        assert!(err.is_rejection());
    }
}
