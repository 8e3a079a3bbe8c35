//! Artifact packaging: sanitised markup → layout document → PDF on disk.
//!
//! The packager understands a small structural subset of HTML (headings
//! h1–h3, paragraphs, list items, bold runs). Everything else is flattened
//! into a paragraph of its text, so no content is ever dropped. Drawing is
//! delegated to an injected [`DocumentRenderer`]; the production renderer is
//! [`crate::pdfium::PdfiumEngine`].
//!
//! Files are rendered to a temp file inside the output directory and then
//! renamed into place, so a reader never sees a half-written PDF.

use crate::error::AdaptError;
use crate::output::Artifact;
use crate::pipeline::sanitize::SafeMarkup;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A span of text with one weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// One block of the rendered document, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutBlock {
    Title(String),
    Heading { level: u8, text: String },
    Paragraph(Vec<TextRun>),
    /// `marker` is a bullet or an ordinal like `3.`; empty when the block
    /// continues the item above it.
    ListItem { marker: String, runs: Vec<TextRun> },
    /// The "Accessibility Notes" block.
    Notes(String),
}

/// Renderer-independent description of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDocument {
    pub title: String,
    pub blocks: Vec<LayoutBlock>,
}

impl LayoutDocument {
    /// Title block, the markup's blocks, then the optional notes block.
    pub fn build(title: &str, markup: &SafeMarkup, notes: Option<&str>) -> Self {
        let mut blocks = vec![LayoutBlock::Title(title.to_string())];
        blocks.extend(layout_from_markup(markup.as_str()));
        if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
            blocks.push(LayoutBlock::Notes(notes.to_string()));
        }
        Self {
            title: title.to_string(),
            blocks,
        }
    }
}

/// Heading shown above the notes block.
pub const NOTES_HEADING: &str = "Accessibility Notes";

/// Bullet marker for unordered list items.
pub const BULLET: &str = "\u{2022}";

// ── Markup → blocks ─────────────────────────────────────────────────────────

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<(/?)([a-zA-Z][a-zA-Z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap());

static RE_OL_START: Lazy<Regex> = Lazy::new(|| Regex::new(r#"start\s*=\s*"?(\d+)"#).unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());

fn decode_entities(text: &str) -> String {
    RE_ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ if name.starts_with('#') => name[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Heading(u8),
    Paragraph,
    ListItem,
}

struct ListContext {
    ordered: bool,
    next: u32,
}

#[derive(Default)]
struct LayoutBuilder {
    blocks: Vec<LayoutBlock>,
    open: Option<(OpenBlock, String)>,
    runs: Vec<TextRun>,
    lists: Vec<ListContext>,
    /// Open `<li>` elements; block content inside them stays list content.
    item_depth: usize,
    bold_depth: usize,
}

impl LayoutBuilder {
    fn start(&mut self, kind: OpenBlock) {
        if kind == OpenBlock::Paragraph && self.item_depth > 0 {
            self.start_in_item();
            return;
        }
        self.flush();
        let marker = match kind {
            OpenBlock::ListItem => match self.lists.last_mut() {
                Some(list) if list.ordered => {
                    let n = list.next;
                    list.next += 1;
                    format!("{n}.")
                }
                _ => BULLET.to_string(),
            },
            _ => String::new(),
        };
        self.open = Some((kind, marker));
    }

    /// A block opening inside a list item. The first one inherits the item's
    /// marker; later ones continue the item without a marker.
    fn start_in_item(&mut self) {
        if matches!(self.open, Some((OpenBlock::ListItem, _))) && self.runs.is_empty() {
            return;
        }
        self.flush();
        self.open = Some((OpenBlock::ListItem, String::new()));
    }

    fn push_text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        let mut text = collapse_whitespace(&decoded);
        if text.is_empty() {
            return;
        }
        let at_line_start = self.runs.last().map_or(true, |r| r.text.ends_with(' '));
        if at_line_start {
            text = text.trim_start().to_string();
            if text.is_empty() {
                return;
            }
        }
        let bold = self.bold_depth > 0;
        match self.runs.last_mut() {
            Some(last) if last.bold == bold => last.text.push_str(&text),
            _ => self.runs.push(TextRun { text, bold }),
        }
    }

    fn flush(&mut self) {
        let open = self.open.take();
        let mut runs = std::mem::take(&mut self.runs);
        if let Some(last) = runs.last_mut() {
            last.text.truncate(last.text.trim_end().len());
        }
        runs.retain(|r| !r.text.is_empty());
        if runs.is_empty() {
            return;
        }

        let block = match open {
            Some((OpenBlock::Heading(level), _)) => LayoutBlock::Heading {
                level,
                text: runs.into_iter().map(|r| r.text).collect(),
            },
            Some((OpenBlock::ListItem, marker)) => LayoutBlock::ListItem { marker, runs },
            None if self.item_depth > 0 => LayoutBlock::ListItem {
                marker: String::new(),
                runs,
            },
            Some((OpenBlock::Paragraph, _)) | None => LayoutBlock::Paragraph(runs),
        };
        self.blocks.push(block);
    }

    fn start_tag(&mut self, name: &str, attrs: &str) {
        match name {
            "h1" => self.start(OpenBlock::Heading(1)),
            "h2" => self.start(OpenBlock::Heading(2)),
            "h3" => self.start(OpenBlock::Heading(3)),
            "li" => {
                self.start(OpenBlock::ListItem);
                self.item_depth += 1;
            }
            "ul" | "ol" => {
                self.flush();
                let next = RE_OL_START
                    .captures(attrs)
                    .and_then(|c| c[1].parse().ok())
                    .unwrap_or(1);
                self.lists.push(ListContext {
                    ordered: name == "ol",
                    next,
                });
            }
            "strong" | "b" => self.bold_depth += 1,
            "br" => self.push_text(" "),
            "hr" => self.flush(),
            n if is_block(n) => self.start(OpenBlock::Paragraph),
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        match name {
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
            }
            "strong" | "b" => self.bold_depth = self.bold_depth.saturating_sub(1),
            "li" => {
                self.flush();
                self.item_depth = self.item_depth.saturating_sub(1);
            }
            "h1" | "h2" | "h3" => self.flush(),
            n if is_block(n) => self.flush(),
            _ => {}
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "h4"
            | "h5"
            | "h6"
            | "div"
            | "blockquote"
            | "pre"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "main"
            | "figure"
            | "figcaption"
            | "table"
            | "caption"
            | "tr"
            | "td"
            | "th"
            | "dl"
            | "dt"
            | "dd"
    )
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Map sanitised markup onto layout blocks.
pub fn layout_from_markup(markup: &str) -> Vec<LayoutBlock> {
    let mut builder = LayoutBuilder::default();
    let mut cursor = 0;

    for caps in RE_TAG.captures_iter(markup) {
        let Some(whole) = caps.get(0) else { continue };
        builder.push_text(&markup[cursor..whole.start()]);
        cursor = whole.end();

        let name = caps[2].to_ascii_lowercase();
        if caps[1].is_empty() {
            builder.start_tag(&name, &caps[3]);
        } else {
            builder.end_tag(&name);
        }
    }
    builder.push_text(&markup[cursor..]);
    builder.flush();
    builder.blocks
}

// ── File naming ─────────────────────────────────────────────────────────────

const MAX_STEM_CHARS: usize = 120;

/// `accessible_{title}` lower-cased, whitespace → `_`, restricted to
/// `[a-z0-9_.-]`, with a `.pdf` extension.
pub fn artifact_file_name(title: &str) -> String {
    let stem: String = format!("accessible_{}", title.trim())
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = stem.trim_end_matches('.');
    format!("{stem}.pdf")
}

// ── Packager ────────────────────────────────────────────────────────────────

/// Draws a [`LayoutDocument`] into a file.
///
/// Blocking; the packager calls it from `spawn_blocking`.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &LayoutDocument, dest: &Path) -> Result<(), AdaptError>;
}

/// Writes artifacts into the output directory.
#[derive(Clone)]
pub struct Packager {
    renderer: Arc<dyn DocumentRenderer>,
    output_dir: PathBuf,
    download_base: String,
}

impl Packager {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        output_dir: impl Into<PathBuf>,
        download_base: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            output_dir: output_dir.into(),
            download_base: download_base.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render `markup` under `title` and return the written artifact.
    pub async fn package(
        &self,
        title: &str,
        markup: &SafeMarkup,
        notes: Option<&str>,
    ) -> Result<Artifact, AdaptError> {
        let file_name = artifact_file_name(title);
        let final_path = self.output_dir.join(&file_name);
        let document = LayoutDocument::build(title, markup, notes);
        debug!("Layout for '{}': {} blocks", title, document.blocks.len());

        let renderer = Arc::clone(&self.renderer);
        let output_dir = self.output_dir.clone();
        let dest = final_path.clone();

        tokio::task::spawn_blocking(move || write_atomically(renderer.as_ref(), &document, &output_dir, &dest))
            .await
            .map_err(|e| AdaptError::Internal(format!("Packaging task panicked: {}", e)))??;

        info!("Wrote artifact {}", final_path.display());
        Ok(Artifact {
            reference: format!("{}/{}", self.download_base.trim_end_matches('/'), file_name),
            file_name,
            path: final_path,
            title: title.to_string(),
            notes: notes.map(str::to_string),
        })
    }
}

fn write_atomically(
    renderer: &dyn DocumentRenderer,
    document: &LayoutDocument,
    output_dir: &Path,
    dest: &Path,
) -> Result<(), AdaptError> {
    let failed = |detail: String| AdaptError::PackagingFailed {
        path: dest.to_path_buf(),
        detail,
    };

    std::fs::create_dir_all(output_dir).map_err(|e| failed(format!("create output dir: {e}")))?;

    // Deleted on drop unless persisted.
    let tmp = tempfile::Builder::new()
        .prefix(".artifact-")
        .suffix(".pdf.tmp")
        .tempfile_in(output_dir)
        .map_err(|e| failed(format!("create temp file: {e}")))?
        .into_temp_path();

    renderer.render(document, &tmp)?;

    tmp.persist(dest).map_err(|e| failed(format!("rename into place: {}", e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sanitize::sanitize;
    use std::sync::Mutex;

    #[test]
    fn headings_paragraphs_and_bold() {
        let blocks = layout_from_markup("<h1>Title</h1><p>Some <strong>key</strong> words.</p>");
        assert_eq!(
            blocks,
            vec![
                LayoutBlock::Heading {
                    level: 1,
                    text: "Title".into()
                },
                LayoutBlock::Paragraph(vec![
                    TextRun::plain("Some "),
                    TextRun::bold("key"),
                    TextRun::plain(" words."),
                ]),
            ]
        );
    }

    #[test]
    fn list_markers() {
        let blocks = layout_from_markup("<ul><li>a</li><li>b</li></ul><ol start=\"3\"><li>c</li><li>d</li></ol>");
        let markers: Vec<_> = blocks
            .iter()
            .map(|b| match b {
                LayoutBlock::ListItem { marker, .. } => marker.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(markers, vec![BULLET, BULLET, "3.", "4."]);
    }

    #[test]
    fn paragraphs_inside_items_keep_markers() {
        let blocks = layout_from_markup("<ol><li><p>First step</p></li><li><p>Second step</p></li></ol>");
        assert_eq!(
            blocks,
            vec![
                LayoutBlock::ListItem {
                    marker: "1.".into(),
                    runs: vec![TextRun::plain("First step")],
                },
                LayoutBlock::ListItem {
                    marker: "2.".into(),
                    runs: vec![TextRun::plain("Second step")],
                },
            ]
        );
    }

    #[test]
    fn second_paragraph_in_item_continues_it() {
        let blocks = layout_from_markup("<ul><li><p>Lead</p><p>Detail</p> tail</li></ul><p>After</p>");
        assert_eq!(
            blocks,
            vec![
                LayoutBlock::ListItem {
                    marker: BULLET.into(),
                    runs: vec![TextRun::plain("Lead")],
                },
                LayoutBlock::ListItem {
                    marker: String::new(),
                    runs: vec![TextRun::plain("Detail")],
                },
                LayoutBlock::ListItem {
                    marker: String::new(),
                    runs: vec![TextRun::plain("tail")],
                },
                LayoutBlock::Paragraph(vec![TextRun::plain("After")]),
            ]
        );
    }

    #[test]
    fn nested_list_inside_item() {
        let blocks = layout_from_markup("<ul><li>Outer<ol><li>Inner</li></ol></li></ul>");
        let markers: Vec<_> = blocks
            .iter()
            .map(|b| match b {
                LayoutBlock::ListItem { marker, .. } => marker.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(markers, vec![BULLET, "1."]);
    }

    #[test]
    fn unknown_structure_becomes_paragraphs() {
        let blocks = layout_from_markup("<h5>Small</h5><blockquote>Quote</blockquote>bare text");
        assert_eq!(
            blocks,
            vec![
                LayoutBlock::Paragraph(vec![TextRun::plain("Small")]),
                LayoutBlock::Paragraph(vec![TextRun::plain("Quote")]),
                LayoutBlock::Paragraph(vec![TextRun::plain("bare text")]),
            ]
        );
    }

    #[test]
    fn quoted_angle_bracket_in_attribute() {
        let blocks = layout_from_markup(r#"<p title="a>b">x</p>"#);
        assert_eq!(blocks, vec![LayoutBlock::Paragraph(vec![TextRun::plain("x")])]);
    }

    #[test]
    fn entities_are_decoded() {
        let blocks = layout_from_markup("<p>a &amp; b &lt;c&gt; &#8212; &#x41;&nbsp;z</p>");
        assert_eq!(blocks, vec![LayoutBlock::Paragraph(vec![TextRun::plain("a & b <c> \u{2014} A z")])]);
    }

    #[test]
    fn whitespace_is_collapsed() {
        let blocks = layout_from_markup("<p>\n  one\n\n  two  </p>");
        assert_eq!(blocks, vec![LayoutBlock::Paragraph(vec![TextRun::plain("one two")])]);
    }

    #[test]
    fn document_has_title_and_notes() {
        let doc = LayoutDocument::build("Accessible Text Input", &sanitize("<p>x</p>"), Some("Processed for: ADHD"));
        assert_eq!(doc.blocks.first(), Some(&LayoutBlock::Title("Accessible Text Input".into())));
        assert_eq!(doc.blocks.last(), Some(&LayoutBlock::Notes("Processed for: ADHD".into())));
    }

    #[test]
    fn file_names_are_safe() {
        assert_eq!(
            artifact_file_name("Accessible Text Input"),
            "accessible_accessible_text_input.pdf"
        );
        assert_eq!(
            artifact_file_name("Accessible PDF Content: ../../etc/passwd"),
            "accessible_accessible_pdf_content_....etcpasswd.pdf"
        );
        let name = artifact_file_name("Ünïcode  Tïtle!");
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.-".contains(c)));
    }

    struct Recording {
        titles: Mutex<Vec<String>>,
        fail: bool,
    }

    impl DocumentRenderer for Recording {
        fn render(&self, document: &LayoutDocument, dest: &Path) -> Result<(), AdaptError> {
            if self.fail {
                return Err(AdaptError::PackagingFailed {
                    path: dest.to_path_buf(),
                    detail: "disk full".into(),
                });
            }
            self.titles.lock().unwrap().push(document.title.clone());
            std::fs::write(dest, b"%PDF-1.7 stub").unwrap();
            Ok(())
        }
    }

    #[tokio::test]
    async fn package_writes_and_references() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(Recording {
            titles: Mutex::new(vec![]),
            fail: false,
        });
        let packager = Packager::new(renderer.clone(), dir.path().join("out"), "/downloads/");
        let artifact = packager
            .package("Accessible Text Input", &sanitize("<p>hi</p>"), None)
            .await
            .unwrap();
        assert_eq!(artifact.reference, "/downloads/accessible_accessible_text_input.pdf");
        assert!(artifact.path.exists());
        assert_eq!(*renderer.titles.lock().unwrap(), vec!["Accessible Text Input"]);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn failed_render_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let packager = Packager::new(
            Arc::new(Recording {
                titles: Mutex::new(vec![]),
                fail: true,
            }),
            dir.path(),
            "/downloads",
        );
        let err = packager.package("T", &sanitize("<p>x</p>"), None).await.unwrap_err();
        assert!(matches!(err, AdaptError::PackagingFailed { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
