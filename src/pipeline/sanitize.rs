//! Output sanitisation: allow-list filter over model-generated HTML.
//!
//! Model output is untrusted. Whatever the system instruction asked for, the
//! fragment shown to the user or rendered into a PDF passes through one
//! fixed [`ammonia`] policy:
//!
//! - only structural and formatting tags survive; `script` and `style` are
//!   removed together with their content, any other tag is unwrapped to
//!   its text;
//! - attributes are limited to a short generic set plus per-tag extras, so
//!   every `on*` handler and inline `style` is dropped;
//! - URLs must use `http`, `https` or `mailto`; relative URLs are removed;
//! - comments are stripped and links get `rel="noopener noreferrer"`.
//!
//! When non-blank input is filtered down to nothing, a visible placeholder
//! paragraph is returned instead of an empty page. The filter is idempotent:
//! sanitising a [`SafeMarkup`] again yields the same markup, because the
//! policy is re-applied until the output stops changing.

use ammonia::{Builder, UrlRelative};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Shown when filtering removed everything.
pub const REMOVED_PLACEHOLDER: &str = "<p>(Content removed by security sanitizer)</p>";

const ALLOWED_TAGS: &[&str] = &[
    // headings & text blocks
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "blockquote", "hr", "br", "div", "span",
    // lists
    "ul", "ol", "li", "dl", "dt", "dd",
    // inline formatting
    "strong", "em", "b", "i", "u", "s", "sub", "sup", "code", "mark", "abbr", "cite", "q", "small",
    // sections
    "section", "article", "header", "footer", "nav", "aside", "main",
    "figure", "figcaption", "img", "a",
    // tables
    "table", "caption", "thead", "tbody", "tfoot", "tr", "th", "td", "colgroup", "col",
];

const GENERIC_ATTRIBUTES: &[&str] = &["class", "id", "title", "lang", "dir", "aria-label", "role"];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "title"]),
    ("img", &["src", "alt", "title", "width", "height", "loading"]),
    ("ol", &["start", "type"]),
    ("li", &["value"]),
    ("td", &["colspan", "rowspan", "headers"]),
    ("th", &["colspan", "rowspan", "headers", "scope", "abbr"]),
    ("col", &["span"]),
    ("colgroup", &["span"]),
    ("abbr", &["title"]),
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Tags dropped together with everything inside them.
const CONTENT_STRIPPED_TAGS: &[&str] = &["script", "style"];

/// Upper bound on clean passes. Unwrapping a disallowed element can leave
/// markup the parser restructures on the next read (nested anchors, `<p>`
/// inside `<p>`).
const MAX_PASSES: usize = 4;

static POLICY: Lazy<Builder<'static>> = Lazy::new(|| {
    let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_ATTRIBUTES
        .iter()
        .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
        .collect();

    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .clean_content_tags(CONTENT_STRIPPED_TAGS.iter().copied().collect())
        .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .url_relative(UrlRelative::Deny)
        .strip_comments(true)
        .link_rel(Some("noopener noreferrer"));
    builder
});

/// HTML that has passed the allow-list filter.
///
/// Only [`sanitize`] constructs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeMarkup(String);

impl SafeMarkup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True when filtering removed all content.
    pub fn is_placeholder(&self) -> bool {
        self.0 == REMOVED_PLACEHOLDER
    }
}

impl fmt::Display for SafeMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeMarkup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Re-clean until the output parses back to itself.
fn clean_to_fixed_point(raw: &str) -> String {
    let mut current = POLICY.clean(raw).to_string().trim().to_string();
    for pass in 1..MAX_PASSES {
        let next = POLICY.clean(&current).to_string().trim().to_string();
        if next == current {
            break;
        }
        debug!("Sanitizer pass {} still changed the markup", pass + 1);
        current = next;
    }
    current
}

/// Filter untrusted HTML through the allow-list.
pub fn sanitize(raw: &str) -> SafeMarkup {
    if raw.trim().is_empty() {
        return SafeMarkup(String::new());
    }

    let cleaned = clean_to_fixed_point(raw);
    let cleaned = cleaned.as_str();

    if cleaned.is_empty() {
        warn!(
            "Sanitizer removed all content ({} input bytes); returning placeholder",
            raw.len()
        );
        return SafeMarkup(REMOVED_PLACEHOLDER.to_string());
    }

    if cleaned.len() != raw.trim().len() {
        debug!("Sanitizer changed output: {} → {} bytes", raw.len(), cleaned.len());
    }
    SafeMarkup(cleaned.to_string())
}
