//! Prompt construction: profile + extracted content → [`RenderedPrompt`].
//!
//! Pure and deterministic: identical inputs always give an identical prompt,
//! which lets the orchestrator reuse one prompt across retries and lets tests
//! assert on exact text.

use crate::pipeline::encode::InlineImage;
use crate::pipeline::extract::ExtractedContent;
use crate::profiles::AccessibilityProfile;
use crate::prompts::{origin_line, IMAGE_INSTRUCTION, IMAGE_PLACEHOLDER, SYSTEM_INSTRUCTION};
use reqwest::Url;
use std::collections::HashSet;
use tracing::warn;

/// The full instruction set for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    /// Inline image data (an uploaded image).
    pub images: Vec<InlineImage>,
    /// Auxiliary image URLs, already filtered; also listed in `user`.
    pub image_refs: Vec<String>,
}

/// Keep the image URLs worth sending: unique, absolute http(s) with a host,
/// no `data:` URIs, at most `max_images` of them, in input order.
///
/// Scheme-relative URLs (`//host/x.png`) are checked as https but returned
/// unchanged.
pub fn clamp_image_refs(urls: &[String], max_images: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();

    for raw in urls {
        if kept.len() >= max_images {
            warn!("Clamping image references to the first {}", max_images);
            break;
        }
        let url = raw.trim();
        if url.is_empty() || url.starts_with("data:") || seen.contains(url) {
            continue;
        }

        let candidate = if url.starts_with("//") {
            format!("https:{url}")
        } else {
            url.to_string()
        };
        let valid = Url::parse(&candidate).is_ok_and(|parsed| {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some_and(|h| !h.is_empty())
        });
        if !valid {
            warn!(
                "Skipping image reference that is not an http(s) URL: {}",
                url.chars().take(100).collect::<String>()
            );
            continue;
        }

        seen.insert(url);
        kept.push(url.to_string());
    }
    kept
}

/// Build the prompt for `content` under `profile`.
///
/// ## Message layout
///
/// 1. **System**: the shared output constraints ([`SYSTEM_INSTRUCTION`]).
/// 2. **User**: profile header, source context, then the rendered profile
///    template. For images the template receives [`IMAGE_PLACEHOLDER`] and
///    is wrapped in the describe-first instruction; the image itself travels
///    in `images`. Image references, when present, close the message as a
///    numbered list.
pub fn build_prompt(
    profile: &AccessibilityProfile,
    content: &ExtractedContent,
    origin: Option<&str>,
    image_refs: &[String],
) -> RenderedPrompt {
    let (body, images) = match content {
        ExtractedContent::Text { text, .. } => (profile.render(text), Vec::new()),
        ExtractedContent::ImageWithInstruction { image, .. } => (
            format!("{}\n\n{}", IMAGE_INSTRUCTION, profile.render(IMAGE_PLACEHOLDER)),
            vec![image.clone()],
        ),
    };

    let mut user = format!(
        "**Accessibility Profile:** {}\n{}\n\n{}",
        profile.display_name,
        origin_line(origin),
        body
    );
    if !image_refs.is_empty() {
        user.push_str("\n\nImage References:");
        for (i, url) in image_refs.iter().enumerate() {
            user.push_str(&format!("\n- Image {}: {}", i + 1, url));
        }
    }

    RenderedPrompt {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
        images,
        image_refs: image_refs.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::ProfileRegistry;
    use crate::prompts::CONTENT_SLOT;

    fn text(s: &str) -> ExtractedContent {
        ExtractedContent::Text {
            text: s.into(),
            title: "Accessible Text Input".into(),
        }
    }

    #[test]
    fn text_prompt_embeds_content_once() {
        let registry = ProfileRegistry::builtin();
        let prompt = build_prompt(registry.resolve(Some("dyslexia")), &text("The cat sat."), None, &[]);
        assert_eq!(prompt.user.matches("The cat sat.").count(), 1);
        assert!(prompt.user.contains("Dyslexia-Friendly Text"));
        assert!(prompt.user.contains("Direct Input"));
        assert!(!prompt.user.contains(CONTENT_SLOT));
        assert!(prompt.images.is_empty());
        assert!(!prompt.user.contains("Image References"));
        assert_eq!(prompt.system, SYSTEM_INSTRUCTION);
    }

    #[test]
    fn image_prompt_describes_first() {
        let registry = ProfileRegistry::builtin();
        let image = InlineImage {
            mime_type: "image/png".into(),
            data_base64: "AAAA".into(),
        };
        let content = ExtractedContent::ImageWithInstruction {
            image: image.clone(),
            title: "Accessible Image Content: cat.png".into(),
        };
        let prompt = build_prompt(registry.resolve(Some("adhd")), &content, Some("Zoo leaflet"), &[]);
        assert!(prompt.user.contains(IMAGE_INSTRUCTION));
        assert!(prompt.user.contains(IMAGE_PLACEHOLDER));
        assert!(prompt.user.contains("`Zoo leaflet`"));
        assert_eq!(prompt.images, vec![image]);
    }

    #[test]
    fn image_refs_are_listed_after_content() {
        let registry = ProfileRegistry::builtin();
        let refs = vec!["https://a.example/1.png".to_string(), "https://b.example/2.jpg".to_string()];
        let prompt = build_prompt(registry.resolve(None), &text("Body."), None, &refs);
        assert!(prompt
            .user
            .ends_with("Image References:\n- Image 1: https://a.example/1.png\n- Image 2: https://b.example/2.jpg"));
        assert_eq!(prompt.image_refs, refs);
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn clamp_drops_duplicates_data_uris_and_bad_schemes() {
        let kept = clamp_image_refs(
            &urls(&[
                "https://example.org/a.png",
                "https://example.org/a.png",
                "data:image/png;base64,AAAA",
                "ftp://example.org/b.png",
                "javascript:alert(1)",
                "not a url",
                "http://",
                "",
                "//cdn.example.org/c.png",
                "http://example.org/d.gif",
            ]),
            15,
        );
        assert_eq!(
            kept,
            urls(&["https://example.org/a.png", "//cdn.example.org/c.png", "http://example.org/d.gif"])
        );
    }

    #[test]
    fn clamp_caps_count_in_order() {
        let many: Vec<String> = (0..20).map(|i| format!("https://img.example/{i}.png")).collect();
        let kept = clamp_image_refs(&many, 15);
        assert_eq!(kept.len(), 15);
        assert_eq!(kept[0], "https://img.example/0.png");
        assert_eq!(kept[14], "https://img.example/14.png");
        assert!(clamp_image_refs(&many, 0).is_empty());
    }

    #[test]
    fn prompt_is_deterministic() {
        let registry = ProfileRegistry::builtin();
        let p = registry.resolve(None);
        assert_eq!(build_prompt(p, &text("x"), None, &[]), build_prompt(p, &text("x"), None, &[]));
    }
}
