//! Accessibility profile registry.
//!
//! A profile is a named transformation strategy: a stable key, a label for
//! humans (also printed into the PDF notes block), and a prompt template with
//! one [`CONTENT_SLOT`]. The registry is built once with
//! [`ProfileRegistry::builtin`] and shared read-only between requests.

use crate::prompts::{
    ADHD_TEMPLATE, COGNITIVE_IMPAIRMENT_TEMPLATE, CONTENT_SLOT, DEFAULT_TEMPLATE,
    DYSLEXIA_TEMPLATE, ESL_SIMPLE_ENGLISH_TEMPLATE, VISUAL_IMPAIRMENT_TEMPLATE,
};
use serde::Serialize;
use tracing::debug;

/// Key of the profile used when the caller asks for nothing or for an
/// unknown key.
pub const DEFAULT_PROFILE_KEY: &str = "default";

/// One accessibility transformation strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessibilityProfile {
    pub key: &'static str,
    pub display_name: &'static str,
    #[serde(skip)]
    pub template: &'static str,
}

impl AccessibilityProfile {
    /// Substitute `content` into the template's content slot.
    pub fn render(&self, content: &str) -> String {
        self.template.replacen(CONTENT_SLOT, content, 1)
    }
}

/// Fixed mapping from profile key to [`AccessibilityProfile`].
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    // Small and fixed: a Vec keeps listing order stable for the CLI.
    profiles: Vec<AccessibilityProfile>,
    default_index: usize,
}

impl ProfileRegistry {
    /// The six built-in profiles.
    pub fn builtin() -> Self {
        let profiles = vec![
            AccessibilityProfile {
                key: "dyslexia",
                display_name: "Dyslexia-Friendly Text",
                template: DYSLEXIA_TEMPLATE,
            },
            AccessibilityProfile {
                key: "cognitive_impairment",
                display_name: "Cognitive Impairment-Friendly Summary",
                template: COGNITIVE_IMPAIRMENT_TEMPLATE,
            },
            AccessibilityProfile {
                key: "visual_impairment",
                display_name: "Low Vision / Screen Reader Optimized Text",
                template: VISUAL_IMPAIRMENT_TEMPLATE,
            },
            AccessibilityProfile {
                key: "adhd",
                display_name: "ADHD-Friendly Highlighted Key Points",
                template: ADHD_TEMPLATE,
            },
            AccessibilityProfile {
                key: "esl_simple_english",
                display_name: "ESL / Simple English Translation",
                template: ESL_SIMPLE_ENGLISH_TEMPLATE,
            },
            AccessibilityProfile {
                key: DEFAULT_PROFILE_KEY,
                display_name: "General Accessibility Improvement",
                template: DEFAULT_TEMPLATE,
            },
        ];
        let default_index = profiles.len() - 1;
        Self {
            profiles,
            default_index,
        }
    }

    /// Exact, case-sensitive lookup; anything else yields the default profile.
    pub fn resolve(&self, key: Option<&str>) -> &AccessibilityProfile {
        match key.and_then(|k| self.profiles.iter().find(|p| p.key == k)) {
            Some(profile) => profile,
            None => {
                if let Some(k) = key {
                    debug!("Unknown profile '{}', using '{}'", k, DEFAULT_PROFILE_KEY);
                }
                self.default_profile()
            }
        }
    }

    /// The fallback profile.
    pub fn default_profile(&self) -> &AccessibilityProfile {
        &self.profiles[self.default_index]
    }

    /// Profile keys in registry order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.profiles.iter().map(|p| p.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessibilityProfile> {
        self.profiles.iter()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_has_exactly_one_slot() {
        let registry = ProfileRegistry::builtin();
        for key in registry.keys() {
            let profile = registry.resolve(Some(key));
            assert_eq!(profile.key, key);
            assert_eq!(
                profile.template.matches(CONTENT_SLOT).count(),
                1,
                "profile '{key}' must have one content slot"
            );
        }
    }

    #[test]
    fn registry_holds_required_profiles() {
        let registry = ProfileRegistry::builtin();
        let keys: Vec<_> = registry.keys().collect();
        for required in [
            "dyslexia",
            "cognitive_impairment",
            "visual_impairment",
            "adhd",
            "esl_simple_english",
            "default",
        ] {
            assert!(keys.contains(&required), "missing {required}");
        }
    }

    #[test]
    fn unknown_and_absent_keys_fall_back() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.resolve(None).key, DEFAULT_PROFILE_KEY);
        assert_eq!(registry.resolve(Some("klingon")).key, DEFAULT_PROFILE_KEY);
        assert_eq!(registry.resolve(Some("")).key, DEFAULT_PROFILE_KEY);
        assert!(!registry.resolve(Some("klingon")).template.is_empty());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.resolve(Some("adhd")).key, "adhd");
        assert_eq!(registry.resolve(Some("ADHD")).key, DEFAULT_PROFILE_KEY);
    }

    #[test]
    fn render_fills_slot() {
        let registry = ProfileRegistry::builtin();
        let rendered = registry.resolve(Some("dyslexia")).render("The cat sat.");
        assert!(rendered.contains("The cat sat."));
        assert!(!rendered.contains(CONTENT_SLOT));
    }

    #[test]
    fn render_does_not_expand_slot_inside_content() {
        let registry = ProfileRegistry::builtin();
        let rendered = registry.resolve(None).render("literal {text_content} here");
        assert!(rendered.ends_with("literal {text_content} here"));
    }
}
