//! Model interaction: send a [`RenderedPrompt`] and classify the reply.
//!
//! The pipeline talks to a [`GenerativeModel`], never to a vendor SDK. The
//! production implementation, [`EdgequakeModel`], wraps any
//! `edgequake_llm::LLMProvider`; tests inject scripted models.
//!
//! ## One attempt per call
//!
//! [`invoke`] makes exactly one attempt bounded by a timeout and returns a
//! [`ModelResult`]. Retrying is the orchestrator's decision (see
//! [`crate::Adapter`]), so a safety block or an empty answer is never sent
//! twice.
//!
//! ## Envelope extraction
//!
//! Providers disagree on where the text lives: some return candidate parts,
//! some a flat text field. [`extract_text`] is the single place that decides,
//! in order: concatenated non-empty parts, then the flat text, then nothing.

use crate::config::{AdaptConfig, DEFAULT_MODEL};
use crate::error::{AdaptError, GenerationFailure, ProviderError};
use crate::pipeline::prompt::RenderedPrompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Raw reply from a model backend, before text extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelEnvelope {
    /// Candidate content parts, in order.
    pub parts: Vec<String>,
    /// Flat text accessor, when the backend offers one.
    pub text: Option<String>,
    /// Set when the provider's safety filter refused the prompt or answer.
    pub block_reason: Option<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl ModelEnvelope {
    /// Envelope holding a single flat text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            block_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Text produced by a successful model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

pub type ModelResult = Result<Generated, GenerationFailure>;

/// A text-generation backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Label for logs, e.g. `gemini/gemini-2.5-flash`.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &RenderedPrompt) -> Result<ModelEnvelope, ProviderError>;
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:html|HTML)?[ \t]*\n(.*?)\n?```$").unwrap());

fn strip_outer_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match RE_OUTER_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Pull the generated text out of an envelope, or `None` if there is none.
pub fn extract_text(envelope: &ModelEnvelope) -> Option<String> {
    let joined: String = envelope
        .parts
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(String::as_str)
        .collect();

    let raw = if !joined.trim().is_empty() {
        joined
    } else {
        envelope
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())?
            .to_string()
    };

    let text = strip_outer_fence(&raw);
    (!text.is_empty()).then(|| text.to_string())
}

/// One model attempt under `timeout`.
pub async fn invoke(
    model: &dyn GenerativeModel,
    prompt: &RenderedPrompt,
    timeout: Duration,
) -> ModelResult {
    let start = Instant::now();

    let envelope = match tokio::time::timeout(timeout, model.generate(prompt)).await {
        Err(_) => {
            return Err(GenerationFailure::Transport {
                detail: format!("no response within {}s", timeout.as_secs()),
            })
        }
        Ok(Err(e)) => return Err(e.into()),
        Ok(Ok(envelope)) => envelope,
    };

    if let Some(reason) = envelope.block_reason.clone() {
        return Err(GenerationFailure::Blocked { reason });
    }

    let Some(text) = extract_text(&envelope) else {
        warn!("{}: response carried no extractable text", model.name());
        return Err(GenerationFailure::EmptyResponse);
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(
        "{}: {} input tokens, {} output tokens, {}ms",
        model.name(),
        envelope.input_tokens,
        envelope.output_tokens,
        duration_ms
    );

    Ok(Generated {
        text,
        input_tokens: envelope.input_tokens,
        output_tokens: envelope.output_tokens,
        duration_ms,
    })
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// [`GenerativeModel`] backed by an `edgequake_llm` provider.
pub struct EdgequakeModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
}

impl EdgequakeModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &AdaptConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// Phrases providers use when a safety filter fires.
const BLOCK_MARKERS: [&str; 5] = [
    "safety",
    "content filter",
    "content_filter",
    "prohibited_content",
    "blocked",
];

fn classify_provider_error(message: String) -> ProviderError {
    let lower = message.to_lowercase();
    if BLOCK_MARKERS.iter().any(|m| lower.contains(m)) {
        ProviderError::Blocked(message)
    } else {
        ProviderError::Transport(message)
    }
}

#[async_trait]
impl GenerativeModel for EdgequakeModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &RenderedPrompt) -> Result<ModelEnvelope, ProviderError> {
        let images: Vec<ImageData> = prompt
            .images
            .iter()
            .map(|img| ImageData::new(img.data_base64.clone(), img.mime_type.clone()).with_detail("high"))
            .collect();

        let messages = vec![
            ChatMessage::system(prompt.system.as_str()),
            ChatMessage::user_with_images(prompt.user.as_str(), images),
        ];
        let options = self.build_options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_provider_error(e.to_string()))?;

        Ok(ModelEnvelope {
            parts: Vec::new(),
            text: Some(response.content),
            block_reason: None,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AdaptError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AdaptError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn env_set(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve the model backend, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. Gemini when `GEMINI_API_KEY` is set, else `ProviderFactory::from_env`.
pub fn resolve_model(config: &AdaptConfig) -> Result<Arc<dyn GenerativeModel>, AdaptError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    let (provider, label) = if let Some(ref provider) = config.provider {
        (Arc::clone(provider), format!("custom/{model}"))
    } else if let Some(ref name) = config.provider_name {
        (create_provider(name, model)?, format!("{name}/{model}"))
    } else if let (Some(prov), Some(env_model)) =
        (env_set("EDGEQUAKE_LLM_PROVIDER"), env_set("EDGEQUAKE_MODEL"))
    {
        let label = format!("{prov}/{env_model}");
        (create_provider(&prov, &env_model)?, label)
    } else if env_set("GEMINI_API_KEY").is_some() {
        (create_provider("gemini", model)?, format!("gemini/{model}"))
    } else {
        let (llm, _embedding) =
            ProviderFactory::from_env().map_err(|e| AdaptError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                    Error: {}",
                    e
                ),
            })?;
        (llm, "auto".to_string())
    };

    debug!("Using model backend {}", label);
    Ok(Arc::new(EdgequakeModel::new(provider, label, config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        reply: Result<ModelEnvelope, ProviderError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(reply: Result<ModelEnvelope, ProviderError>) -> Self {
            Self {
                reply,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &RenderedPrompt) -> Result<ModelEnvelope, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn prompt() -> RenderedPrompt {
        RenderedPrompt {
            system: "sys".into(),
            user: "user".into(),
            images: vec![],
            image_refs: vec![],
        }
    }

    #[test]
    fn parts_win_over_text() {
        let env = ModelEnvelope {
            parts: vec!["<p>a</p>".into(), "  ".into(), "<p>b</p>".into()],
            text: Some("<p>flat</p>".into()),
            ..Default::default()
        };
        assert_eq!(extract_text(&env).as_deref(), Some("<p>a</p><p>b</p>"));
    }

    #[test]
    fn text_used_when_parts_blank() {
        let env = ModelEnvelope {
            parts: vec![" ".into()],
            text: Some("<p>flat</p>".into()),
            ..Default::default()
        };
        assert_eq!(extract_text(&env).as_deref(), Some("<p>flat</p>"));
    }

    #[test]
    fn nothing_yields_none() {
        assert_eq!(extract_text(&ModelEnvelope::default()), None);
        assert_eq!(extract_text(&ModelEnvelope::from_text("   ")), None);
    }

    #[test]
    fn html_fence_is_stripped() {
        let env = ModelEnvelope::from_text("```html\n<p>Hi</p>\n```\n");
        assert_eq!(extract_text(&env).as_deref(), Some("<p>Hi</p>"));
        let bare = ModelEnvelope::from_text("```\n<h1>T</h1>\n```");
        assert_eq!(extract_text(&bare).as_deref(), Some("<h1>T</h1>"));
    }

    #[test]
    fn inner_fences_are_kept() {
        let text = "<p>Use:</p>\n```\ncode\n```\n<p>end</p>";
        assert_eq!(extract_text(&ModelEnvelope::from_text(text)).as_deref(), Some(text));
    }

    #[test]
    fn safety_errors_are_blocks() {
        assert!(matches!(
            classify_provider_error("Response blocked: SAFETY".into()),
            ProviderError::Blocked(_)
        ));
        assert!(matches!(
            classify_provider_error("HTTP 503 Service Unavailable".into()),
            ProviderError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn invoke_success() {
        let model = Scripted::new(Ok(ModelEnvelope {
            text: Some("<p>ok</p>".into()),
            input_tokens: 12,
            output_tokens: 3,
            ..Default::default()
        }));
        let gen = invoke(&model, &prompt(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(gen.text, "<p>ok</p>");
        assert_eq!((gen.input_tokens, gen.output_tokens), (12, 3));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invoke_blocked() {
        let model = Scripted::new(Ok(ModelEnvelope::blocked("SAFETY")));
        let err = invoke(&model, &prompt(), Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, GenerationFailure::Blocked { reason: "SAFETY".into() });
    }

    #[tokio::test]
    async fn invoke_empty() {
        let model = Scripted::new(Ok(ModelEnvelope::default()));
        let err = invoke(&model, &prompt(), Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, GenerationFailure::EmptyResponse);
    }

    #[tokio::test]
    async fn invoke_transport_error() {
        let model = Scripted::new(Err(ProviderError::Transport("connection reset".into())));
        let err = invoke(&model, &prompt(), Duration::from_secs(5)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_times_out() {
        let mut model = Scripted::new(Ok(ModelEnvelope::from_text("late")));
        model.delay = Duration::from_secs(120);
        let err = invoke(&model, &prompt(), Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, GenerationFailure::Transport { .. }));
    }
}
