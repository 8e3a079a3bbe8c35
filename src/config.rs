//! Configuration types for accessibility adaptation.
//!
//! All pipeline behaviour is controlled through [`AdaptConfig`], built via
//! its [`AdaptConfigBuilder`]. One struct holds every knob so a config can be
//! shared across concurrent requests and logged as a unit.

use crate::error::AdaptError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for the adaptation pipeline.
///
/// Built via [`AdaptConfig::builder()`] or using [`AdaptConfig::default()`].
///
/// # Example
/// ```rust
/// use a11y_adapt::AdaptConfig;
///
/// let config = AdaptConfig::builder()
///     .model("gemini-2.5-flash")
///     .output_dir("outputs")
///     .max_retries(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AdaptConfig {
    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Rewriting needs some latitude to simplify wording, but should stay
    /// close to the source facts.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Timeout for one model call in seconds. Default: 60.
    ///
    /// A call that exceeds it is reported as a transport failure.
    pub api_timeout_secs: u64,

    /// Extra attempts after a transport failure. Default: 0 (single attempt).
    ///
    /// Safety blocks and empty responses are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Longest text (in characters) sent to the model. Default: 50 000.
    pub max_text_chars: usize,

    /// Pages read from an uploaded PDF. Default: 25.
    pub max_pdf_pages: usize,

    /// Auxiliary image URLs passed to the model per request. Default: 15.
    pub max_images: usize,

    /// Directory that receives generated PDF artifacts. Default: `outputs`.
    pub output_dir: PathBuf,

    /// Prefix of the download reference returned to callers. Default: `/downloads`.
    pub download_base: String,

    /// Render a PDF artifact for each successful request. Default: true.
    pub generate_artifact: bool,

    /// Requests in flight at once in [`crate::Adapter::adapt_batch`]. Default: 4.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional observer for pipeline stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AdaptConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            api_timeout_secs: 60,
            max_retries: 0,
            retry_backoff_ms: 500,
            max_text_chars: 50_000,
            max_pdf_pages: 25,
            max_images: 15,
            output_dir: PathBuf::from("outputs"),
            download_base: "/downloads".to_string(),
            generate_artifact: true,
            concurrency: 4,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AdaptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_text_chars", &self.max_text_chars)
            .field("max_pdf_pages", &self.max_pdf_pages)
            .field("max_images", &self.max_images)
            .field("output_dir", &self.output_dir)
            .field("download_base", &self.download_base)
            .field("generate_artifact", &self.generate_artifact)
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl AdaptConfig {
    /// Create a new builder for `AdaptConfig`.
    pub fn builder() -> AdaptConfigBuilder {
        AdaptConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AdaptConfig`].
#[derive(Debug)]
pub struct AdaptConfigBuilder {
    config: AdaptConfig,
}

impl AdaptConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_text_chars(mut self, n: usize) -> Self {
        self.config.max_text_chars = n;
        self
    }

    pub fn max_pdf_pages(mut self, n: usize) -> Self {
        self.config.max_pdf_pages = n;
        self
    }

    pub fn max_images(mut self, n: usize) -> Self {
        self.config.max_images = n;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn download_base(mut self, base: impl Into<String>) -> Self {
        self.config.download_base = base.into();
        self
    }

    pub fn generate_artifact(mut self, v: bool) -> Self {
        self.config.generate_artifact = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AdaptConfig, AdaptError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(AdaptError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_text_chars < 100 {
            return Err(AdaptError::InvalidConfig(format!(
                "max_text_chars must be ≥ 100, got {}",
                c.max_text_chars
            )));
        }
        if c.max_pdf_pages == 0 {
            return Err(AdaptError::InvalidConfig(
                "max_pdf_pages must be ≥ 1".into(),
            ));
        }
        if c.generate_artifact && c.output_dir.as_os_str().is_empty() {
            return Err(AdaptError::InvalidConfig(
                "output_dir must be set when artifacts are enabled".into(),
            ));
        }
        Ok(self.config)
    }
}
