//! Error types for the a11y-adapt library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AdaptError`]: **fatal** for one request. The input was rejected
//!   (empty, unsupported, unreadable) or the model produced nothing usable.
//!   Returned as `Err(AdaptError)` from [`crate::Adapter::adapt`].
//!
//! * [`GenerationFailure`]: the classified outcome of a single model call.
//!   The invoker returns it as a value so the orchestrator can decide whether
//!   to retry; once retries are exhausted it is wrapped in
//!   [`AdaptError::GenerationFailed`].
//!
//! Callers see a single generic "generation failed" message for every
//! provider-side failure (see [`AdaptError::user_message`]), while logs and
//! [`AdaptError::generation_failure`] keep the sub-kind.

use std::path::PathBuf;
use thiserror::Error;

/// All per-request errors returned by the a11y-adapt library.
#[derive(Debug, Error)]
pub enum AdaptError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither text nor a file was supplied, or the text was blank.
    #[error("Please provide either text input or upload a file.")]
    EmptyInput,

    /// The upload is not text, an image, or a PDF.
    #[error("Unsupported file type '{media_type}'. Please upload an image (jpg, png), a PDF, or a text file.")]
    UnsupportedMediaKind { media_type: String },

    /// The upload was recognised but no usable content could be read from it.
    #[error("Could not extract text from the provided file: {detail}")]
    ExtractionFailed { detail: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model call failed after the orchestrator's retry budget.
    #[error("Failed to generate accessible content: {0}")]
    GenerationFailed(GenerationFailure),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// The PDF artifact could not be rendered or written.
    ///
    /// [`crate::Adapter::adapt`] never returns this; it degrades to a missing
    /// artifact. It is visible only from [`crate::pipeline::package`].
    #[error("Failed to write artifact '{path}': {detail}")]
    PackagingFailed { path: PathBuf, detail: String },

    // ── Engine / config errors ────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdaptError {
    /// True when the request itself was bad and no model call was attempted.
    ///
    /// HTTP front-ends map these to a 4xx status; everything else is a 5xx.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AdaptError::EmptyInput
                | AdaptError::UnsupportedMediaKind { .. }
                | AdaptError::ExtractionFailed { .. }
                | AdaptError::InputNotFound { .. }
        )
    }

    /// The classified model failure, if this error came from the model call.
    pub fn generation_failure(&self) -> Option<&GenerationFailure> {
        match self {
            AdaptError::GenerationFailed(f) => Some(f),
            _ => None,
        }
    }

    /// Message suitable for showing to an end user.
    ///
    /// Provider-side failures collapse into one generic message, except a
    /// safety block which asks the user to rephrase.
    pub fn user_message(&self) -> String {
        match self {
            AdaptError::GenerationFailed(GenerationFailure::Blocked { .. }) => {
                "The AI service declined to process this content. \
                 Please rephrase or try different content."
                    .to_string()
            }
            AdaptError::GenerationFailed(_) => {
                "Failed to generate accessible content. Please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Classified outcome of a failed model invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum GenerationFailure {
    /// The provider's safety filter blocked the prompt or the candidate.
    #[error("blocked by provider safety filter: {reason}")]
    Blocked { reason: String },

    /// Network, timeout, quota or any other provider-side error.
    #[error("provider transport error: {detail}")]
    Transport { detail: String },

    /// The call succeeded but the envelope carried no extractable text.
    #[error("provider returned no extractable text")]
    EmptyResponse,
}

impl GenerationFailure {
    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationFailure::Transport { .. })
    }

    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFailure::Blocked { .. } => "provider_blocked",
            GenerationFailure::Transport { .. } => "provider_transport_error",
            GenerationFailure::EmptyResponse => "provider_empty_response",
        }
    }
}

/// Error returned by a [`crate::pipeline::llm::GenerativeModel`] backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Safety filter tripped.
    #[error("blocked: {0}")]
    Blocked(String),

    /// Anything else: HTTP failure, quota, auth, malformed reply.
    #[error("transport: {0}")]
    Transport(String),
}

impl From<ProviderError> for GenerationFailure {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Blocked(reason) => GenerationFailure::Blocked { reason },
            ProviderError::Transport(detail) => GenerationFailure::Transport { detail },
        }
    }
}
