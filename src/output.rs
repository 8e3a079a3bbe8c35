//! Result types returned by the adaptation pipeline.
//!
//! [`AdaptOutput`] is the library-level success value. [`AdaptResponse`] is
//! the flattened, serialisable shape handed to callers that only need the
//! content, a download reference, or an error message (the CLI's `--json`
//! mode, or an HTTP handler).

use crate::error::AdaptError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A rendered PDF written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name inside the output directory, e.g. `accessible_report.pdf`.
    pub file_name: String,
    /// Absolute or config-relative location on disk.
    pub path: PathBuf,
    /// Caller-facing download reference: `{download_base}/{file_name}`.
    pub reference: String,
    pub title: String,
    pub notes: Option<String>,
}

/// Token and timing figures for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptStats {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Model attempts made, including the first.
    pub attempts: u32,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub package_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Successful result of [`crate::Adapter::adapt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptOutput {
    /// Sanitised HTML fragment.
    pub adapted_content: String,
    /// `None` when artifacts are disabled or packaging failed.
    pub artifact: Option<Artifact>,
    /// Key of the profile actually applied (after fallback).
    pub profile_key: String,
    pub title: String,
    pub stats: AdaptStats,
}

/// Caller-facing response: exactly one of `adapted_content` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapted_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdaptResponse {
    pub fn is_success(&self) -> bool {
        self.adapted_content.is_some()
    }
}

impl From<AdaptOutput> for AdaptResponse {
    fn from(out: AdaptOutput) -> Self {
        Self {
            adapted_content: Some(out.adapted_content),
            artifact_reference: out.artifact.map(|a| a.reference),
            error: None,
        }
    }
}

impl From<AdaptError> for AdaptResponse {
    fn from(err: AdaptError) -> Self {
        Self {
            adapted_content: None,
            artifact_reference: None,
            error: Some(err.user_message()),
        }
    }
}

impl From<Result<AdaptOutput, AdaptError>> for AdaptResponse {
    fn from(result: Result<AdaptOutput, AdaptError>) -> Self {
        match result {
            Ok(out) => out.into(),
            Err(err) => err.into(),
        }
    }
}
