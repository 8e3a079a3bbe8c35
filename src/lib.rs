//! # a11y-adapt
//!
//! Rewrite text, images and PDFs into accessible HTML with a generative
//! language model, then package the result as a downloadable PDF.
//!
//! ## Why this crate?
//!
//! Readers with dyslexia, ADHD, low vision, cognitive impairments, or limited
//! English each need the same content shaped differently. An *accessibility
//! profile* names one such shape as a prompt template. The pipeline feeds
//! the user's content through the chosen template, treats the model's HTML
//! as untrusted and filters it through a strict allow-list, then lays it out
//! as a simple PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! TransformationRequest
//!  │
//!  ├─ 1. Input     text, local file, URL, or in-memory upload
//!  ├─ 2. Extract   text pass-through | PDF page text | inline image
//!  ├─ 3. Prompt    system constraints + profile template
//!  ├─ 4. Invoke    one model call under a timeout (+ optional retries)
//!  ├─ 5. Sanitize  ammonia allow-list, placeholder on collapse
//!  └─ 6. Package   A4 PDF via pdfium (best-effort)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a11y_adapt::{AdaptConfig, Adapter, TransformationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let adapter = Adapter::builder(AdaptConfig::default()).build()?;
//!     let request = TransformationRequest::text("The mitochondria is the powerhouse of the cell.")
//!         .with_profile("dyslexia");
//!     let output = adapter.adapt(request).await?;
//!     println!("{}", output.adapted_content);
//!     if let Some(artifact) = output.artifact {
//!         eprintln!("PDF: {}", artifact.reference);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Profiles
//!
//! | Key | Display name |
//! |-----|--------------|
//! | `dyslexia` | Dyslexia-Friendly Text |
//! | `cognitive_impairment` | Cognitive Impairment-Friendly Summary |
//! | `visual_impairment` | Low Vision / Screen Reader Optimized Text |
//! | `adhd` | ADHD-Friendly Highlighted Key Points |
//! | `esl_simple_english` | ESL / Simple English Translation |
//! | `default` | General Accessibility Improvement |
//!
//! Unknown keys fall back to `default`.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `a11y-adapt` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapt;
pub mod config;
pub mod error;
pub mod output;
pub mod pdfium;
pub mod pipeline;
pub mod profiles;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use adapt::{Adapter, AdapterBuilder};
pub use config::{AdaptConfig, AdaptConfigBuilder};
pub use error::{AdaptError, GenerationFailure, ProviderError};
pub use output::{AdaptOutput, AdaptResponse, AdaptStats, Artifact};
pub use pdfium::{PdfiumEngine, UnavailablePdfEngine};
pub use pipeline::encode::InlineImage;
pub use pipeline::extract::{ExtractedContent, PdfTextReader};
pub use pipeline::input::{InputSource, MediaKind, TransformationRequest, UploadedFile};
pub use pipeline::llm::{GenerativeModel, ModelEnvelope};
pub use pipeline::package::{DocumentRenderer, LayoutBlock, LayoutDocument, TextRun};
pub use pipeline::prompt::RenderedPrompt;
pub use pipeline::sanitize::{sanitize, SafeMarkup};
pub use profiles::{AccessibilityProfile, ProfileRegistry};
pub use progress::{AdaptProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
