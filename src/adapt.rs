//! The [`Adapter`]: runs one request through the whole pipeline.
//!
//! ```text
//! request ─▶ profile ─▶ extract ─▶ prompt ─▶ invoke (+retry) ─▶ sanitize ─▶ package
//! ```
//!
//! Every request ends in exactly one `Ok(AdaptOutput)` or one `Err(AdaptError)`.
//! Rejections (empty input, unsupported file, unreadable PDF) return before
//! the model is called. Packaging is best-effort: a failed PDF is logged and
//! the request still succeeds without an artifact.
//!
//! The request is consumed, so a temporary upload it owns is deleted when
//! `adapt` returns, whichever way it returns.

use crate::config::AdaptConfig;
use crate::error::AdaptError;
use crate::output::{AdaptOutput, AdaptResponse, AdaptStats};
use crate::pdfium::{PdfiumEngine, UnavailablePdfEngine};
use crate::pipeline::extract::{Extractor, PdfTextReader};
use crate::pipeline::input::{resolve_input, TransformationRequest, UploadedFile};
use crate::pipeline::llm::{invoke, resolve_model, GenerativeModel, ModelResult};
use crate::pipeline::package::{DocumentRenderer, Packager};
use crate::pipeline::prompt::{build_prompt, clamp_image_refs, RenderedPrompt};
use crate::pipeline::sanitize::sanitize;
use crate::profiles::ProfileRegistry;
use crate::progress::Stage;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Pipeline runner holding the shared, read-only collaborators.
///
/// Cheap to share: wrap it in an `Arc` and call [`Adapter::adapt`] from as
/// many tasks as you like.
pub struct Adapter {
    config: AdaptConfig,
    registry: Arc<ProfileRegistry>,
    model: Arc<dyn GenerativeModel>,
    extractor: Extractor,
    packager: Option<Packager>,
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("model", &self.model.name())
            .field("artifacts", &self.packager.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Adapter {
    pub fn builder(config: AdaptConfig) -> AdapterBuilder {
        AdapterBuilder {
            config,
            registry: None,
            model: None,
            pdf_reader: None,
            renderer: None,
        }
    }

    pub fn config(&self) -> &AdaptConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Resolve a local path or HTTP(S) URL into an upload, downloading URLs
    /// under `config.download_timeout_secs`.
    pub async fn resolve_input(&self, input: &str) -> Result<UploadedFile, AdaptError> {
        resolve_input(input, self.config.download_timeout_secs).await
    }

    /// Run one request through the pipeline.
    pub async fn adapt(&self, request: TransformationRequest) -> Result<AdaptOutput, AdaptError> {
        let result = self.run(&request).await;
        if let Some(ref cb) = self.config.progress_callback {
            match &result {
                Ok(out) => cb.on_finish(true, &out.title),
                Err(e) => cb.on_finish(false, &e.user_message()),
            }
        }
        // `request` drops here, removing any temporary upload.
        result
    }

    /// [`Adapter::adapt`] flattened into the caller-facing response shape.
    pub async fn respond(&self, request: TransformationRequest) -> AdaptResponse {
        self.adapt(request).await.into()
    }

    /// Run independent requests with at most `config.concurrency` in flight.
    ///
    /// Results arrive in completion order, each tagged with the index of its
    /// request in `requests`.
    pub async fn adapt_batch(
        &self,
        requests: Vec<TransformationRequest>,
    ) -> Vec<(usize, Result<AdaptOutput, AdaptError>)> {
        info!("Adapting batch of {} requests", requests.len());
        stream::iter(requests.into_iter().enumerate())
            .map(|(idx, request)| async move { (idx, self.adapt(request).await) })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    async fn run(&self, request: &TransformationRequest) -> Result<AdaptOutput, AdaptError> {
        let total_start = Instant::now();
        let profile = self.registry.resolve(request.profile.as_deref());
        info!("Adapting request with profile '{}'", profile.key);

        // ── Step 1: Extract ──────────────────────────────────────────────
        self.stage_start(Stage::Extract);
        let extract_start = Instant::now();
        let content = self.extractor.extract(&request.source).await.map_err(|e| {
            info!("Request rejected: {}", e);
            e
        })?;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        self.stage_done(Stage::Extract, &content.summary());

        // ── Step 2: Prompt + model call ─────────────────────────────────
        let image_refs = clamp_image_refs(&request.image_refs, self.config.max_images);
        let prompt = build_prompt(profile, &content, request.origin.as_deref(), &image_refs);
        debug!(
            "Prompt: {} system chars, {} user chars, {} image(s), {} image ref(s)",
            prompt.system.len(),
            prompt.user.len(),
            prompt.images.len(),
            prompt.image_refs.len()
        );

        self.stage_start(Stage::Generate);
        let llm_start = Instant::now();
        let (result, attempts) = self.generate(&prompt).await;
        let generated = result.map_err(|failure| {
            warn!(
                "{}: generation failed after {} attempt(s) ({}): {}",
                self.model.name(),
                attempts,
                failure.kind(),
                failure
            );
            AdaptError::GenerationFailed(failure)
        })?;
        let llm_duration_ms = llm_start.elapsed().as_millis() as u64;
        self.stage_done(Stage::Generate, &format!("{} output tokens", generated.output_tokens));

        // ── Step 3: Sanitize ────────────────────────────────────────────
        self.stage_start(Stage::Sanitize);
        let safe = sanitize(&generated.text);
        self.stage_done(Stage::Sanitize, &format!("{} bytes", safe.as_str().len()));

        // ── Step 4: Package (best-effort) ───────────────────────────────
        let title = content.title().to_string();
        let package_start = Instant::now();
        let artifact = match (&self.packager, self.config.generate_artifact) {
            (Some(packager), true) => {
                self.stage_start(Stage::Package);
                let notes = format!("Processed for: {}", profile.display_name);
                match packager.package(&title, &safe, Some(&notes)).await {
                    Ok(artifact) => {
                        self.stage_done(Stage::Package, &artifact.reference);
                        Some(artifact)
                    }
                    Err(e) => {
                        warn!("Artifact skipped for '{}': {}", title, e);
                        None
                    }
                }
            }
            _ => None,
        };
        let package_duration_ms = package_start.elapsed().as_millis() as u64;

        let stats = AdaptStats {
            input_tokens: generated.input_tokens,
            output_tokens: generated.output_tokens,
            attempts,
            extract_duration_ms,
            llm_duration_ms,
            package_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Adapted '{}' in {}ms ({} in / {} out tokens)",
            title, stats.total_duration_ms, stats.input_tokens, stats.output_tokens
        );

        Ok(AdaptOutput {
            adapted_content: safe.into_string(),
            artifact,
            profile_key: profile.key.to_string(),
            title,
            stats,
        })
    }

    /// Invoke the model, retrying transport failures with exponential backoff.
    ///
    /// Returns the final result and the number of attempts made.
    async fn generate(&self, prompt: &RenderedPrompt) -> (ModelResult, u32) {
        let timeout = Duration::from_secs(self.config.api_timeout_secs);
        let mut attempts: u32 = 0;

        loop {
            if attempts > 0 {
                let backoff = self
                    .config
                    .retry_backoff_ms
                    .saturating_mul(1u64 << (attempts - 1).min(16));
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.model.name(),
                    attempts,
                    self.config.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let result = invoke(self.model.as_ref(), prompt, timeout).await;
            attempts += 1;

            match result {
                Err(failure) if failure.is_retryable() && attempts <= self.config.max_retries => {
                    warn!("{}: attempt {} failed: {}", self.model.name(), attempts, failure);
                }
                other => return (other, attempts),
            }
        }
    }

    fn stage_start(&self, stage: Stage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn stage_done(&self, stage: Stage, detail: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, detail);
        }
    }
}

/// Builder for [`Adapter`]. Anything not injected is created from the
/// config and environment at [`AdapterBuilder::build`].
pub struct AdapterBuilder {
    config: AdaptConfig,
    registry: Option<ProfileRegistry>,
    model: Option<Arc<dyn GenerativeModel>>,
    pdf_reader: Option<Arc<dyn PdfTextReader>>,
    renderer: Option<Arc<dyn DocumentRenderer>>,
}

impl AdapterBuilder {
    pub fn registry(mut self, registry: ProfileRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn pdf_reader(mut self, reader: Arc<dyn PdfTextReader>) -> Self {
        self.pdf_reader = Some(reader);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Resolve defaults and assemble the adapter.
    ///
    /// # Errors
    /// [`AdaptError::ProviderNotConfigured`] when no model was injected and
    /// none can be created from the environment.
    pub fn build(self) -> Result<Adapter, AdaptError> {
        let model = match self.model {
            Some(model) => model,
            None => resolve_model(&self.config)?,
        };

        let (pdf_reader, renderer) = match (self.pdf_reader, self.renderer) {
            (Some(reader), Some(renderer)) => (reader, renderer),
            (reader, renderer) => {
                let (default_reader, default_renderer) = default_pdf_engine();
                (
                    reader.unwrap_or(default_reader),
                    renderer.unwrap_or(default_renderer),
                )
            }
        };

        let extractor = Extractor::new(pdf_reader, self.config.max_text_chars, self.config.max_pdf_pages);
        let packager = self.config.generate_artifact.then(|| {
            Packager::new(
                renderer,
                self.config.output_dir.clone(),
                self.config.download_base.clone(),
            )
        });

        info!("Adapter ready: model {}", model.name());
        Ok(Adapter {
            config: self.config,
            registry: Arc::new(self.registry.unwrap_or_default()),
            model,
            extractor,
            packager,
        })
    }
}

fn default_pdf_engine() -> (Arc<dyn PdfTextReader>, Arc<dyn DocumentRenderer>) {
    match PdfiumEngine::locate() {
        Ok(engine) => {
            let engine = Arc::new(engine);
            let reader: Arc<dyn PdfTextReader> = engine.clone();
            let renderer: Arc<dyn DocumentRenderer> = engine;
            (reader, renderer)
        }
        Err(e) => {
            warn!("PDF support disabled: {}", e);
            let engine = Arc::new(UnavailablePdfEngine::new(e.to_string()));
            let reader: Arc<dyn PdfTextReader> = engine.clone();
            let renderer: Arc<dyn DocumentRenderer> = engine;
            (reader, renderer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationFailure, ProviderError};
    use crate::pipeline::llm::ModelEnvelope;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Flaky {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeModel for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _prompt: &RenderedPrompt) -> Result<ModelEnvelope, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ProviderError::Transport("HTTP 503".into()));
            }
            Ok(ModelEnvelope::from_text("<p>done</p>"))
        }
    }

    struct NoPdf;

    impl PdfTextReader for NoPdf {
        fn page_texts(&self, _path: &Path, _max_pages: usize) -> Result<Vec<String>, AdaptError> {
            Ok(vec![])
        }
    }

    impl DocumentRenderer for NoPdf {
        fn render(&self, _doc: &crate::pipeline::package::LayoutDocument, _dest: &Path) -> Result<(), AdaptError> {
            Ok(())
        }
    }

    fn adapter(model: Arc<dyn GenerativeModel>, config: AdaptConfig) -> Adapter {
        Adapter::builder(config)
            .model(model)
            .pdf_reader(Arc::new(NoPdf))
            .renderer(Arc::new(NoPdf))
            .build()
            .unwrap()
    }

    fn flaky(failures: usize) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let model = flaky(1);
        let a = adapter(model.clone(), AdaptConfig::builder().generate_artifact(false).build().unwrap());
        let err = a.adapt(TransformationRequest::text("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            AdaptError::GenerationFailed(GenerationFailure::Transport { .. })
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_are_retried() {
        let model = flaky(2);
        let config = AdaptConfig::builder()
            .generate_artifact(false)
            .max_retries(2)
            .retry_backoff_ms(10)
            .build()
            .unwrap();
        let out = adapter(model.clone(), config)
            .adapt(TransformationRequest::text("hello"))
            .await
            .unwrap();
        assert_eq!(out.adapted_content, "<p>done</p>");
        assert_eq!(out.stats.attempts, 3);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[derive(Default)]
    struct Stages(Mutex<Vec<Stage>>);

    impl crate::progress::AdaptProgressCallback for Stages {
        fn on_stage_start(&self, stage: Stage) {
            self.0.lock().unwrap().push(stage);
        }
    }

    #[tokio::test]
    async fn stages_are_reported_in_order() {
        let stages = Arc::new(Stages::default());
        let dir = tempfile::tempdir().unwrap();
        let config = AdaptConfig::builder()
            .output_dir(dir.path())
            .progress_callback(stages.clone())
            .build()
            .unwrap();
        let out = adapter(flaky(0), config)
            .adapt(TransformationRequest::text("hello").with_profile("adhd"))
            .await
            .unwrap();
        assert_eq!(out.profile_key, "adhd");
        assert_eq!(
            *stages.0.lock().unwrap(),
            vec![Stage::Extract, Stage::Generate, Stage::Sanitize, Stage::Package]
        );
    }

    #[tokio::test]
    async fn batch_tags_results_with_index() {
        let a = adapter(flaky(0), AdaptConfig::builder().generate_artifact(false).build().unwrap());
        let mut results = a
            .adapt_batch(vec![
                TransformationRequest::text("one"),
                TransformationRequest::text("   "),
                TransformationRequest::text("three"),
            ])
            .await;
        results.sort_by_key(|(i, _)| *i);
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(AdaptError::EmptyInput)));
        assert!(results[2].1.is_ok());
    }

    #[tokio::test]
    async fn resolve_input_keeps_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let a = adapter(flaky(0), AdaptConfig::builder().generate_artifact(false).build().unwrap());

        let file = a.resolve_input(path.to_str().unwrap()).await.unwrap();
        assert_eq!(file.path(), path.as_path());
        assert!(!file.is_temporary());
    }

    #[tokio::test]
    async fn url_download_uses_configured_timeout() {
        // Accepts connections at the socket level but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/slow.txt", listener.local_addr().unwrap());
        let config = AdaptConfig::builder()
            .generate_artifact(false)
            .download_timeout_secs(1)
            .build()
            .unwrap();
        let a = adapter(flaky(0), config);

        match a.resolve_input(&url).await.unwrap_err() {
            AdaptError::DownloadFailed { reason, .. } => {
                assert!(reason.contains("timed out after 1s"), "unexpected reason: {reason}")
            }
            other => panic!("expected DownloadFailed, got {other:?}"),
        }
        drop(listener);
    }
}
