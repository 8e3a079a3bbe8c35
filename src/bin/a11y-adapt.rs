//! CLI binary for a11y-adapt.
//!
//! A thin shim over the library crate that maps CLI flags to `AdaptConfig`,
//! builds requests from text, files and URLs, and prints the results.

use a11y_adapt::{
    AdaptConfig, AdaptError, AdaptOutput, AdaptProgressCallback, AdaptResponse, Adapter,
    ProfileRegistry, ProgressCallback, Stage, TransformationRequest,
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the current stage and logs a line per finished stage.
///
/// In batch mode events from several requests interleave; the spinner then
/// simply shows the most recent stage.
struct CliProgressCallback {
    bar: ProgressBar,
    finished: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("a11y-adapt");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            finished: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let done = self.finished.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        if done > 1 {
            eprintln!(
                "{} {}/{} inputs adapted",
                if failed == 0 { green("✔") } else { red("✘") },
                bold(&(done - failed).to_string()),
                done
            );
        }
    }
}

impl AdaptProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{}…", stage.label()));
    }

    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        self.bar
            .println(format!("  {} {:<30} {}", green("✓"), stage.label(), dim(detail)));
    }

    fn on_finish(&self, success: bool, message: &str) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        if success {
            self.bar.println(format!("{} {}", green("✔"), bold(message)));
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!("{} {}", red("✘"), red(message)));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Adapt a sentence for dyslexic readers
  a11y-adapt --text "Photosynthesis converts light energy into chemical energy." --profile dyslexia

  # Adapt a PDF for screen readers, writing the artifact to ./outputs
  a11y-adapt --profile visual_impairment report.pdf

  # Describe an image in simple English, JSON output
  a11y-adapt --profile esl_simple_english --json diagram.png

  # Several inputs at once, 2 in flight
  a11y-adapt -c 2 notes.txt https://example.org/paper.pdf

  # Read text from stdin
  cat article.txt | a11y-adapt --profile adhd -

  # List available profiles (no API key needed)
  a11y-adapt --list-profiles

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (preferred when set)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (PDF input and PDF artifacts)
  RUST_LOG                Log filter, e.g. a11y_adapt=debug

  Variables may also be placed in a .env file in the working directory.
"#;

/// Rewrite text, images and PDFs into accessible HTML.
#[derive(Parser, Debug)]
#[command(
    name = "a11y-adapt",
    version,
    about = "Rewrite text, images and PDFs into accessible HTML with LLM prompt profiles",
    long_about = "Adapt content for readers with dyslexia, ADHD, low vision, cognitive \
impairments, or limited English. Each input is rewritten by a generative model under the \
chosen accessibility profile, sanitised, and optionally rendered into a PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files or HTTP/HTTPS URLs to adapt. Use `-` to read text from stdin.
    inputs: Vec<String>,

    /// Adapt this text directly.
    #[arg(short, long)]
    text: Option<String>,

    /// Accessibility profile key (see --list-profiles). Unknown keys use `default`.
    #[arg(short, long, env = "A11Y_PROFILE")]
    profile: Option<String>,

    /// Where the content came from (page title, URL, …); shown to the model as context.
    #[arg(long)]
    origin: Option<String>,

    /// URL of an image that accompanies the content (repeatable).
    #[arg(long = "image-ref", value_name = "URL")]
    image_refs: Vec<String>,

    /// Max image references passed to the model.
    #[arg(long, env = "A11Y_MAX_IMAGES", default_value_t = 15)]
    max_images: usize,

    /// Print the available profiles and exit.
    #[arg(long)]
    list_profiles: bool,

    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Directory for generated PDF artifacts.
    #[arg(long, env = "A11Y_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Prefix of the download reference printed for each artifact.
    #[arg(long, env = "A11Y_DOWNLOAD_BASE", default_value = "/downloads")]
    download_base: String,

    /// Skip PDF artifact generation.
    #[arg(long, env = "A11Y_NO_ARTIFACT")]
    no_artifact: bool,

    /// Max LLM output tokens.
    #[arg(long, env = "A11Y_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "A11Y_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Extra attempts after a transport failure.
    #[arg(long, env = "A11Y_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Longest input text, in characters, sent to the model.
    #[arg(long, env = "A11Y_MAX_TEXT_CHARS", default_value_t = 50_000)]
    max_text_chars: usize,

    /// Pages read from an uploaded PDF.
    #[arg(long, env = "A11Y_MAX_PDF_PAGES", default_value_t = 25)]
    max_pdf_pages: usize,

    /// Inputs processed concurrently.
    #[arg(short, long, env = "A11Y_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// LLM call timeout in seconds.
    #[arg(long, env = "A11Y_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "A11Y_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output JSON responses instead of HTML.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "A11Y_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "A11Y_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "A11Y_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before parsing so `env = ...` defaults see .env values.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; keep library INFO logs
    // out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Profile listing ──────────────────────────────────────────────────
    if cli.list_profiles {
        print_profiles(&ProfileRegistry::builtin(), cli.json)?;
        return Ok(());
    }

    if cli.text.is_none() && cli.inputs.is_empty() {
        anyhow::bail!("Please provide --text, a file, or a URL to adapt.");
    }

    // ── Build adapter ────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;
    let adapter = Adapter::builder(config).build().context("Failed to set up the adapter")?;

    // ── Resolve inputs ───────────────────────────────────────────────────
    let mut labels = Vec::new();
    let mut requests = Vec::new();
    let mut early: Vec<(String, AdaptError)> = Vec::new();

    if let Some(ref text) = cli.text {
        labels.push("--text".to_string());
        requests.push(with_options(TransformationRequest::text(text.clone()), &cli));
    }
    for input in &cli.inputs {
        match build_request(&adapter, input, &cli).await {
            Ok(request) => {
                labels.push(input.clone());
                requests.push(request);
            }
            Err(e) => early.push((input.clone(), e)),
        }
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let mut results = adapter.adapt_batch(requests).await;
    results.sort_by_key(|(idx, _)| *idx);
    if let Some(ref p) = progress {
        p.finish();
    }

    let mut outcomes: Vec<(String, Result<AdaptOutput, AdaptError>)> = results
        .into_iter()
        .map(|(idx, result)| (labels[idx].clone(), result))
        .collect();
    outcomes.extend(early.into_iter().map(|(label, e)| (label, Err(e))));

    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
    let total = outcomes.len();
    print_outcomes(outcomes, &cli)?;

    if failed > 0 {
        anyhow::bail!("{failed} of {total} input(s) could not be adapted");
    }
    Ok(())
}

/// Map CLI args to `AdaptConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AdaptConfig> {
    let mut builder = AdaptConfig::builder()
        .output_dir(cli.output_dir.clone())
        .download_base(cli.download_base.clone())
        .generate_artifact(!cli.no_artifact)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .max_text_chars(cli.max_text_chars)
        .max_pdf_pages(cli.max_pdf_pages)
        .max_images(cli.max_images)
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn with_options(mut request: TransformationRequest, cli: &Cli) -> TransformationRequest {
    request.profile = cli.profile.clone();
    request.origin = cli.origin.clone();
    request.with_image_refs(cli.image_refs.iter().cloned())
}

/// Turn one positional input into a request.
async fn build_request(adapter: &Adapter, input: &str, cli: &Cli) -> Result<TransformationRequest, AdaptError> {
    let request = if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| AdaptError::Internal(format!("Failed to read stdin: {e}")))?;
        TransformationRequest::text(text)
    } else {
        TransformationRequest::file(adapter.resolve_input(input).await?)
    };
    Ok(with_options(request, cli))
}

fn print_profiles(registry: &ProfileRegistry, json: bool) -> Result<()> {
    if json {
        let profiles: Vec<_> = registry.iter().collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&profiles).context("Failed to serialise profiles")?
        );
    } else {
        for profile in registry.iter() {
            println!("{:<22} {}", bold(profile.key), profile.display_name);
        }
    }
    Ok(())
}

fn print_outcomes(outcomes: Vec<(String, Result<AdaptOutput, AdaptError>)>, cli: &Cli) -> Result<()> {
    if cli.json {
        let entries: Vec<_> = outcomes
            .into_iter()
            .map(|(input, result)| {
                serde_json::json!({
                    "input": input,
                    "response": AdaptResponse::from(result),
                })
            })
            .collect();
        let json = if entries.len() == 1 {
            serde_json::to_string_pretty(&entries[0]["response"])
        } else {
            serde_json::to_string_pretty(&entries)
        }
        .context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let many = outcomes.len() > 1;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for (input, result) in outcomes {
        match result {
            Ok(output) => {
                if many {
                    writeln!(handle, "<!-- {input} -->").context("Failed to write to stdout")?;
                }
                writeln!(handle, "{}", output.adapted_content).context("Failed to write to stdout")?;
                if !cli.quiet {
                    if let Some(ref artifact) = output.artifact {
                        eprintln!("{}  {}", dim("PDF:"), bold(&artifact.reference));
                    }
                    eprintln!(
                        "   {} tokens in  /  {} tokens out  /  {}ms total",
                        dim(&output.stats.input_tokens.to_string()),
                        dim(&output.stats.output_tokens.to_string()),
                        output.stats.total_duration_ms,
                    );
                }
            }
            Err(e) => {
                eprintln!("{} {}: {}", red("✘"), input, e.user_message());
                tracing::debug!("{input}: {e}");
            }
        }
    }
    Ok(())
}
