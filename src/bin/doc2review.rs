//! CLI binary for doc2review.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ReviewConfig`, runs the review and prints the run summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doc2review::catalog::RequestCatalog;
use doc2review::{
    parse_selection_list, review_document, RequestSelection, ReviewConfig, ReviewConfigBuilder,
    ReviewOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review a deck against a local Ollama endpoint
  OPENAI_BASE_URL=http://localhost:11434 doc2review ppt deck.pptx

  # Skip the title and agenda slides, text checks only
  doc2review ppt --skip-slides 1,2 --no-artistic-slide-requests --no-deck-requests deck.pptx

  # Detailed review of a Word document, one response per request
  doc2review --detailed-analysis doc report.docx

  # Review chapters 2 and 3 of a Markdown file with a custom persona
  doc2review --reviewer-properties-path reviewer.txt md --only-paragraphs 2,3 notes.md

  # Summarize every response through post template 1
  doc2review --post-requests 1 pdf paper.pdf

  # Dry run: no endpoint calls, the report shows what would be sent
  doc2review --simulate-calls-only ppt deck.pptx

  # List the request catalogs and their ordinals
  doc2review list-requests

SELECTION SYNTAX:
  Request ordinals and slide numbers use inclusive ranges: 1,3-5,8.
  Chapter selections use dotted path prefixes as printed in the report:
  --only-paragraphs 2,3.1 keeps chapter 2 (with children) and chapter 3.1.

ENVIRONMENT VARIABLES:
  OPENAI_BASE_URL                     Chat endpoint base (default https://api.openai.com)
  OPENAI_API_KEY                      Bearer token; unset or empty sends no auth header
  DOC2REVIEW_MODEL                    Default model name for --model-name
  DOC2REVIEW_NB_WORKERS               Worker pool size in detailed mode (default 1)
  DOC2REVIEW_REQUESTS_SLIDE_TEXT      Extra per-slide text requests (JSON file)
  DOC2REVIEW_REQUESTS_SLIDE_ARTISTIC  Extra per-slide artistic requests (JSON file)
  DOC2REVIEW_REQUESTS_DECK            Extra whole-deck requests (JSON file)
  DOC2REVIEW_REQUESTS_PARAGRAPH       Extra chapter requests (JSON file)
  DOC2REVIEW_REQUESTS_POST            Extra pre/post templates (JSON file)
  RUST_LOG                            Overrides the stderr log filter

  Request prompts may also embed {ENV_VAR} or {ENV_VAR,default} tokens,
  e.g. the built-in extraction request reads DOC2REVIEW_DETAIL_TYPE.

SETUP:
  1. Point at an endpoint:  export OPENAI_BASE_URL=http://localhost:11434
  2. Review:                doc2review ppt deck.pptx
  The report lands next to the input (deck.md) unless --to-document is given.
"#;

/// Review documents with LLM prompts and assemble a findings report.
#[derive(Parser, Debug)]
#[command(
    name = "doc2review",
    version,
    about = "Review PowerPoint, Word, Markdown and PDF documents with LLM prompts",
    long_about = "Review documents against a configurable catalog of LLM prompts and assemble \
the answers into a numbered Markdown report with a table of content and a ranked findings \
summary. Works with any OpenAI-compatible endpoint (OpenAI, Ollama, llama.cpp, vLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Write the review to this file instead of deriving it from the input.
    #[arg(long, global = true, value_name = "FILE")]
    to_document: Option<PathBuf>,

    /// Chat model identifier sent to the endpoint.
    #[arg(
        long,
        env = "DOC2REVIEW_MODEL",
        default_value = "gemma3-27b",
        global = true,
        value_name = "MODEL"
    )]
    model_name: String,

    /// Text file describing the document's context, appended to every call.
    #[arg(long, global = true, value_name = "FILE")]
    context_path: Option<PathBuf>,

    /// One call per request with its own numbered report section, instead
    /// of one merged call per batch.
    #[arg(long, global = true)]
    detailed_analysis: bool,

    /// File describing the reviewer persona to impersonate.
    #[arg(long, global = true, value_name = "FILE")]
    reviewer_properties_path: Option<PathBuf>,

    /// Override the temperature of every request (0.0-2.0).
    #[arg(long, global = true, value_name = "T")]
    force_temperature: Option<f32>,

    /// Override the top_p of every request (0.0-1.0).
    #[arg(long, global = true, value_name = "P")]
    force_top_p: Option<f32>,

    /// Do not call the endpoint; responses echo what would have been sent.
    #[arg(long, global = true)]
    simulate_calls_only: bool,

    /// Pre/post template ordinals to wrap and chain, range syntax 1,2-5.
    #[arg(long, global = true, value_name = "IDS")]
    post_requests: Option<String>,

    /// Model context length in tokens; chapter batches fold to stay under it.
    #[arg(long, default_value_t = 120_000, global = true, value_name = "TOKENS")]
    context_length: usize,

    /// Only warnings and errors on stderr.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Debug-level logs on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Review a PowerPoint deck slide by slide, then as a whole.
    Ppt(PptArgs),
    /// Review a Word document chapter by chapter.
    Doc(TextArgs),
    /// Review a Markdown or plain-text file chapter by chapter.
    Md(TextArgs),
    /// Review a PDF document chapter by chapter.
    Pdf(TextArgs),
    /// Print the request catalogs with their ordinals.
    ListRequests,
}

#[derive(Args, Debug)]
struct PptArgs {
    /// The .pptx file to review.
    input: PathBuf,

    /// Slides to skip, e.g. 1,3-5. Cannot be combined with --only-slides.
    #[arg(long, value_name = "SLIDES", conflicts_with = "only_slides")]
    skip_slides: Option<String>,

    /// Slides to keep, dropping the rest.
    #[arg(long, value_name = "SLIDES")]
    only_slides: Option<String>,

    /// Text request ordinals to run on each slide (default: all).
    #[arg(long, value_name = "IDS", conflicts_with = "no_text_slide_requests")]
    text_slide_requests: Option<String>,

    /// Skip the per-slide text checks.
    #[arg(long)]
    no_text_slide_requests: bool,

    /// Artistic request ordinals to run on each slide (default: all).
    #[arg(long, value_name = "IDS", conflicts_with = "no_artistic_slide_requests")]
    artistic_slide_requests: Option<String>,

    /// Skip the per-slide artistic checks.
    #[arg(long)]
    no_artistic_slide_requests: bool,

    /// Deck request ordinals to run once on the whole deck (default: all).
    #[arg(long, value_name = "IDS", conflicts_with = "no_deck_requests")]
    deck_requests: Option<String>,

    /// Skip the whole-deck check.
    #[arg(long)]
    no_deck_requests: bool,
}

#[derive(Args, Debug)]
struct TextArgs {
    /// The file to review.
    input: PathBuf,

    /// Chapter path prefixes to skip, e.g. 1.2,3. Cannot be combined with
    /// --only-paragraphs.
    #[arg(
        long,
        value_name = "PATHS",
        value_delimiter = ',',
        conflicts_with = "only_paragraphs"
    )]
    skip_paragraphs: Vec<String>,

    /// Chapter path prefixes to keep, dropping the rest.
    #[arg(long, value_name = "PATHS", value_delimiter = ',')]
    only_paragraphs: Vec<String>,

    /// Heading depth (0-based) below which chapters never start a new
    /// batch; -1 lets any heading open one.
    #[arg(long, default_value_t = -1, allow_hyphen_values = true, value_name = "DEPTH")]
    split_depth: i32,

    /// Chapter request ordinals to run on each batch (default: all).
    #[arg(long, value_name = "IDS")]
    paragraph_requests: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The spinner owns the terminal while a review runs; keep the library
    // quiet below warnings unless --verbose asks for more.
    let filter = if cli.global.verbose {
        "debug"
    } else if cli.global.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let outcome = match &cli.command {
        Command::ListRequests => {
            let defaults = ReviewConfig::default();
            let catalog = RequestCatalog::load(&defaults.color_palette, &[], None, None)
                .context("Failed to load the request catalogs")?;
            print!("{}", catalog.describe());
            return Ok(());
        }
        Command::Ppt(args) => {
            let config = ppt_config(&cli.global, args)?;
            run(&cli.global, &config, &args.input).await?
        }
        Command::Doc(args) | Command::Md(args) | Command::Pdf(args) => {
            let config = text_config(&cli.global, args)?;
            run(&cli.global, &config, &args.input).await?
        }
    };

    if !cli.global.quiet {
        let stats = &outcome.stats;
        let tick = if stats.aborted.is_some() {
            cyan("⚠")
        } else {
            green("✔")
        };
        eprintln!(
            "{tick}  {} step(s)  {} request(s) sent  {} response(s) (+{} post)  {:.1}s",
            stats.steps,
            stats.requests_sent,
            stats.responses,
            stats.post_responses,
            stats.duration_ms as f64 / 1000.0,
        );
        if stats.finding_scopes > 0 {
            eprintln!(
                "   {}",
                dim(&format!("{} scope(s) with findings", stats.finding_scopes))
            );
        }
        if let Some(reason) = &stats.aborted {
            eprintln!("   {} {}", red("aborted early:"), reason);
        }
        eprintln!(
            "   →  {}",
            bold(&outcome.report_path.display().to_string())
        );
    }
    Ok(())
}

/// Run one review with a terminal spinner.
async fn run(global: &GlobalArgs, config: &ReviewConfig, input: &Path) -> Result<ReviewOutcome> {
    let bar = if global.quiet || global.verbose {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Reviewing");
        bar.set_message(input.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };

    let outcome = review_document(input, config).await;
    bar.finish_and_clear();
    outcome.context("Review failed")
}

fn ppt_config(global: &GlobalArgs, args: &PptArgs) -> Result<ReviewConfig> {
    let mut builder = global_builder(global)?;
    if let Some(list) = &args.skip_slides {
        builder = builder.skip_slides(parse_selection_list(list).context("--skip-slides")?);
    }
    if let Some(list) = &args.only_slides {
        builder = builder.keep_slides(parse_selection_list(list).context("--only-slides")?);
    }
    builder = builder
        .slide_text_requests(
            selection(args.no_text_slide_requests, args.text_slide_requests.as_deref())
                .context("--text-slide-requests")?,
        )
        .slide_artistic_requests(
            selection(
                args.no_artistic_slide_requests,
                args.artistic_slide_requests.as_deref(),
            )
            .context("--artistic-slide-requests")?,
        )
        .deck_requests(
            selection(args.no_deck_requests, args.deck_requests.as_deref())
                .context("--deck-requests")?,
        );
    builder.build().context("Invalid configuration")
}

fn text_config(global: &GlobalArgs, args: &TextArgs) -> Result<ReviewConfig> {
    global_builder(global)?
        .skip_paragraphs(args.skip_paragraphs.clone())
        .keep_paragraphs(args.only_paragraphs.clone())
        .split_depth(args.split_depth)
        .paragraph_requests(
            selection(false, args.paragraph_requests.as_deref())
                .context("--paragraph-requests")?,
        )
        .build()
        .context("Invalid configuration")
}

/// Builder pre-loaded with the global flags.
fn global_builder(global: &GlobalArgs) -> Result<ReviewConfigBuilder> {
    let mut builder = ReviewConfig::builder()
        .model(&global.model_name)
        .detailed(global.detailed_analysis)
        .simulate(global.simulate_calls_only)
        .context_length(global.context_length);
    if let Some(path) = &global.to_document {
        builder = builder.to_document(path.clone());
    }
    if let Some(path) = &global.context_path {
        builder = builder.context_path(path.clone());
    }
    if let Some(path) = &global.reviewer_properties_path {
        builder = builder.reviewer_path(path.clone());
    }
    if let Some(t) = global.force_temperature {
        builder = builder.force_temperature(t);
    }
    if let Some(p) = global.force_top_p {
        builder = builder.force_top_p(p);
    }
    if let Some(ids) = &global.post_requests {
        builder = builder.post_request_ids(parse_selection_list(ids).context("--post-requests")?);
    }
    Ok(builder)
}

/// Map an off switch plus an optional ordinal list to a selection.
fn selection(off: bool, ids: Option<&str>) -> Result<RequestSelection> {
    if off {
        return Ok(RequestSelection::Off);
    }
    Ok(match ids {
        Some(list) => RequestSelection::Only(parse_selection_list(list)?),
        None => RequestSelection::All,
    })
}
