//! # doc2review
//!
//! Review PowerPoint, Word, Markdown and PDF documents with LLM prompts and
//! assemble a structured Markdown findings report.
//!
//! ## Why this crate?
//!
//! Reading a sixty-slide deck for grammar, flow, colour discipline and
//! layout glitches is slow and inconsistent. This crate walks the document
//! once, sends each slide (or chapter batch) through a configurable catalog
//! of review prompts against any OpenAI-compatible endpoint — local Ollama
//! and llama.cpp servers included — and assembles the answers into one
//! numbered report with a table of content and a ranked findings summary.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document (pptx | docx | md | pdf)
//!  │
//!  ├─ 1. Source   parse the file into slides or chapter units
//!  ├─ 2. Segment  group text units into chapter batches (token budget)
//!  ├─ 3. Compose  persona + requests + context + JSON payload → messages
//!  ├─ 4. Chat     OpenAI-compatible endpoint, combined or detailed mode
//!  ├─ 5. Report   numbered sections, findings harvesting, ranked summary
//!  └─ 6. Output   Markdown report + run statistics
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2review::{RequestSelection, ReviewConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Endpoint read from OPENAI_BASE_URL / OPENAI_API_KEY
//!     let config = ReviewConfig::builder()
//!         .model("gemma3-27b")
//!         .deck_requests(RequestSelection::Off)
//!         .build()?;
//!     let outcome = doc2review::review_document(Path::new("deck.pptx"), &config).await?;
//!     println!("report: {}", outcome.report_path.display());
//!     eprintln!(
//!         "{} response(s), {} finding scope(s)",
//!         outcome.stats.responses, outcome.stats.finding_scopes
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2review` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! doc2review = { version = "0.3", default-features = false }
//! ```
//!
//! ## Environment
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `OPENAI_BASE_URL` / `OPENAI_API_KEY` | chat endpoint and bearer token |
//! | `DOC2REVIEW_MODEL` | default model name for the CLI |
//! | `DOC2REVIEW_NB_WORKERS` | detailed-mode worker pool size (default 1) |
//! | `DOC2REVIEW_REQUESTS_SLIDE_TEXT` | extra slide text requests, JSON file |
//! | `DOC2REVIEW_REQUESTS_SLIDE_ARTISTIC` | extra artistic requests, JSON file |
//! | `DOC2REVIEW_REQUESTS_DECK` | extra whole-deck requests, JSON file |
//! | `DOC2REVIEW_REQUESTS_PARAGRAPH` | extra chapter requests, JSON file |
//! | `DOC2REVIEW_REQUESTS_POST` | extra pre/post templates, JSON file |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod checker;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod review;
pub mod source;
pub mod unit;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{parse_selection_list, RequestSelection, ReviewConfig, ReviewConfigBuilder};
pub use error::ReviewError;
pub use output::{Response, ReviewOutcome, RunStats};
pub use review::review_document;
pub use source::DocumentKind;
