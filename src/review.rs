//! Top-level driver: validate, plan, check, report.
//!
//! [`review_document`] wires the stages together: it resolves the
//! configuration into a catalog, persona and report writer, lets the format
//! adapter plan its steps, drives every step through the engine writing the
//! responses as they arrive, and closes the report. Fatal provider errors
//! stop the run but never the report: whatever was reviewed up to that
//! point is flushed together with its summary.

use crate::catalog::{CatalogKind, RequestCatalog};
use crate::checker::PostProcessChecker;
use crate::config::{RequestSelection, ReviewConfig};
use crate::error::ReviewError;
use crate::output::{Response, ReviewOutcome, RunStats};
use crate::pipeline::chat::{ChatProvider, OpenAiCompatProvider, SimulatedProvider};
use crate::pipeline::engine::{AccessMode, LlmAccess};
use crate::pipeline::report::ReportWriter;
use crate::prompts;
use crate::source::{self, DocumentKind, ReviewStep};
use crate::unit::{BatchPayload, ReviewBatch};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Review one document and write its Markdown report.
///
/// Returns the report path and the run counters. A fatal provider error
/// (context overflow, explicit internal server error) aborts the remaining
/// steps, records itself in [`RunStats::aborted`] and still flushes the
/// report; every other error propagates.
pub async fn review_document(
    input: &Path,
    config: &ReviewConfig,
) -> Result<ReviewOutcome, ReviewError> {
    let started = Instant::now();

    let is_file = tokio::fs::metadata(input)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ReviewError::FileNotFound {
            path: input.to_path_buf(),
        });
    }
    let kind = DocumentKind::from_path(input)?;

    let context = match &config.context_path {
        Some(path) => Some(tokio::fs::read_to_string(path).await.map_err(|_| {
            ReviewError::ContextFileNotFound { path: path.clone() }
        })?),
        None => None,
    };
    let reviewer = match &config.reviewer_path {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|_| {
            ReviewError::ReviewerFileNotFound { path: path.clone() }
        })?,
        None => prompts::DEFAULT_REVIEWER.to_string(),
    };
    let persona_set = prompts::persona_set(reviewer.trim(), kind.is_slide_deck());

    let catalog = RequestCatalog::load(
        &config.color_palette,
        &config.post_request_ids,
        config.force_temperature,
        config.force_top_p,
    )?;

    let title = if config.detailed {
        format!("Detailed Review Of Filename {}", input.display())
    } else {
        format!("Review Of Filename {}", input.display())
    };
    let mut report = ReportWriter::new(
        output_path(input, config),
        &title,
        prompts::REPORT_INTRODUCTION,
        config.max_important_findings,
    )?;
    document_configuration(&mut report, input, kind, config, &catalog)?;

    let provider: Arc<dyn ChatProvider> = if config.simulate {
        info!("simulation requested, no endpoint will be called");
        Arc::new(SimulatedProvider::new(config.detailed))
    } else {
        Arc::new(OpenAiCompatProvider::from_env()?)
    };
    let mode = if config.detailed {
        AccessMode::Detailed
    } else {
        AccessMode::Combined
    };
    let engine = LlmAccess::new(provider, mode, config.model.clone(), persona_set, context);

    let mut source = source::open(input, config)?;
    let steps = source.prepare(&catalog, &mut report).await?;

    let mut stats = RunStats {
        steps: steps.len(),
        ..RunStats::default()
    };
    run_steps(&engine, &catalog, &mut report, steps, &mut stats).await?;

    stats.finding_scopes = report.scopes_with_findings();
    stats.duration_ms = started.elapsed().as_millis() as u64;
    let report_path = report.out_path().to_path_buf();
    report.flush_and_close()?;
    info!("review written to {}", report_path.display());
    Ok(ReviewOutcome { report_path, stats })
}

/// Drive the planned steps through the engine.
///
/// A fatal provider error records itself in `stats.aborted` and returns
/// `Ok` so the caller still flushes the report.
async fn run_steps(
    engine: &LlmAccess,
    catalog: &RequestCatalog,
    report: &mut ReportWriter,
    steps: Vec<ReviewStep>,
    stats: &mut RunStats,
) -> Result<(), ReviewError> {
    for step in steps {
        report.add_title(step.title_rank, &step.title)?;
        let Some(work) = step.work else { continue };

        stats.batches += 1;
        let responses = match engine.check(work.checker.as_ref(), &work.batch).await {
            Ok(responses) => responses,
            Err(e) if e.is_fatal_provider_error() => {
                warn!("{e}, leaving application");
                stats.aborted = Some(e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        stats.requests_sent += responses.len();
        stats.responses += responses.len();

        // Chain depth is capped at one: follow-ups queue behind the
        // primaries and never enqueue further work.
        let mut follow_ups: Vec<(Option<String>, String)> = Vec::new();
        for response in &responses {
            write_response(report, &work.batch, response)?;
            if response.post_request_name.is_some() || catalog.has_post_stage() {
                follow_ups.push((response.post_request_name.clone(), response.text.clone()));
            }
        }

        for (post_name, text) in follow_ups {
            let checker = PostProcessChecker::new(catalog, post_name.as_deref());
            let batch = ReviewBatch {
                scope_label: format!("Post process: {}", work.batch.scope_label),
                payload: BatchPayload::Text(text),
                format_description: None,
                numbered_response_titles: work.batch.numbered_response_titles,
                response_title_rank: work.batch.response_title_rank,
                done_marker: None,
            };
            stats.batches += 1;
            let post_responses = match engine.check(&checker, &batch).await {
                Ok(responses) => responses,
                Err(e) if e.is_fatal_provider_error() => {
                    warn!("{e}, leaving application");
                    stats.aborted = Some(e.to_string());
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            stats.requests_sent += post_responses.len();
            stats.post_responses += post_responses.len();
            for response in &post_responses {
                write_response(report, &batch, response)?;
            }
        }

        if let Some(marker) = &work.batch.done_marker {
            info!("{marker} done");
        }
    }
    Ok(())
}

/// Write one response under the current section: a numbered title or an
/// inline bold header, then the body with its findings harvested.
fn write_response(
    report: &mut ReportWriter,
    batch: &ReviewBatch,
    response: &Response,
) -> Result<(), ReviewError> {
    if batch.numbered_response_titles {
        report.add_title(
            batch.response_title_rank,
            &format!(
                "{} (temperature: {}, top_p: {})",
                response.request_name, response.temperature, response.top_p
            ),
        )?;
    } else {
        report.document(&format!(
            "**{}** (temperature: {}, top_p: {})",
            response.request_name, response.temperature, response.top_p
        ))?;
    }
    report.document_response(&batch.scope_label, &response.text)
}

/// Report path: configured, or the input with its extension replaced.
/// Reviewing a Markdown file keeps its full name so the report never
/// overwrites the input.
fn output_path(input: &Path, config: &ReviewConfig) -> PathBuf {
    if let Some(path) = &config.to_document {
        return path.clone();
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("review");
    let suffix = if config.detailed { "-detailed.md" } else { ".md" };
    let candidate = input.with_file_name(format!("{stem}{suffix}"));
    if candidate == input {
        let name = input
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("review");
        return input.with_file_name(format!("{name}{suffix}"));
    }
    candidate
}

fn document_configuration(
    report: &mut ReportWriter,
    input: &Path,
    kind: DocumentKind,
    config: &ReviewConfig,
    catalog: &RequestCatalog,
) -> Result<(), ReviewError> {
    report.add_title(1, "Configuration")?;
    let mode = match (config.detailed, config.simulate) {
        (false, false) => "combined".to_string(),
        (true, false) => "detailed".to_string(),
        (detailed, true) => {
            format!("{} (simulated)", if detailed { "detailed" } else { "combined" })
        }
    };
    let out = report.out_path().display().to_string();
    report.document(&format!("Model: {}", config.model))?;
    report.document(&format!("Mode: {mode}"))?;
    report.document(&format!("Input: {}", input.display()))?;
    report.document(&format!("Output: {out}"))?;
    if let Some(path) = &config.context_path {
        report.document(&format!("Context file: {}", path.display()))?;
    }
    if let Some(path) = &config.reviewer_path {
        report.document(&format!("Reviewer file: {}", path.display()))?;
    }

    if kind.is_slide_deck() {
        if !config.skip_slides.is_empty() {
            report.document(&format!("Skipping slides: {}", number_list(&config.skip_slides)))?;
        }
        if !config.keep_slides.is_empty() {
            report.document(&format!("Keeping only slides: {}", number_list(&config.keep_slides)))?;
        }
        document_selection(
            report,
            "Text requests applied on each slide",
            catalog,
            CatalogKind::SlideText,
            &config.slide_text_requests,
        )?;
        document_selection(
            report,
            "Artistic requests applied on each slide",
            catalog,
            CatalogKind::SlideArtistic,
            &config.slide_artistic_requests,
        )?;
        document_selection(
            report,
            "Requests applied on the whole deck",
            catalog,
            CatalogKind::Deck,
            &config.deck_requests,
        )?;
    } else {
        if !config.skip_paragraphs.is_empty() {
            report.document(&format!(
                "Skipping chapters: {}",
                config.skip_paragraphs.join(", ")
            ))?;
        }
        if !config.keep_paragraphs.is_empty() {
            report.document(&format!(
                "Keeping only chapters: {}",
                config.keep_paragraphs.join(", ")
            ))?;
        }
        document_selection(
            report,
            "Requests applied on each chapter batch",
            catalog,
            CatalogKind::Paragraph,
            &config.paragraph_requests,
        )?;
    }

    if !config.post_request_ids.is_empty() {
        report.document(&format!(
            "Post templates: {}",
            number_list(&config.post_request_ids)
        ))?;
    }
    Ok(())
}

/// One line per selected request, `* {ordinal}: {name}`, or `none`.
fn document_selection(
    report: &mut ReportWriter,
    label: &str,
    catalog: &RequestCatalog,
    kind: CatalogKind,
    selection: &RequestSelection,
) -> Result<(), ReviewError> {
    if selection.is_off() {
        report.document(&format!("{label}: none"))?;
        return Ok(());
    }
    let ordinals: Vec<usize> = match selection.indices() {
        Some(ids) => {
            let mut ids = ids.to_vec();
            ids.sort_unstable();
            ids.dedup();
            ids
        }
        None => (0..catalog.len(kind)).collect(),
    };
    let requests = catalog.select(kind, selection.indices())?;
    let mut lines = format!("{label}:");
    for (ordinal, request) in ordinals.iter().zip(&requests) {
        lines.push_str(&format!("\n* {ordinal}: {}", request.name));
    }
    report.document(&lines)?;
    Ok(())
}

fn number_list(values: &[usize]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn simulated_config() -> ReviewConfig {
        ReviewConfig::builder().simulate(true).build().unwrap()
    }

    #[test]
    fn output_path_replaces_the_extension() {
        let config = ReviewConfig::default();
        assert_eq!(
            output_path(Path::new("/tmp/deck.pptx"), &config),
            PathBuf::from("/tmp/deck.md")
        );

        let detailed = ReviewConfig::builder().detailed(true).build().unwrap();
        assert_eq!(
            output_path(Path::new("/tmp/deck.pptx"), &detailed),
            PathBuf::from("/tmp/deck-detailed.md")
        );

        let custom = ReviewConfig::builder()
            .to_document(PathBuf::from("/tmp/out.md"))
            .build()
            .unwrap();
        assert_eq!(
            output_path(Path::new("/tmp/deck.pptx"), &custom),
            PathBuf::from("/tmp/out.md")
        );
    }

    #[tokio::test]
    async fn missing_input_is_reported_before_anything_runs() {
        let dir = tempdir().unwrap();
        let err = review_document(&dir.path().join("gone.md"), &simulated_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_context_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("notes.md");
        std::fs::write(&doc, "# Intro\nWelcome aboard.\n").unwrap();
        let config = ReviewConfig::builder()
            .simulate(true)
            .context_path(dir.path().join("missing-context.txt"))
            .build()
            .unwrap();

        let err = review_document(&doc, &config).await.unwrap_err();
        assert!(matches!(err, ReviewError::ContextFileNotFound { .. }));
    }

    #[tokio::test]
    async fn simulated_markdown_run_writes_a_complete_report() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("notes.md");
        std::fs::write(&doc, "# Intro\nWelcome aboard, this is a plan.\n").unwrap();

        let outcome = review_document(&doc, &simulated_config()).await.unwrap();

        assert_eq!(outcome.report_path, dir.path().join("notes.md.md"));
        let written = std::fs::read_to_string(&outcome.report_path).unwrap();
        assert!(written.starts_with("# Review Of Filename "));
        assert!(written.contains("# Configuration"));
        assert!(written.contains("Model: gemma3-27b"));
        assert!(written.contains("## Table of content"));
        assert!(written.contains("No calls performed"));
        assert!(outcome.stats.steps >= 1);
        assert!(outcome.stats.responses >= 1);
        assert!(outcome.stats.aborted.is_none());
        assert!(!dir
            .path()
            .join("notes.md.md.temporary")
            .exists());
    }

    #[tokio::test]
    async fn selected_post_templates_chain_one_follow_up_per_response() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("notes.md");
        std::fs::write(&doc, "# Intro\nWelcome aboard, this is a plan.\n").unwrap();
        let config = ReviewConfig::builder()
            .simulate(true)
            .post_request_ids(vec![1])
            .build()
            .unwrap();

        let outcome = review_document(&doc, &config).await.unwrap();

        assert!(outcome.stats.post_responses >= 1);
        assert_eq!(outcome.stats.responses, outcome.stats.post_responses);
        let written = std::fs::read_to_string(&outcome.report_path).unwrap();
        assert!(written.contains("Summary finding"));
    }
}
