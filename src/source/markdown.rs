//! Markdown / plain-text source.
//!
//! Lines feed the chapter segmenter as-is: a `#`-run heading advances the
//! structural path (depth = run length - 1) and keeps its hashes in the
//! batch text. `<HEADER>` / `<FOOTER>` marker lines and the closing or
//! self-closing tag lines that follow them are dropped; the content between
//! the markers is kept.

use crate::catalog::RequestCatalog;
use crate::config::{RequestSelection, ReviewConfig};
use crate::error::ReviewError;
use crate::pipeline::report::ReportWriter;
use crate::pipeline::segment::{segment_units, SegmenterConfig};
use crate::source::{chapter_steps, DocumentSource, ReviewStep};
use crate::unit::ContentUnit;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static RE_MARKER_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*<(?:HEADER|FOOTER)>").unwrap());
static RE_MARKER_STOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:</|<[A-Z_]*/>)").unwrap());
static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(#+)[^#]+").unwrap());

/// Plain text files reviewed chapter by chapter.
pub struct MarkdownSource {
    path: PathBuf,
    segmenter: SegmenterConfig,
    selection: RequestSelection,
}

impl MarkdownSource {
    pub fn new(path: &Path, config: &ReviewConfig) -> Self {
        MarkdownSource {
            path: path.to_path_buf(),
            segmenter: SegmenterConfig {
                context_length: config.context_length,
                split_depth: config.split_depth,
                skip: config.skip_paragraphs.clone(),
                keep: config.keep_paragraphs.clone(),
            },
            selection: config.paragraph_requests.clone(),
        }
    }
}

#[async_trait]
impl DocumentSource for MarkdownSource {
    async fn prepare(
        &mut self,
        catalog: &RequestCatalog,
        report: &mut ReportWriter,
    ) -> Result<Vec<ReviewStep>, ReviewError> {
        info!("opening file: {}", self.path.display());
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ReviewError::DocumentRead {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;
        // Invalid byte sequences degrade to replacement characters rather
        // than failing the whole review.
        let raw = String::from_utf8_lossy(&bytes);
        let units = units_from_lines(filter_marker_lines(raw.lines()));
        debug!("{} line unit(s) in {}", units.len(), self.path.display());
        let outcome = segment_units(&units, &self.segmenter);
        chapter_steps(catalog, &self.selection, outcome, report)
    }
}

/// Drop marker lines, keep everything else with trailing whitespace
/// trimmed. A stop tag counts as a marker only after a start marker.
fn filter_marker_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut kept = Vec::new();
    let mut excluded = false;
    for line in lines {
        let line = line.trim_end();
        if !excluded {
            if RE_MARKER_START.is_match(line) {
                excluded = true;
                continue;
            }
        } else if RE_MARKER_STOP.is_match(line) {
            excluded = false;
            continue;
        }
        kept.push(line);
    }
    kept
}

/// 0-based heading depth of a line, `None` for body text. A bare `#` run
/// with no text after it is body text.
fn heading_depth(line: &str) -> Option<usize> {
    RE_HEADING.captures(line).map(|c| c[1].len() - 1)
}

fn units_from_lines(lines: Vec<&str>) -> Vec<ContentUnit> {
    lines
        .into_iter()
        .map(|line| match heading_depth(line) {
            Some(depth) => ContentUnit::heading(line, depth),
            None => ContentUnit::paragraph(line),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewConfig;
    use tempfile::tempdir;

    #[test]
    fn marker_lines_drop_but_content_between_survives() {
        let lines = vec![
            "<HEADER>",
            "Company confidential   ",
            "</HEADER>",
            "# Title",
            "<PAGE/>",
        ];
        let kept = filter_marker_lines(lines.into_iter());
        assert_eq!(kept, vec!["Company confidential", "# Title", "<PAGE/>"]);
    }

    #[test]
    fn self_closing_tag_ends_an_exclusion_block() {
        let lines = vec!["<FOOTER>", "page 4", "<CONFIDENTIAL/>", "body"];
        let kept = filter_marker_lines(lines.into_iter());
        assert_eq!(kept, vec!["page 4", "body"]);
    }

    #[test]
    fn heading_depth_counts_hash_runs() {
        assert_eq!(heading_depth("# One"), Some(0));
        assert_eq!(heading_depth("  ### Deep"), Some(2));
        assert_eq!(heading_depth("####"), None);
        assert_eq!(heading_depth("plain text"), None);
    }

    #[tokio::test]
    async fn plans_one_step_per_chapter_batch() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("notes.md");
        std::fs::write(&doc, "# Intro\nWelcome aboard.\n# Budget\nNumbers here.\n").unwrap();
        let mut report = ReportWriter::new(dir.path().join("out.md"), "t", "d", 10).unwrap();
        let catalog = RequestCatalog::load(&[], &[], None, None).unwrap();
        let config = ReviewConfig::default();

        let mut source = MarkdownSource::new(&doc, &config);
        let steps = source.prepare(&catalog, &mut report).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].title,
            "Check of content for chapters 1.0.0.0, 2.0.0.0"
        );
        let work = steps[0].work.as_ref().unwrap();
        assert_eq!(work.batch.scope_label, "Chapters 1.0.0.0, 2.0.0.0");
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let mut report = ReportWriter::new(dir.path().join("out.md"), "t", "d", 10).unwrap();
        let catalog = RequestCatalog::load(&[], &[], None, None).unwrap();
        let config = ReviewConfig::default();

        let mut source = MarkdownSource::new(&dir.path().join("gone.md"), &config);
        let err = source.prepare(&catalog, &mut report).await.unwrap_err();
        assert!(matches!(err, ReviewError::DocumentRead { .. }));
    }
}
