//! PDF source.
//!
//! `pdf-extract` yields plain text without font metadata, so headings are
//! recognised by their decimal section numbers: a short line starting
//! `2 `, `2.3 ` or `3.1.4. ` opens a chapter at depth components - 1.
//! Recognised headings are rendered into the batch text with a matching
//! `#` run; everything else passes through as body text.
//!
//! Extraction runs under `spawn_blocking`: it is CPU-bound and some
//! malformed documents make the parser panic, which the join boundary
//! turns into an error instead of poisoning the runtime.

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

/// Lines with more words than this are body text even when numbered.
const MAX_HEADING_WORDS: usize = 10;

static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+\S").unwrap());

/// PDF files reviewed chapter by chapter.
pub struct PdfSource {
    path: PathBuf,
    segmenter: SegmenterConfig,
    selection: RequestSelection,
}

impl PdfSource {
    pub fn new(path: &Path, config: &ReviewConfig) -> Self {
        PdfSource {
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
impl DocumentSource for PdfSource {
    async fn prepare(
        &mut self,
        catalog: &RequestCatalog,
        report: &mut ReportWriter,
    ) -> Result<Vec<ReviewStep>, ReviewError> {
        info!("extracting text from {}", self.path.display());
        let path = self.path.clone();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
            .await
            .map_err(|e| ReviewError::Internal(format!("PDF extraction task panicked: {e}")))?
            .map_err(|e| ReviewError::DocumentRead {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;

        let units = units_from_text(&text);
        debug!("{} line unit(s) in {}", units.len(), self.path.display());
        let outcome = segment_units(&units, &self.segmenter);
        chapter_steps(catalog, &self.selection, outcome, report)
    }
}

/// 0-based depth of a decimal-numbered heading line, `None` for body text.
/// `2.3 Budget` has two number components, depth 1.
fn numbered_heading_depth(line: &str) -> Option<usize> {
    let captures = RE_NUMBERED_HEADING.captures(line)?;
    if line.split_whitespace().count() > MAX_HEADING_WORDS {
        return None;
    }
    Some(captures[1].split('.').count() - 1)
}

fn units_from_text(text: &str) -> Vec<ContentUnit> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match numbered_heading_depth(line) {
            Some(depth) => {
                ContentUnit::heading(format!("{} {line}", "#".repeat(depth + 1)), depth)
            }
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
    fn numbered_lines_map_to_component_depth() {
        assert_eq!(numbered_heading_depth("7 Overview"), Some(0));
        assert_eq!(numbered_heading_depth("2.3 Budget"), Some(1));
        assert_eq!(numbered_heading_depth("3.1.4. Risk register"), Some(2));
    }

    #[test]
    fn prose_is_not_a_heading() {
        assert_eq!(numbered_heading_depth("Plain sentence."), None);
        assert_eq!(numbered_heading_depth("2."), None);
        assert_eq!(
            numbered_heading_depth("4 a very long sentence that keeps going well past the cap"),
            None
        );
    }

    #[test]
    fn extracted_lines_become_trimmed_units() {
        let units = units_from_text("Preamble\n\n  2 Scope  \nDetails follow.\n");
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["Preamble", "# 2 Scope", "Details follow."]);
        assert_eq!(units[0].depth, None);
        assert_eq!(units[1].depth, Some(0));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let mut report = ReportWriter::new(dir.path().join("out.md"), "t", "d", 10).unwrap();
        let catalog = RequestCatalog::load(&[], &[], None, None).unwrap();
        let config = ReviewConfig::default();

        let mut source = PdfSource::new(&dir.path().join("gone.pdf"), &config);
        let err = source.prepare(&catalog, &mut report).await.unwrap_err();
        assert!(matches!(err, ReviewError::DocumentRead { .. }));
    }
}
