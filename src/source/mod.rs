//! Document sources: format adapters that turn an input file into a review
//! plan.
//!
//! ## The capability seam
//!
//! Each supported format implements [`DocumentSource`]. An adapter parses
//! its file, writes the skip markers it owes the report, and yields ordered
//! [`ReviewStep`]s; the driver runs those steps without knowing which format
//! produced them. Format quirks (hidden slides, heading styles, numbered
//! PDF lines) never leak past the adapter that owns them.
//!
//! Text formats (Word, Markdown, PDF) share one tail: their units run
//! through the chapter segmenter and [`chapter_steps`] turns the outcome
//! into the plan. Slide decks plan per slide and skip segmentation.

pub mod markdown;
pub mod pdf;
pub mod pptx;
pub mod slides;
pub mod word;

use crate::catalog::RequestCatalog;
use crate::checker::{ChapterChecker, Checker};
use crate::config::{RequestSelection, ReviewConfig};
use crate::error::ReviewError;
use crate::pipeline::report::ReportWriter;
use crate::pipeline::segment::SegmentOutcome;
use crate::unit::ReviewBatch;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// A checker plus the batch it runs against.
#[derive(Debug)]
pub struct ReviewWork {
    pub checker: Box<dyn Checker>,
    pub batch: ReviewBatch,
}

/// One entry of a source's review plan: a report section title, optionally
/// with work to run under it.
#[derive(Debug)]
pub struct ReviewStep {
    /// Heading rank of the section title, 1-based.
    pub title_rank: usize,
    pub title: String,
    pub work: Option<ReviewWork>,
}

impl ReviewStep {
    /// A section title with nothing to check.
    pub fn heading(title_rank: usize, title: impl Into<String>) -> Self {
        ReviewStep {
            title_rank,
            title: title.into(),
            work: None,
        }
    }

    /// A section title with a batch to check under it.
    pub fn review(
        title_rank: usize,
        title: impl Into<String>,
        checker: Box<dyn Checker>,
        batch: ReviewBatch,
    ) -> Self {
        ReviewStep {
            title_rank,
            title: title.into(),
            work: Some(ReviewWork { checker, batch }),
        }
    }
}

/// A format adapter: parse the input and build the review plan.
#[async_trait]
pub trait DocumentSource: Send {
    /// Parse the document and plan its review.
    ///
    /// Skip markers are written to `report` here so they land before any
    /// reviewed content, in document order.
    async fn prepare(
        &mut self,
        catalog: &RequestCatalog,
        report: &mut ReportWriter,
    ) -> Result<Vec<ReviewStep>, ReviewError>;
}

/// Supported input formats, detected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Slides,
    Word,
    Markdown,
    Pdf,
}

impl DocumentKind {
    /// Detect the format from the extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, ReviewError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "pptx" => Ok(DocumentKind::Slides),
            "docx" => Ok(DocumentKind::Word),
            "md" | "txt" => Ok(DocumentKind::Markdown),
            "pdf" => Ok(DocumentKind::Pdf),
            _ => Err(ReviewError::UnsupportedDocumentType {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    /// Slide decks get per-slide checks and JSON payloads; everything else
    /// runs through the chapter segmenter.
    pub fn is_slide_deck(self) -> bool {
        matches!(self, DocumentKind::Slides)
    }
}

/// Open the adapter matching a path.
pub fn open(path: &Path, config: &ReviewConfig) -> Result<Box<dyn DocumentSource>, ReviewError> {
    let kind = DocumentKind::from_path(path)?;
    debug!("resolved '{}' as a {:?} source", path.display(), kind);
    Ok(match kind {
        DocumentKind::Slides => Box::new(slides::SlideSource::new(path, config)),
        DocumentKind::Word => Box::new(word::WordSource::new(path, config)),
        DocumentKind::Markdown => Box::new(markdown::MarkdownSource::new(path, config)),
        DocumentKind::Pdf => Box::new(pdf::PdfSource::new(path, config)),
    })
}

/// Shared text-format tail: write one marker per skipped chapter, then one
/// rank-1 step per chapter batch.
pub(crate) fn chapter_steps(
    catalog: &RequestCatalog,
    selection: &RequestSelection,
    outcome: SegmentOutcome,
    report: &mut ReportWriter,
) -> Result<Vec<ReviewStep>, ReviewError> {
    for chapter in &outcome.skipped {
        report.document(&format!(
            "**Skipped chapter {} as per request.**",
            chapter.path
        ))?;
    }
    if selection.is_off() {
        return Ok(Vec::new());
    }
    let mut steps = Vec::with_capacity(outcome.chapters.len());
    for chapter in outcome.chapters {
        let checker = ChapterChecker::new(catalog, selection.indices(), &chapter.chapter_list())?;
        steps.push(ReviewStep::review(
            1,
            chapter.title(),
            Box::new(checker),
            chapter.into_batch(),
        ));
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::segment::{ChapterBatch, SkippedChapter};
    use tempfile::tempdir;

    #[test]
    fn extension_detection_is_case_insensitive() {
        let kind = DocumentKind::from_path(Path::new("deck.PPTX")).unwrap();
        assert_eq!(kind, DocumentKind::Slides);
        assert!(kind.is_slide_deck());
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.txt")).unwrap(),
            DocumentKind::Markdown
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("paper.pdf")).unwrap(),
            DocumentKind::Pdf
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = DocumentKind::from_path(Path::new("image.png")).unwrap_err();
        assert!(matches!(
            err,
            ReviewError::UnsupportedDocumentType { extension, .. } if extension == "png"
        ));
    }

    #[test]
    fn chapter_plan_markers_then_one_step_per_batch() {
        let dir = tempdir().unwrap();
        let mut report = ReportWriter::new(dir.path().join("out.md"), "t", "d", 10).unwrap();
        let catalog = RequestCatalog::load(&[], &[], None, None).unwrap();
        let outcome = SegmentOutcome {
            chapters: vec![ChapterBatch {
                text: "# One\nbody\n".into(),
                paths: vec!["1.0.0.0".into()],
            }],
            skipped: vec![SkippedChapter {
                path: "2.0.0.0".into(),
                title: "Two".into(),
            }],
        };

        let steps =
            chapter_steps(&catalog, &RequestSelection::All, outcome, &mut report).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title_rank, 1);
        assert_eq!(steps[0].title, "Check of content for chapters 1.0.0.0");
        let work = steps[0].work.as_ref().unwrap();
        assert!(!work.checker.requests().is_empty());
        assert_eq!(work.batch.scope_label, "Chapters 1.0.0.0");
        assert_eq!(
            work.batch.done_marker.as_deref(),
            Some("Chapters 1.0.0.0")
        );

        report.flush_and_close().unwrap();
        let out = std::fs::read_to_string(dir.path().join("out.md")).unwrap();
        assert!(out.contains("**Skipped chapter 2.0.0.0 as per request.**"));
    }

    #[test]
    fn disabled_paragraph_requests_plan_nothing() {
        let dir = tempdir().unwrap();
        let mut report = ReportWriter::new(dir.path().join("out.md"), "t", "d", 10).unwrap();
        let catalog = RequestCatalog::load(&[], &[], None, None).unwrap();
        let outcome = SegmentOutcome {
            chapters: vec![ChapterBatch {
                text: "body".into(),
                paths: vec![],
            }],
            skipped: vec![],
        };

        let steps =
            chapter_steps(&catalog, &RequestSelection::Off, outcome, &mut report).unwrap();
        assert!(steps.is_empty());
    }
}
