//! Word (docx) source.
//!
//! Paragraphs styled `Heading N` open a chapter at depth N - 1 and are
//! rendered into the batch text with a matching `#` run. Bold runs keep
//! `** … **` markers so emphasis survives the flattening; tables become
//! Markdown cell grids. The resulting units feed the chapter segmenter
//! like any other text document.
//!
//! Parsing runs under `spawn_blocking`: a docx is a zip of XML parts and
//! decompressing large documents would stall the async workers.

use crate::catalog::RequestCatalog;
use crate::config::{RequestSelection, ReviewConfig};
use crate::error::ReviewError;
use crate::pipeline::report::ReportWriter;
use crate::pipeline::segment::{segment_units, SegmenterConfig};
use crate::source::{chapter_steps, DocumentSource, ReviewStep};
use crate::unit::ContentUnit;
use async_trait::async_trait;
use docx_rs::{
    Bold, DocumentChild, Docx, Paragraph, ParagraphChild, Run, RunChild, Table, TableCell,
    TableCellContent, TableChild, TableRowChild,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Matches both the style id (`Heading1`) and the style name (`heading 1`).
static RE_HEADING_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^heading\s*(\d+)").unwrap());

/// Word documents reviewed chapter by chapter.
pub struct WordSource {
    path: PathBuf,
    segmenter: SegmenterConfig,
    selection: RequestSelection,
}

impl WordSource {
    pub fn new(path: &Path, config: &ReviewConfig) -> Self {
        WordSource {
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
impl DocumentSource for WordSource {
    async fn prepare(
        &mut self,
        catalog: &RequestCatalog,
        report: &mut ReportWriter,
    ) -> Result<Vec<ReviewStep>, ReviewError> {
        info!("opening document: {}", self.path.display());
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ReviewError::DocumentRead {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;
        let units = tokio::task::spawn_blocking(move || {
            docx_rs::read_docx(&bytes).map(|docx| units_from_docx(&docx))
        })
        .await
        .map_err(|e| ReviewError::Internal(format!("DOCX parse task panicked: {e}")))?
        .map_err(|e| ReviewError::DocumentRead {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;

        debug!("{} block unit(s) in {}", units.len(), self.path.display());
        let outcome = segment_units(&units, &self.segmenter);
        chapter_steps(catalog, &self.selection, outcome, report)
    }
}

fn units_from_docx(docx: &Docx) -> Vec<ContentUnit> {
    let mut units = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => units.push(paragraph_unit(paragraph)),
            DocumentChild::Table(table) => {
                units.push(ContentUnit::paragraph(table_to_markdown(table)));
            }
            _ => {}
        }
    }
    units
}

fn paragraph_unit(paragraph: &Paragraph) -> ContentUnit {
    let text = paragraph_text(paragraph);
    match heading_depth(paragraph) {
        Some(depth) => ContentUnit::heading(format!("{} {text}", "#".repeat(depth + 1)), depth),
        None => ContentUnit::paragraph(text),
    }
}

/// 0-based chapter depth from the paragraph style; `Heading 1` is depth 0.
fn heading_depth(paragraph: &Paragraph) -> Option<usize> {
    let style = paragraph.property.style.as_ref()?;
    let captures = RE_HEADING_STYLE.captures(&style.val)?;
    let level: usize = captures[1].parse().ok()?;
    Some(level.saturating_sub(1))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut pieces: Vec<String> = Vec::new();
    for child in &paragraph.children {
        match child {
            ParagraphChild::Run(run) => pieces.push(run_text(run)),
            ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let ParagraphChild::Run(run) = inner {
                        pieces.push(run_text(run));
                    }
                }
            }
            _ => {}
        }
    }
    pieces.join(" ")
}

fn run_text(run: &Run) -> String {
    let text: String = run
        .children
        .iter()
        .filter_map(|child| match child {
            RunChild::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect();
    if run.run_property.bold.as_ref().is_some_and(|b| *b == Bold::new()) {
        format!("** {text} ** ")
    } else {
        text
    }
}

/// Flatten a table into a Markdown grid, first row as the header. Nested
/// tables render inline inside their cell.
fn table_to_markdown(table: &Table) -> String {
    let mut lines: Vec<String> = Vec::new();
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                let TableRowChild::TableCell(cell) = cell;
                cell_text(cell)
            })
            .collect();
        let rendered = format!("| {} |", cells.join(" | "));
        if lines.is_empty() {
            let separator: Vec<&str> = cells.iter().map(|_| "---").collect();
            lines.push(rendered);
            lines.push(format!("| {} |", separator.join(" | ")));
        } else {
            lines.push(rendered);
        }
    }
    lines.join("\n")
}

fn cell_text(cell: &TableCell) -> String {
    let mut parts: Vec<String> = Vec::new();
    for content in &cell.children {
        match content {
            TableCellContent::Paragraph(paragraph) => parts.push(paragraph.raw_text()),
            TableCellContent::Table(nested) => parts.push(table_to_markdown(nested)),
            _ => {}
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewConfig;
    use docx_rs::TableRow;
    use tempfile::tempdir;

    #[test]
    fn heading_styles_map_to_zero_based_depth() {
        let heading = Paragraph::new()
            .add_run(Run::new().add_text("Budget"))
            .style("Heading2");
        let unit = paragraph_unit(&heading);
        assert_eq!(unit.depth, Some(1));
        assert_eq!(unit.text, "## Budget");

        let spaced = Paragraph::new()
            .add_run(Run::new().add_text("Intro"))
            .style("heading 1");
        assert_eq!(heading_depth(&spaced), Some(0));

        let body = Paragraph::new().add_run(Run::new().add_text("plain"));
        assert_eq!(heading_depth(&body), None);
    }

    #[test]
    fn bold_runs_carry_star_markers() {
        let paragraph = Paragraph::new()
            .add_run(Run::new().add_text("Warning").bold())
            .add_run(Run::new().add_text("ahead"));
        assert_eq!(paragraph_text(&paragraph), "** Warning **  ahead");
    }

    #[test]
    fn tables_render_as_markdown_grids() {
        let table = Table::new(vec![
            TableRow::new(vec![
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("A"))),
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("B"))),
            ]),
            TableRow::new(vec![
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("1"))),
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("2"))),
            ]),
        ]);
        assert_eq!(
            table_to_markdown(&table),
            "| A | B |\n| --- | --- |\n| 1 | 2 |"
        );
    }

    #[tokio::test]
    async fn plans_chapter_steps_from_a_packed_document() {
        let dir = tempdir().unwrap();
        let doc_path = dir.path().join("status.docx");
        let file = std::fs::File::create(&doc_path).unwrap();
        Docx::new()
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("Intro"))
                    .style("Heading1"),
            )
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Welcome text.")))
            .build()
            .pack(file)
            .unwrap();

        let mut report = ReportWriter::new(dir.path().join("out.md"), "t", "d", 10).unwrap();
        let catalog = RequestCatalog::load(&[], &[], None, None).unwrap();
        let config = ReviewConfig::default();

        let mut source = WordSource::new(&doc_path, &config);
        let steps = source.prepare(&catalog, &mut report).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title, "Check of content for chapters 1.0.0.0");
        let work = steps[0].work.as_ref().unwrap();
        assert_eq!(work.batch.scope_label, "Chapters 1.0.0.0");
    }
}
