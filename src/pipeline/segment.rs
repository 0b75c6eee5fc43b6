//! Chapter segmentation for text documents.
//!
//! Word, Markdown and PDF sources produce a flat stream of
//! [`ContentUnit`]s; this stage folds that stream into chapter batches that
//! fit the configured token budget. Headings advance the dotted structural
//! path and the skip/keep lists are evaluated against it for every unit, so
//! a filtered heading drops its whole body as well.
//!
//! The fold keeps two buffers: the accumulator (batch under construction)
//! and the pending chapter (everything since the last heading). Each
//! retained heading either folds the pending chapter into the accumulator
//! or, when the budget would overflow or the heading sits at or above the
//! forced split depth, flushes the accumulator as one batch and promotes
//! the pending chapter to accumulator. A batch therefore always ends on a
//! chapter boundary and carries the paths of exactly the chapters whose
//! text it contains.

use tracing::{debug, info};

use crate::unit::{
    advance_path, normalize_path_filter, path_matches, path_retained, BatchPayload, ContentUnit,
    ReviewBatch, INITIAL_PATH,
};

/// Rendered in chapter labels when a batch holds only pre-heading text.
pub const NO_CHAPTER_FOUND: &str = "<No chapter found!>";

/// Estimated token count of `text`: non-whitespace characters divided by
/// 2.8, truncated. Coarse, but stable across providers and cheap enough to
/// run on every heading.
pub fn estimate_tokens(text: &str) -> usize {
    (non_whitespace_len(text) as f64 / 2.8) as usize
}

fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Budget and filtering knobs for [`segment_units`].
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Token budget per batch, for the source text alone.
    pub context_length: usize,
    /// Headings at a 0-based depth below this value always start a new
    /// batch. `-1` disables depth-forced splits.
    pub split_depth: i32,
    /// Dotted path prefixes to drop, e.g. `2.` or `3.1`.
    pub skip: Vec<String>,
    /// Dotted path prefixes to keep; empty keeps everything not skipped.
    pub keep: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        SegmenterConfig {
            context_length: 120_000,
            split_depth: -1,
            skip: Vec::new(),
            keep: Vec::new(),
        }
    }
}

/// One flushed batch: the accumulated chapter text plus the dotted paths of
/// the chapters it contains, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBatch {
    pub text: String,
    pub paths: Vec<String>,
}

impl ChapterBatch {
    /// Comma-joined chapter paths, or [`NO_CHAPTER_FOUND`] for text that
    /// precedes the first heading.
    pub fn chapter_list(&self) -> String {
        if self.paths.is_empty() {
            NO_CHAPTER_FOUND.to_string()
        } else {
            self.paths.join(", ")
        }
    }

    /// Step title shown in the report for this batch.
    pub fn title(&self) -> String {
        format!("Check of content for chapters {}", self.chapter_list())
    }

    /// Findings scope for responses to this batch.
    pub fn scope(&self) -> String {
        format!("Chapters {}", self.chapter_list())
    }

    pub fn into_batch(self) -> ReviewBatch {
        let scope = self.scope();
        ReviewBatch {
            scope_label: scope.clone(),
            payload: BatchPayload::Text(self.text),
            format_description: None,
            numbered_response_titles: true,
            response_title_rank: 2,
            done_marker: Some(scope),
        }
    }
}

/// A heading dropped by the skip list. The source writes one report marker
/// per event; keep-list misses stay silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChapter {
    pub path: String,
    pub title: String,
}

/// What [`segment_units`] produced for one document.
#[derive(Debug, Clone, Default)]
pub struct SegmentOutcome {
    pub chapters: Vec<ChapterBatch>,
    pub skipped: Vec<SkippedChapter>,
}

/// Fold `units` into chapter batches under `config`'s budget and filters.
///
/// Units with a heading depth advance the structural path; all units are
/// retained or dropped according to the path current at that point. The
/// pre-heading sentinel path `0.0.0.0` is filtered like any other.
pub fn segment_units(units: &[ContentUnit], config: &SegmenterConfig) -> SegmentOutcome {
    let skip = normalize_path_filter(&config.skip);
    let keep = normalize_path_filter(&config.keep);
    let keep_filter = (!keep.is_empty()).then_some(keep.as_slice());
    let budget = config.context_length.max(1);

    let mut chapters: Vec<ChapterBatch> = Vec::new();
    let mut skipped: Vec<SkippedChapter> = Vec::new();
    let mut accumulator = String::new();
    let mut accumulator_paths: Vec<String> = Vec::new();
    let mut pending = String::new();
    let mut pending_paths: Vec<String> = Vec::new();
    let mut path = INITIAL_PATH.to_string();
    let mut last_flush_depth: i32 = -1;

    for unit in units {
        if let Some(depth) = unit.depth {
            path = advance_path(&path, depth);
            if path_matches(&path, &skip) {
                info!("chapter {path} skipped as per request");
                skipped.push(SkippedChapter {
                    path: path.clone(),
                    title: heading_title(&unit.text),
                });
                continue;
            }
            if !keep.is_empty() && !path_matches(&path, &keep) {
                debug!("chapter {path} not in the keep list, dropped");
                continue;
            }

            let depth = depth as i32;
            let folded = non_whitespace_len(&accumulator) + non_whitespace_len(&pending);
            if ((folded as f64 / 2.8) as usize) < budget
                && depth > last_flush_depth
                && depth >= config.split_depth
            {
                accumulator.push_str(&pending);
                pending.clear();
                accumulator_paths.append(&mut pending_paths);
            } else if !accumulator.is_empty() {
                debug!("flushing batch at depth {depth}, path {path}");
                last_flush_depth = depth;
                chapters.push(ChapterBatch {
                    text: std::mem::take(&mut accumulator),
                    paths: std::mem::take(&mut accumulator_paths),
                });
                accumulator = std::mem::take(&mut pending);
                accumulator_paths = std::mem::take(&mut pending_paths);
            }
            pending_paths.push(path.clone());
            pending.push_str(&unit.text);
            pending.push('\n');
        } else if path_retained(&path, &skip, keep_filter) {
            pending.push_str(&unit.text);
            pending.push('\n');
        }
    }

    accumulator.push_str(&pending);
    accumulator_paths.append(&mut pending_paths);
    if !accumulator.is_empty() {
        chapters.push(ChapterBatch {
            text: accumulator,
            paths: accumulator_paths,
        });
    }

    info!("prepared {} chapter batches", chapters.len());
    for chapter in &chapters {
        let pct = (estimate_tokens(&chapter.text) * 10_000 / budget) as f64 / 100.0;
        info!("{}: {pct}% context length used", chapter.title());
    }

    SegmentOutcome { chapters, skipped }
}

/// Heading text with the markdown rank markers removed.
fn heading_title(text: &str) -> String {
    text.trim_start()
        .trim_start_matches('#')
        .trim()
        .to_string()
}
