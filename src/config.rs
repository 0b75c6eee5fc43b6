//! Run configuration for a document review.
//!
//! Everything that shapes a run lives in one immutable [`ReviewConfig`],
//! built via its [`ReviewConfigBuilder`] and passed by reference through the
//! pipeline. No stage mutates it and no stage reads configuration from
//! anywhere else, so two runs with equal configs behave identically.
//!
//! # Design choice: builder over constructor
//! A twenty-field constructor is unreadable and breaks on every added
//! field. The builder lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::error::ReviewError;
use std::path::PathBuf;

/// Configuration for one review run.
///
/// Built via [`ReviewConfig::builder()`] or using
/// [`ReviewConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2review::{RequestSelection, ReviewConfig};
///
/// let config = ReviewConfig::builder()
///     .model("gemma3-27b")
///     .simulate(true)
///     .deck_requests(RequestSelection::Off)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Chat model identifier sent to the endpoint. Default: `gemma3-27b`.
    pub model: String,

    /// Detailed mode: one call per request instead of one merged call per
    /// batch, and every response gets its own numbered report section.
    /// Default: false.
    pub detailed: bool,

    /// Simulate calls: no network, deterministic echo responses describing
    /// what would have been sent. Default: false.
    pub simulate: bool,

    /// Override the temperature of every catalog entry. Range: 0.0–2.0.
    pub force_temperature: Option<f32>,

    /// Override the top_p of every catalog entry. Range: 0.0–1.0.
    pub force_top_p: Option<f32>,

    /// Model context length in tokens; chapter batches are folded to stay
    /// under it. Default: 120 000. Must be ≥ 1.
    pub context_length: usize,

    /// Heading depth (0-based) below which chapters never start a new batch.
    /// `-1` lets any heading open one. Default: -1.
    pub split_depth: i32,

    /// Colour palette handed to the artistic slide requests. Default:
    /// `green`, `purple`.
    pub color_palette: Vec<String>,

    /// Pre/post template ordinals to wrap around every primary request and
    /// chain after every response. Default: none.
    pub post_request_ids: Vec<usize>,

    /// Text requests to run per slide. Default: all.
    pub slide_text_requests: RequestSelection,

    /// Artistic requests to run per slide. Default: all.
    pub slide_artistic_requests: RequestSelection,

    /// Requests to run once against the whole deck. Default: all.
    pub deck_requests: RequestSelection,

    /// Requests to run per chapter batch of a text document. Default: all.
    pub paragraph_requests: RequestSelection,

    /// 1-based slide numbers to drop. Mutually exclusive with `keep_slides`.
    pub skip_slides: Vec<usize>,

    /// 1-based slide numbers to keep, dropping the rest. Mutually exclusive
    /// with `skip_slides`.
    pub keep_slides: Vec<usize>,

    /// Dotted chapter-path prefixes to drop, e.g. `1.2`. Mutually exclusive
    /// with `keep_paragraphs`.
    pub skip_paragraphs: Vec<String>,

    /// Dotted chapter-path prefixes to keep, dropping the rest. Mutually
    /// exclusive with `skip_paragraphs`.
    pub keep_paragraphs: Vec<String>,

    /// Extra context file appended to every call. Missing file is an error.
    pub context_path: Option<PathBuf>,

    /// Reviewer persona file; without it the built-in persona is used.
    pub reviewer_path: Option<PathBuf>,

    /// Report output path. Default: input path with its extension replaced
    /// by `.md` (`-detailed.md` in detailed mode).
    pub to_document: Option<PathBuf>,

    /// Scopes and findings listed per section of the closing summary.
    /// Default: 10.
    pub max_important_findings: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            model: "gemma3-27b".to_string(),
            detailed: false,
            simulate: false,
            force_temperature: None,
            force_top_p: None,
            context_length: 120_000,
            split_depth: -1,
            color_palette: vec!["green".to_string(), "purple".to_string()],
            post_request_ids: Vec::new(),
            slide_text_requests: RequestSelection::default(),
            slide_artistic_requests: RequestSelection::default(),
            deck_requests: RequestSelection::default(),
            paragraph_requests: RequestSelection::default(),
            skip_slides: Vec::new(),
            keep_slides: Vec::new(),
            skip_paragraphs: Vec::new(),
            keep_paragraphs: Vec::new(),
            context_path: None,
            reviewer_path: None,
            to_document: None,
            max_important_findings: 10,
        }
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn detailed(mut self, v: bool) -> Self {
        self.config.detailed = v;
        self
    }

    pub fn simulate(mut self, v: bool) -> Self {
        self.config.simulate = v;
        self
    }

    pub fn force_temperature(mut self, t: f32) -> Self {
        self.config.force_temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn force_top_p(mut self, p: f32) -> Self {
        self.config.force_top_p = Some(p.clamp(0.0, 1.0));
        self
    }

    pub fn context_length(mut self, tokens: usize) -> Self {
        self.config.context_length = tokens.max(1);
        self
    }

    pub fn split_depth(mut self, depth: i32) -> Self {
        self.config.split_depth = depth;
        self
    }

    pub fn color_palette(mut self, palette: Vec<String>) -> Self {
        self.config.color_palette = palette;
        self
    }

    pub fn post_request_ids(mut self, ids: Vec<usize>) -> Self {
        self.config.post_request_ids = ids;
        self
    }

    pub fn slide_text_requests(mut self, selection: RequestSelection) -> Self {
        self.config.slide_text_requests = selection;
        self
    }

    pub fn slide_artistic_requests(mut self, selection: RequestSelection) -> Self {
        self.config.slide_artistic_requests = selection;
        self
    }

    pub fn deck_requests(mut self, selection: RequestSelection) -> Self {
        self.config.deck_requests = selection;
        self
    }

    pub fn paragraph_requests(mut self, selection: RequestSelection) -> Self {
        self.config.paragraph_requests = selection;
        self
    }

    pub fn skip_slides(mut self, slides: Vec<usize>) -> Self {
        self.config.skip_slides = slides;
        self
    }

    pub fn keep_slides(mut self, slides: Vec<usize>) -> Self {
        self.config.keep_slides = slides;
        self
    }

    pub fn skip_paragraphs(mut self, paths: Vec<String>) -> Self {
        self.config.skip_paragraphs = paths;
        self
    }

    pub fn keep_paragraphs(mut self, paths: Vec<String>) -> Self {
        self.config.keep_paragraphs = paths;
        self
    }

    pub fn context_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.context_path = Some(path.into());
        self
    }

    pub fn reviewer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.reviewer_path = Some(path.into());
        self
    }

    pub fn to_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.to_document = Some(path.into());
        self
    }

    pub fn max_important_findings(mut self, n: usize) -> Self {
        self.config.max_important_findings = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if !c.skip_slides.is_empty() && !c.keep_slides.is_empty() {
            return Err(ReviewError::ConflictingSelection {
                what: "slides".into(),
            });
        }
        if !c.skip_paragraphs.is_empty() && !c.keep_paragraphs.is_empty() {
            return Err(ReviewError::ConflictingSelection {
                what: "paragraphs".into(),
            });
        }
        if c.context_length == 0 {
            return Err(ReviewError::InvalidConfig(
                "Context length must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Selections ───────────────────────────────────────────────────────────

/// Which entries of a primary request catalog to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestSelection {
    /// Run every catalog entry (default).
    #[default]
    All,
    /// Run the entries at these zero-based catalog positions.
    Only(Vec<usize>),
    /// Run nothing; the check stage is dropped entirely.
    Off,
}

impl RequestSelection {
    /// Index filter as the catalog expects it: `None` selects everything.
    /// Meaningless for [`RequestSelection::Off`]; callers check
    /// [`is_off`](Self::is_off) first.
    pub fn indices(&self) -> Option<&[usize]> {
        match self {
            RequestSelection::All | RequestSelection::Off => None,
            RequestSelection::Only(ids) => Some(ids),
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, RequestSelection::Off)
    }
}

/// Parse a `1,3-5,8` style selection list into a sorted, deduplicated
/// number list. Ranges are inclusive on both ends.
pub fn parse_selection_list(value: &str) -> Result<Vec<usize>, ReviewError> {
    let invalid = || ReviewError::InvalidRange {
        value: value.to_string(),
    };
    let mut numbers: Vec<usize> = Vec::new();
    for piece in value.split(',') {
        let piece = piece.trim();
        match piece.split_once('-') {
            Some((start, end)) => {
                let start: usize = start.trim().parse().map_err(|_| invalid())?;
                let end: usize = end.trim().parse().map_err(|_| invalid())?;
                if start > end {
                    return Err(invalid());
                }
                numbers.extend(start..=end);
            }
            None => numbers.push(piece.parse().map_err(|_| invalid())?),
        }
    }
    numbers.sort_unstable();
    numbers.dedup();
    Ok(numbers)
}
