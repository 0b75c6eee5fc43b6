//! Content model shared by the document sources and the review pipeline.
//!
//! A [`ContentUnit`] is one extracted fragment of a document: a slide shape,
//! a heading, or a body paragraph. Sources turn documents into units, the
//! segmenter groups units into [`ReviewBatch`]es, and the engine serializes
//! batch payloads to JSON for the wire — slide payloads become arrays of
//! shape objects, text payloads become one JSON-quoted string.

use serde::Serialize;

/// What kind of fragment a [`ContentUnit`] is.
///
/// Slide kinds mirror the shape types reported to the model in the format
/// description; text documents only use `Heading` and `Paragraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    TextBox,
    Table,
    Group,
    Shape,
    Picture,
    /// Synthesized title for a slide whose title text appears in no shape.
    ForcedTitle,
    Heading,
    Paragraph,
}

/// One extracted fragment of a document.
///
/// The serialized form is the slide-shape JSON sent to the model; the
/// structural fields used only by the segmenter are skipped.
#[derive(Debug, Clone, Serialize)]
pub struct ContentUnit {
    /// 1-based slide number, present only for slide shapes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<usize>,
    /// Shape or paragraph text. `\n` separates paragraphs inside one shape.
    pub text: String,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub is_title: bool,
    /// Geometry and styling, present only on artistic slide payloads.
    #[serde(flatten)]
    pub graphics: Option<GraphicalInfo>,
    /// Heading depth (0-based; a top-level heading is depth 0).
    #[serde(skip)]
    pub depth: Option<usize>,
    /// Dotted structural path at the time the unit was read.
    #[serde(skip)]
    pub path: Option<String>,
}

impl ContentUnit {
    /// A body-text unit for text documents.
    pub fn paragraph(text: impl Into<String>) -> Self {
        ContentUnit {
            slide_number: None,
            text: text.into(),
            kind: UnitKind::Paragraph,
            is_title: false,
            graphics: None,
            depth: None,
            path: None,
        }
    }

    /// A heading unit at the given 0-based depth.
    pub fn heading(text: impl Into<String>, depth: usize) -> Self {
        ContentUnit {
            slide_number: None,
            text: text.into(),
            kind: UnitKind::Heading,
            is_title: false,
            graphics: None,
            depth: Some(depth),
            path: None,
        }
    }
}

/// Geometry and styling details attached to artistic slide payloads.
///
/// Positions and sizes are percentages of the slide dimensions, so the
/// model can reason about layout without knowing EMU coordinates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphicalInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_degrees: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_fore_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LineInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_details: Option<Vec<FontDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_size: Option<TableSize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
    pub is_dash_style: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width_points: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionInfo {
    /// Percent of slide width from the left border.
    pub from_left: f32,
    /// Percent of slide height from the top border.
    pub from_top: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizeInfo {
    /// Percent of slide width.
    pub width: f32,
    /// Percent of slide height.
    pub height: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FontDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    /// The run of text these font settings apply to.
    pub text_impacted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSize {
    pub number_cols: usize,
    pub number_rows: usize,
}

// ── Review batches ───────────────────────────────────────────────────────

/// What a batch carries to the model.
///
/// Serialized untagged: a text payload becomes one JSON string, unit and
/// line payloads become JSON arrays.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchPayload {
    /// Accumulated chapter text (Word, Markdown, PDF).
    Text(String),
    /// Slide shapes as JSON objects.
    Units(Vec<serde_json::Value>),
    /// Per-slide text digests for whole-deck review.
    Lines(Vec<String>),
}

/// One reviewable chunk of a document plus its reporting metadata.
#[derive(Debug, Clone)]
pub struct ReviewBatch {
    /// Findings scope and response header label, e.g. `Slide 3 Roadmap`.
    pub scope_label: String,
    pub payload: BatchPayload,
    /// Payload-format schema sent with the persona when present.
    pub format_description: Option<String>,
    /// Whether each response gets its own numbered title (deck and chapter
    /// batches) or an inline bold header (slide batches).
    pub numbered_response_titles: bool,
    /// Rank used for numbered response titles.
    pub response_title_rank: usize,
    /// Logged when the batch finishes.
    pub done_marker: Option<String>,
}

impl ReviewBatch {
    pub fn requires_format_description(&self) -> bool {
        self.format_description.is_some()
    }

    /// JSON-encode the payload for the final user message.
    pub fn wire_payload(&self) -> Result<String, crate::error::ReviewError> {
        serde_json::to_string(&self.payload)
            .map_err(|e| crate::error::ReviewError::Internal(format!("payload encoding: {e}")))
    }
}

// ── Structural paths ─────────────────────────────────────────────────────

/// Path value before any heading has been seen.
pub const INITIAL_PATH: &str = "0.0.0.0";

/// Advance a dotted path for a heading at `depth` (0-based): increment the
/// segment at `depth`, zero everything deeper. Depths past the last segment
/// leave the path unchanged.
pub fn advance_path(path: &str, depth: usize) -> String {
    let mut segments: Vec<u64> = path
        .split('.')
        .map(|s| s.parse().unwrap_or(0))
        .collect();
    if depth < segments.len() {
        segments[depth] += 1;
        for seg in segments.iter_mut().skip(depth + 1) {
            *seg = 0;
        }
    }
    segments
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Normalize a skip/keep list: bare numbers get a trailing dot so `2`
/// matches chapter `2.` and not `21.`.
pub fn normalize_path_filter(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|e| {
            let e = e.trim();
            if !e.is_empty() && e.chars().all(|c| c.is_ascii_digit()) {
                format!("{e}.")
            } else {
                e.to_string()
            }
        })
        .collect()
}

/// True when `path` starts with any filter entry.
pub fn path_matches(path: &str, filters: &[String]) -> bool {
    filters.iter().any(|f| path.starts_with(f.as_str()))
}

/// Retention rule shared by all text sources: a unit survives iff its path
/// is not skip-matched and, when a keep list exists, is keep-matched.
pub fn path_retained(path: &str, skip: &[String], keep: Option<&[String]>) -> bool {
    if path_matches(path, skip) {
        return false;
    }
    match keep {
        Some(keep) => path_matches(path, keep),
        None => true,
    }
}
