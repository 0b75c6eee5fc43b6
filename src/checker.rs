//! Checker strategies: which requests run against a batch, and how their
//! responses are labelled.
//!
//! A checker is resolved once from the catalog when its batch is built and
//! stays immutable. `separator_information` is appended to response names in
//! detailed mode; `error_information` scopes log and error messages.

use crate::catalog::{CatalogKind, RequestCatalog, ReviewRequest};
use crate::error::ReviewError;

pub trait Checker: Send + Sync + std::fmt::Debug {
    /// The resolved requests to run against the batch.
    fn requests(&self) -> &[ReviewRequest];
    /// Scope suffix for logs and errors, e.g. ` (Slide 4)`.
    fn error_information(&self) -> &str;
    /// Scope suffix appended to response names in detailed mode.
    fn separator_information(&self) -> &str;
}

/// Whole-deck reviews.
#[derive(Debug)]
pub struct DeckChecker {
    requests: Vec<ReviewRequest>,
}

impl DeckChecker {
    pub fn new(
        catalog: &RequestCatalog,
        indices: Option<&[usize]>,
    ) -> Result<Self, ReviewError> {
        Ok(DeckChecker {
            requests: catalog.select(CatalogKind::Deck, indices)?,
        })
    }
}

impl Checker for DeckChecker {
    fn requests(&self) -> &[ReviewRequest] {
        &self.requests
    }
    fn error_information(&self) -> &str {
        " (Deck)"
    }
    fn separator_information(&self) -> &str {
        " (Deck)"
    }
}

/// Text reviews for one slide.
#[derive(Debug)]
pub struct TextSlideChecker {
    requests: Vec<ReviewRequest>,
    scope: String,
}

impl TextSlideChecker {
    pub fn new(
        catalog: &RequestCatalog,
        indices: Option<&[usize]>,
        slide_number: usize,
    ) -> Result<Self, ReviewError> {
        Ok(TextSlideChecker {
            requests: catalog.select(CatalogKind::SlideText, indices)?,
            scope: format!(" (Slide {slide_number})"),
        })
    }
}

impl Checker for TextSlideChecker {
    fn requests(&self) -> &[ReviewRequest] {
        &self.requests
    }
    fn error_information(&self) -> &str {
        &self.scope
    }
    fn separator_information(&self) -> &str {
        &self.scope
    }
}

/// Artistic reviews for one slide.
#[derive(Debug)]
pub struct ArtisticSlideChecker {
    requests: Vec<ReviewRequest>,
    scope: String,
}

impl ArtisticSlideChecker {
    pub fn new(
        catalog: &RequestCatalog,
        indices: Option<&[usize]>,
        slide_number: usize,
    ) -> Result<Self, ReviewError> {
        Ok(ArtisticSlideChecker {
            requests: catalog.select(CatalogKind::SlideArtistic, indices)?,
            scope: format!(" (Slide {slide_number})"),
        })
    }
}

impl Checker for ArtisticSlideChecker {
    fn requests(&self) -> &[ReviewRequest] {
        &self.requests
    }
    fn error_information(&self) -> &str {
        &self.scope
    }
    fn separator_information(&self) -> &str {
        &self.scope
    }
}

/// Chapter reviews for text documents (Word, Markdown, PDF).
#[derive(Debug)]
pub struct ChapterChecker {
    requests: Vec<ReviewRequest>,
    scope: String,
}

impl ChapterChecker {
    pub fn new(
        catalog: &RequestCatalog,
        indices: Option<&[usize]>,
        chapter_list: &str,
    ) -> Result<Self, ReviewError> {
        Ok(ChapterChecker {
            requests: catalog.select(CatalogKind::Paragraph, indices)?,
            scope: format!(" (Chapters {chapter_list})"),
        })
    }
}

impl Checker for ChapterChecker {
    fn requests(&self) -> &[ReviewRequest] {
        &self.requests
    }
    fn error_information(&self) -> &str {
        &self.scope
    }
    fn separator_information(&self) -> &str {
        &self.scope
    }
}

/// Chained post-processing of a primary response.
///
/// Requests are the templates named by the triggering response plus the
/// globally selected templates, deduplicated by name.
#[derive(Debug)]
pub struct PostProcessChecker {
    requests: Vec<ReviewRequest>,
}

impl PostProcessChecker {
    pub fn new(catalog: &RequestCatalog, post_request_name: Option<&str>) -> Self {
        let mut requests: Vec<ReviewRequest> = Vec::new();
        if let Some(name) = post_request_name {
            requests.extend(catalog.post_by_name(name));
        }
        for template in catalog.post_selected() {
            if !requests.iter().any(|r| r.name == template.name) {
                requests.push(template);
            }
        }
        PostProcessChecker { requests }
    }
}

impl Checker for PostProcessChecker {
    fn requests(&self) -> &[ReviewRequest] {
        &self.requests
    }
    fn error_information(&self) -> &str {
        " (Post Process)"
    }
    fn separator_information(&self) -> &str {
        " (Post Process)"
    }
}
