//! Error types for the doc2review library.
//!
//! One enum, three failure classes:
//!
//! * **Setup errors** (missing input, bad ranges, bad catalog files) are
//!   returned as `Err(ReviewError)` from [`crate::review_document`] before
//!   any report file exists.
//!
//! * **Transient provider errors** ([`ReviewError::Provider`]) never escape
//!   the engine: the retry loop waits and tries again, forever. They appear
//!   here only so the chat client has something typed to return.
//!
//! * **Fatal provider errors** ([`ReviewError::ContextWindowExceeded`],
//!   [`ReviewError::ProviderInternal`]) abort the run immediately. The
//!   orchestrator logs them and still flushes the partially written report,
//!   so a long run is never lost to one oversized request.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the doc2review library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// A context file was configured but does not exist.
    #[error("Context file not found: '{path}'\nPass --context-path only with an existing file.")]
    ContextFileNotFound { path: PathBuf },

    /// A reviewer-properties file was configured but does not exist.
    #[error("Reviewer properties file not found: '{path}'")]
    ReviewerFileNotFound { path: PathBuf },

    /// The input extension maps to no known document source.
    #[error("Unsupported document type '{extension}' for '{path}'\nSupported: .pptx, .docx, .md, .txt, .pdf")]
    UnsupportedDocumentType { path: PathBuf, extension: String },

    /// The document exists but could not be parsed.
    #[error("Failed to read document '{path}': {detail}")]
    DocumentRead { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Skip and keep lists were both given for the same scope.
    #[error("Conflicting selection: {what}\nUse either the skip list or the only list, not both.")]
    ConflictingSelection { what: String },

    /// A selection list entry is not a number or an `a-b` range.
    #[error("Invalid selection range '{value}'\nExpected comma-separated numbers or ranges, e.g. '1,3-5,8'.")]
    InvalidRange { value: String },

    /// A request id points past the end of its catalog.
    #[error("Request id {index} is out of range for the {kind} catalog ({len} entries)\nList ids with: doc2review list-requests")]
    InvalidRequestIndex {
        index: usize,
        kind: String,
        len: usize,
    },

    /// An external request-catalog file could not be loaded.
    #[error("Failed to load request catalog '{path}': {detail}")]
    CatalogFile { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Provider errors ───────────────────────────────────────────────────
    /// Transient chat-endpoint failure. The engine retries these forever
    /// with backoff; callers of the public API never see this variant.
    #[error("Chat request failed: {detail}")]
    Provider { detail: String },

    /// The request no longer fits the provider's context window.
    ///
    /// Raised without retrying: a too-large request stays too large.
    #[error("Context window exceeded for request '{request_name}'\nLower --context-length or split the document with --split-depth.")]
    ContextWindowExceeded { request_name: String },

    /// The provider reported an internal server fault.
    #[error("Provider internal error for request '{request_name}': {detail}")]
    ProviderInternal {
        request_name: String,
        detail: String,
    },

    // ── Report errors ─────────────────────────────────────────────────────
    /// Could not create or append to the report or its temporary sibling.
    #[error("Failed to write report '{path}': {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    /// True for provider errors that must abort the run instead of retrying.
    pub fn is_fatal_provider_error(&self) -> bool {
        matches!(
            self,
            ReviewError::ContextWindowExceeded { .. } | ReviewError::ProviderInternal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_overflow_display() {
        let e = ReviewError::ContextWindowExceeded {
            request_name: "Flow check".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Flow check"), "got: {msg}");
        assert!(msg.contains("--context-length"));
    }

    #[test]
    fn invalid_request_index_display() {
        let e = ReviewError::InvalidRequestIndex {
            index: 12,
            kind: "deck".into(),
            len: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("deck"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn conflicting_selection_display() {
        let e = ReviewError::ConflictingSelection {
            what: "--skip-slides and --only-slides".into(),
        };
        assert!(e.to_string().contains("--skip-slides"));
    }

    #[test]
    fn fatal_classification() {
        assert!(ReviewError::ContextWindowExceeded {
            request_name: "x".into()
        }
        .is_fatal_provider_error());
        assert!(ReviewError::ProviderInternal {
            request_name: "x".into(),
            detail: "boom".into()
        }
        .is_fatal_provider_error());
        assert!(!ReviewError::Provider {
            detail: "timeout".into()
        }
        .is_fatal_provider_error());
    }
}
