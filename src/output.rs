//! Result types: engine responses and run statistics.

use serde::Serialize;
use std::path::PathBuf;

/// One model answer, combined or per-request.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Request name; detailed mode appends the checker's scope suffix,
    /// combined mode joins all merged names with ` & `.
    pub request_name: String,
    /// Response body as returned by the provider.
    pub text: String,
    pub temperature: f32,
    pub top_p: f32,
    /// Name of the post template to chain, when the request carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_request_name: Option<String>,
}

/// Counters accumulated over one review run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Steps yielded by the document source (titles and checks).
    pub steps: usize,
    /// Batches sent through the engine, post-process calls included.
    pub batches: usize,
    /// Individual chat requests sent (combined mode counts one per batch).
    pub requests_sent: usize,
    pub responses: usize,
    pub post_responses: usize,
    /// Scopes that produced at least one finding row.
    pub finding_scopes: usize,
    pub duration_ms: u64,
    /// Fatal engine error that cut the run short, if any. The report file
    /// is still written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

/// What [`crate::review_document`] returns.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    /// Path of the assembled Markdown report.
    pub report_path: PathBuf,
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_without_empty_abort() {
        let stats = RunStats {
            steps: 3,
            responses: 2,
            ..Default::default()
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["steps"], 3);
        assert!(value.get("aborted").is_none());
    }
}
