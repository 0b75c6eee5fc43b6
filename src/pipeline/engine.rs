//! LLM access engine: dispatch, retry, worker pool.
//!
//! ## Modes
//!
//! **Combined** sends one call per batch with every request merged into the
//! message list; sampling parameters are averaged. **Detailed** sends one
//! call per request, in chunks the size of the worker pool; inside a chunk
//! responses land in completion order, chunk boundaries keep the overall
//! order coarse-grained but stable.
//!
//! ## Retry Strategy
//!
//! Transient endpoint failures are retried forever: wait 10 s, double, cap
//! at 30 s. Runs are expected to survive hours of endpoint downtime rather
//! than lose a half-finished report. Two failure signatures are fatal and
//! never retried: context-window overflow and an explicit internal server
//! error. Those abort the run; the report still flushes.

use crate::checker::Checker;
use crate::error::ReviewError;
use crate::output::Response;
use crate::pipeline::chat::{ChatProvider, ChatRequest};
use crate::pipeline::compose;
use crate::unit::ReviewBatch;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

/// First wait after a transient failure.
pub const RETRY_INITIAL_BACKOFF_SECS: u64 = 10;
/// Backoff ceiling; waits go 10, 20, 30, 30, …
pub const RETRY_BACKOFF_CAP_SECS: u64 = 30;

/// Worker-pool size for detailed mode. Default 1, minimum 1.
pub const ENV_NB_WORKERS: &str = "DOC2REVIEW_NB_WORKERS";

/// Sampling defaults applied when a request carries none.
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TOP_P: f32 = 0.1;

const CONTEXT_OVERFLOW_SIGNATURES: [&str; 2] =
    ["ContextWindowExceededError", "context_length_exceeded"];
const INTERNAL_SERVER_SIGNATURE: &str = "InternalServerError";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// One merged call per batch.
    Combined,
    /// One call per request over the worker pool.
    Detailed,
}

/// The engine: a provider plus the per-run request envelope.
pub struct LlmAccess {
    provider: Arc<dyn ChatProvider>,
    mode: AccessMode,
    model: String,
    persona_set: String,
    context: Option<String>,
}

impl LlmAccess {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        mode: AccessMode,
        model: impl Into<String>,
        persona_set: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        LlmAccess {
            provider,
            mode,
            model: model.into(),
            persona_set: persona_set.into(),
            context,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Run a checker's requests against a batch.
    ///
    /// Returns one response per call; an empty checker yields no responses
    /// and no calls.
    pub async fn check(
        &self,
        checker: &dyn Checker,
        batch: &ReviewBatch,
    ) -> Result<Vec<Response>, ReviewError> {
        let requests = checker.requests();
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let payload = batch.wire_payload()?;
        match self.mode {
            AccessMode::Combined => self.check_combined(checker, batch, &payload).await,
            AccessMode::Detailed => self.check_detailed(checker, batch, &payload).await,
        }
    }

    async fn check_combined(
        &self,
        checker: &dyn Checker,
        batch: &ReviewBatch,
        payload: &str,
    ) -> Result<Vec<Response>, ReviewError> {
        let requests = checker.requests();
        let messages = compose::combined_messages(
            &self.persona_set,
            batch.format_description.as_deref(),
            requests,
            self.context.as_deref(),
            payload,
        );

        let count = requests.len() as f32;
        let temperature = requests
            .iter()
            .map(|r| r.temperature.unwrap_or(DEFAULT_TEMPERATURE))
            .sum::<f32>()
            / count;
        let top_p = requests
            .iter()
            .map(|r| r.top_p.unwrap_or(DEFAULT_TOP_P))
            .sum::<f32>()
            / count;

        let name = requests
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(" & ");
        let post_request_name = requests
            .iter()
            .find_map(|r| r.post_request_name.clone().filter(|n| !n.is_empty()));

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(temperature),
            top_p: Some(top_p),
        };
        let text = self
            .send_with_retry(&request, &name, checker.error_information())
            .await?;

        Ok(vec![Response {
            request_name: name,
            text,
            temperature,
            top_p,
            post_request_name,
        }])
    }

    async fn check_detailed(
        &self,
        checker: &dyn Checker,
        batch: &ReviewBatch,
        payload: &str,
    ) -> Result<Vec<Response>, ReviewError> {
        let workers = worker_pool_size();
        let mut responses: Vec<Response> = Vec::with_capacity(checker.requests().len());

        for chunk in checker.requests().chunks(workers) {
            debug!(
                "dispatching chunk of {} request(s) over {} worker(s)",
                chunk.len(),
                workers
            );
            let results: Vec<Result<Response, ReviewError>> =
                stream::iter(chunk.iter().map(|request| {
                    let messages = compose::detailed_messages(
                        &self.persona_set,
                        batch.format_description.as_deref(),
                        request,
                        self.context.as_deref(),
                        payload,
                    );
                    let chat_request = ChatRequest {
                        model: self.model.clone(),
                        messages,
                        temperature: Some(request.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
                        top_p: Some(request.top_p.unwrap_or(DEFAULT_TOP_P)),
                    };
                    let scope = checker.error_information().to_string();
                    async move {
                        let text = self
                            .send_with_retry(&chat_request, &request.name, &scope)
                            .await?;
                        Ok(Response {
                            request_name: request.name.clone(),
                            text,
                            temperature: chat_request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                            top_p: chat_request.top_p.unwrap_or(DEFAULT_TOP_P),
                            post_request_name: request
                                .post_request_name
                                .clone()
                                .filter(|n| !n.is_empty()),
                        })
                    }
                }))
                .buffer_unordered(workers)
                .collect()
                .await;

            for result in results {
                let mut response = result?;
                response
                    .request_name
                    .push_str(checker.separator_information());
                responses.push(response);
            }
        }

        Ok(responses)
    }

    /// Send one request, retrying transient failures forever.
    async fn send_with_retry(
        &self,
        request: &ChatRequest,
        request_name: &str,
        scope: &str,
    ) -> Result<String, ReviewError> {
        let mut backoff = Duration::from_secs(RETRY_INITIAL_BACKOFF_SECS);
        let cap = Duration::from_secs(RETRY_BACKOFF_CAP_SECS);
        loop {
            match self.provider.chat(request).await {
                Ok(text) => return Ok(text),
                Err(ReviewError::Provider { detail }) => {
                    warn!("{request_name}{scope}: chat request failed: {detail}");
                    if CONTEXT_OVERFLOW_SIGNATURES.iter().any(|s| detail.contains(s)) {
                        error!("{request_name}{scope}: request exceeds the provider context window");
                        return Err(ReviewError::ContextWindowExceeded {
                            request_name: request_name.to_string(),
                        });
                    }
                    if detail.contains(INTERNAL_SERVER_SIGNATURE) {
                        return Err(ReviewError::ProviderInternal {
                            request_name: request_name.to_string(),
                            detail,
                        });
                    }
                    warn!("{request_name}{scope}: retrying in {}s", backoff.as_secs());
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(cap);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// Worker-pool size from the environment; default 1, minimum 1.
pub fn worker_pool_size() -> usize {
    std::env::var(ENV_NB_WORKERS)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}
