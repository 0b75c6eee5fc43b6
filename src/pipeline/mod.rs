//! Review pipeline stages.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. the simulated chat provider) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! units ──▶ segment ──▶ compose ──▶ chat ──▶ report
//! (source)  (batches)   (messages)  (LLM)    (markdown)
//! ```
//!
//! 1. [`segment`] — group content units into chapter batches under the token
//!    budget, honouring skip/keep lists
//! 2. [`compose`] — assemble chat messages from persona, requests, context
//!    and payload; hoist system messages, merge same-role runs, sanitise
//! 3. [`chat`]    — the OpenAI-compatible wire types and providers; the only
//!    stage with network I/O
//! 4. [`engine`]  — combined/detailed dispatch with retry/backoff and the
//!    bounded worker pool
//! 5. [`report`]  — numbered TOC, findings harvesting, ranked summary,
//!    crash-safe output file
//!
//! Slide decks skip stage 1: their batches are built per slide by
//! [`crate::source::slides`].

pub mod chat;
pub mod compose;
pub mod engine;
pub mod report;
pub mod segment;
