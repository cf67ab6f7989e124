//! # TransLLM, structure-preserving source translation
//!
//! Translates the natural-language parts of a code base (comments,
//! docstrings, user-facing strings) with an LLM backend while guaranteeing
//! that the code itself comes back line-for-line intact, or is reported.
//!
//! ## Architecture
//!
//! - **[`chunker`]**: Line-window chunking with boundary markers, on-disk staging store
//! - **[`transform`]**: `Transformer` trait, chat-completions / messages backends, mock
//! - **[`pipeline`]**: Semaphore-gated concurrent chunk transformation
//! - **[`sanitize`]** / **[`guard`]**: Per-chunk output cleanup and drift/first-line repair
//! - **[`merger`]**: Marker scrubbing and ordered reassembly
//! - **[`validator`]**: Post-merge integrity checks (lines, syntax, skeleton, scripts, indentation)
//! - **[`project`]**: Project scan and end-to-end orchestration
//! - **[`report`]**: JSON / Markdown translation reports
//! - **[`events`]**: Structured pipeline events and sinks
//! - **[`config`]**: Configuration loading and validation

pub mod chunker;
pub mod config;
pub mod events;
pub mod guard;
pub mod merger;
pub mod pipeline;
pub mod project;
pub mod report;
pub mod sanitize;
pub mod transform;
pub mod validator;
