//! Core pipeline orchestration and domain logic for NewsDigest.
//!
//! This crate ties together the news backends, LLM enrichment, and digest
//! aggregation into one end-to-end run ([`pipeline::Pipeline::run`]).

pub mod aggregate;
pub mod context;
pub mod enrichment;
pub mod llm;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use context::{MemorySink, RunContext, Stage, TraceEvent, TraceKind, TraceSink, TracingSink};
pub use enrichment::{ConcurrencyPolicy, Enricher};
pub use llm::{ChatModel, ChatRequest, OpenAiChatModel};
pub use pipeline::{
    DigestOutput, DigestRequest, FetchAttempt, MAX_LIMIT, MIN_LIMIT, Pipeline, ProgressReporter,
    SilentProgress, Sources,
};
