//! Per-run context handed to every pipeline stage.
//!
//! A [`RunContext`] carries the run identifier and a [`TraceSink`]. Stages
//! report what they did through [`RunContext::emit`] instead of writing to a
//! global logger, so a test can inspect the exact sequence of events.

use std::sync::{Arc, Mutex};

use newsdigest_shared::RunId;
use tracing::{info, warn};

/// Pipeline stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Enrich,
    Aggregate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Enrich => "enrich",
            Self::Aggregate => "aggregate",
        }
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    /// A stage began.
    Started,
    /// One backend or model call was made.
    Attempt,
    /// A fallback path was taken.
    Fallback,
    /// A result was replaced by placeholder data.
    Degraded,
    /// A stage finished.
    Completed,
    /// The run was aborted.
    Failed,
}

/// One structured trace event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub stage: Stage,
    pub kind: TraceKind,
    pub detail: String,
}

/// Destination for trace events.
pub trait TraceSink: Send + Sync {
    fn record(&self, run_id: &RunId, event: TraceEvent);
}

/// Forwards events to `tracing`, degraded and failed ones at `warn`.
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, run_id: &RunId, event: TraceEvent) {
        let stage = event.stage.as_str();
        match event.kind {
            TraceKind::Degraded | TraceKind::Failed => {
                warn!(%run_id, stage, kind = ?event.kind, "{}", event.detail);
            }
            _ => {
                info!(%run_id, stage, kind = ?event.kind, "{}", event.detail);
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl TraceSink for MemorySink {
    fn record(&self, _run_id: &RunId, event: TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Run identifier plus trace sink. Cheap to clone.
#[derive(Clone)]
pub struct RunContext {
    run_id: RunId,
    sink: Arc<dyn TraceSink>,
}

impl RunContext {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self {
            run_id: RunId::new(),
            sink,
        }
    }

    /// Context that logs through `tracing`.
    pub fn with_tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn emit(&self, stage: Stage, kind: TraceKind, detail: impl Into<String>) {
        self.sink.record(
            &self.run_id,
            TraceEvent {
                stage,
                kind,
                detail: detail.into(),
            },
        );
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
