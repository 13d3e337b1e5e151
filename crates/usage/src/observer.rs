//! Fetch-level observation on top of the per-stage script hooks.

use crate::snapshot::UsageSnapshot;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use terminal::{
    InteractionStep, NoopObserver, ScriptObserver, StageResult, StepKind, TerminalError,
    TracingObserver,
};

/// Where a fetch is in its lifecycle.
///
/// `AllocationFailed` and `SpawnFailed` are followed directly by `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Created,
    SessionOpen,
    ProcessRunning { pid: Option<u32> },
    Parsed,
    Closed,
    AllocationFailed,
    SpawnFailed,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchState::Created => f.write_str("created"),
            FetchState::SessionOpen => f.write_str("session open"),
            FetchState::ProcessRunning { pid: Some(pid) } => write!(f, "process running (pid {})", pid),
            FetchState::ProcessRunning { pid: None } => f.write_str("process running"),
            FetchState::Parsed => f.write_str("parsed"),
            FetchState::Closed => f.write_str("closed"),
            FetchState::AllocationFailed => f.write_str("allocation failed"),
            FetchState::SpawnFailed => f.write_str("spawn failed"),
        }
    }
}

pub trait FetchObserver: ScriptObserver {
    fn state_changed(&self, _state: FetchState) {}

    /// The fetch ended before any stage ran.
    fn fetch_failed(&self, _error: &TerminalError) {}

    /// Called once per fetch, after teardown, with the snapshot handed to the caller.
    fn snapshot_ready(&self, _snapshot: &UsageSnapshot) {}
}

impl FetchObserver for NoopObserver {}

impl FetchObserver for TracingObserver {
    fn state_changed(&self, state: FetchState) {
        tracing::debug!(%state, "Fetch state changed");
    }

    fn fetch_failed(&self, error: &TerminalError) {
        tracing::error!("Fetch failed: {}", error);
    }

    fn snapshot_ready(&self, snapshot: &UsageSnapshot) {
        match snapshot.percent_used {
            Some(percent) => tracing::info!(
                percent,
                reset = snapshot.reset_date_text.as_deref().unwrap_or("unknown"),
                "Usage parsed"
            ),
            None => tracing::warn!(
                raw_len = snapshot.raw_output.len(),
                "Usage percentage not found in output"
            ),
        }
    }
}

/// Fans every event out to several observers, in insertion order.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn FetchObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ScriptObserver for ObserverSet {
    fn stage_started(&self, index: usize, step: &InteractionStep) {
        for observer in &self.observers {
            observer.stage_started(index, step);
        }
    }

    fn chunk_received(&self, index: usize, kind: StepKind, len: usize) {
        for observer in &self.observers {
            observer.chunk_received(index, kind, len);
        }
    }

    fn write_failed(&self, index: usize, error: &TerminalError) {
        for observer in &self.observers {
            observer.write_failed(index, error);
        }
    }

    fn idle_ceiling_reached(&self, index: usize, waited: Duration) {
        for observer in &self.observers {
            observer.idle_ceiling_reached(index, waited);
        }
    }

    fn stage_finished(&self, index: usize, result: &StageResult) {
        for observer in &self.observers {
            observer.stage_finished(index, result);
        }
    }
}

impl FetchObserver for ObserverSet {
    fn state_changed(&self, state: FetchState) {
        for observer in &self.observers {
            observer.state_changed(state);
        }
    }

    fn fetch_failed(&self, error: &TerminalError) {
        for observer in &self.observers {
            observer.fetch_failed(error);
        }
    }

    fn snapshot_ready(&self, snapshot: &UsageSnapshot) {
        for observer in &self.observers {
            observer.snapshot_ready(snapshot);
        }
    }
}
