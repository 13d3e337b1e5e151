//! Observation hooks for script execution.
//!
//! The executor has no output channel of its own: everything it wants to report
//! goes through a [`ScriptObserver`]. All hooks default to doing nothing.

use crate::error::TerminalError;
use crate::script::{InteractionStep, StageResult, StepKind};
use std::time::Duration;

pub trait ScriptObserver: Send + Sync {
    fn stage_started(&self, _index: usize, _step: &InteractionStep) {}

    /// A non-empty chunk of `len` characters arrived during a stage.
    fn chunk_received(&self, _index: usize, _kind: StepKind, _len: usize) {}

    /// A keystroke could not be delivered. The stage continues.
    fn write_failed(&self, _index: usize, _error: &TerminalError) {}

    /// An idle wait gave up before the child went quiet.
    fn idle_ceiling_reached(&self, _index: usize, _waited: Duration) {}

    fn stage_finished(&self, _index: usize, _result: &StageResult) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScriptObserver for NoopObserver {}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ScriptObserver for TracingObserver {
    fn stage_started(&self, index: usize, step: &InteractionStep) {
        tracing::debug!(stage = index, kind = %step.kind(), "Stage started");
    }

    fn chunk_received(&self, index: usize, kind: StepKind, len: usize) {
        tracing::trace!(stage = index, %kind, len, "Received output");
    }

    fn write_failed(&self, index: usize, error: &TerminalError) {
        tracing::warn!(stage = index, "Keystroke not delivered: {}", error);
    }

    fn idle_ceiling_reached(&self, index: usize, waited: Duration) {
        tracing::warn!(
            stage = index,
            waited_ms = waited.as_millis() as u64,
            "Child never went quiet, giving up on idle wait"
        );
    }

    fn stage_finished(&self, index: usize, result: &StageResult) {
        tracing::debug!(
            stage = index,
            kind = %result.kind,
            len = result.text.len(),
            "Stage finished"
        );
        tracing::trace!(stage = index, "Stage output:\n{}", result.text);
    }
}
