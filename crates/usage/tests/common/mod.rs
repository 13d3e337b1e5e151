//! Shared fixtures for fetch integration tests.
//!
//! Everything runs on a `ManualClock`, so a full 13-second protocol completes
//! instantly and deterministically.

#![allow(dead_code)]

use mockall::mock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use terminal::testing::{FakeAllocator, ManualClock, ScriptedTransport, WriteLog};
use terminal::{InteractionStep, ScriptObserver, StageResult, StepKind, TerminalError};
use usage::{FetchObserver, FetchOptions, FetchState, UsageFetcher, UsageSnapshot};

/// The usage screen as it arrives after typing `/usage` and Enter.
pub const USAGE_SCREEN: &str = "\x1b[2J\x1b[H Settings:  Status   Config   Usage\r\n\r\n\
    \x1b[1m Current session\x1b[0m\r\n \u{2588}\u{2588}      4% used\r\n Resets 6pm (America/Chicago)\r\n\r\n\
    \x1b[1m Current week (all models)\x1b[0m\r\n \u{2588}\u{2588}\u{2588}\u{2588}   37% used\r\n \
    Resets Dec 22, 1pm (America/Chicago)\r\n";

pub const WELCOME: &str = "Welcome to Claude Code\r\n> ";

pub const PROMPT_REDRAW: &str = "\x1b[2K> ";

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// A target that greets, redraws its prompt on the first Enter, and renders the
/// usage screen once `/usage` is submitted.
pub fn usage_target(clock: Arc<ManualClock>) -> ScriptedTransport {
    ScriptedTransport::new(clock)
        .emit_at(ms(300), WELCOME)
        .on_input("\r", ms(200), PROMPT_REDRAW)
        .on_input("/usage\r", ms(800), USAGE_SCREEN)
}

/// Allocator whose sessions run `target`, plus the write log of the last session.
pub fn allocator_with<F>(target: F) -> (FakeAllocator, Arc<Mutex<Option<WriteLog>>>)
where
    F: Fn() -> ScriptedTransport + Send + Sync + 'static,
{
    let writes = Arc::new(Mutex::new(None));
    let slot = writes.clone();
    let allocator = FakeAllocator::new(move || {
        let transport = target();
        *slot.lock() = Some(transport.write_log());
        transport
    });
    (allocator, writes)
}

pub fn fetcher(
    allocator: FakeAllocator,
    clock: Arc<ManualClock>,
    observer: Arc<dyn FetchObserver>,
) -> UsageFetcher {
    UsageFetcher::new(FetchOptions::default())
        .with_allocator(allocator)
        .with_clock(clock)
        .with_observer(observer)
}

mock! {
    pub Observer {}

    impl ScriptObserver for Observer {
        fn stage_started(&self, index: usize, step: &InteractionStep);
        fn chunk_received(&self, index: usize, kind: StepKind, len: usize);
        fn write_failed(&self, index: usize, error: &TerminalError);
        fn idle_ceiling_reached(&self, index: usize, waited: Duration);
        fn stage_finished(&self, index: usize, result: &StageResult);
    }

    impl FetchObserver for Observer {
        fn state_changed(&self, state: FetchState);
        fn fetch_failed(&self, error: &TerminalError);
        fn snapshot_ready(&self, snapshot: &UsageSnapshot);
    }
}

/// Mock that records state transitions and accepts any script event.
pub fn recording_observer() -> (MockObserver, Arc<Mutex<Vec<FetchState>>>) {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();

    let mut observer = MockObserver::new();
    observer
        .expect_state_changed()
        .returning(move |state| sink.lock().push(state));
    observer.expect_stage_started().return_const(());
    observer.expect_chunk_received().return_const(());
    observer.expect_stage_finished().return_const(());
    (observer, states)
}
