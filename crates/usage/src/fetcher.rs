//! One fetch, end to end.
//!
//! `fetch` moves the work onto a dedicated thread and reports through a
//! completion callback. Inside the worker everything is sequential: open a
//! session, launch the target, run the script, parse the target stage, tear down.

use crate::observer::{FetchObserver, FetchState};
use crate::protocol::FetchOptions;
use crate::snapshot::UsageSnapshot;
use parking_lot::Mutex;
use settings::Config;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use terminal::{
    launcher, Clock, NativePtyAllocator, PtyAllocator, ScriptRunner, SystemClock, TerminalError,
    TerminalSession, TracingObserver,
};
use uuid::Uuid;

/// Runs fetches with a fixed set of options.
///
/// Cloning is cheap; clones share the allocator, clock and observer.
#[derive(Clone)]
pub struct UsageFetcher {
    options: Arc<FetchOptions>,
    allocator: Arc<dyn PtyAllocator>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn FetchObserver>,
}

impl UsageFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self {
            options: Arc::new(options),
            allocator: Arc::new(NativePtyAllocator),
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(FetchOptions::from_config(config))
    }

    pub fn with_allocator(mut self, allocator: impl PtyAllocator + 'static) -> Self {
        self.allocator = Arc::new(allocator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Run one fetch off the calling thread.
    ///
    /// `completion` is called exactly once, on the worker thread, after the
    /// session has been torn down. If the worker can't be started it is called
    /// before this returns.
    pub fn fetch<F>(&self, completion: F) -> FetchHandle
    where
        F: FnOnce(UsageSnapshot) + Send + 'static,
    {
        let completion = Arc::new(Mutex::new(Some(completion)));
        let worker_completion = completion.clone();
        let fetcher = self.clone();

        let spawned = thread::Builder::new()
            .name("ptyprobe-fetch".to_string())
            .spawn(move || {
                let snapshot = panic::catch_unwind(AssertUnwindSafe(|| fetcher.fetch_blocking()))
                    .unwrap_or_else(|_| {
                        tracing::error!("Fetch worker panicked");
                        UsageSnapshot::failed("Fetch worker panicked")
                    });
                deliver(&worker_completion, snapshot);
            });

        match spawned {
            Ok(worker) => FetchHandle {
                worker: Some(worker),
            },
            Err(error) => {
                tracing::error!("Failed to start fetch worker: {}", error);
                deliver(
                    &completion,
                    UsageSnapshot::failed(format!("Failed to start fetch worker: {}", error)),
                );
                FetchHandle { worker: None }
            }
        }
    }

    /// Run one fetch on the calling thread. Blocks for the whole script.
    pub fn fetch_blocking(&self) -> UsageSnapshot {
        let span = tracing::info_span!("fetch", id = %Uuid::new_v4());
        let _enter = span.enter();
        let observer = self.observer.as_ref();

        observer.state_changed(FetchState::Created);

        let session = match self.allocator.open(self.options.size) {
            Ok(session) => session,
            Err(error) => return self.abort(FetchState::AllocationFailed, error),
        };
        let mut session = SessionGuard(session);
        observer.state_changed(FetchState::SessionOpen);

        // `spawn` closes the session itself when the launch fails.
        let mut child = match launcher::spawn(session.0.as_mut(), &self.options.command) {
            Ok(child) => child,
            Err(error) => return self.abort(FetchState::SpawnFailed, error),
        };
        observer.state_changed(FetchState::ProcessRunning {
            pid: child.process_id(),
        });

        let transcript = ScriptRunner::new(self.clock.as_ref(), observer)
            .run(&self.options.script, child.channel_mut());

        let target = transcript.target_text(self.options.script.parse_target());
        let scanner = &self.options.scanner;
        let snapshot = UsageSnapshot::new(
            scanner.percentage(&target),
            scanner.reset_date(&target),
            transcript.full_text(),
        );
        observer.state_changed(FetchState::Parsed);

        child.terminate();
        drop(child);
        session.0.close();
        observer.state_changed(FetchState::Closed);

        observer.snapshot_ready(&snapshot);
        snapshot
    }

    fn abort(&self, state: FetchState, error: TerminalError) -> UsageSnapshot {
        let observer = self.observer.as_ref();
        observer.fetch_failed(&error);
        observer.state_changed(state);
        observer.state_changed(FetchState::Closed);

        let snapshot = UsageSnapshot::failed(error.to_string());
        observer.snapshot_ready(&snapshot);
        snapshot
    }
}

fn deliver<F: FnOnce(UsageSnapshot)>(slot: &Mutex<Option<F>>, snapshot: UsageSnapshot) {
    let completion = slot.lock().take();
    if let Some(completion) = completion {
        completion(snapshot);
    }
}

/// Closes the session on every exit path, including unwinding out of the script.
struct SessionGuard(Box<dyn TerminalSession>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Handle to an in-flight fetch.
#[derive(Debug)]
pub struct FetchHandle {
    worker: Option<JoinHandle<()>>,
}

impl FetchHandle {
    /// Wait for the worker to finish. The completion has run by the time this returns.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Fetch worker panicked after delivering its result");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(true, |worker| worker.is_finished())
    }
}
