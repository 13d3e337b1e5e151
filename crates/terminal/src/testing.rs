//! Test doubles for driving scripts without a real terminal or child process.
//!
//! Enabled for this crate's own tests and for dependents through the
//! `test-support` feature.

use crate::channel::{NonBlockingChannel, PtyTransport};
use crate::clock::Clock;
use crate::error::TerminalError;
use crate::launcher::{ChildProcess, LaunchCommand};
use crate::session::{PtyAllocator, TerminalSession, TerminalSize};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Virtual clock. `sleep` returns immediately and moves time forward.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Virtual time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }
}

/// Writes seen by a [`ScriptedTransport`], shared with the test.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    entries: Arc<Mutex<Vec<(Duration, String)>>>,
}

impl WriteLog {
    pub fn payloads(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, p)| p.clone()).collect()
    }

    /// Virtual time of each write.
    pub fn times(&self) -> Vec<Duration> {
        self.entries.lock().iter().map(|(t, _)| *t).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

struct InputRule {
    suffix: String,
    delay: Duration,
    output: Vec<u8>,
    fired: bool,
}

/// Fake child output released on a [`ManualClock`].
///
/// Output is either scheduled at a fixed virtual time (`emit_at`) or in response
/// to input (`on_input`, fires once when everything typed so far ends with the
/// given suffix).
pub struct ScriptedTransport {
    clock: Arc<ManualClock>,
    pending: Vec<(Duration, Vec<u8>)>,
    rules: Vec<InputRule>,
    input: String,
    echo: bool,
    fail_writes: bool,
    writes: WriteLog,
}

impl ScriptedTransport {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            pending: Vec::new(),
            rules: Vec::new(),
            input: String::new(),
            echo: false,
            fail_writes: false,
            writes: WriteLog::default(),
        }
    }

    pub fn emit_at(mut self, at: Duration, output: impl Into<Vec<u8>>) -> Self {
        self.pending.push((at, output.into()));
        self
    }

    pub fn on_input(
        mut self,
        suffix: impl Into<String>,
        delay: Duration,
        output: impl Into<Vec<u8>>,
    ) -> Self {
        self.rules.push(InputRule {
            suffix: suffix.into(),
            delay,
            output: output.into(),
            fired: false,
        });
        self
    }

    /// Echo every write back immediately, like a terminal in cooked mode.
    pub fn echo_input(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn write_log(&self) -> WriteLog {
        self.writes.clone()
    }
}

impl PtyTransport for ScriptedTransport {
    fn try_read(&mut self) -> Option<Vec<u8>> {
        let now = self.clock.elapsed();
        let (index, _) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= now)
            .min_by_key(|(_, (at, _))| *at)?;
        Some(self.pending.remove(index).1)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "child exited"));
        }

        let now = self.clock.elapsed();
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.writes.entries.lock().push((now, text.clone()));

        if self.echo {
            self.pending.push((now, bytes.to_vec()));
        }

        self.input.push_str(&text);
        for rule in self.rules.iter_mut().filter(|rule| !rule.fired) {
            if self.input.ends_with(&rule.suffix) {
                rule.fired = true;
                self.pending.push((now + rule.delay, rule.output.clone()));
            }
        }
        Ok(())
    }
}

/// Counters shared by a [`FakeAllocator`] and everything it hands out.
#[derive(Debug, Default)]
pub struct SessionProbe {
    sessions_opened: AtomicUsize,
    master_closes: AtomicUsize,
    slave_closes: AtomicUsize,
    spawns: AtomicUsize,
    channels_opened: AtomicUsize,
    terminations: AtomicUsize,
    last_command: Mutex<Option<LaunchCommand>>,
}

impl SessionProbe {
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn master_closes(&self) -> usize {
        self.master_closes.load(Ordering::SeqCst)
    }

    pub fn slave_closes(&self) -> usize {
        self.slave_closes.load(Ordering::SeqCst)
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn channels_opened(&self) -> usize {
        self.channels_opened.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn last_command(&self) -> Option<LaunchCommand> {
        self.last_command.lock().clone()
    }
}

type TransportFactory = Box<dyn Fn() -> ScriptedTransport + Send + Sync>;

#[derive(Debug, Clone)]
enum Failure {
    Allocation(String),
    Spawn(String),
}

/// Allocator whose sessions launch a [`FakeChild`] wired to a scripted transport.
pub struct FakeAllocator {
    factory: TransportFactory,
    failure: Option<Failure>,
    probe: Arc<SessionProbe>,
}

impl FakeAllocator {
    pub fn new(factory: impl Fn() -> ScriptedTransport + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            failure: None,
            probe: Arc::new(SessionProbe::default()),
        }
    }

    pub fn failing_allocation(reason: impl Into<String>) -> Self {
        let mut allocator = Self::new(|| ScriptedTransport::new(Arc::new(ManualClock::new())));
        allocator.failure = Some(Failure::Allocation(reason.into()));
        allocator
    }

    pub fn failing_spawn(reason: impl Into<String>) -> Self {
        let mut allocator = Self::new(|| ScriptedTransport::new(Arc::new(ManualClock::new())));
        allocator.failure = Some(Failure::Spawn(reason.into()));
        allocator
    }

    pub fn probe(&self) -> Arc<SessionProbe> {
        self.probe.clone()
    }
}

impl PtyAllocator for FakeAllocator {
    fn open(&self, size: TerminalSize) -> Result<Box<dyn TerminalSession>, TerminalError> {
        if let Some(Failure::Allocation(reason)) = &self.failure {
            return Err(TerminalError::Allocation(reason.clone()));
        }

        self.probe.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            size,
            master_open: true,
            slave_open: true,
            transport: Some((self.factory)()),
            spawn_failure: match &self.failure {
                Some(Failure::Spawn(reason)) => Some(reason.clone()),
                _ => None,
            },
            probe: self.probe.clone(),
        }))
    }
}

pub struct FakeSession {
    size: TerminalSize,
    master_open: bool,
    slave_open: bool,
    transport: Option<ScriptedTransport>,
    spawn_failure: Option<String>,
    probe: Arc<SessionProbe>,
}

impl TerminalSession for FakeSession {
    fn size(&self) -> TerminalSize {
        self.size
    }

    fn spawn_child(
        &mut self,
        command: &LaunchCommand,
    ) -> Result<Box<dyn ChildProcess>, TerminalError> {
        *self.probe.last_command.lock() = Some(command.clone());

        if let Some(reason) = &self.spawn_failure {
            return Err(TerminalError::Spawn {
                program: command.program().display().to_string(),
                reason: reason.clone(),
            });
        }

        self.probe.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeChild {
            pid: 4242,
            probe: self.probe.clone(),
        }))
    }

    fn release_slave(&mut self) {
        if std::mem::take(&mut self.slave_open) {
            self.probe.slave_closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn open_channel(&mut self) -> Result<NonBlockingChannel, TerminalError> {
        if !self.master_open {
            return Err(TerminalError::Channel("session is closed".to_string()));
        }
        let transport = self
            .transport
            .take()
            .ok_or_else(|| TerminalError::Channel("writer already taken".to_string()))?;
        self.probe.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(NonBlockingChannel::new(Box::new(transport)))
    }

    fn close(&mut self) {
        self.release_slave();
        if std::mem::take(&mut self.master_open) {
            self.probe.master_closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        !self.master_open && !self.slave_open
    }
}

#[derive(Debug)]
pub struct FakeChild {
    pid: u32,
    probe: Arc<SessionProbe>,
}

impl ChildProcess for FakeChild {
    fn process_id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) {
        self.probe.terminations.fetch_add(1, Ordering::SeqCst);
    }
}
