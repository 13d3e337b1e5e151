//! Pseudo-terminal sessions.
//!
//! A session owns the master/slave descriptor pair from allocation until
//! [`TerminalSession::close`]. Closing is idempotent and releases each side
//! exactly once; dropping a native session closes it.

use crate::channel::{MasterTransport, NonBlockingChannel};
use crate::error::TerminalError;
use crate::launcher::{ChildProcess, LaunchCommand};
use portable_pty::{native_pty_system, Child, MasterPty, PtySize, SlavePty};

/// Fixed screen geometry of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl TerminalSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self {
            rows: settings::constants::terminal::ROWS,
            cols: settings::constants::terminal::COLS,
        }
    }
}

impl From<TerminalSize> for PtySize {
    fn from(size: TerminalSize) -> Self {
        PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// Creates sessions. Swapped for a fake in tests.
pub trait PtyAllocator: Send + Sync {
    /// Allocate a linked master/slave pair. Leaves nothing behind on failure.
    fn open(&self, size: TerminalSize) -> Result<Box<dyn TerminalSession>, TerminalError>;
}

/// One allocated master/slave pair.
pub trait TerminalSession: Send {
    fn size(&self) -> TerminalSize;

    /// Launch `command` with stdin, stdout and stderr bound to the slave side.
    fn spawn_child(
        &mut self,
        command: &LaunchCommand,
    ) -> Result<Box<dyn ChildProcess>, TerminalError>;

    /// Close the parent's copy of the slave descriptor. The child keeps its own.
    fn release_slave(&mut self);

    /// Wrap the master side in a non-blocking channel.
    fn open_channel(&mut self) -> Result<NonBlockingChannel, TerminalError>;

    /// Release both descriptors. No-op after the first call.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Allocator backed by the platform PTY implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePtyAllocator;

impl PtyAllocator for NativePtyAllocator {
    fn open(&self, size: TerminalSize) -> Result<Box<dyn TerminalSession>, TerminalError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(size.into())
            .map_err(|e| TerminalError::Allocation(format!("{:#}", e)))?;

        tracing::debug!(rows = size.rows, cols = size.cols, "PTY allocated");

        Ok(Box::new(NativeSession {
            master: Some(pair.master),
            slave: Some(pair.slave),
            size,
        }))
    }
}

/// Session over a real master/slave pair.
pub struct NativeSession {
    master: Option<Box<dyn MasterPty + Send>>,
    slave: Option<Box<dyn SlavePty + Send>>,
    size: TerminalSize,
}

impl TerminalSession for NativeSession {
    fn size(&self) -> TerminalSize {
        self.size
    }

    fn spawn_child(
        &mut self,
        command: &LaunchCommand,
    ) -> Result<Box<dyn ChildProcess>, TerminalError> {
        let spawn_error = |reason: String| TerminalError::Spawn {
            program: command.program().display().to_string(),
            reason,
        };

        let slave = self
            .slave
            .as_ref()
            .ok_or_else(|| spawn_error("slave side already released".to_string()))?;

        let child = slave
            .spawn_command(command.to_command_builder())
            .map_err(|e| spawn_error(format!("{:#}", e)))?;

        Ok(Box::new(NativeChild { child }))
    }

    fn release_slave(&mut self) {
        if self.slave.take().is_some() {
            tracing::trace!("Released parent copy of PTY slave");
        }
    }

    fn open_channel(&mut self) -> Result<NonBlockingChannel, TerminalError> {
        let master = self
            .master
            .as_ref()
            .ok_or_else(|| TerminalError::Channel("session is closed".to_string()))?;

        let reader = master
            .try_clone_reader()
            .map_err(|e| TerminalError::Channel(format!("{:#}", e)))?;
        let writer = master
            .take_writer()
            .map_err(|e| TerminalError::Channel(format!("{:#}", e)))?;

        let transport = MasterTransport::start(reader, writer)
            .map_err(|e| TerminalError::Channel(e.to_string()))?;

        Ok(NonBlockingChannel::new(Box::new(transport)))
    }

    fn close(&mut self) {
        let master = self.master.take();
        let slave = self.slave.take();
        if master.is_some() || slave.is_some() {
            drop(slave);
            drop(master);
            tracing::debug!("PTY session closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.master.is_none() && self.slave.is_none()
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Child launched by [`NativeSession::spawn_child`].
struct NativeChild {
    child: Box<dyn Child + Send + Sync>,
}

impl ChildProcess for NativeChild {
    fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn terminate(&mut self) {
        // Kill the child process if still running
        if let Err(e) = self.child.kill() {
            // ESRCH (no such process) is expected if already exited
            tracing::debug!("Kill child process: {}", e);
        }

        // Wait for child to reap it (avoid zombie)
        if let Err(e) = self.child.wait() {
            tracing::debug!("Wait for child process: {}", e);
        }
    }
}
