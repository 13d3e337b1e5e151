//! Errors raised while setting up or driving a pseudo-terminal.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    /// The OS could not create a linked master/slave pair.
    #[error("Failed to create PTY: {0}")]
    Allocation(String),

    /// The child process could not be launched on the slave side.
    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The master side could not be turned into a read/write channel.
    #[error("Failed to open PTY channel: {0}")]
    Channel(String),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),
}

impl TerminalError {
    /// Whether the failure happened before the terminal device existed.
    pub fn is_allocation(&self) -> bool {
        matches!(self, TerminalError::Allocation(_))
    }
}
