//! Pseudo-terminal automation core.
//!
//! Allocates a PTY session, launches a program on its slave side, and drives it
//! through a timed interaction script over a non-blocking channel. The output is
//! a [`Transcript`] of everything the program printed, stage by stage.

pub mod channel;
pub mod clock;
mod error;
pub mod launcher;
pub mod observer;
pub mod script;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use channel::{NonBlockingChannel, PtyTransport};
pub use clock::{Clock, SystemClock};
pub use error::TerminalError;
pub use launcher::{ChildHandle, ChildProcess, LaunchCommand};
pub use observer::{NoopObserver, ScriptObserver, TracingObserver};
pub use script::{
    InteractionScript, InteractionStep, ParseTarget, ScriptRunner, StageResult, StepKind,
    Transcript,
};
pub use session::{NativePtyAllocator, PtyAllocator, TerminalSession, TerminalSize};
