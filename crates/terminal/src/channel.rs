//! Non-blocking access to the master side of a session.
//!
//! The master descriptor is read on a dedicated thread that forwards every chunk
//! over an mpsc channel; draining the channel with `try_recv` never blocks the
//! interaction script. Decoding is lossy: a chunk that is not valid UTF-8 is
//! dropped whole.

use crate::error::TerminalError;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// Byte-level access to a running session.
pub trait PtyTransport: Send {
    /// Next chunk already buffered, or `None` when nothing is waiting.
    fn try_read(&mut self) -> Option<Vec<u8>>;

    /// Write the whole payload.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Whether the reader has seen end-of-file from the child.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Transport over a real master descriptor.
pub struct MasterTransport {
    writer: Box<dyn Write + Send>,
    output_rx: Receiver<Vec<u8>>,
    exited: Arc<AtomicBool>,
    /// Never joined: the read fails with EIO (or hits EOF) once the child is
    /// reaped and the master is closed, and the thread exits on its own.
    _reader_thread: thread::JoinHandle<()>,
}

impl MasterTransport {
    /// Start forwarding `reader` output to an internal queue.
    pub fn start(
        mut reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
    ) -> io::Result<Self> {
        let (output_tx, output_rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>) = mpsc::channel();

        let exited = Arc::new(AtomicBool::new(false));
        let exited_clone = exited.clone();

        let reader_thread = thread::Builder::new()
            .name("ptyprobe-pty-reader".into())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            exited_clone.store(true, Ordering::SeqCst);
                            break;
                        }
                        Ok(n) => {
                            if output_tx.send(buf[..n].to_vec()).is_err() {
                                break; // Channel closed
                            }
                        }
                        Err(e) => {
                            // EIO once the child side is gone
                            tracing::debug!("PTY reader stopped: {}", e);
                            exited_clone.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            writer,
            output_rx,
            exited,
            _reader_thread: reader_thread,
        })
    }
}

impl PtyTransport for MasterTransport {
    fn try_read(&mut self) -> Option<Vec<u8>> {
        self.output_rx.try_recv().ok()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    fn is_closed(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

/// Text-level channel used by the interaction script.
pub struct NonBlockingChannel {
    transport: Box<dyn PtyTransport>,
    dropped_bytes: usize,
}

impl NonBlockingChannel {
    pub fn new(transport: Box<dyn PtyTransport>) -> Self {
        Self {
            transport,
            dropped_bytes: 0,
        }
    }

    /// Everything currently buffered, decoded. Empty when nothing is waiting.
    pub fn drain_available(&mut self) -> String {
        let mut output = String::new();
        while let Some(chunk) = self.transport.try_read() {
            match String::from_utf8(chunk) {
                Ok(text) => output.push_str(&text),
                Err(e) => {
                    let len = e.as_bytes().len();
                    self.dropped_bytes += len;
                    tracing::trace!(bytes = len, "Dropped undecodable PTY chunk");
                }
            }
        }
        output
    }

    /// Write `text` to the child. No partial-write retry beyond `write_all`.
    pub fn send(&mut self, text: &str) -> Result<(), TerminalError> {
        self.transport
            .write_all(text.as_bytes())
            .map_err(TerminalError::Write)
    }

    /// Bytes discarded so far because they were not valid UTF-8.
    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }

    /// Whether the child side has hung up.
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}
