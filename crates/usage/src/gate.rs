use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lets at most one fetch run at a time.
///
/// Clones share the same flag. The flag is held by the returned [`FetchTicket`]
/// and released when the ticket drops.
#[derive(Debug, Clone, Default)]
pub struct FetchGate {
    busy: Arc<AtomicBool>,
}

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another fetch holds the gate.
    pub fn try_begin(&self) -> Option<FetchTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FetchTicket {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[must_use = "the gate reopens as soon as the ticket is dropped"]
#[derive(Debug)]
pub struct FetchTicket {
    busy: Arc<AtomicBool>,
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
