//! Usage fetching on top of the terminal automation core.
//!
//! A [`UsageFetcher`] opens a pseudo-terminal, launches the target program,
//! drives it through the usage-screen protocol and parses the last stage into a
//! [`UsageSnapshot`]. Resources are released before the snapshot is delivered,
//! whether or not the fetch succeeded.

mod debug_log;
mod fetcher;
mod gate;
mod observer;
mod protocol;
mod snapshot;

pub use debug_log::{DebugEntry, DebugLog};
pub use fetcher::{FetchHandle, UsageFetcher};
pub use gate::{FetchGate, FetchTicket};
pub use observer::{FetchObserver, FetchState, ObserverSet};
pub use protocol::{launch_command, usage_script, FetchOptions, USAGE_STAGE};
pub use snapshot::UsageSnapshot;
