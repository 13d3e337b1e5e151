//! Bounded in-memory log of fetch activity, for display by the caller.

use crate::observer::{FetchObserver, FetchState};
use crate::snapshot::UsageSnapshot;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use settings::constants::debug_log::MAX_ENTRIES;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use terminal::{InteractionStep, ScriptObserver, StageResult, TerminalError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    pub at: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for DebugEntry {
    /// `[HH:MM:SS] message`, local time.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Keeps the most recent `capacity` messages; the oldest is dropped first.
#[derive(Debug)]
pub struct DebugLog {
    capacity: usize,
    entries: Mutex<VecDeque<DebugEntry>>,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }
}

impl DebugLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, message: impl Into<String>) {
        self.push_at(Local::now(), message);
    }

    pub fn push_at(&self, at: DateTime<Local>, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(DebugEntry {
            at,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Messages only, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl ScriptObserver for DebugLog {
    fn stage_started(&self, index: usize, step: &InteractionStep) {
        self.push(format!("Stage {} ({}) started", index, step.kind()));
    }

    fn write_failed(&self, index: usize, error: &TerminalError) {
        self.push(format!("Stage {}: write failed: {}", index, error));
    }

    fn idle_ceiling_reached(&self, index: usize, waited: Duration) {
        self.push(format!(
            "Stage {}: still busy after {}ms, moving on",
            index,
            waited.as_millis()
        ));
    }

    fn stage_finished(&self, index: usize, result: &StageResult) {
        self.push(format!(
            "Stage {} ({}) finished, {} chars",
            index,
            result.kind,
            result.text.chars().count()
        ));
    }
}

impl FetchObserver for DebugLog {
    fn state_changed(&self, state: FetchState) {
        match state {
            FetchState::Created => self.push("Starting fetch..."),
            FetchState::ProcessRunning { .. } | FetchState::Closed => {
                self.push(format!("Fetch {}", state))
            }
            _ => {}
        }
    }

    fn fetch_failed(&self, error: &TerminalError) {
        self.push(format!("Fetch failed: {}", error));
    }

    fn snapshot_ready(&self, snapshot: &UsageSnapshot) {
        match (&snapshot.percent_used, &snapshot.reset_date_text) {
            (Some(percent), reset) => {
                self.push(format!("Parsed: {}%", percent));
                if let Some(reset) = reset {
                    self.push(format!("Reset date: {}", reset));
                }
            }
            (None, _) => self.push("Failed to parse percentage"),
        }
    }
}
