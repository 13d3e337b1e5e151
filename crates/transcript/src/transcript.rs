//! Anchored scanning of raw terminal transcripts.
//!
//! Terminal output moves the cursor with carriage returns as often as with line
//! feeds, so a transcript is split on any run of `\r`/`\n` and empty lines are
//! dropped. Values are then located relative to an anchor line:
//!
//! - the percentage is the first `<digits>% used` (case-insensitive) within the
//!   few lines after an anchor;
//! - the reset date is the text between `Resets` and the next `(` on the first
//!   matching line within a slightly wider window.
//!
//! When an anchor's window has no match the search moves on to the next line that
//! contains the anchor. Everything here is pure.

use once_cell::sync::Lazy;
use regex::Regex;
use settings::constants::parser;

/// "45% used", any case.
static PERCENT_USED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)%\s+used").unwrap());

/// "Resets Dec 22, 1pm (America/Chicago)" captures "Dec 22, 1pm".
static RESETS_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"Resets\s+([^(]+?)\s*\(").unwrap());

const RESETS_MARKER: &str = "Resets";

/// Non-empty logical lines, splitting on any run of CR and/or LF.
pub fn logical_lines(transcript: &str) -> impl Iterator<Item = &str> {
    transcript
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
}

/// Weekly usage percentage using the default anchor.
pub fn parse_percentage(transcript: &str) -> Option<f64> {
    AnchorScanner::default().percentage(transcript)
}

/// Weekly reset date text using the default anchor.
pub fn parse_reset_date(transcript: &str) -> Option<String> {
    AnchorScanner::default().reset_date(transcript)
}

/// Anchor marker plus the window sizes searched after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorScanner {
    anchor: String,
    percent_window: usize,
    reset_window: usize,
}

impl Default for AnchorScanner {
    fn default() -> Self {
        Self {
            anchor: parser::ANCHOR.to_string(),
            percent_window: parser::PERCENT_WINDOW,
            reset_window: parser::RESET_WINDOW,
        }
    }
}

impl AnchorScanner {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
            ..Self::default()
        }
    }

    pub fn with_percent_window(mut self, lines: usize) -> Self {
        self.percent_window = lines;
        self
    }

    pub fn with_reset_window(mut self, lines: usize) -> Self {
        self.reset_window = lines;
        self
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn percentage(&self, transcript: &str) -> Option<f64> {
        self.scan(transcript, self.percent_window, extract_percentage)
    }

    pub fn reset_date(&self, transcript: &str) -> Option<String> {
        self.scan(transcript, self.reset_window, extract_reset_date)
    }

    /// First value `extract` finds within `window` lines after any anchor line.
    fn scan<T>(
        &self,
        transcript: &str,
        window: usize,
        extract: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let lines: Vec<&str> = logical_lines(transcript).collect();

        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(self.anchor.as_str()))
            .find_map(|(index, _)| {
                lines
                    .iter()
                    .skip(index + 1)
                    .take(window)
                    .find_map(|line| extract(line))
            })
    }
}

fn extract_percentage(line: &str) -> Option<f64> {
    let captures = PERCENT_USED.captures(line)?;
    captures.get(1)?.as_str().parse().ok()
}

fn extract_reset_date(line: &str) -> Option<String> {
    if !line.contains(RESETS_MARKER) {
        return None;
    }
    let captures = RESETS_AT.captures(line)?;
    Some(captures.get(1)?.as_str().trim().to_string())
}
