use serde::Serialize;

/// Result of one fetch.
///
/// `percent_used` is always within `0..=100` when present. `raw_output` holds the
/// full transcript after a completed script, or a diagnostic line when the fetch
/// failed before any stage ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub percent_used: Option<f64>,
    pub reset_date_text: Option<String>,
    pub raw_output: String,
}

impl UsageSnapshot {
    pub fn new(
        percent_used: Option<f64>,
        reset_date_text: Option<String>,
        raw_output: impl Into<String>,
    ) -> Self {
        let percent_used = percent_used.filter(|percent| {
            let valid = (0.0..=100.0).contains(percent);
            if !valid {
                tracing::warn!(percent, "Discarding out-of-range usage percentage");
            }
            valid
        });

        Self {
            percent_used,
            reset_date_text,
            raw_output: raw_output.into(),
        }
    }

    /// Snapshot for a fetch that never reached the script.
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            percent_used: None,
            reset_date_text: None,
            raw_output: diagnostic.into(),
        }
    }

    pub fn has_usage(&self) -> bool {
        self.percent_used.is_some()
    }

    /// Same parsed values, ignoring the transcript.
    pub fn same_usage(&self, other: &UsageSnapshot) -> bool {
        self.percent_used == other.percent_used && self.reset_date_text == other.reset_date_text
    }
}
