//! Rendering snapshots for the terminal or for scripts.

use anyhow::Result;
use serde::Serialize;
use usage::UsageSnapshot;

#[derive(Serialize)]
struct Report<'a> {
    percent_used: Option<f64>,
    reset_date_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_output: Option<&'a str>,
}

pub fn render_json(snapshot: &UsageSnapshot, include_raw: bool) -> Result<String> {
    let report = Report {
        percent_used: snapshot.percent_used,
        reset_date_text: snapshot.reset_date_text.as_deref(),
        raw_output: include_raw.then_some(snapshot.raw_output.as_str()),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn render_text(snapshot: &UsageSnapshot, include_raw: bool) -> String {
    let mut out = match snapshot.percent_used {
        Some(percent) => format!("Weekly usage: {}%\n", percent),
        None => "Weekly usage: not found\n".to_string(),
    };
    if let Some(reset) = &snapshot.reset_date_text {
        out.push_str(&format!("Resets: {}\n", reset));
    }

    if include_raw {
        out.push_str("\n--- raw output ---\n");
        out.push_str(&snapshot.raw_output);
        if !snapshot.raw_output.ends_with('\n') {
            out.push('\n');
        }
    } else if is_diagnostic(snapshot) {
        out.push_str(&format!("{}\n", snapshot.raw_output));
    }
    out
}

/// Failed fetches carry a single diagnostic line instead of a transcript.
fn is_diagnostic(snapshot: &UsageSnapshot) -> bool {
    !snapshot.has_usage()
        && !snapshot.raw_output.is_empty()
        && !snapshot.raw_output.contains(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parsed() -> UsageSnapshot {
        UsageSnapshot::new(
            Some(37.0),
            Some("Dec 22, 1pm".to_string()),
            "Current week (all models)\r\n37% used\r\n",
        )
    }

    #[test]
    fn text_shows_percentage_and_reset() {
        assert_eq!(
            render_text(&parsed(), false),
            "Weekly usage: 37%\nResets: Dec 22, 1pm\n"
        );
    }

    #[test]
    fn text_includes_raw_output_on_request() {
        let text = render_text(&parsed(), true);
        assert!(text.ends_with("--- raw output ---\nCurrent week (all models)\r\n37% used\r\n"));
    }

    #[test]
    fn text_shows_failure_diagnostic() {
        let snapshot = UsageSnapshot::failed("Failed to create PTY: out of ptys");
        assert_eq!(
            render_text(&snapshot, false),
            "Weekly usage: not found\nFailed to create PTY: out of ptys\n"
        );
    }

    #[test]
    fn json_omits_raw_output_by_default() {
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&parsed(), false).unwrap()).unwrap();

        assert_eq!(json["percent_used"], 37.0);
        assert_eq!(json["reset_date_text"], "Dec 22, 1pm");
        assert!(json.get("raw_output").is_none());
    }

    #[test]
    fn json_includes_raw_output_on_request() {
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&parsed(), true).unwrap()).unwrap();

        assert_eq!(
            json["raw_output"],
            "Current week (all models)\r\n37% used\r\n"
        );
    }
}
