//! Centralized configuration constants for ptyprobe.
//!
//! These are the reference defaults for one usage fetch. Every value here can be
//! overridden from `config.toml`; the defaults reproduce the observed behavior of
//! the interactive program exactly.

/// Pseudo-terminal configuration.
pub mod terminal {
    /// Screen height of the session.
    pub const ROWS: u16 = 24;
    /// Screen width of the session.
    pub const COLS: u16 = 80;
    /// Terminal type advertised to the child.
    pub const TERM: &str = "xterm-256color";
}

/// Child process configuration.
pub mod process {
    /// Executable launched when the config doesn't name one.
    pub const DEFAULT_EXECUTABLE: &str = "/opt/homebrew/bin/claude";

    /// Executable search path handed to the child, in order.
    pub const SEARCH_PATH: &[&str] = &[
        "/opt/homebrew/bin",
        "/usr/local/bin",
        "/usr/bin",
        "/bin",
        "/usr/sbin",
        "/sbin",
    ];
}

/// Interaction timing.
pub mod timing {
    use std::time::Duration;

    /// Quiet period that ends an idle wait.
    pub const IDLE_GAP: Duration = Duration::from_millis(2000);
    /// Cadence at which an idle wait polls the channel.
    pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);
    /// Total length of a poll window.
    pub const POLL_WINDOW: Duration = Duration::from_millis(5000);
    /// Sleep between drains inside a poll window.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
    /// Delay after each typed character.
    pub const KEYSTROKE_DELAY: Duration = Duration::from_millis(100);
    /// Pause after typing, before the terminator is sent.
    pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);
}

/// Keystrokes sent to the child.
pub mod input {
    /// Slash command typed to open the usage screen.
    pub const USAGE_COMMAND: &str = "/usage";
    /// Enter key as the terminal delivers it.
    pub const ENTER: &str = "\r";
}

/// Transcript scanning.
pub mod parser {
    /// Marker line that precedes the weekly usage figures.
    pub const ANCHOR: &str = "Current week (all models)";
    /// Lines after an anchor searched for the percentage.
    pub const PERCENT_WINDOW: usize = 3;
    /// Lines after an anchor searched for the reset date.
    pub const RESET_WINDOW: usize = 5;
}

/// In-memory debug log.
pub mod debug_log {
    /// Entries kept before the oldest is dropped.
    pub const MAX_ENTRIES: usize = 100;
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    /// Settings files should be tiny; anything larger is suspicious.
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants, clippy::const_is_empty)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_window_is_whole_number_of_intervals() {
        let window = timing::POLL_WINDOW.as_millis();
        let interval = timing::POLL_INTERVAL.as_millis();
        assert_eq!(
            window % interval,
            0,
            "POLL_WINDOW ({}ms) should be a multiple of POLL_INTERVAL ({}ms)",
            window,
            interval
        );
        assert_eq!(window / interval, 10);
    }

    #[test]
    fn test_idle_poll_is_shorter_than_gap() {
        assert!(
            timing::IDLE_POLL_INTERVAL < timing::IDLE_GAP,
            "IDLE_POLL_INTERVAL ({:?}) should be shorter than IDLE_GAP ({:?})",
            timing::IDLE_POLL_INTERVAL,
            timing::IDLE_GAP
        );
    }

    #[test]
    fn test_reset_window_covers_percent_window() {
        assert!(parser::RESET_WINDOW >= parser::PERCENT_WINDOW);
    }

    #[test]
    fn test_search_path_has_system_dirs() {
        assert!(process::SEARCH_PATH.contains(&"/usr/bin"));
        assert!(process::SEARCH_PATH.contains(&"/bin"));
    }

    #[test]
    fn test_geometry_is_classic_terminal() {
        assert_eq!((terminal::ROWS, terminal::COLS), (24, 80));
    }
}
