//! TOML config file support.
//!
//! Config location: `~/.config/ptyprobe/config.toml`

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;

/// Stage timing, in milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimingConfig {
    /// Quiet period that ends an idle wait.
    pub idle_gap_ms: u64,
    /// Poll cadence inside an idle wait.
    pub idle_poll_ms: u64,
    /// Upper bound on an idle wait. Unset means wait for quiescence forever.
    pub idle_ceiling_ms: Option<u64>,
    /// Length of each poll window.
    pub poll_window_ms: u64,
    /// Sleep between drains inside a poll window.
    pub poll_interval_ms: u64,
    /// Delay after each typed character.
    pub keystroke_delay_ms: u64,
    /// Pause between typing and the terminator.
    pub settle_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_gap_ms: as_millis(constants::timing::IDLE_GAP),
            idle_poll_ms: as_millis(constants::timing::IDLE_POLL_INTERVAL),
            idle_ceiling_ms: None,
            poll_window_ms: as_millis(constants::timing::POLL_WINDOW),
            poll_interval_ms: as_millis(constants::timing::POLL_INTERVAL),
            keystroke_delay_ms: as_millis(constants::timing::KEYSTROKE_DELAY),
            settle_delay_ms: as_millis(constants::timing::SETTLE_DELAY),
        }
    }
}

impl TimingConfig {
    pub fn idle_gap(&self) -> Duration {
        Duration::from_millis(self.idle_gap_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn idle_ceiling(&self) -> Option<Duration> {
        self.idle_ceiling_ms.map(Duration::from_millis)
    }

    pub fn poll_window(&self) -> Duration {
        Duration::from_millis(self.poll_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Anchored scanning parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParserConfig {
    pub anchor: String,
    pub percent_window: usize,
    pub reset_window: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            anchor: constants::parser::ANCHOR.to_string(),
            percent_window: constants::parser::PERCENT_WINDOW,
            reset_window: constants::parser::RESET_WINDOW,
        }
    }
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Program driven through the pseudo-terminal.
    pub executable: String,
    /// Arguments passed to the program.
    pub arguments: Vec<String>,
    /// Directory the program starts in. Defaults to the home directory.
    pub working_directory: Option<String>,
    /// `TERM` value for the child.
    pub term: String,
    /// Directories joined into the child's `PATH`, in order.
    pub search_path: Vec<String>,
    /// Extra environment variables layered over the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Session height.
    pub rows: u16,
    /// Session width.
    pub cols: u16,
    /// Command typed at human pace once the program is ready.
    pub command: String,
    pub timing: TimingConfig,
    pub parser: ParserConfig,
    /// Capacity of the in-memory debug log.
    pub debug_log_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executable: constants::process::DEFAULT_EXECUTABLE.to_string(),
            arguments: Vec::new(),
            working_directory: None,
            term: constants::terminal::TERM.to_string(),
            search_path: constants::process::SEARCH_PATH
                .iter()
                .map(|dir| dir.to_string())
                .collect(),
            env: BTreeMap::new(),
            rows: constants::terminal::ROWS,
            cols: constants::terminal::COLS,
            command: constants::input::USAGE_COMMAND.to_string(),
            timing: TimingConfig::default(),
            parser: ParserConfig::default(),
            debug_log_entries: constants::debug_log::MAX_ENTRIES,
        }
    }
}

impl Config {
    /// Resolved working directory (`~` expanded, home directory when unset).
    pub fn working_directory(&self) -> PathBuf {
        match &self.working_directory {
            Some(dir) => ptyprobe_paths::expand_home(dir),
            None => ptyprobe_paths::home_dir().clone(),
        }
    }

    /// The `PATH` value handed to the child.
    pub fn search_path_value(&self) -> String {
        self.search_path.join(":")
    }

    /// Replace values that would stall or break a fetch with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Config::default();

        if self.rows == 0 || self.cols == 0 {
            tracing::warn!(
                "Invalid terminal size {}x{}, using {}x{}",
                self.rows,
                self.cols,
                defaults.rows,
                defaults.cols
            );
            self.rows = defaults.rows;
            self.cols = defaults.cols;
        }

        let timing = &mut self.timing;
        if timing.idle_poll_ms == 0 {
            tracing::warn!("idle-poll-ms must be positive, using default");
            timing.idle_poll_ms = defaults.timing.idle_poll_ms;
        }
        if timing.poll_interval_ms == 0 {
            tracing::warn!("poll-interval-ms must be positive, using default");
            timing.poll_interval_ms = defaults.timing.poll_interval_ms;
        }

        if self.parser.anchor.is_empty() {
            tracing::warn!("Empty parser anchor, using default");
            self.parser.anchor = defaults.parser.anchor;
        }

        self
    }
}

fn as_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Default config file content with comments (generated on demand).
const DEFAULT_CONFIG: &str = r#"# ptyprobe configuration

# Program driven through the pseudo-terminal
executable = "/opt/homebrew/bin/claude"

# Extra arguments for the program
# arguments = []

# Directory the program starts in (defaults to your home directory)
# working-directory = "~"

# Terminal type and search path handed to the program
term = "xterm-256color"
search-path = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin", "/usr/sbin", "/sbin"]

# Extra environment variables
# [env]
# NO_COLOR = "1"

# Session geometry
rows = 24
cols = 80

# Command typed once the program is ready
command = "/usage"

# Entries kept in the in-memory debug log
debug-log-entries = 100

[timing]
# Quiet period that ends the startup wait, and how often it polls
idle-gap-ms = 2000
idle-poll-ms = 500

# Give up waiting for quiet after this long (unset: wait forever)
# idle-ceiling-ms = 30000

# Polling window after each Enter
poll-window-ms = 5000
poll-interval-ms = 500

# Human-paced typing
keystroke-delay-ms = 100
settle-delay-ms = 1000

[parser]
anchor = "Current week (all models)"
percent-window = 3
reset-window = 5
"#;

/// Return the config file path.
pub fn config_path() -> PathBuf {
    ptyprobe_paths::config_file()
}

/// Ensure the config file exists, creating a default if missing.
/// Returns the path to the config file.
pub fn ensure_config_file() -> Option<PathBuf> {
    ensure_config_file_at(&config_path())
}

/// Like [`ensure_config_file`] for an explicit location.
pub fn ensure_config_file_at(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        let parent = path.parent()?;
        std::fs::create_dir_all(parent).ok()?;
        std::fs::write(path, DEFAULT_CONFIG).ok()?;
        tracing::info!("Created default config at {:?}", path);
    }
    Some(path.to_path_buf())
}

/// Load and parse the config file. Returns default on any error.
pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// Load and parse a config file at an explicit location. Returns default on any error.
pub fn load_config_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > constants::settings::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str::<Config>(&content) {
        Ok(cfg) => cfg.sanitized(),
        Err(e) => {
            tracing::warn!("Failed to parse config.toml: {}", e);
            Config::default()
        }
    }
}
