//! The usage-screen interaction protocol and the launch it runs against.

use settings::constants::input;
use settings::Config;
use terminal::{InteractionScript, InteractionStep, LaunchCommand, ParseTarget, TerminalSize};
use transcript::AnchorScanner;

/// Index of the last poll window, whose output holds the usage screen.
pub const USAGE_STAGE: usize = 5;

/// Everything one fetch needs to know up front.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub command: LaunchCommand,
    pub size: TerminalSize,
    pub script: InteractionScript,
    pub scanner: AnchorScanner,
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: launch_command(config),
            size: TerminalSize::new(config.rows, config.cols),
            script: usage_script(config),
            scanner: AnchorScanner::new(config.parser.anchor.as_str())
                .with_percent_window(config.parser.percent_window)
                .with_reset_window(config.parser.reset_window),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Program, directory and environment for the target.
pub fn launch_command(config: &Config) -> LaunchCommand {
    let mut command = LaunchCommand::new(&config.executable)
        .args(config.arguments.iter().cloned())
        .working_dir(config.working_directory())
        .env("TERM", config.term.as_str())
        .env("PATH", config.search_path_value());

    for (key, value) in &config.env {
        command = command.env(key.as_str(), value.as_str());
    }
    command
}

/// Wait for the prompt, dismiss any startup screen, type the command, then watch
/// the result render.
pub fn usage_script(config: &Config) -> InteractionScript {
    let timing = &config.timing;

    let steps = vec![
        InteractionStep::IdleWait {
            max_gap: timing.idle_gap(),
            poll_interval: timing.idle_poll(),
            ceiling: timing.idle_ceiling(),
        },
        InteractionStep::send(input::ENTER),
        InteractionStep::poll_window(timing.poll_window(), timing.poll_interval()),
        InteractionStep::PacedType {
            text: config.command.clone(),
            per_char_delay: timing.keystroke_delay(),
            settle_delay: timing.settle_delay(),
        },
        InteractionStep::send(input::ENTER),
        InteractionStep::poll_window(timing.poll_window(), timing.poll_interval()),
    ];

    InteractionScript::new(steps, ParseTarget::Stage(USAGE_STAGE))
}
