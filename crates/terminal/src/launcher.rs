//! Launching the target program on a session and tearing it down again.

use crate::channel::NonBlockingChannel;
use crate::error::TerminalError;
use crate::session::TerminalSession;
use portable_pty::CommandBuilder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Program, arguments, directory and environment overrides for one launch.
///
/// Overrides are layered onto the inherited environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub(crate) fn to_command_builder(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.working_dir {
            cmd.cwd(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// A launched child. Termination is best-effort.
pub trait ChildProcess: Send {
    fn process_id(&self) -> Option<u32>;

    /// Ask the child to stop and reap it if it does.
    fn terminate(&mut self);
}

/// The running child plus the parent's channel to it.
///
/// Dropping the handle terminates the child if [`ChildHandle::terminate`]
/// hasn't been called yet.
pub struct ChildHandle {
    child: Box<dyn ChildProcess>,
    channel: NonBlockingChannel,
    terminated: bool,
}

impl ChildHandle {
    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn channel_mut(&mut self) -> &mut NonBlockingChannel {
        &mut self.channel
    }

    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.child.terminate();
        tracing::debug!(pid = ?self.child.process_id(), "Child process terminated");
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Launch `command` on `session`.
///
/// On success the parent's slave descriptor is released (the child owns it now)
/// and the master side is wrapped in a non-blocking channel. On any failure the
/// session is closed before the error is returned.
pub fn spawn(
    session: &mut dyn TerminalSession,
    command: &LaunchCommand,
) -> Result<ChildHandle, TerminalError> {
    let mut child = match session.spawn_child(command) {
        Ok(child) => child,
        Err(error) => {
            session.close();
            return Err(error);
        }
    };

    tracing::info!(
        pid = ?child.process_id(),
        program = %command.program().display(),
        "Child process started"
    );

    session.release_slave();

    let channel = match session.open_channel() {
        Ok(channel) => channel,
        Err(error) => {
            child.terminate();
            session.close();
            return Err(error);
        }
    };

    Ok(ChildHandle {
        child,
        channel,
        terminated: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PtyAllocator, TerminalSize};
    use crate::testing::{FakeAllocator, ManualClock, ScriptedTransport};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn target() -> LaunchCommand {
        LaunchCommand::new("/opt/homebrew/bin/claude")
            .working_dir("/home/user")
            .env("TERM", "xterm-256color")
    }

    #[test]
    fn builder_collects_overrides() {
        let command = LaunchCommand::new("/bin/cat")
            .args(["-u", "-"])
            .working_dir("/tmp")
            .env("TERM", "xterm-256color")
            .env("PATH", "/usr/bin:/bin");

        assert_eq!(command.program(), Path::new("/bin/cat"));
        assert_eq!(command.arguments(), ["-u", "-"]);
        assert_eq!(command.current_dir(), Some(Path::new("/tmp")));
        assert_eq!(
            command.env_overrides().get("PATH").map(String::as_str),
            Some("/usr/bin:/bin")
        );
    }

    #[test]
    fn command_builder_carries_program_and_env() {
        let builder = target().to_command_builder();
        let argv: Vec<String> = builder
            .get_argv()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(argv, vec!["/opt/homebrew/bin/claude"]);
        assert_eq!(
            builder.get_env("TERM").map(|v| v.to_string_lossy().into_owned()),
            Some("xterm-256color".to_string())
        );
    }

    #[test]
    fn spawn_failure_closes_both_descriptors_once() {
        let allocator = FakeAllocator::failing_spawn("No such file or directory (os error 2)");
        let probe = allocator.probe();
        let mut session = allocator.open(TerminalSize::default()).unwrap();

        let err = match spawn(session.as_mut(), &target()) {
            Ok(_) => panic!("spawn should fail"),
            Err(err) => err,
        };

        assert!(matches!(err, TerminalError::Spawn { .. }));
        assert!(err.to_string().contains("os error 2"));
        assert!(session.is_closed());
        session.close();
        assert_eq!(probe.master_closes(), 1);
        assert_eq!(probe.slave_closes(), 1);
        assert_eq!(probe.channels_opened(), 0);
    }

    #[test]
    fn successful_spawn_releases_slave_and_keeps_master() {
        let clock = Arc::new(ManualClock::new());
        let allocator = FakeAllocator::new(move || ScriptedTransport::new(clock.clone()));
        let probe = allocator.probe();
        let mut session = allocator.open(TerminalSize::default()).unwrap();

        let handle = spawn(session.as_mut(), &target()).unwrap();

        assert_eq!(handle.process_id(), Some(4242));
        assert_eq!(probe.slave_closes(), 1);
        assert_eq!(probe.master_closes(), 0);
        assert_eq!(probe.channels_opened(), 1);
        assert_eq!(probe.last_command().as_ref(), Some(&target()));
    }

    #[test]
    fn dropping_handle_terminates_child_once() {
        let clock = Arc::new(ManualClock::new());
        let allocator = FakeAllocator::new(move || ScriptedTransport::new(clock.clone()));
        let probe = allocator.probe();
        let mut session = allocator.open(TerminalSize::default()).unwrap();

        let mut handle = spawn(session.as_mut(), &target()).unwrap();
        handle.terminate();
        handle.terminate();
        drop(handle);

        assert_eq!(probe.terminations(), 1);
    }
}
