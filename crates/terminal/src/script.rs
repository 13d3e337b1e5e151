//! Sequential interaction scripts.
//!
//! A script is a fixed list of steps run one after another against a
//! [`NonBlockingChannel`]. Each step has its own completion policy:
//!
//! - `IdleWait` polls until the child has been quiet for `max_gap`.
//! - `SendBytes` writes once and returns immediately.
//! - `PacedType` writes one character at a time with a delay after each, then settles.
//! - `PollWindow` drains a fixed number of times, whether or not output keeps coming.
//!
//! Every step yields a [`StageResult`]; the results, in order, form the [`Transcript`].

use crate::channel::NonBlockingChannel;
use crate::clock::Clock;
use crate::observer::ScriptObserver;
use settings::constants::timing;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// One step of an interaction script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionStep {
    IdleWait {
        max_gap: Duration,
        poll_interval: Duration,
        /// Give up after this long even if output never stops.
        ceiling: Option<Duration>,
    },
    SendBytes {
        payload: String,
    },
    PacedType {
        text: String,
        per_char_delay: Duration,
        settle_delay: Duration,
    },
    PollWindow {
        total_duration: Duration,
        poll_interval: Duration,
    },
}

impl InteractionStep {
    /// Wait for `max_gap` of silence, polling on the default cadence with no ceiling.
    pub fn idle_wait(max_gap: Duration) -> Self {
        InteractionStep::IdleWait {
            max_gap,
            poll_interval: timing::IDLE_POLL_INTERVAL,
            ceiling: None,
        }
    }

    pub fn send(payload: impl Into<String>) -> Self {
        InteractionStep::SendBytes {
            payload: payload.into(),
        }
    }

    /// Type `text` with `per_char_delay` after each character and the default settle delay.
    pub fn paced_type(text: impl Into<String>, per_char_delay: Duration) -> Self {
        InteractionStep::PacedType {
            text: text.into(),
            per_char_delay,
            settle_delay: timing::SETTLE_DELAY,
        }
    }

    pub fn poll_window(total_duration: Duration, poll_interval: Duration) -> Self {
        InteractionStep::PollWindow {
            total_duration,
            poll_interval,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            InteractionStep::IdleWait { .. } => StepKind::IdleWait,
            InteractionStep::SendBytes { .. } => StepKind::SendBytes,
            InteractionStep::PacedType { .. } => StepKind::PacedType,
            InteractionStep::PollWindow { .. } => StepKind::PollWindow,
        }
    }
}

/// Number of drains a poll window performs. Zero for a zero interval.
pub fn poll_count(total_duration: Duration, poll_interval: Duration) -> u128 {
    total_duration
        .as_nanos()
        .checked_div(poll_interval.as_nanos())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    IdleWait,
    SendBytes,
    PacedType,
    PollWindow,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::IdleWait => "idle-wait",
            StepKind::SendBytes => "send-bytes",
            StepKind::PacedType => "paced-type",
            StepKind::PollWindow => "poll-window",
        };
        f.write_str(name)
    }
}

/// Output collected while one step ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub kind: StepKind,
    pub text: String,
}

/// Which text the parser should look at after the script ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTarget {
    /// Output of the stage at this index.
    Stage(usize),
    FullTranscript,
}

/// Stage results in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    stages: Vec<StageResult>,
}

impl Transcript {
    pub fn push(&mut self, result: StageResult) {
        self.stages.push(result);
    }

    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Every stage's output concatenated in execution order.
    pub fn full_text(&self) -> String {
        self.stages.iter().map(|stage| stage.text.as_str()).collect()
    }

    pub fn stage_text(&self, index: usize) -> Option<&str> {
        self.stages.get(index).map(|stage| stage.text.as_str())
    }

    /// Text selected by `target`. Empty when the stage doesn't exist.
    pub fn target_text(&self, target: ParseTarget) -> Cow<'_, str> {
        match target {
            ParseTarget::Stage(index) => Cow::Borrowed(self.stage_text(index).unwrap_or_default()),
            ParseTarget::FullTranscript => Cow::Owned(self.full_text()),
        }
    }
}

/// Immutable list of steps plus the stage whose output gets parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionScript {
    steps: Vec<InteractionStep>,
    parse_target: ParseTarget,
}

impl InteractionScript {
    pub fn new(steps: Vec<InteractionStep>, parse_target: ParseTarget) -> Self {
        Self {
            steps,
            parse_target,
        }
    }

    pub fn steps(&self) -> &[InteractionStep] {
        &self.steps
    }

    pub fn parse_target(&self) -> ParseTarget {
        self.parse_target
    }
}

/// Runs scripts one step at a time on the calling thread.
pub struct ScriptRunner<'a, O: ScriptObserver + ?Sized> {
    clock: &'a dyn Clock,
    observer: &'a O,
}

impl<'a, O: ScriptObserver + ?Sized> ScriptRunner<'a, O> {
    pub fn new(clock: &'a dyn Clock, observer: &'a O) -> Self {
        Self { clock, observer }
    }

    /// Execute every step in order. Not cancellable.
    pub fn run(&self, script: &InteractionScript, channel: &mut NonBlockingChannel) -> Transcript {
        let mut transcript = Transcript::default();

        for (index, step) in script.steps().iter().enumerate() {
            self.observer.stage_started(index, step);

            let text = match step {
                InteractionStep::IdleWait {
                    max_gap,
                    poll_interval,
                    ceiling,
                } => self.idle_wait(index, channel, *max_gap, *poll_interval, *ceiling),
                InteractionStep::SendBytes { payload } => {
                    self.send(index, channel, payload);
                    String::new()
                }
                InteractionStep::PacedType {
                    text,
                    per_char_delay,
                    settle_delay,
                } => self.paced_type(index, channel, text, *per_char_delay, *settle_delay),
                InteractionStep::PollWindow {
                    total_duration,
                    poll_interval,
                } => self.poll_window(index, channel, *total_duration, *poll_interval),
            };

            let result = StageResult {
                kind: step.kind(),
                text,
            };
            self.observer.stage_finished(index, &result);
            transcript.push(result);
        }

        transcript
    }

    fn idle_wait(
        &self,
        index: usize,
        channel: &mut NonBlockingChannel,
        max_gap: Duration,
        poll_interval: Duration,
        ceiling: Option<Duration>,
    ) -> String {
        let mut output = String::new();
        let started = self.clock.now();
        let mut last_output = started;

        while self.clock.now().duration_since(last_output) < max_gap {
            self.clock.sleep(poll_interval);
            if self.collect(index, StepKind::IdleWait, channel, &mut output) {
                last_output = self.clock.now();
            }

            if let Some(ceiling) = ceiling {
                let waited = self.clock.now().duration_since(started);
                if waited >= ceiling {
                    self.observer.idle_ceiling_reached(index, waited);
                    break;
                }
            }
        }

        output
    }

    fn paced_type(
        &self,
        index: usize,
        channel: &mut NonBlockingChannel,
        text: &str,
        per_char_delay: Duration,
        settle_delay: Duration,
    ) -> String {
        let mut output = String::new();
        let mut buf = [0u8; 4];

        for ch in text.chars() {
            self.send(index, channel, ch.encode_utf8(&mut buf));
            self.clock.sleep(per_char_delay);
            self.collect(index, StepKind::PacedType, channel, &mut output);
        }

        self.clock.sleep(settle_delay);
        output
    }

    fn poll_window(
        &self,
        index: usize,
        channel: &mut NonBlockingChannel,
        total_duration: Duration,
        poll_interval: Duration,
    ) -> String {
        let mut output = String::new();

        for _ in 0..poll_count(total_duration, poll_interval) {
            self.clock.sleep(poll_interval);
            self.collect(index, StepKind::PollWindow, channel, &mut output);
        }

        output
    }

    fn send(&self, index: usize, channel: &mut NonBlockingChannel, payload: &str) {
        if let Err(error) = channel.send(payload) {
            self.observer.write_failed(index, &error);
        }
    }

    /// Drain the channel into `output`. True when anything arrived.
    fn collect(
        &self,
        index: usize,
        kind: StepKind,
        channel: &mut NonBlockingChannel,
        output: &mut String,
    ) -> bool {
        let chunk = channel.drain_available();
        if chunk.is_empty() {
            return false;
        }
        self.observer.chunk_received(index, kind, chunk.chars().count());
        output.push_str(&chunk);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use crate::testing::{ManualClock, ScriptedTransport};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use test_case::test_case;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn run_steps(
        clock: &Arc<ManualClock>,
        transport: ScriptedTransport,
        steps: Vec<InteractionStep>,
    ) -> Transcript {
        let script = InteractionScript::new(steps, ParseTarget::FullTranscript);
        let mut channel = NonBlockingChannel::new(Box::new(transport));
        ScriptRunner::new(clock.as_ref(), &NoopObserver).run(&script, &mut channel)
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ScriptObserver for Recorder {
        fn stage_started(&self, index: usize, step: &InteractionStep) {
            self.events.lock().push(format!("start {} {}", index, step.kind()));
        }

        fn chunk_received(&self, index: usize, kind: StepKind, len: usize) {
            self.events
                .lock()
                .push(format!("chunk {} {} {}", index, kind, len));
        }

        fn write_failed(&self, index: usize, _error: &crate::TerminalError) {
            self.events.lock().push(format!("write-failed {}", index));
        }

        fn idle_ceiling_reached(&self, index: usize, waited: Duration) {
            self.events
                .lock()
                .push(format!("ceiling {} {}ms", index, waited.as_millis()));
        }

        fn stage_finished(&self, index: usize, result: &StageResult) {
            self.events
                .lock()
                .push(format!("finish {} {}", index, result.text.len()));
        }
    }

    #[test]
    fn idle_wait_without_output_polls_until_gap() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone());

        let transcript = run_steps(&clock, transport, vec![InteractionStep::idle_wait(ms(2000))]);

        assert_eq!(transcript.stage_text(0), Some(""));
        assert_eq!(clock.sleeps(), vec![ms(500); 4]);
        assert_eq!(clock.elapsed(), ms(2000));
    }

    #[test]
    fn idle_wait_resets_on_output() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone())
            .emit_at(ms(400), "Welcome")
            .emit_at(ms(1300), " back");

        let transcript = run_steps(&clock, transport, vec![InteractionStep::idle_wait(ms(2000))]);

        // Last output seen at the 1500ms poll, quiet again by 3500ms.
        assert_eq!(transcript.stage_text(0), Some("Welcome back"));
        assert_eq!(clock.elapsed(), ms(3500));
    }

    #[test]
    fn idle_wait_ceiling_stops_chatty_child() {
        let clock = Arc::new(ManualClock::new());
        let mut transport = ScriptedTransport::new(clock.clone());
        for tick in 0..100 {
            transport = transport.emit_at(ms(tick * 500 + 100), "spinner ");
        }
        let recorder = Recorder::default();
        let script = InteractionScript::new(
            vec![InteractionStep::IdleWait {
                max_gap: ms(2000),
                poll_interval: ms(500),
                ceiling: Some(ms(3000)),
            }],
            ParseTarget::Stage(0),
        );
        let mut channel = NonBlockingChannel::new(Box::new(transport));

        let transcript = ScriptRunner::new(clock.as_ref(), &recorder).run(&script, &mut channel);

        assert_eq!(clock.elapsed(), ms(3000));
        assert_eq!(transcript.stage_text(0).map(|t| t.matches("spinner").count()), Some(6));
        assert!(recorder
            .events
            .lock()
            .contains(&"ceiling 0 3000ms".to_string()));
    }

    #[test]
    fn send_bytes_writes_once_without_waiting() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone());
        let writes = transport.write_log();

        let transcript = run_steps(&clock, transport, vec![InteractionStep::send("\r")]);

        assert_eq!(transcript.stage_text(0), Some(""));
        assert_eq!(writes.payloads(), vec!["\r"]);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn paced_type_writes_one_character_per_delay() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone()).echo_input();
        let writes = transport.write_log();

        let transcript = run_steps(
            &clock,
            transport,
            vec![InteractionStep::paced_type("/usage", ms(100))],
        );

        assert_eq!(writes.payloads(), vec!["/", "u", "s", "a", "g", "e"]);
        let times: Vec<Duration> = writes.times();
        assert_eq!(
            times,
            vec![ms(0), ms(100), ms(200), ms(300), ms(400), ms(500)]
        );
        assert_eq!(transcript.stage_text(0), Some("/usage"));
        // Six keystroke delays then the settle delay.
        assert_eq!(clock.elapsed(), ms(1600));
        assert_eq!(clock.sleeps().last(), Some(&ms(1000)));
    }

    #[test]
    fn poll_window_never_exits_early() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone()).emit_at(ms(200), "Loading usage…");

        let transcript = run_steps(
            &clock,
            transport,
            vec![InteractionStep::poll_window(ms(5000), ms(500))],
        );

        assert_eq!(transcript.stage_text(0), Some("Loading usage…"));
        assert_eq!(clock.sleeps(), vec![ms(500); 10]);
    }

    #[test]
    fn timed_stages_report_each_non_empty_drain() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone())
            .echo_input()
            .emit_at(ms(1200), "Loading")
            .emit_at(ms(2100), "Done");
        let recorder = Recorder::default();
        let script = InteractionScript::new(
            vec![
                InteractionStep::paced_type("ab", ms(100)),
                InteractionStep::poll_window(ms(2000), ms(500)),
            ],
            ParseTarget::FullTranscript,
        );
        let mut channel = NonBlockingChannel::new(Box::new(transport));

        let transcript = ScriptRunner::new(clock.as_ref(), &recorder).run(&script, &mut channel);

        // Typing ends at 1200ms after the settle delay; polls at 1700..3200ms.
        assert_eq!(transcript.stage_text(0), Some("ab"));
        assert_eq!(transcript.stage_text(1), Some("LoadingDone"));
        let chunks: Vec<String> = recorder
            .events
            .lock()
            .iter()
            .filter(|event| event.starts_with("chunk"))
            .cloned()
            .collect();
        assert_eq!(
            chunks,
            vec![
                "chunk 0 paced-type 1",
                "chunk 0 paced-type 1",
                "chunk 1 poll-window 7",
                "chunk 1 poll-window 4",
            ]
        );
    }

    #[test_case(5000, 500, 10 ; "reference window")]
    #[test_case(5000, 0, 0 ; "zero interval")]
    #[test_case(1000, 300, 3 ; "partial interval truncates")]
    #[test_case(0, 500, 0 ; "empty window")]
    fn poll_count_divides_window(total: u64, interval: u64, expected: u128) {
        assert_eq!(poll_count(ms(total), ms(interval)), expected);
    }

    #[test]
    fn transcript_concatenates_stages_in_order() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone())
            .emit_at(ms(100), "trust this folder? ")
            .on_input("\r", ms(50), "welcome ")
            .on_input("/usage\r", ms(50), "Current week (all models)");

        let transcript = run_steps(
            &clock,
            transport,
            vec![
                InteractionStep::idle_wait(ms(2000)),
                InteractionStep::send("\r"),
                InteractionStep::poll_window(ms(1000), ms(500)),
                InteractionStep::paced_type("/usage", ms(100)),
                InteractionStep::send("\r"),
                InteractionStep::poll_window(ms(1000), ms(500)),
            ],
        );

        let kinds: Vec<StepKind> = transcript.stages().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::IdleWait,
                StepKind::SendBytes,
                StepKind::PollWindow,
                StepKind::PacedType,
                StepKind::SendBytes,
                StepKind::PollWindow,
            ]
        );
        assert_eq!(
            transcript.full_text(),
            "trust this folder? welcome Current week (all models)"
        );
        assert_eq!(
            transcript.target_text(ParseTarget::Stage(5)),
            "Current week (all models)"
        );
        assert_eq!(transcript.target_text(ParseTarget::Stage(9)), "");
    }

    #[test]
    fn write_failures_are_reported_and_script_continues() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new(clock.clone()).failing_writes();
        let recorder = Recorder::default();
        let script = InteractionScript::new(
            vec![InteractionStep::send("\r"), InteractionStep::send("q")],
            ParseTarget::FullTranscript,
        );
        let mut channel = NonBlockingChannel::new(Box::new(transport));

        let transcript = ScriptRunner::new(clock.as_ref(), &recorder).run(&script, &mut channel);

        assert_eq!(transcript.len(), 2);
        assert_eq!(
            *recorder.events.lock(),
            vec![
                "start 0 send-bytes",
                "write-failed 0",
                "finish 0 0",
                "start 1 send-bytes",
                "write-failed 1",
                "finish 1 0",
            ]
        );
    }
}
