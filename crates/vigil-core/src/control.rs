//! Scheduling loop and shared run state.
//!
//! The loop owns nothing exotic: it samples, publishes, updates a status
//! flag, then sleeps out the interval in short slices so a shutdown request
//! takes effect within tens of milliseconds instead of a whole tick. Pause
//! and shutdown are plain atomics flipped from other threads (the console
//! command reader, the Ctrl-C handler).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::collect::Sampler;
use crate::publish::{HostIdentity, Publisher};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Coarse health of the agent as shown on the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Sampling and publishing normally.
    Running,
    /// Paused by the operator; ticks are skipped.
    Paused,
    /// The last publish attempt failed; retrying each tick.
    Error,
}

impl AgentStatus {
    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Paused => 1,
            Self::Error => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Paused,
            2 => Self::Error,
            _ => Self::Running,
        }
    }
}

/// Shared mutable state between the loop and its control surfaces.
pub struct RunState {
    running: AtomicBool,
    shutdown: AtomicBool,
    status: AtomicU8,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
            status: AtomicU8::new(AgentStatus::Running.as_u8()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flip between running and paused, returning the new running flag.
    pub fn toggle(&self) -> bool {
        !self.running.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Store the new status, returning the previous one.
    fn swap_status(&self, next: AgentStatus) -> AgentStatus {
        AgentStatus::from_u8(self.status.swap(next.as_u8(), Ordering::SeqCst))
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for status transitions, notified only when the status actually
/// changes.
pub trait StatusSink: Send + Sync {
    fn status_changed(&self, status: AgentStatus);
}

/// A sink that ignores every transition.
pub struct NullSink;

impl StatusSink for NullSink {
    fn status_changed(&self, _status: AgentStatus) {}
}

fn set_status(state: &RunState, sink: &dyn StatusSink, next: AgentStatus) {
    if state.swap_status(next) != next {
        sink.status_changed(next);
    }
}

/// One scheduling tick: sample, publish, reflect the outcome on the status
/// surface. A paused agent skips the tick entirely.
pub fn tick(
    sampler: &Sampler,
    publisher: &Publisher,
    identity: &HostIdentity,
    state: &RunState,
    sink: &dyn StatusSink,
) {
    if !state.is_running() {
        set_status(state, sink, AgentStatus::Paused);
        return;
    }

    let snapshot = sampler.sample();
    match publisher.publish(&snapshot, identity) {
        Ok(count) => {
            debug!("published {count} records");
            set_status(state, sink, AgentStatus::Running);
        }
        Err(err) => {
            error!("telemetry publish failed: {err}");
            set_status(state, sink, AgentStatus::Error);
        }
    }
}

/// Run ticks at the given interval until shutdown is requested. The sleep
/// between ticks is sliced so shutdown is honored promptly.
pub fn run_loop(
    sampler: &Sampler,
    publisher: &Publisher,
    identity: &HostIdentity,
    state: &RunState,
    sink: &dyn StatusSink,
    interval: Duration,
) {
    info!("scheduling loop started, interval {}s", interval.as_secs());
    while !state.shutdown_requested() {
        tick(sampler, publisher, identity, state, sink);

        let deadline = Instant::now() + interval;
        while !state.shutdown_requested() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(SLEEP_SLICE.min(remaining));
        }
    }
    info!("scheduling loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::collect::{FieldMap, FieldValue, MetricSource};

    struct Recorder(Mutex<Vec<AgentStatus>>);

    impl Recorder {
        fn new() -> Self {
            Self(Mutex::new(Vec::new()))
        }

        fn seen(&self) -> Vec<AgentStatus> {
            self.0.lock().unwrap().clone()
        }
    }

    impl StatusSink for Recorder {
        fn status_changed(&self, status: AgentStatus) {
            self.0.lock().unwrap().push(status);
        }
    }

    struct Failing;

    impl MetricSource for Failing {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn collect(&self) -> Result<FieldMap, String> {
            Err("boom".to_string())
        }
    }

    struct Fixed;

    impl MetricSource for Fixed {
        fn name(&self) -> &'static str {
            "cpu"
        }

        fn collect(&self) -> Result<FieldMap, String> {
            let mut fields = FieldMap::new();
            fields.insert("cpu_percent".to_string(), FieldValue::Float(1.0));
            Ok(fields)
        }
    }

    fn unroutable_publisher() -> Publisher {
        Publisher::new("http://127.0.0.1:1", "t", "o", "b").unwrap()
    }

    fn identity() -> HostIdentity {
        HostIdentity {
            configured_name: Some("test".to_string()),
            company: "acme".to_string(),
        }
    }

    #[test]
    fn toggle_flips_and_reports_the_new_state() {
        let state = RunState::new();
        assert!(state.is_running());
        assert!(!state.toggle());
        assert!(!state.is_running());
        assert!(state.toggle());
        assert!(state.is_running());
    }

    #[test]
    fn status_round_trips_through_the_atomic() {
        let state = RunState::new();
        assert_eq!(state.status(), AgentStatus::Running);
        state.swap_status(AgentStatus::Error);
        assert_eq!(state.status(), AgentStatus::Error);
    }

    #[test]
    fn paused_tick_skips_sampling_and_reports_paused() {
        // The snapshot would be nonempty, so an attempted publish against
        // the unroutable endpoint would flip the status to Error instead.
        let sampler = Sampler::new(vec![Box::new(Fixed)]);
        let state = RunState::new();
        state.toggle();
        let sink = Recorder::new();
        tick(&sampler, &unroutable_publisher(), &identity(), &state, &sink);
        assert_eq!(state.status(), AgentStatus::Paused);
        assert_eq!(sink.seen(), vec![AgentStatus::Paused]);
    }

    #[test]
    fn empty_snapshot_keeps_the_status_running() {
        let sampler = Sampler::new(vec![Box::new(Failing)]);
        let state = RunState::new();
        let sink = Recorder::new();
        tick(&sampler, &unroutable_publisher(), &identity(), &state, &sink);
        assert_eq!(state.status(), AgentStatus::Running);
        // No transition: the status was already Running.
        assert!(sink.seen().is_empty());
    }

    #[test]
    fn failed_publish_sets_error_once_until_recovery() {
        let sampler = Sampler::new(vec![Box::new(Fixed)]);
        let publisher = unroutable_publisher();
        let state = RunState::new();
        let sink = Recorder::new();
        tick(&sampler, &publisher, &identity(), &state, &sink);
        tick(&sampler, &publisher, &identity(), &state, &sink);
        assert_eq!(state.status(), AgentStatus::Error);
        assert_eq!(sink.seen(), vec![AgentStatus::Error]);
    }

    #[test]
    fn shutdown_before_start_exits_immediately() {
        let sampler = Sampler::new(vec![Box::new(Failing)]);
        let state = RunState::new();
        state.request_shutdown();
        run_loop(
            &sampler,
            &unroutable_publisher(),
            &identity(),
            &state,
            &NullSink,
            Duration::from_secs(60),
        );
    }
}
