//! Session state, phases and the events emitted on transitions
//!
//! `SessionState` is the only value shared between the monitoring thread and
//! the control loop. Its fields are private; the mutators below keep the
//! invariants (confirmation time exists exactly when the chip run is
//! confirmed, timers are cleared when an episode starts or ends).

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Conceptual phase of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for the open gesture
    #[default]
    Idle,
    /// Recording; chip run not yet confirmed
    RecordingUnconfirmed,
    /// Recording; chip run confirmed, stop pending
    RecordingConfirmed,
    /// Stop requested and not yet consumed by the control loop
    Stopping,
}

impl SessionPhase {
    /// Returns a human-readable description of the phase
    pub fn description(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Waiting for open gesture",
            SessionPhase::RecordingUnconfirmed => "Recording episode",
            SessionPhase::RecordingConfirmed => "Chip confirmed, stopping soon",
            SessionPhase::Stopping => "Episode stop requested",
        }
    }

    /// Returns whether an episode should be running in this phase
    pub fn is_recording(&self) -> bool {
        matches!(
            self,
            SessionPhase::RecordingUnconfirmed | SessionPhase::RecordingConfirmed
        )
    }
}

/// Edge events produced by the debouncer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Open gesture seen while idle; recording starts
    OpenDetected,
    /// First chip sample of a run
    ChipSeen,
    /// A non-chip sample broke an unconfirmed chip run
    ChipInterrupted {
        /// How long the broken run had lasted
        held_ms: u64,
    },
    /// Chip run lasted long enough; fires the notification
    ChipConfirmed {
        /// Length of the run at confirmation
        held_ms: u64,
    },
    /// Confirmation has been held long enough; the episode should end
    EpisodeShouldStop {
        /// Time since confirmation
        since_confirm_ms: u64,
    },
}

/// Cross-thread session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    recording_active: bool,
    stop_requested: bool,
    chip_first_seen_at: Option<Instant>,
    chip_confirmed_at: Option<Instant>,
}

impl SessionState {
    /// Creates an idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an episode is recording
    pub fn recording_active(&self) -> bool {
        self.recording_active
    }

    /// Whether the current episode has been asked to stop
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Start of the current chip run, if any
    pub fn chip_first_seen_at(&self) -> Option<Instant> {
        self.chip_first_seen_at
    }

    /// Whether the chip run has been confirmed this episode
    pub fn chip_confirmed(&self) -> bool {
        self.chip_confirmed_at.is_some()
    }

    /// When the chip run was confirmed, if it was
    pub fn chip_confirmed_at(&self) -> Option<Instant> {
        self.chip_confirmed_at
    }

    /// Phase derived from the flags
    pub fn phase(&self) -> SessionPhase {
        match (self.recording_active, self.chip_confirmed(), self.stop_requested) {
            (true, true, _) => SessionPhase::RecordingConfirmed,
            (true, false, _) => SessionPhase::RecordingUnconfirmed,
            (false, _, true) => SessionPhase::Stopping,
            (false, _, false) => SessionPhase::Idle,
        }
    }

    /// Enter a new episode with cleared chip timers
    pub fn start_recording(&mut self) {
        self.recording_active = true;
        self.chip_first_seen_at = None;
        self.chip_confirmed_at = None;
    }

    pub(crate) fn mark_chip_seen(&mut self, now: Instant) {
        self.chip_first_seen_at = Some(now);
    }

    /// Clear an unconfirmed chip run, returning how long it had lasted
    pub(crate) fn interrupt_chip_run(&mut self, now: Instant) -> Option<Duration> {
        if self.chip_confirmed() {
            return None;
        }
        self.chip_first_seen_at
            .take()
            .map(|first| now.saturating_duration_since(first))
    }

    pub(crate) fn confirm_chip(&mut self, now: Instant) {
        self.chip_confirmed_at = Some(now);
    }

    /// Request the stop and return to idle
    ///
    /// Only valid while recording; otherwise a no-op returning `false`.
    pub fn end_episode(&mut self) -> bool {
        if !self.recording_active {
            return false;
        }
        self.stop_requested = true;
        self.recording_active = false;
        self.chip_first_seen_at = None;
        self.chip_confirmed_at = None;
        true
    }

    /// Consume a pending stop request (edge-triggered)
    pub fn consume_stop_request(&mut self) -> bool {
        std::mem::replace(&mut self.stop_requested, false)
    }
}

/// Snapshot of the session for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Current phase
    pub phase: SessionPhase,
    /// Phase description
    pub description: String,
    /// Whether an episode should be running
    pub recording_active: bool,
    /// Whether a stop is pending
    pub stop_requested: bool,
    /// Whether the process is shutting down
    pub termination_requested: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let state = SessionState::new();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(!state.recording_active());
        assert!(!state.stop_requested());
        assert!(state.chip_first_seen_at().is_none());
        assert!(!state.chip_confirmed());
    }

    #[test]
    fn test_start_recording_clears_timers() {
        let t0 = Instant::now();
        let mut state = SessionState::new();
        state.start_recording();
        state.mark_chip_seen(t0);
        state.confirm_chip(t0);

        state.start_recording();
        assert!(state.chip_first_seen_at().is_none());
        assert!(state.chip_confirmed_at().is_none());
        assert_eq!(state.phase(), SessionPhase::RecordingUnconfirmed);
    }

    #[test]
    fn test_confirmed_phase() {
        let mut state = SessionState::new();
        state.start_recording();
        state.confirm_chip(Instant::now());
        assert!(state.chip_confirmed());
        assert_eq!(state.phase(), SessionPhase::RecordingConfirmed);
    }

    #[test]
    fn test_end_episode_enters_stopping() {
        let mut state = SessionState::new();
        state.start_recording();
        state.confirm_chip(Instant::now());

        assert!(state.end_episode());
        assert_eq!(state.phase(), SessionPhase::Stopping);
        assert!(state.stop_requested());
        assert!(!state.recording_active());
        assert!(!state.chip_confirmed());
    }

    #[test]
    fn test_end_episode_requires_recording() {
        let mut state = SessionState::new();
        assert!(!state.end_episode());
        assert!(!state.stop_requested());
    }

    #[test]
    fn test_consume_stop_request_is_edge_triggered() {
        let mut state = SessionState::new();
        state.start_recording();
        state.end_episode();

        assert!(state.consume_stop_request());
        assert!(!state.consume_stop_request());
        assert_eq!(state.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_interrupt_keeps_confirmed_run() {
        let t0 = Instant::now();
        let mut state = SessionState::new();
        state.start_recording();
        state.mark_chip_seen(t0);
        state.confirm_chip(t0 + Duration::from_secs(3));

        assert!(state.interrupt_chip_run(t0 + Duration::from_secs(4)).is_none());
        assert_eq!(state.chip_first_seen_at(), Some(t0));
    }

    #[test]
    fn test_phase_descriptions() {
        assert_eq!(SessionPhase::Idle.description(), "Waiting for open gesture");
        assert!(SessionPhase::RecordingConfirmed.is_recording());
        assert!(!SessionPhase::Stopping.is_recording());
    }

    #[test]
    fn test_event_serialisation() {
        let json = serde_json::to_string(&SessionEvent::ChipConfirmed { held_ms: 3100 }).unwrap();
        assert_eq!(json, r#"{"type":"chip_confirmed","held_ms":3100}"#);
    }
}
