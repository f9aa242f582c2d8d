//! Thread-safe session state shared by the monitor and the control loop
//!
//! The monitor thread writes the recording flag and chip timers; the control
//! loop consumes stop requests. Both go through the same mutex, and every
//! change to the recording flag or the termination flag wakes waiters on the
//! condition variable.

use super::state::{SessionPhase, SessionState, SessionStatus};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Outcome of waiting for an episode to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Recording became active
    Started,
    /// Termination was requested first
    Terminated,
    /// The deadline passed (timed waits only)
    TimedOut,
}

/// Session state plus the process-wide termination flag
pub struct SharedSession {
    state: Mutex<SessionState>,
    changed: Condvar,
    terminate: AtomicBool,
    exit_early: AtomicBool,
}

impl SharedSession {
    /// Creates an idle session
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::new()),
            changed: Condvar::new(),
            terminate: AtomicBool::new(false),
            exit_early: AtomicBool::new(false),
        }
    }

    /// Apply `f` under the lock, waking waiters if the recording flag changed
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock();
        let was_recording = state.recording_active();
        let result = f(&mut state);
        if state.recording_active() != was_recording {
            self.changed.notify_all();
        }
        result
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Returns the current phase
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase()
    }

    /// Returns whether an episode should be running
    pub fn is_recording_active(&self) -> bool {
        self.state.lock().recording_active()
    }

    /// Returns whether a stop request is pending
    pub fn is_stop_requested(&self) -> bool {
        self.state.lock().stop_requested()
    }

    /// Clear any stale stop or exit-early request at the start of an episode
    ///
    /// Returns whether a stop request was pending.
    pub fn begin_episode(&self) -> bool {
        self.update(|state| {
            self.exit_early.store(false, Ordering::SeqCst);
            state.consume_stop_request()
        })
    }

    /// Operator request to end the running episode now
    ///
    /// Ends the episode like a detected stop and marks it as ended early.
    /// Returns `false` when no episode is recording.
    pub fn request_exit_early(&self) -> bool {
        self.update(|state| {
            if state.end_episode() {
                self.exit_early.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        })
    }

    /// Returns whether the current episode was ended by the operator
    pub fn is_exit_early_requested(&self) -> bool {
        self.exit_early.load(Ordering::SeqCst)
    }

    /// Ask every loop to exit; wakes all waiters
    pub fn request_termination(&self) {
        if !self.terminate.swap(true, Ordering::SeqCst) {
            tracing::info!("Termination requested");
        }
        // Take the lock so a waiter between its flag check and its wait
        // cannot miss the notification.
        let _guard = self.state.lock();
        self.changed.notify_all();
    }

    /// Returns whether every loop should exit
    pub fn is_termination_requested(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Block until recording is active or termination is requested
    pub fn wait_for_recording(&self) -> WaitOutcome {
        let mut state = self.state.lock();
        loop {
            if self.is_termination_requested() {
                return WaitOutcome::Terminated;
            }
            if state.recording_active() {
                return WaitOutcome::Started;
            }
            self.changed.wait(&mut state);
        }
    }

    /// Like [`wait_for_recording`](Self::wait_for_recording) with a deadline
    pub fn wait_for_recording_timeout(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if self.is_termination_requested() {
                return WaitOutcome::Terminated;
            }
            if state.recording_active() {
                return WaitOutcome::Started;
            }
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return if state.recording_active() {
                    WaitOutcome::Started
                } else {
                    WaitOutcome::TimedOut
                };
            }
        }
    }

    /// Sleep for `duration` unless termination is requested first
    ///
    /// Returns `false` if woken by termination.
    pub fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock();
        while !self.is_termination_requested() {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return !self.is_termination_requested();
            }
        }
        false
    }

    /// Status built from a single locked view of the state
    pub fn status(&self) -> SessionStatus {
        let state = self.state.lock();
        let phase = state.phase();
        SessionStatus {
            phase,
            description: phase.description().to_string(),
            recording_active: state.recording_active(),
            stop_requested: state.stop_requested(),
            termination_requested: self.is_termination_requested(),
        }
    }
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new()
    }
}
