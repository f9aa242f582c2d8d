//! Gesture debouncer
//!
//! Turns one classified frame into session edge events. The debouncer owns no
//! state of its own: every call reads and updates the `SessionState` it is
//! handed, at the instant it is handed, so tests drive it with simulated time.

use super::label::Gesture;
use crate::config::DebounceConfig;
use crate::session::state::{SessionEvent, SessionState};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct GestureDebouncer {
    chip_confirm: Duration,
    stop_after_confirm: Duration,
}

impl GestureDebouncer {
    /// Creates a debouncer with explicit thresholds
    pub fn new(chip_confirm: Duration, stop_after_confirm: Duration) -> Self {
        Self {
            chip_confirm,
            stop_after_confirm,
        }
    }

    /// Creates a debouncer from the debounce settings
    pub fn from_config(config: &DebounceConfig) -> Self {
        Self::new(config.chip_confirm(), config.stop_after_confirm())
    }

    /// Run one debounce cycle
    ///
    /// `gesture` is `None` when no sample was available this cycle; the
    /// post-confirmation stop check still runs.
    pub fn observe(
        &self,
        state: &mut SessionState,
        gesture: Option<Gesture>,
        now: Instant,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if let Some(gesture) = gesture {
            if let Some(event) = self.apply_gesture(state, gesture, now) {
                events.push(event);
            }
        }

        if let Some(event) = self.check_stop(state, now) {
            events.push(event);
        }

        events
    }

    fn apply_gesture(
        &self,
        state: &mut SessionState,
        gesture: Gesture,
        now: Instant,
    ) -> Option<SessionEvent> {
        match gesture {
            Gesture::Open if !state.recording_active() => {
                state.start_recording();
                Some(SessionEvent::OpenDetected)
            }
            Gesture::Chip if state.recording_active() => match state.chip_first_seen_at() {
                None => {
                    state.mark_chip_seen(now);
                    Some(SessionEvent::ChipSeen)
                }
                Some(first) if !state.chip_confirmed() => {
                    let held = now.saturating_duration_since(first);
                    if held >= self.chip_confirm {
                        state.confirm_chip(now);
                        Some(SessionEvent::ChipConfirmed {
                            held_ms: as_millis(held),
                        })
                    } else {
                        None
                    }
                }
                Some(_) => None,
            },
            Gesture::Open | Gesture::Other if state.recording_active() => state
                .interrupt_chip_run(now)
                .map(|held| SessionEvent::ChipInterrupted {
                    held_ms: as_millis(held),
                }),
            _ => None,
        }
    }

    fn check_stop(&self, state: &mut SessionState, now: Instant) -> Option<SessionEvent> {
        let confirmed_at = state.chip_confirmed_at()?;
        let since = now.saturating_duration_since(confirmed_at);
        if since < self.stop_after_confirm {
            return None;
        }

        state.end_episode();
        Some(SessionEvent::EpisodeShouldStop {
            since_confirm_ms: as_millis(since),
        })
    }
}

impl Default for GestureDebouncer {
    fn default() -> Self {
        Self::from_config(&DebounceConfig::default())
    }
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
