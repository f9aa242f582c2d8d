//! Session state machine
//!
//! Ties the debouncer to the shared state and fires the notification once per
//! confirmation. Runs on the monitoring thread; the lock is held only while
//! the debouncer updates the state, never while logging or notifying.

use super::shared::SharedSession;
use super::state::SessionEvent;
use crate::gesture::{ClassificationSample, Gesture, GestureDebouncer, LabelMap};
use crate::notify::Notifier;
use std::sync::Arc;
use std::time::Instant;

/// Debouncer bound to the shared session and the notifier
pub struct SessionMachine {
    shared: Arc<SharedSession>,
    debouncer: GestureDebouncer,
    labels: LabelMap,
    notifier: Notifier,
    last_logged_state: Option<String>,
}

impl SessionMachine {
    /// Creates a machine over `shared` that notifies through `notifier`
    pub fn new(
        shared: Arc<SharedSession>,
        debouncer: GestureDebouncer,
        labels: LabelMap,
        notifier: Notifier,
    ) -> Self {
        Self {
            shared,
            debouncer,
            labels,
            notifier,
            last_logged_state: None,
        }
    }

    /// Shared session this machine updates
    pub fn shared(&self) -> &Arc<SharedSession> {
        &self.shared
    }

    /// Notifier fired on chip confirmation
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Process one classified frame
    pub fn on_sample(&mut self, sample: &ClassificationSample, now: Instant) -> Vec<SessionEvent> {
        self.log_label_change(sample);
        let gesture = self.labels.classify(sample);
        tracing::trace!("Gesture: {}", gesture.as_str());
        self.step(Some(gesture), now)
    }

    /// Run a cycle with no sample (failed frame or classification)
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        self.step(None, now)
    }

    fn step(&mut self, gesture: Option<Gesture>, now: Instant) -> Vec<SessionEvent> {
        let debouncer = &self.debouncer;
        let events = self
            .shared
            .update(|state| debouncer.observe(state, gesture, now));

        for event in &events {
            self.handle_event(event);
        }
        events
    }

    fn handle_event(&mut self, event: &SessionEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        match event {
            SessionEvent::OpenDetected => tracing::info!(event = %payload, "Open detected"),
            SessionEvent::ChipSeen => tracing::info!(event = %payload, "Chip detected"),
            SessionEvent::ChipInterrupted { .. } => {
                tracing::debug!(event = %payload, "Chip run interrupted")
            }
            SessionEvent::ChipConfirmed { .. } => {
                tracing::info!(event = %payload, "Chip confirmed");
                self.notifier.notify();
            }
            SessionEvent::EpisodeShouldStop { .. } => {
                tracing::info!(event = %payload, "Stop recording")
            }
        }
    }

    fn log_label_change(&mut self, sample: &ClassificationSample) {
        let current = sample.display_state();
        if self.last_logged_state.as_deref() != Some(current.as_str()) {
            tracing::info!("Classification: {}", current);
            self.last_logged_state = Some(current);
        }
    }

    /// Stop the notification worker after delivering queued values
    pub fn shutdown(mut self) {
        self.notifier.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationPort, NotifyError};
    use crate::session::state::SessionPhase;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CountingPort {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl NotificationPort for CountingPort {
        fn send(&mut self, payload: &str) -> Result<(), NotifyError> {
            self.sent.lock().push(payload.to_string());
            Ok(())
        }
    }

    fn machine() -> (SessionMachine, CountingPort) {
        let port = CountingPort::default();
        let notifier = Notifier::spawn(port.clone(), 100, 40).unwrap();
        let machine = SessionMachine::new(
            Arc::new(SharedSession::new()),
            GestureDebouncer::default(),
            LabelMap::default(),
            notifier,
        );
        (machine, port)
    }

    fn sample(label: &str) -> ClassificationSample {
        ClassificationSample::new(label, 0.8)
    }

    #[test]
    fn test_open_sets_shared_flag() {
        let (mut machine, _port) = machine();
        machine.on_sample(&sample("open"), Instant::now());
        assert!(machine.shared().is_recording_active());
        assert_eq!(machine.shared().phase(), SessionPhase::RecordingUnconfirmed);
    }

    #[test]
    fn test_duplicate_chips_after_confirmation_notify_once() {
        let (mut machine, port) = machine();
        let t0 = Instant::now();
        machine.on_sample(&sample("open"), t0);
        machine.on_sample(&sample("chip"), t0);

        for ms in [3000, 3100, 3200, 3300, 3400] {
            machine.on_sample(&sample("chip"), t0 + Duration::from_millis(ms));
        }
        assert_eq!(machine.notifier().value(), 140);

        machine.shutdown();
        assert_eq!(*port.sent.lock(), vec!["140"]);
    }

    #[test]
    fn test_second_episode_notifies_with_next_value() {
        let (mut machine, port) = machine();
        let t0 = Instant::now();
        let at = |ms: u64| t0 + Duration::from_millis(ms);

        for offset in [0, 10_000] {
            machine.on_sample(&sample("open"), at(offset));
            machine.on_sample(&sample("chip"), at(offset));
            machine.on_sample(&sample("chip"), at(offset + 3000));
            machine.tick(at(offset + 5000));
            assert!(machine.shared().begin_episode());
        }

        machine.shutdown();
        assert_eq!(*port.sent.lock(), vec!["140", "180"]);
    }

    /// Port that blocks inside `send` until the gate is dropped
    struct BlockedPort {
        entered: crossbeam_channel::Sender<()>,
        gate: crossbeam_channel::Receiver<()>,
    }

    impl NotificationPort for BlockedPort {
        fn send(&mut self, _payload: &str) -> Result<(), NotifyError> {
            let _ = self.entered.send(());
            let _ = self.gate.recv();
            Ok(())
        }
    }

    #[test]
    fn test_stop_fires_while_notification_is_blocked() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let notifier = Notifier::spawn(
            BlockedPort {
                entered: entered_tx,
                gate: gate_rx,
            },
            100,
            40,
        )
        .unwrap();
        let mut machine = SessionMachine::new(
            Arc::new(SharedSession::new()),
            GestureDebouncer::default(),
            LabelMap::default(),
            notifier,
        );

        let t0 = Instant::now();
        machine.on_sample(&sample("open"), t0);
        machine.on_sample(&sample("chip"), t0);
        machine.on_sample(&sample("chip"), t0 + Duration::from_millis(3000));
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(machine.tick(t0 + Duration::from_millis(4999)).is_empty());
        let events = machine.tick(t0 + Duration::from_millis(5000));
        assert_eq!(
            events,
            vec![SessionEvent::EpisodeShouldStop {
                since_confirm_ms: 2000
            }]
        );
        assert!(machine.shared().is_stop_requested());
        assert!(entered_rx.try_recv().is_err());

        drop(gate_tx);
        machine.shutdown();
    }

    #[test]
    fn test_unknown_label_while_idle_does_nothing() {
        let (mut machine, port) = machine();
        let events = machine.on_sample(&sample("close"), Instant::now());
        assert!(events.is_empty());
        machine.shutdown();
        assert!(port.sent.lock().is_empty());
    }
}
