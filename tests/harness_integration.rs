//! End-to-end harness tests.
//!
//! Runs the full monitor + control loop wiring with simulated collaborators and
//! shortened timings, in both vision and fallback mode.

use anyhow::{bail, Result};
use cuerig_lib::config::Config;
use cuerig_lib::gesture::ClassificationSample;
use cuerig_lib::notify::{NotificationPort, NotifyError};
use cuerig_lib::recording::{
    EndReason, EpisodeControl, EpisodeReport, RecordingSink, TimedRecording,
};
use cuerig_lib::robot::{Pose, RobotDriver, SimulatedArm};
use cuerig_lib::session::SharedSession;
use cuerig_lib::vision::{
    AcquireError, Classifier, ClassifyError, Frame, FrameSource, VisionPipeline,
};
use cuerig_lib::{run_harness, Collaborators};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Simulated collaborators
// =============================================================================

#[derive(Clone, Default)]
struct CapturePort {
    sent: Arc<Mutex<Vec<String>>>,
}

impl NotificationPort for CapturePort {
    fn send(&mut self, payload: &str) -> Result<(), NotifyError> {
        self.sent.lock().push(payload.to_string());
        Ok(())
    }
}

/// Timed recording that ends the run after `limit` episodes
struct LimitedSink {
    inner: TimedRecording,
    shared: Arc<SharedSession>,
    limit: u32,
    reports: Arc<Mutex<Vec<EpisodeReport>>>,
}

impl RecordingSink for LimitedSink {
    fn record_episode(
        &mut self,
        episode: u32,
        control: &EpisodeControl<'_>,
    ) -> Result<EpisodeReport> {
        let report = self.inner.record_episode(episode, control)?;
        self.reports.lock().push(report.clone());
        if episode >= self.limit {
            self.shared.request_termination();
        }
        Ok(report)
    }
}

/// Camera that reports closed after `limit` reads
struct FlakyCamera {
    reads: u32,
    limit: u32,
}

impl FrameSource for FlakyCamera {
    fn read(&mut self) -> Result<Frame, AcquireError> {
        self.reads += 1;
        Ok(Frame::default())
    }

    fn is_open(&self) -> bool {
        self.reads < self.limit
    }
}

struct IdleClassifier;

impl Classifier for IdleClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<ClassificationSample, ClassifyError> {
        Ok(ClassificationSample::new("idle", 0.7))
    }
}

struct StaticCamera;

impl FrameSource for StaticCamera {
    fn read(&mut self) -> Result<Frame, AcquireError> {
        Ok(Frame::default())
    }
}

/// One "open" frame followed by a long run of "chip" frames, repeating
struct OpenThenChip {
    frame: u32,
}

impl Classifier for OpenThenChip {
    fn classify(&mut self, _frame: &Frame) -> Result<ClassificationSample, ClassifyError> {
        let label = if self.frame % 30 == 0 { "open" } else { "chip" };
        self.frame += 1;
        Ok(ClassificationSample::new(label, 0.9))
    }
}

struct UnreachableArm;

impl RobotDriver for UnreachableArm {
    fn connect(&mut self) -> Result<()> {
        bail!("serial port not found")
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_observation(&mut self) -> Result<BTreeMap<String, f64>> {
        bail!("not connected")
    }

    fn send_pose(&mut self, _pose: &Pose) -> Result<Pose> {
        bail!("not connected")
    }
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.debounce.chip_confirm_ms = 40;
    config.debounce.stop_after_confirm_ms = 30;
    config.debounce.poll_interval_ms = 5;
    config.fallback.open_delay_ms = 30;
    config.fallback.stop_delay_ms = 20;
    config.homing.steps = 3;
    config.homing.step_delay_ms = 0;
    config
}

fn limited_sink(
    shared: &Arc<SharedSession>,
    limit: u32,
) -> (LimitedSink, Arc<Mutex<Vec<EpisodeReport>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = LimitedSink {
        inner: TimedRecording::new(Duration::from_millis(2), Duration::from_secs(10), "test"),
        shared: shared.clone(),
        limit,
        reports: reports.clone(),
    };
    (sink, reports)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_fallback_mode_records_episodes_without_notifying() {
    let config = fast_config();
    let shared = Arc::new(SharedSession::new());
    let (sink, reports) = limited_sink(&shared, 2);
    let port = CapturePort::default();

    let episodes = run_harness(
        &config,
        shared.clone(),
        Collaborators {
            robot: SimulatedArm::default(),
            sink,
            port: port.clone(),
            vision: None,
        },
    )
    .unwrap();

    assert_eq!(episodes, 2);
    let reports = reports.lock();
    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| r.ended_by == EndReason::StopRequested));

    // Only the startup announcement; the fallback never confirms a chip run.
    assert_eq!(*port.sent.lock(), vec!["100"]);
    assert!(shared.is_termination_requested());
}

#[test]
fn test_vision_mode_confirms_and_stops_each_episode() {
    let config = fast_config();
    let shared = Arc::new(SharedSession::new());
    let (sink, reports) = limited_sink(&shared, 2);
    let port = CapturePort::default();
    let pipeline = VisionPipeline::new(
        Box::new(StaticCamera),
        Box::new(OpenThenChip { frame: 0 }),
    );

    let episodes = run_harness(
        &config,
        shared.clone(),
        Collaborators {
            robot: SimulatedArm::default(),
            sink,
            port: port.clone(),
            vision: Some(pipeline),
        },
    )
    .unwrap();

    assert_eq!(episodes, 2);
    assert!(reports
        .lock()
        .iter()
        .all(|r| r.ended_by == EndReason::StopRequested));

    let sent = port.sent.lock();
    assert!(sent.len() >= 3);
    assert_eq!(sent[..3], ["100", "140", "180"]);
}

#[test]
fn test_announcement_can_be_disabled() {
    let mut config = fast_config();
    config.notification.announce_on_start = false;
    let shared = Arc::new(SharedSession::new());
    let (sink, _reports) = limited_sink(&shared, 1);
    let port = CapturePort::default();

    run_harness(
        &config,
        shared,
        Collaborators {
            robot: SimulatedArm::default(),
            sink,
            port: port.clone(),
            vision: None,
        },
    )
    .unwrap();

    assert!(port.sent.lock().is_empty());
}

#[test]
fn test_connect_failure_stops_monitor_and_propagates() {
    let config = fast_config();
    let shared = Arc::new(SharedSession::new());
    let (sink, reports) = limited_sink(&shared, 1);

    let err = run_harness(
        &config,
        shared.clone(),
        Collaborators {
            robot: UnreachableArm,
            sink,
            port: CapturePort::default(),
            vision: None,
        },
    )
    .unwrap_err();

    assert!(format!("{:#}", err).contains("serial port not found"));
    assert!(shared.is_termination_requested());
    assert!(reports.lock().is_empty());
}

#[test]
fn test_camera_close_shuts_harness_down() {
    let config = fast_config();
    let shared = Arc::new(SharedSession::new());
    let (sink, reports) = limited_sink(&shared, 1);
    let pipeline = VisionPipeline::new(
        Box::new(FlakyCamera { reads: 0, limit: 3 }),
        Box::new(IdleClassifier),
    );

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let harness_shared = shared.clone();
    std::thread::spawn(move || {
        let result = run_harness(
            &config,
            harness_shared,
            Collaborators {
                robot: SimulatedArm::default(),
                sink,
                port: CapturePort::default(),
                vision: Some(pipeline),
            },
        );
        let _ = done_tx.send(result.map_err(|e| e.to_string()));
    });

    let result = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("harness did not return after the camera closed");
    assert_eq!(result.unwrap(), 0);
    assert!(shared.is_termination_requested());
    assert!(reports.lock().is_empty());
}
