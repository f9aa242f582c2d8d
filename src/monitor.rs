//! Monitoring thread
//!
//! Runs the session machine against the vision pipeline at a paced cadence,
//! or, when no pipeline could be set up, drives the session on fixed timers so
//! the rest of the rig stays usable. The loop checks the termination flag at
//! the top of every cycle; an acquisition already in flight is allowed to
//! finish first.

use crate::config::{DebounceConfig, FallbackConfig};
use crate::session::{SessionMachine, SharedSession};
use crate::vision::{Detection, VisionPipeline};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Timing used by the monitoring thread
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Pacing delay between vision cycles
    pub poll_interval: Duration,
    /// Delay before the simulated open gesture
    pub fallback_open_delay: Duration,
    /// Delay between the simulated open and the stop request
    pub fallback_stop_delay: Duration,
}

impl MonitorSettings {
    /// Builds settings from the debounce and fallback sections
    pub fn from_config(debounce: &DebounceConfig, fallback: &FallbackConfig) -> Self {
        Self {
            poll_interval: debounce.poll_interval(),
            fallback_open_delay: fallback.open_delay(),
            fallback_stop_delay: fallback.stop_delay(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&DebounceConfig::default(), &FallbackConfig::default())
    }
}

/// Which loop the monitor ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Vision,
    Fallback,
}

/// Handle to the running monitoring thread
pub struct MonitorHandle {
    mode: MonitorMode,
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    /// Returns which loop the thread is running
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Wait for the thread to release the camera and exit
    pub fn join(self) {
        if self.handle.join().is_err() {
            tracing::error!("Monitoring thread panicked");
        }
    }
}

/// Start the monitoring thread
///
/// With `vision == None` the fixed-timer fallback runs instead of detection.
pub fn spawn_monitor(
    machine: SessionMachine,
    vision: Option<VisionPipeline>,
    settings: MonitorSettings,
) -> std::io::Result<MonitorHandle> {
    let mode = if vision.is_some() {
        MonitorMode::Vision
    } else {
        MonitorMode::Fallback
    };

    let handle = std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || match vision {
            Some(pipeline) => run_vision_loop(machine, pipeline, &settings),
            None => {
                tracing::warn!("Vision pipeline unavailable, using fixed-timer fallback");
                let shared = machine.shared().clone();
                run_fallback(&shared, &settings);
                machine.shutdown();
            }
        })?;

    Ok(MonitorHandle { mode, handle })
}

/// Detection loop; returns after termination or when the camera closes
///
/// A closed camera requests termination so the control loop does not wait
/// for an episode that can never start.
pub fn run_vision_loop(
    mut machine: SessionMachine,
    mut pipeline: VisionPipeline,
    settings: &MonitorSettings,
) {
    let shared = machine.shared().clone();

    while !shared.is_termination_requested() {
        if !pipeline.is_open() {
            tracing::error!("Camera closed, requesting shutdown");
            shared.request_termination();
            break;
        }

        match pipeline.detect() {
            Detection::Sample(sample) => {
                machine.on_sample(&sample, Instant::now());
            }
            Detection::NoFrame(e) => {
                tracing::debug!("Frame unavailable: {}", e);
                machine.tick(Instant::now());
            }
            Detection::Failed(e) => {
                tracing::warn!("Detection error: {}", e);
                machine.tick(Instant::now());
            }
        }

        shared.pause(settings.poll_interval);
    }

    drop(pipeline);
    tracing::info!("Camera released");
    machine.shutdown();
}

/// Fixed-timer stand-in for detection
///
/// Repeats open → wait → stop until termination. No notification is sent
/// because no chip gesture is ever observed.
pub fn run_fallback(shared: &SharedSession, settings: &MonitorSettings) {
    while !shared.is_termination_requested() {
        if !shared.pause(settings.fallback_open_delay) {
            break;
        }
        shared.update(|state| state.start_recording());
        tracing::info!("[fallback] Open simulated");

        if !shared.pause(settings.fallback_stop_delay) {
            break;
        }
        if shared.update(|state| state.end_episode()) {
            tracing::info!("[fallback] Stop recording");
        }
    }
    tracing::debug!("Fallback timer exiting");
}
