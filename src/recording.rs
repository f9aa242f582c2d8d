//! Episode recording
//!
//! The dataset writer is a collaborator behind [`RecordingSink`]. It sees the
//! session only through [`EpisodeControl`], which reports when the episode
//! must end early.

use crate::config::RecordingConfig;
use crate::session::SharedSession;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The debounced stop gesture requested it
    StopRequested,
    /// The operator ended the episode early
    ExitEarly,
    /// The episode reached its time limit
    TimeLimit,
    /// The process is shutting down
    Terminated,
}

/// Summary of a finished episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    /// 1-based episode number
    pub episode: u32,
    /// Frames recorded
    pub frames: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// What ended the episode
    pub ended_by: EndReason,
}

/// Early-exit view of the session for a running episode
pub struct EpisodeControl<'a> {
    shared: &'a SharedSession,
}

impl<'a> EpisodeControl<'a> {
    /// Creates a view over `shared`
    pub fn new(shared: &'a SharedSession) -> Self {
        Self { shared }
    }

    /// Reason to end now, if any
    pub fn stop_reason(&self) -> Option<EndReason> {
        if self.shared.is_termination_requested() {
            Some(EndReason::Terminated)
        } else if self.shared.is_exit_early_requested() {
            Some(EndReason::ExitEarly)
        } else if self.shared.is_stop_requested() {
            Some(EndReason::StopRequested)
        } else {
            None
        }
    }

    /// Returns whether the episode should end now
    pub fn should_stop(&self) -> bool {
        self.stop_reason().is_some()
    }
}

/// Dataset writer driven by the control loop
pub trait RecordingSink {
    /// Record one episode, returning when `control` says to stop or the
    /// sink's own limit is reached
    fn record_episode(
        &mut self,
        episode: u32,
        control: &EpisodeControl<'_>,
    ) -> Result<EpisodeReport>;
}

/// Sink that paces frames at a fixed rate up to a time limit
///
/// Frames are counted, not stored.
pub struct TimedRecording {
    frame_interval: Duration,
    episode_time: Duration,
    task: String,
}

impl TimedRecording {
    /// Creates a sink pacing frames at `frame_interval`
    pub fn new(
        frame_interval: Duration,
        episode_time: Duration,
        task: impl Into<String>,
    ) -> Self {
        Self {
            frame_interval,
            episode_time,
            task: task.into(),
        }
    }

    /// Creates a sink from the recording settings
    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(
            config.frame_interval(),
            config.episode_time(),
            config.task_description.clone(),
        )
    }
}

impl RecordingSink for TimedRecording {
    fn record_episode(
        &mut self,
        episode: u32,
        control: &EpisodeControl<'_>,
    ) -> Result<EpisodeReport> {
        tracing::info!(episode, task = %self.task, "Recording episode");
        let started = Instant::now();
        let mut frames = 0u64;

        let ended_by = loop {
            if let Some(reason) = control.stop_reason() {
                break reason;
            }
            if started.elapsed() >= self.episode_time {
                break EndReason::TimeLimit;
            }
            frames += 1;
            std::thread::sleep(self.frame_interval);
        };

        Ok(EpisodeReport {
            episode,
            frames,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            ended_by,
        })
    }
}
