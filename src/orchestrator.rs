//! Episode control loop
//!
//! Each pass homes the arm, blocks until the monitor raises the recording
//! flag, then hands the episode to the sink. The loop exits when termination
//! is requested. Collaborator errors propagate; callers run `shutdown` on
//! every exit path.

use crate::config::HomingConfig;
use crate::monitor::MonitorHandle;
use crate::recording::{EpisodeControl, EpisodeReport, RecordingSink};
use crate::robot::{move_to_home, RobotDriver};
use crate::session::{SharedSession, WaitOutcome};
use anyhow::Result;
use std::sync::Arc;

/// Main-thread episode loop: home, wait, record
pub struct ControlLoop<R: RobotDriver, S: RecordingSink> {
    shared: Arc<SharedSession>,
    robot: R,
    sink: S,
    homing: HomingConfig,
    episode_count: u32,
}

impl<R: RobotDriver, S: RecordingSink> ControlLoop<R, S> {
    /// Creates a loop over the given collaborators
    pub fn new(shared: Arc<SharedSession>, robot: R, sink: S, homing: HomingConfig) -> Self {
        Self {
            shared,
            robot,
            sink,
            homing,
            episode_count: 0,
        }
    }

    /// Episodes started so far
    pub fn episode_count(&self) -> u32 {
        self.episode_count
    }

    /// Borrow the arm driver
    pub fn robot(&self) -> &R {
        &self.robot
    }

    /// Run episodes until termination
    ///
    /// Returns the reports of every completed episode.
    pub fn run(&mut self) -> Result<Vec<EpisodeReport>> {
        let mut reports = Vec::new();

        while !self.shared.is_termination_requested() {
            move_to_home(&mut self.robot, &self.homing)?;

            tracing::info!("Waiting for open gesture...");
            if self.shared.wait_for_recording() == WaitOutcome::Terminated {
                break;
            }

            self.episode_count += 1;
            let episode = self.episode_count;
            tracing::info!("Episode {}", episode);

            if self.shared.begin_episode() {
                tracing::debug!("Cleared stale stop request");
            }

            let report = self
                .sink
                .record_episode(episode, &EpisodeControl::new(&self.shared))?;

            let status = self.shared.status();
            tracing::info!(
                frames = report.frames,
                duration_ms = report.duration_ms,
                ended_by = ?report.ended_by,
                phase = %status.description,
                "Episode {} done",
                episode
            );
            reports.push(report);
        }

        Ok(reports)
    }

    /// Stop the monitor and disconnect the arm
    ///
    /// Runs on every exit path. Disconnect failures are logged, not returned.
    pub fn shutdown(mut self, monitor: Option<MonitorHandle>) -> u32 {
        self.shared.request_termination();
        if let Some(monitor) = monitor {
            monitor.join();
        }

        if let Err(e) = self.robot.disconnect() {
            tracing::warn!("Failed to disconnect arm: {:#}", e);
        }

        tracing::info!("Total: {} episodes", self.episode_count);
        self.episode_count
    }
}
