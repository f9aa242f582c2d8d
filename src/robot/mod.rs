//! Robot arm collaborator
//!
//! Joint positions are plain maps from joint name to degrees. The driver's
//! observations may also carry camera frames and other readings; only keys
//! ending in `.pos` are joint positions.

pub mod homing;

pub use homing::{interpolate_poses, move_to_home};

use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// Joint name → angle in degrees
pub type Pose = BTreeMap<String, f64>;

/// Suffix marking joint position keys in an observation
const JOINT_POSITION_SUFFIX: &str = ".pos";

/// Robot driver
///
/// Errors are hard collaborator failures and propagate to the caller.
pub trait RobotDriver: Send {
    fn connect(&mut self) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;

    /// Full observation, including non-joint readings
    fn get_observation(&mut self) -> Result<BTreeMap<String, f64>>;

    /// Command a pose; returns the pose the driver actually accepted
    fn send_pose(&mut self, pose: &Pose) -> Result<Pose>;

    /// Current joint positions
    fn get_pose(&mut self) -> Result<Pose> {
        Ok(joint_positions(&self.get_observation()?))
    }
}

/// Keep only the joint position entries of an observation
pub fn joint_positions(observation: &BTreeMap<String, f64>) -> Pose {
    observation
        .iter()
        .filter(|(key, _)| key.ends_with(JOINT_POSITION_SUFFIX))
        .map(|(key, value)| (key.clone(), *value))
        .collect()
}

/// In-memory arm that reaches every commanded pose instantly
#[derive(Debug, Default)]
pub struct SimulatedArm {
    connected: bool,
    pose: Pose,
    commands: usize,
}

impl SimulatedArm {
    /// Creates a disconnected arm at `initial`
    pub fn new(initial: Pose) -> Self {
        Self {
            connected: false,
            pose: initial,
            commands: 0,
        }
    }

    /// Whether `connect` has succeeded and `disconnect` has not been called since
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Last commanded pose
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Number of poses commanded since creation
    pub fn commands(&self) -> usize {
        self.commands
    }
}

impl RobotDriver for SimulatedArm {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        tracing::info!("Simulated arm connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            bail!("Simulated arm is not connected");
        }
        self.connected = false;
        tracing::info!("Simulated arm disconnected");
        Ok(())
    }

    fn get_observation(&mut self) -> Result<BTreeMap<String, f64>> {
        if !self.connected {
            bail!("Simulated arm is not connected");
        }
        let mut observation = self.pose.clone();
        observation.insert("timestamp".to_string(), self.commands as f64);
        Ok(observation)
    }

    fn send_pose(&mut self, pose: &Pose) -> Result<Pose> {
        if !self.connected {
            bail!("Simulated arm is not connected");
        }
        self.pose.extend(pose.iter().map(|(k, v)| (k.clone(), *v)));
        self.commands += 1;
        Ok(pose.clone())
    }
}
