//! Move the arm to its home pose in linearly interpolated steps

use super::{Pose, RobotDriver};
use crate::config::HomingConfig;
use anyhow::Result;

/// Linearly interpolated poses from `current` to `target`
///
/// Returns `steps` poses; the last equals `target`. Joints missing from
/// `current` start at 0. Joints not in `target` are left out.
pub fn interpolate_poses(current: &Pose, target: &Pose, steps: u32) -> Vec<Pose> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|step| {
            let fraction = f64::from(step) / f64::from(steps);
            target
                .iter()
                .map(|(joint, &goal)| {
                    let start = current.get(joint).copied().unwrap_or(0.0);
                    (joint.clone(), start + (goal - start) * fraction)
                })
                .collect()
        })
        .collect()
}

/// Drive the arm home, pausing `step_delay` after each pose
///
/// Driver errors propagate unchanged.
pub fn move_to_home<R: RobotDriver + ?Sized>(robot: &mut R, config: &HomingConfig) -> Result<()> {
    let current = robot.get_pose()?;
    let poses = interpolate_poses(&current, &config.home_pose, config.steps);
    tracing::info!("Homing arm in {} steps", poses.len());

    for pose in &poses {
        robot.send_pose(pose)?;
        std::thread::sleep(config.step_delay());
    }

    tracing::debug!("Homing complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::SimulatedArm;

    fn pose(entries: &[(&str, f64)]) -> Pose {
        entries
            .iter()
            .map(|(joint, deg)| (joint.to_string(), *deg))
            .collect()
    }

    #[test]
    fn test_interpolation_ends_at_target() {
        let current = pose(&[("a.pos", 0.0), ("b.pos", 10.0)]);
        let target = pose(&[("a.pos", 15.0), ("b.pos", -5.0)]);

        let poses = interpolate_poses(&current, &target, 15);
        assert_eq!(poses.len(), 15);
        assert_eq!(poses[0]["a.pos"], 1.0);
        assert_eq!(poses[0]["b.pos"], 9.0);
        assert_eq!(poses.last().unwrap(), &target);
    }

    #[test]
    fn test_missing_joint_starts_at_zero() {
        let target = pose(&[("gripper.pos", 50.0)]);
        let poses = interpolate_poses(&Pose::new(), &target, 2);
        assert_eq!(poses[0]["gripper.pos"], 25.0);
        assert_eq!(poses[1]["gripper.pos"], 50.0);
    }

    #[test]
    fn test_zero_steps_goes_straight_to_target() {
        let target = pose(&[("a.pos", 3.0)]);
        let poses = interpolate_poses(&Pose::new(), &target, 0);
        assert_eq!(poses, vec![target]);
    }

    #[test]
    fn test_move_to_home_sends_every_step() {
        let mut arm = SimulatedArm::new(pose(&[("elbow_flex.pos", 0.0)]));
        arm.connect().unwrap();
        let config = HomingConfig {
            steps: 4,
            step_delay_ms: 0,
            home_pose: pose(&[("elbow_flex.pos", 80.0)]),
        };

        move_to_home(&mut arm, &config).unwrap();
        assert_eq!(arm.commands(), 4);
        assert_eq!(arm.pose()["elbow_flex.pos"], 80.0);
    }

    #[test]
    fn test_move_to_home_propagates_driver_error() {
        let mut arm = SimulatedArm::default();
        assert!(move_to_home(&mut arm, &HomingConfig::default()).is_err());
    }
}
