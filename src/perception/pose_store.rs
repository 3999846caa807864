//! Owned best-estimate pose and the capabilities the localizer needs from it

use crate::common::{AngleUnit, Pose};

/// Read access to the current pose
pub trait PoseProvider {
    /// Current pose, heading in radians in the chassis convention
    fn pose(&self) -> Pose;

    /// Heading in radians, standard position (counter-clockwise from +x)
    fn standard_heading(&self) -> f64 {
        self.pose().standard_position().theta
    }
}

/// Write access used for resets, dead reckoning and filter corrections
pub trait PoseCorrector: PoseProvider {
    /// Overwrite the whole pose (heading in radians)
    fn write_pose(&mut self, pose: Pose);

    /// Accumulate an odometry delta
    fn apply_delta(&mut self, delta: Pose) {
        let mut pose = self.pose();
        pose += delta;
        self.write_pose(pose);
    }

    /// Replace the position, keeping the current heading
    fn correct_position(&mut self, x: f64, y: f64) {
        let pose = self.pose();
        self.write_pose(Pose { x, y, ..pose });
    }
}

/// The robot's best-estimate pose.
///
/// Starts at the zero pose. Changed only by [`PoseStore::set_pose`],
/// [`PoseStore::update`] and position corrections.
#[derive(Debug, Clone, Default)]
pub struct PoseStore {
    pose: Pose,
}

impl PoseStore {
    pub fn new() -> Self {
        PoseStore::default()
    }

    /// Get the pose with the heading in `unit`, optionally in standard position
    pub fn get_pose(&self, unit: AngleUnit, standard_position: bool) -> Pose {
        self.pose.to_unit(unit, standard_position)
    }

    /// Overwrite the pose; `pose.theta` is in `unit`
    pub fn set_pose(&mut self, pose: Pose, unit: AngleUnit) {
        self.pose = Pose {
            theta: unit.to_radians(pose.theta),
            ..pose
        };
    }

    /// Accumulate an odometry delta (heading in radians)
    pub fn update(&mut self, delta: Pose) {
        self.pose += delta;
    }
}

impl PoseProvider for PoseStore {
    fn pose(&self) -> Pose {
        self.pose
    }
}

impl PoseCorrector for PoseStore {
    fn write_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    fn apply_delta(&mut self, delta: Pose) {
        self.update(delta);
    }
}
