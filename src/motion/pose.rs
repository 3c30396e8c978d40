// src/motion/pose.rs - Body pose state and per-leg goal composition
use crate::geometry::{Vec2, Vec3, rotate};

/// Smoothed body height, tilt, leveling rotation and center-of-weight shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub height: f64,
    pub height_goal: f64,
    pub tilt: Vec2,
    pub tilt_goal: Vec2,
    pub leveling_rotation: Vec3,
    pub center_offset: Vec2,
}

impl BodyPose {
    pub fn new(height: f64) -> Self {
        Self {
            height,
            height_goal: height,
            tilt: Vec2::zeros(),
            tilt_goal: Vec2::zeros(),
            leveling_rotation: Vec3::zeros(),
            center_offset: Vec2::zeros(),
        }
    }

    /// First-order step of the stance height toward its goal.
    pub fn smooth_height(&mut self, dt: f64) {
        self.height += (self.height_goal - self.height) * dt / 2.0;
    }

    pub fn smooth_tilt(&mut self, dt: f64) {
        self.tilt += (self.tilt_goal - self.tilt) * dt;
    }

    pub fn clear_tilt(&mut self) {
        self.tilt = Vec2::zeros();
        self.tilt_goal = Vec2::zeros();
    }

    pub fn tilt_rotation(&self) -> Vec3 {
        Vec3::new(self.tilt.x, self.tilt.y, 0.0)
    }
}

/// Per-leg adjustments layered on top of the gait position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseModifiers {
    /// Ground-adaptation height offset, when adaptation is active.
    pub load_offset: Option<f64>,
    pub leveling: bool,
    /// Pin the foot to Z = 0, simulating a lost leg.
    pub drop_leg: bool,
}

/// Turn a gait-relative foot position into the leg's body-frame goal.
///
/// Order matters: height smoothing, tilt, height smoothing again, load
/// offset, leveling, then the center-of-weight shift and stance height.
pub fn compose(pose: &mut BodyPose, gait_position: Vec3, modifiers: &PoseModifiers, dt: f64) -> Vec3 {
    pose.smooth_height(dt);

    pose.smooth_tilt(dt);
    let mut pos = rotate(&gait_position, &pose.tilt_rotation());

    // TODO: confirm on hardware whether this second height step is wanted; it doubles the smoothing rate.
    pose.smooth_height(dt);

    if let Some(offset) = modifiers.load_offset {
        pos.z += offset;
    }

    if modifiers.leveling {
        pos = rotate(&pos, &pose.leveling_rotation);
    }

    let mut goal = pos + Vec3::new(pose.center_offset.x, pose.center_offset.y, -pose.height);
    if modifiers.drop_leg {
        goal.z = 0.0;
    }
    goal
}
