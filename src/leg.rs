// src/leg.rs - Leg geometry, inverse kinematics and the shared goal cell
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::geometry::{Vec2, Vec3};
use crate::hardware::{Actuator, HardwareError};

pub const LEG_COUNT: usize = 6;

/// Mounting side. Right-side legs are mirrored, so their joint angle
/// conventions are reflected to keep the knee bending the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn is_right(self) -> bool {
        matches!(self, Side::Right)
    }
}

/// Commanded angles for hip yaw, hip pitch and knee, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngles {
    pub hip_yaw: f64,
    pub hip_pitch: f64,
    pub knee: f64,
}

impl JointAngles {
    pub fn is_finite(&self) -> bool {
        self.hip_yaw.is_finite() && self.hip_pitch.is_finite() && self.knee.is_finite()
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.hip_yaw, self.hip_pitch, self.knee]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegGeometry {
    pub upper: f64,
    pub lower: f64,
    /// Hip position in the body frame.
    pub mount: Vec2,
    /// Mount yaw in radians.
    pub mount_angle: f64,
    pub side: Side,
    pub servo_offset_z: f64,
}

impl LegGeometry {
    /// Closed-form IK for a goal relative to the hip mount.
    ///
    /// Targets outside the reachable shell `|a-b| <= c <= a+b` push the
    /// arc-cosine arguments out of range; the result is then non-finite and
    /// callers must not command it.
    pub fn solve(&self, relative_goal: &Vec3) -> JointAngles {
        let goal = relative_goal + Vec3::new(0.0, 0.0, self.servo_offset_z);

        let a = self.upper;
        let b = self.lower;
        let c = goal.norm();

        let gamma = ((c.powi(2) - a.powi(2) - b.powi(2)) / (-2.0 * a * b)).acos();
        let beta = ((b.powi(2) - c.powi(2) - a.powi(2)) / (-2.0 * c * a)).acos();

        let top = goal.xy();
        let reach = top.norm();
        // Straight below the hip the yaw is free; keep it at the mount angle.
        let sweep = if reach > 0.0 { (top.y / reach).asin() } else { 0.0 };

        match self.side {
            Side::Right => JointAngles {
                hip_yaw: sweep + self.mount_angle,
                hip_pitch: reach.atan2(goal.z) - beta + PI / 2.0,
                knee: gamma,
            },
            Side::Left => JointAngles {
                hip_yaw: PI - sweep - self.mount_angle,
                hip_pitch: (-reach).atan2(goal.z) + beta + PI * 1.5,
                knee: 2.0 * PI - gamma,
            },
        }
    }

    pub fn to_relative(&self, goal: &Vec3) -> Vec3 {
        Vec3::new(goal.x - self.mount.x, goal.y - self.mount.y, goal.z)
    }
}

/// Single-writer, many-reader cell holding a leg's goal position.
///
/// Writes replace the whole vector atomically, so readers see either the
/// previous or the new goal and never a mix of both.
#[derive(Debug)]
pub struct GoalCell(ArcSwapOption<Vec3>);

impl GoalCell {
    pub fn new() -> Self {
        Self(ArcSwapOption::empty())
    }

    pub fn store(&self, goal: Vec3) {
        self.0.store(Some(Arc::new(goal)));
    }

    pub fn load(&self) -> Option<Vec3> {
        self.0.load().as_deref().copied()
    }

    pub fn clear(&self) {
        self.0.store(None);
    }
}

impl Default for GoalCell {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Leg {
    id: usize,
    geometry: LegGeometry,
    goal: GoalCell,
    actuators: [Arc<dyn Actuator>; 3],
}

impl Leg {
    /// Build a leg and ping its actuators. A missing actuator is logged and
    /// the leg keeps working in degraded form.
    pub fn new(id: usize, geometry: LegGeometry, actuators: [Arc<dyn Actuator>; 3]) -> Self {
        for actuator in &actuators {
            if !actuator.ping() {
                tracing::warn!(
                    "Actuator (ID: {}) of leg (ID: {}) couldn't be found",
                    actuator.id(),
                    id
                );
            }
        }
        Self {
            id,
            geometry,
            goal: GoalCell::new(),
            actuators,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn geometry(&self) -> &LegGeometry {
        &self.geometry
    }

    pub fn side(&self) -> Side {
        self.geometry.side
    }

    /// Publish a new body-frame goal. Non-finite goals are dropped and the
    /// previous goal stays in place.
    pub fn set_goal_position(&self, goal: Vec3) -> bool {
        if !(goal.x.is_finite() && goal.y.is_finite() && goal.z.is_finite()) {
            tracing::debug!("Leg {} ignored non-finite goal {:?}", self.id, goal);
            return false;
        }
        self.goal.store(goal);
        true
    }

    pub fn goal_position(&self) -> Option<Vec3> {
        self.goal.load()
    }

    pub fn clear_goal(&self) {
        self.goal.clear();
    }

    /// Goal relative to the hip mount.
    pub fn relative_goal_position(&self) -> Option<Vec3> {
        self.goal.load().map(|goal| self.geometry.to_relative(&goal))
    }

    pub fn actuators(&self) -> &[Arc<dyn Actuator>; 3] {
        &self.actuators
    }

    pub fn set_torque_enabled(&self, enabled: bool) -> Result<(), HardwareError> {
        let mut first_error = None;
        for actuator in &self.actuators {
            if let Err(e) = actuator.set_torque_enabled(enabled) {
                tracing::warn!("Torque change failed on leg {}: {}", self.id, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Solve IK for the current goal and command the actuators.
    ///
    /// Returns whether angles were pushed. Nothing is sent while the goal
    /// is unset or when the solution is not finite; the leg then holds its
    /// last commanded pose.
    pub fn update_actuators(&self) -> bool {
        match self.relative_goal_position() {
            Some(goal) => self.move_to_relative(&goal),
            None => false,
        }
    }

    pub fn move_to_relative(&self, goal: &Vec3) -> bool {
        let angles = self.geometry.solve(goal);
        if !angles.is_finite() {
            tracing::trace!("Leg {} target {:?} unreachable", self.id, goal);
            return false;
        }
        for (actuator, angle) in self.actuators.iter().zip(angles.as_array()) {
            if let Err(e) = actuator.set_goal_position(angle) {
                tracing::trace!("Leg {} actuator {}: {}", self.id, actuator.id(), e);
            }
        }
        true
    }
}

impl std::fmt::Debug for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leg")
            .field("id", &self.id)
            .field("geometry", &self.geometry)
            .field("goal", &self.goal.load())
            .finish()
    }
}
