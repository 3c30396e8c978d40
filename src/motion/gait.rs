// src/motion/gait.rs - Table-driven phase engine shared by ripple, tripod and wave gaits
use std::f64::consts::PI;
use std::fmt;
use std::time::Duration;

use crate::geometry::{Vec2, Vec3, rotate_z, with_z};
use crate::leg::LEG_COUNT;

/// Phase in which the foot lifts off and starts moving toward its stance point.
pub const SWING_RAISE: u8 = 1;
/// Phase in which the foot finishes the arc and touches down.
pub const SWING_LOWER: u8 = 2;

/// Speed factor used until the first step window completes.
pub const INITIAL_SPEED_FACTOR: f64 = 0.2;
const SPEED_FACTOR_FLOOR: f64 = 0.2;
const PHASE_DIVISOR: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GaitKind {
    Ripple,
    Tripod,
    Wave,
}

/// Phase count, stance scaling and the starting phase of every leg.
#[derive(Debug, Clone, PartialEq)]
pub struct GaitSpec {
    pub phases: u8,
    pub speed_scale: f64,
    pub rotation_scale: f64,
    pub initial_phases: [u8; LEG_COUNT],
}

const RIPPLE: GaitSpec = GaitSpec {
    phases: 6,
    speed_scale: 1.0,
    rotation_scale: 1.0,
    initial_phases: [5, 2, 3, 6, 1, 4],
};

const TRIPOD: GaitSpec = GaitSpec {
    phases: 4,
    speed_scale: 3.0,
    rotation_scale: 1.0,
    initial_phases: [1, 3, 3, 1, 1, 3],
};

const WAVE: GaitSpec = GaitSpec {
    phases: 12,
    speed_scale: 0.3,
    rotation_scale: 0.3,
    initial_phases: [1, 3, 5, 7, 9, 11],
};

impl GaitKind {
    pub const ALL: [GaitKind; 3] = [GaitKind::Ripple, GaitKind::Tripod, GaitKind::Wave];

    pub fn spec(self) -> &'static GaitSpec {
        match self {
            GaitKind::Ripple => &RIPPLE,
            GaitKind::Tripod => &TRIPOD,
            GaitKind::Wave => &WAVE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GaitKind::Ripple => "ripple",
            GaitKind::Tripod => "tripod",
            GaitKind::Wave => "wave",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|gait| gait.name().eq_ignore_ascii_case(name))
    }

    fn index(self) -> usize {
        match self {
            GaitKind::Ripple => 0,
            GaitKind::Tripod => 1,
            GaitKind::Wave => 2,
        }
    }
}

impl fmt::Display for GaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleThresholds {
    pub speed: f64,
    pub rotation: f64,
    /// Maximum XY distance from the default stance point.
    pub radius: f64,
}

/// Stance-phase motion for one tick, already scaled for the active gait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StanceMotion {
    pub speed: Vec2,
    pub rotation: f64,
    pub step_height: f64,
}

/// Per-leg phase machines for every gait plus the shared step clock.
///
/// Each gait keeps its own phase table so that switching back to a gait
/// resumes its leg offsets. Walk positions and swing-start points are
/// shared, since gait switches only happen with all feet at rest.
#[derive(Debug, Clone)]
pub struct GaitEngine {
    default_positions: [Vec2; LEG_COUNT],
    phases: [[u8; LEG_COUNT]; 3],
    swing_start: [Vec2; LEG_COUNT],
    walk_positions: [Vec3; LEG_COUNT],
    step_clock_ms: f64,
    speed_factor: f64,
    step_period_ms: f64,
}

impl GaitEngine {
    pub fn new(default_positions: [Vec2; LEG_COUNT], step_period_ms: f64) -> Self {
        Self {
            default_positions,
            phases: GaitKind::ALL.map(|gait| gait.spec().initial_phases),
            swing_start: default_positions,
            walk_positions: default_positions.map(|p| with_z(&p, 0.0)),
            step_clock_ms: 0.0,
            speed_factor: INITIAL_SPEED_FACTOR,
            step_period_ms,
        }
    }

    /// Put every foot back on its default stance point at height `z`.
    /// Phase tables are kept.
    pub fn reset(&mut self, z: f64) {
        self.walk_positions = self.default_positions.map(|p| with_z(&p, z));
        self.swing_start = self.default_positions;
        self.step_clock_ms = 0.0;
        self.speed_factor = INITIAL_SPEED_FACTOR;
    }

    /// Duration of one phase in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.step_period_ms / PHASE_DIVISOR / self.speed_factor
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    pub fn step_clock_ms(&self) -> f64 {
        self.step_clock_ms
    }

    pub fn phase(&self, gait: GaitKind, leg: usize) -> u8 {
        self.phases[gait.index()][leg]
    }

    /// True unless the leg is in the swing-raise phase.
    pub fn in_stance(&self, gait: GaitKind, leg: usize) -> bool {
        self.phase(gait, leg) != SWING_RAISE
    }

    pub fn walk_position(&self, leg: usize) -> Vec3 {
        self.walk_positions[leg]
    }

    pub fn default_position(&self, leg: usize) -> Vec2 {
        self.default_positions[leg]
    }

    /// Idle when the commanded motion is negligible and every foot rests
    /// within `radius` of its default stance point.
    pub fn is_idle(&self, speed: &Vec2, rotation: f64, thresholds: &IdleThresholds) -> bool {
        if speed.norm() >= thresholds.speed || rotation.abs() >= thresholds.rotation {
            return false;
        }
        self.walk_positions
            .iter()
            .zip(self.default_positions.iter())
            .all(|(walk, home)| (walk.xy() - home).norm() <= thresholds.radius)
    }

    /// Hold a leg in place on the ground.
    pub fn hold_leg(&mut self, leg: usize) -> Vec3 {
        self.walk_positions[leg].z = 0.0;
        self.walk_positions[leg]
    }

    /// Advance one leg through its phase for this tick and return its
    /// gait-relative position.
    pub fn step_leg(
        &mut self,
        gait: GaitKind,
        leg: usize,
        elapsed: Duration,
        motion: &StanceMotion,
    ) -> Vec3 {
        let t = self.step_clock_ms;
        let d = self.duration_ms();
        let home = self.default_positions[leg];
        let from = self.swing_start[leg];
        let mut pos = self.walk_positions[leg];

        match self.phases[gait.index()][leg] {
            SWING_RAISE => {
                let xy = swing_xy(&from, &home, t, d);
                pos = with_z(&xy, (t / d * (PI / 2.0)).sin() * motion.step_height);
            }
            SWING_LOWER => {
                let xy = swing_xy(&from, &home, t + d, d);
                pos = with_z(&xy, ((t / d * PI).cos() + 1.0) * (motion.step_height / 2.0));
            }
            _ => {
                let dt = elapsed.as_secs_f64();
                pos.x -= motion.speed.x * dt;
                pos.y -= motion.speed.y * dt;
                pos.z = 0.0;
                pos = rotate_z(&pos, -motion.rotation * dt);
            }
        }

        if t >= d {
            let phase = &mut self.phases[gait.index()][leg];
            if *phase != SWING_RAISE {
                self.swing_start[leg] = pos.xy();
            }
            *phase = if *phase >= gait.spec().phases { SWING_RAISE } else { *phase + 1 };
        }

        self.walk_positions[leg] = pos;
        pos
    }

    /// Advance the shared step clock. When the current window is used up the
    /// clock wraps and the speed factor is recomputed from the commanded
    /// speed so cadence follows demand, never dropping below the floor.
    pub fn advance_clock(&mut self, elapsed: Duration, speed: f64, rotation: f64, damping: f64) {
        if self.step_clock_ms < self.duration_ms() {
            self.step_clock_ms += elapsed.as_secs_f64() * 1000.0;
        } else {
            self.speed_factor = speed.max(rotation.abs()) * damping + SPEED_FACTOR_FLOOR;
            self.step_clock_ms = 0.0;
        }
    }

    /// True when the step clock has used up the current window; the next
    /// `step_leg` calls will advance every leg's phase.
    pub fn window_elapsed(&self) -> bool {
        self.step_clock_ms >= self.duration_ms()
    }
}

/// Linear interpolation from `from` toward `to` across a window of `2d`.
fn swing_xy(from: &Vec2, to: &Vec2, t: f64, d: f64) -> Vec2 {
    (from * (d * 2.0 - t) + to * t) / (d * 2.0)
}
