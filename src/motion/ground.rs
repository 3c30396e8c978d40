// src/motion/ground.rs - Load balancing and plane-fit leveling of per-leg height offsets
use crate::geometry::{Plane, Vec2, Vec3, with_z};
use crate::leg::{LEG_COUNT, Side};

/// Proportional gain driving each leg toward the mean weighted load.
pub const LOAD_GAIN: f64 = 80.0;

/// Shift applied to foot positions before the plane fit, keeping the sums
/// ΣX and ΣY well away from zero.
pub const PLANE_SHIFT_X: f64 = 500.0;
pub const PLANE_SHIFT_Y: f64 = 400.0;

/// Everything the balancer needs to know about one leg this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegLoad {
    /// Raw load sample from the actuator.
    pub raw: i32,
    pub side: Side,
    /// Current goal relative to the hip mount.
    pub relative_goal: Option<Vec3>,
    /// Gait-relative foot position.
    pub walk_xy: Vec2,
    /// Foot is on the ground (any stance phase, or the body is idle).
    pub grounded: bool,
}

impl LegLoad {
    /// Load divided by the foot's horizontal lever arm. Right-side sensors
    /// report with the opposite sign. `None` without a usable lever arm.
    pub fn weighted(&self) -> Option<f64> {
        let reach = self.relative_goal?.xy().norm();
        if reach <= 0.0 || !reach.is_finite() {
            return None;
        }
        let load = f64::from(self.raw);
        let load = if self.side.is_right() { -load } else { load };
        Some(load / reach)
    }
}

/// Per-leg height offsets equalizing load across grounded legs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundAdaptation {
    offsets: [f64; LEG_COUNT],
}

impl GroundAdaptation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offsets(&self) -> &[f64; LEG_COUNT] {
        &self.offsets
    }

    pub fn offset(&self, leg: usize) -> f64 {
        self.offsets[leg]
    }

    pub fn reset(&mut self) {
        self.offsets = [0.0; LEG_COUNT];
    }

    /// One adaptation step: balance loads, re-center, zero airborne legs,
    /// then remove the best-fit plane.
    pub fn update(&mut self, legs: &[LegLoad; LEG_COUNT], dt: f64) {
        self.balance(legs, dt);
        self.recenter();
        for (offset, leg) in self.offsets.iter_mut().zip(legs) {
            if !leg.grounded {
                *offset = 0.0;
            }
        }
        let walk_xy: [Vec2; LEG_COUNT] = std::array::from_fn(|i| legs[i].walk_xy);
        self.remove_plane(&walk_xy);
    }

    fn balance(&mut self, legs: &[LegLoad; LEG_COUNT], dt: f64) {
        let weighted: [Option<f64>; LEG_COUNT] =
            std::array::from_fn(|i| if legs[i].grounded { legs[i].weighted() } else { None });

        let contributing: Vec<f64> = weighted.iter().flatten().copied().collect();
        if contributing.is_empty() {
            return;
        }
        let mean = contributing.iter().sum::<f64>() / contributing.len() as f64;

        for (offset, load) in self.offsets.iter_mut().zip(weighted) {
            if let Some(load) = load {
                *offset -= (mean - load) * dt * LOAD_GAIN;
            }
        }
    }

    /// Keep the offsets zero-sum so the body does not drift vertically.
    fn recenter(&mut self) {
        let mean = self.offsets.iter().sum::<f64>() / LEG_COUNT as f64;
        for offset in self.offsets.iter_mut() {
            *offset -= mean;
        }
    }

    /// Subtract the least-squares plane through (foot XY, offset), removing
    /// any systematic grade the balancer has built up.
    pub fn remove_plane(&mut self, walk_xy: &[Vec2; LEG_COUNT]) {
        let shift = Vec2::new(PLANE_SHIFT_X, PLANE_SHIFT_Y);
        let shifted: [Vec2; LEG_COUNT] = std::array::from_fn(|i| walk_xy[i] + shift);
        let points: Vec<Vec3> = shifted
            .iter()
            .zip(self.offsets.iter())
            .map(|(xy, offset)| with_z(xy, *offset))
            .collect();

        let plane = Plane::fit(&points);
        for (offset, xy) in self.offsets.iter_mut().zip(shifted.iter()) {
            let z = plane.z_at(xy);
            if z.is_finite() {
                *offset -= z;
            }
        }
    }

    pub fn sum(&self) -> f64 {
        self.offsets.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(raw: i32, side: Side, x: f64, y: f64) -> LegLoad {
        LegLoad {
            raw,
            side,
            relative_goal: Some(Vec3::new(x, y, -100.0)),
            walk_xy: Vec2::new(x, y),
            grounded: true,
        }
    }

    #[test]
    fn test_weighted_load_flips_right_side() {
        let left = leg(100, Side::Left, 30.0, 40.0);
        let right = leg(100, Side::Right, 30.0, 40.0);
        assert_eq!(left.weighted(), Some(2.0));
        assert_eq!(right.weighted(), Some(-2.0));
    }

    #[test]
    fn test_weighted_load_handles_extreme_samples() {
        let right = leg(i32::MIN, Side::Right, 30.0, 40.0);
        assert_eq!(right.weighted(), Some(-(i32::MIN as f64) / 50.0));
    }

    #[test]
    fn test_weighted_load_without_goal() {
        let mut l = leg(100, Side::Left, 30.0, 40.0);
        l.relative_goal = None;
        assert_eq!(l.weighted(), None);
    }

    #[test]
    fn test_equal_loads_leave_offsets_flat() {
        let legs = [
            leg(50, Side::Left, -60.0, 80.0),
            leg(-50, Side::Right, 60.0, 80.0),
            leg(50, Side::Left, -100.0, 0.0),
            leg(-50, Side::Right, 100.0, 0.0),
            leg(50, Side::Left, -60.0, -80.0),
            leg(-50, Side::Right, 60.0, -80.0),
        ];
        let mut ground = GroundAdaptation::new();
        ground.update(&legs, 0.02);
        assert!(ground.offsets().iter().all(|o| o.abs() < 1e-9));
    }

    #[test]
    fn test_heavier_leg_is_raised() {
        let mut legs = [
            leg(50, Side::Left, -60.0, 80.0),
            leg(-50, Side::Right, 60.0, 80.0),
            leg(50, Side::Left, -100.0, 0.0),
            leg(-50, Side::Right, 100.0, 0.0),
            leg(50, Side::Left, -60.0, -80.0),
            leg(-50, Side::Right, 60.0, -80.0),
        ];
        legs[0].raw = 110;
        let mut ground = GroundAdaptation::new();
        ground.balance(&legs, 0.02);
        assert!(ground.offset(0) > 0.0);
        assert!(ground.offset(1) < 0.0);
    }

    #[test]
    fn test_airborne_leg_is_skipped_by_balance() {
        let mut legs = [leg(0, Side::Left, 30.0, 40.0); LEG_COUNT];
        legs[1].raw = 500;
        legs[1].grounded = false;
        let mut ground = GroundAdaptation::new();
        ground.balance(&legs, 0.02);
        assert!(ground.offsets().iter().all(|o| *o == 0.0));
    }

    #[test]
    fn test_update_zeroes_airborne_leg_before_plane() {
        let mut ground = GroundAdaptation::new();
        ground.offsets = [3.0, -3.0, 1.0, -1.0, 2.0, -2.0];
        let mut legs = [leg(0, Side::Left, 30.0, 40.0); LEG_COUNT];
        legs[1].grounded = false;
        let walk: [Vec2; LEG_COUNT] = std::array::from_fn(|i| legs[i].walk_xy);
        ground.update(&legs, 0.0);
        let mut expected = GroundAdaptation::new();
        expected.offsets = [3.0, 0.0, 1.0, -1.0, 2.0, -2.0];
        expected.remove_plane(&walk);
        assert_eq!(ground, expected);
    }

    #[test]
    fn test_recenter_is_zero_sum() {
        let mut ground = GroundAdaptation::new();
        ground.offsets = [4.0, 1.0, -2.0, 7.0, 0.5, 3.0];
        ground.recenter();
        assert!(ground.sum().abs() < 1e-12);
    }
}
