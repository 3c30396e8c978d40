// src/geometry.rs - Vector aliases, body rotations and the least-squares plane fit
use nalgebra::{Rotation3, Vector2, Vector3};

pub type Vec2 = Vector2<f64>;
pub type Vec3 = Vector3<f64>;

/// Rotate `v` by the Euler angles in `angles` (roll about X, pitch about Y, yaw about Z).
pub fn rotate(v: &Vec3, angles: &Vec3) -> Vec3 {
    Rotation3::from_euler_angles(angles.x, angles.y, angles.z) * v
}

/// Rotate `v` about the vertical axis.
pub fn rotate_z(v: &Vec3, angle: f64) -> Vec3 {
    rotate(v, &Vec3::new(0.0, 0.0, angle))
}

/// Lift a planar point into 3D at height `z`.
pub fn with_z(xy: &Vec2, z: f64) -> Vec3 {
    Vec3::new(xy.x, xy.y, z)
}

/// A plane stored as a point on it plus its (unnormalized) normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    origin: Vec3,
    normal: Vec3,
}

impl Plane {
    /// The horizontal plane through the origin; predicts zero everywhere.
    pub fn zero() -> Self {
        Self {
            origin: Vec3::zeros(),
            normal: Vec3::z(),
        }
    }

    /// Plane through three points. Collinear points give a degenerate
    /// plane whose `z_at` is not finite.
    pub fn through(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            origin: a,
            normal: (b - a).cross(&(c - a)),
        }
    }

    /// Least-squares fit of `z = ax + by + c` over `points`.
    ///
    /// Each normal equation, divided through by its leading sum, names a
    /// point that lies on the fitted plane:
    /// `(ΣX²/ΣX, ΣXY/ΣX, ΣXZ/ΣX)`, `(ΣXY/ΣY, ΣY²/ΣY, ΣYZ/ΣY)` and the
    /// centroid. The plane through those three points is the fit. When
    /// ΣX or ΣY is exactly zero the zero plane is returned instead.
    pub fn fit(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::zero();
        }

        let mut sum = Vec3::zeros();
        let mut sum_sq = Vec3::zeros();
        let mut sum_xy = 0.0;
        let mut sum_xz = 0.0;
        let mut sum_yz = 0.0;

        for p in points {
            sum += p;
            sum_sq += p.component_mul(p);
            sum_xy += p.x * p.y;
            sum_xz += p.x * p.z;
            sum_yz += p.y * p.z;
        }

        if sum.x == 0.0 || sum.y == 0.0 {
            return Self::zero();
        }

        let n = points.len() as f64;
        let from_x = Vec3::new(sum_sq.x / sum.x, sum_xy / sum.x, sum_xz / sum.x);
        let from_y = Vec3::new(sum_xy / sum.y, sum_sq.y / sum.y, sum_yz / sum.y);
        let centroid = sum / n;

        Self::through(from_x, from_y, centroid)
    }

    /// Height of the plane above `p`. Not finite for vertical or degenerate planes.
    pub fn z_at(&self, p: &Vec2) -> f64 {
        let n = &self.normal;
        self.origin.z - (n.x * (p.x - self.origin.x) + n.y * (p.y - self.origin.y)) / n.z
    }
}
