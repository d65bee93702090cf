//! Geometry Engine.
//!
//! Maps one [`Reading`] to world-space points: every sensor's scalar distance
//! is laid along its local +X axis, rotated by the rig attitude and then
//! translated by the sensor's mounting offset.
//!
//! The attitude rotation is composed as
//!
//! ```text
//! R = R_yaw · R_pitch · R_roll
//! ```
//!
//! where yaw turns about Z, pitch about Y and roll about X.  The order is
//! fixed; recorded data sets depend on it.
//!
//! # Example
//!
//! ```rust
//! use echoscan_perception::geometry::transform;
//! use echoscan_types::{Orientation, Reading, SensorDistances, SensorMount};
//!
//! let rig = SensorMount::default_rig();
//! let reading = Reading::new(SensorDistances::uniform(10.0), Orientation::default());
//!
//! let points = transform(&reading, &rig);
//! assert_eq!(points.len(), 4);
//! assert!((points[0].x - 5.0).abs() < 1e-12); // -5 offset + 10 along X
//! ```

use echoscan_types::{Orientation, Point3D, Reading, SensorMount};

// ────────────────────────────────────────────────────────────────────────────
// Matrix3
// ────────────────────────────────────────────────────────────────────────────

/// Row-major 3×3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    pub rows: [[f64; 3]; 3],
}

impl Matrix3 {
    pub fn new(rows: [[f64; 3]; 3]) -> Self {
        Self { rows }
    }

    pub fn identity() -> Self {
        Self::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Matrix product `self · rhs`.
    pub fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.rows[i][k] * rhs.rows[k][j]).sum();
            }
        }
        Self::new(out)
    }

    /// Matrix-vector product `self · v`.
    pub fn mul_vec(self, v: Point3D) -> Point3D {
        let [a, b, c] = self.rows;
        Point3D::new(
            a[0] * v.x + a[1] * v.y + a[2] * v.z,
            b[0] * v.x + b[1] * v.y + b[2] * v.z,
            c[0] * v.x + c[1] * v.y + c[2] * v.z,
        )
    }

    pub fn transpose(self) -> Self {
        let r = self.rows;
        Self::new([
            [r[0][0], r[1][0], r[2][0]],
            [r[0][1], r[1][1], r[2][1]],
            [r[0][2], r[1][2], r[2][2]],
        ])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Elementary rotations
// ────────────────────────────────────────────────────────────────────────────

/// Rotation about Z by `yaw` radians.
pub fn rotation_yaw(yaw: f64) -> Matrix3 {
    let (s, c) = yaw.sin_cos();
    Matrix3::new([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
}

/// Rotation about Y by `pitch` radians (turns the X/Z plane).
pub fn rotation_pitch(pitch: f64) -> Matrix3 {
    let (s, c) = pitch.sin_cos();
    Matrix3::new([[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]])
}

/// Rotation about X by `roll` radians.
pub fn rotation_roll(roll: f64) -> Matrix3 {
    let (s, c) = roll.sin_cos();
    Matrix3::new([[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]])
}

/// `R_yaw · R_pitch · R_roll` for an attitude given in degrees.
pub fn composed_rotation(orientation: &Orientation) -> Matrix3 {
    let (pitch, roll, yaw) = orientation.to_radians();
    rotation_yaw(yaw).mul(rotation_pitch(pitch).mul(rotation_roll(roll)))
}

// ────────────────────────────────────────────────────────────────────────────
// transform
// ────────────────────────────────────────────────────────────────────────────

/// Convert `reading` into one world-space point per entry of `mounts`.
///
/// The output has the same length and order as `mounts`.  No input is
/// rejected: negative distances land behind the sensor and non-finite values
/// propagate into the output.
pub fn transform(reading: &Reading, mounts: &[SensorMount]) -> Vec<Point3D> {
    let rotation = composed_rotation(&reading.orientation);
    mounts
        .iter()
        .map(|mount| {
            let local = Point3D::new(reading.distance(mount.id), 0.0, 0.0);
            rotation.mul_vec(local).add(mount.offset)
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use echoscan_types::{SensorDistances, SensorId};

    const EPS: f64 = 1e-9;

    fn reading(distance: f64, pitch: f64, roll: f64, yaw: f64) -> Reading {
        Reading::new(
            SensorDistances::uniform(distance),
            Orientation::new(pitch, roll, yaw),
        )
    }

    fn assert_close(a: Point3D, b: Point3D) {
        assert!(
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS && (a.z - b.z).abs() < EPS,
            "{a:?} != {b:?}"
        );
    }

    fn assert_identity(m: Matrix3) {
        let id = Matrix3::identity();
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (m.rows[i][j] - id.rows[i][j]).abs() < EPS,
                    "entry ({i},{j}) = {}",
                    m.rows[i][j]
                );
            }
        }
    }

    // ── Matrix3 ─────────────────────────────────────────────────────────────

    #[test]
    fn identity_mul_is_noop() {
        let m = rotation_yaw(0.3).mul(rotation_roll(-1.1));
        assert_eq!(Matrix3::identity().mul(m), m);
        assert_eq!(m.mul(Matrix3::identity()), m);
    }

    #[test]
    fn zero_orientation_composes_to_identity() {
        assert_eq!(composed_rotation(&Orientation::default()), Matrix3::identity());
    }

    #[test]
    fn composition_order_is_yaw_pitch_roll() {
        let o = Orientation::new(30.0, 45.0, 60.0);
        let (p, r, y) = o.to_radians();
        let expected = rotation_yaw(y).mul(rotation_pitch(p)).mul(rotation_roll(r));
        let reversed = rotation_roll(r).mul(rotation_pitch(p)).mul(rotation_yaw(y));
        let got = composed_rotation(&o);
        for i in 0..3 {
            for j in 0..3 {
                assert!((got.rows[i][j] - expected.rows[i][j]).abs() < EPS);
            }
        }
        assert_ne!(got, reversed, "rotation order must matter");
    }

    #[test]
    fn composed_rotation_is_orthogonal() {
        let attitudes = [
            (0.0, 0.0, 0.0),
            (12.5, -40.0, 170.0),
            (-90.0, 90.0, -180.0),
            (359.0, 721.0, -45.0),
            (0.001, 179.999, 33.3),
        ];
        for (p, r, y) in attitudes {
            let m = composed_rotation(&Orientation::new(p, r, y));
            assert_identity(m.mul(m.transpose()));
        }
    }

    #[test]
    fn rotation_preserves_distance() {
        let rig = SensorMount::default_rig();
        for (p, r, y) in [(10.0, 20.0, 30.0), (-75.0, 5.0, 260.0), (0.0, 0.0, 90.0)] {
            let reading = reading(37.5, p, r, y);
            let points = transform(&reading, &rig);
            for (point, mount) in points.iter().zip(&rig) {
                let rotated = Point3D::new(
                    point.x - mount.offset.x,
                    point.y - mount.offset.y,
                    point.z - mount.offset.z,
                );
                assert!((rotated.norm() - 37.5).abs() < EPS);
            }
        }
    }

    // ── transform ───────────────────────────────────────────────────────────

    #[test]
    fn zero_orientation_is_distance_plus_offset() {
        let rig = SensorMount::default_rig();
        let r = Reading::new(
            SensorDistances {
                top_left: 1.0,
                top_right: 2.0,
                bottom_left: 3.0,
                bottom_right: 4.0,
            },
            Orientation::default(),
        );
        let points = transform(&r, &rig);
        for (point, mount) in points.iter().zip(&rig) {
            let expected = Point3D::new(r.distance(mount.id), 0.0, 0.0).add(mount.offset);
            assert_eq!(*point, expected);
        }
    }

    #[test]
    fn default_rig_scenario() {
        let points = transform(&reading(10.0, 0.0, 0.0, 0.0), &SensorMount::default_rig());
        assert_eq!(
            points,
            vec![
                Point3D::new(5.0, 5.0, 0.0),
                Point3D::new(15.0, 5.0, 0.0),
                Point3D::new(5.0, -5.0, 0.0),
                Point3D::new(15.0, -5.0, 0.0),
            ]
        );
    }

    #[test]
    fn yaw_90_matches_trig() {
        let rig = SensorMount::default_rig();
        let points = transform(&reading(10.0, 0.0, 0.0, 90.0), &rig);

        let yaw = 90.0_f64.to_radians();
        for (point, mount) in points.iter().zip(&rig) {
            // R_z(yaw) · (d, 0, 0) = (d cos yaw, d sin yaw, 0)
            let expected = Point3D::new(
                10.0 * yaw.cos() + mount.offset.x,
                10.0 * yaw.sin() + mount.offset.y,
                mount.offset.z,
            );
            assert_close(*point, expected);
        }
        assert_close(points[0], Point3D::new(-5.0, 15.0, 0.0));
    }

    #[test]
    fn pitch_rotates_x_into_negative_z() {
        let mount = [SensorMount::new(SensorId::TopLeft, Point3D::default())];
        let p = transform(&reading(10.0, 90.0, 0.0, 0.0), &mount)[0];
        assert_close(p, Point3D::new(0.0, 0.0, -10.0));
    }

    #[test]
    fn roll_leaves_forward_axis_unchanged() {
        let mount = [SensorMount::new(SensorId::TopRight, Point3D::default())];
        let p = transform(&reading(10.0, 0.0, 63.0, 0.0), &mount)[0];
        assert_close(p, Point3D::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn output_follows_mount_order() {
        let rig: Vec<_> = SensorMount::default_rig().into_iter().rev().collect();
        let r = Reading::new(
            SensorDistances {
                top_left: 1.0,
                top_right: 2.0,
                bottom_left: 3.0,
                bottom_right: 4.0,
            },
            Orientation::default(),
        );
        let points = transform(&r, &rig);
        assert_eq!(points.len(), 4);
        // bottom_right first: 4 + 5
        assert_eq!(points[0], Point3D::new(9.0, -5.0, 0.0));
        // top_left last: 1 - 5
        assert_eq!(points[3], Point3D::new(-4.0, 5.0, 0.0));
    }

    #[test]
    fn output_length_tracks_mounts() {
        let r = reading(5.0, 1.0, 2.0, 3.0);
        assert!(transform(&r, &[]).is_empty());
        let two = &SensorMount::default_rig()[..2];
        assert_eq!(transform(&r, two).len(), 2);
    }

    #[test]
    fn transform_is_deterministic() {
        let rig = SensorMount::default_rig();
        let r = reading(123.456, -17.0, 44.4, 201.0);
        assert_eq!(transform(&r, &rig), transform(&r, &rig));
    }

    #[test]
    fn negative_distance_points_backwards() {
        let mount = [SensorMount::new(SensorId::BottomLeft, Point3D::default())];
        let p = transform(&reading(-10.0, 0.0, 0.0, 0.0), &mount)[0];
        assert_eq!(p, Point3D::new(-10.0, 0.0, 0.0));
    }

    #[test]
    fn non_finite_inputs_propagate() {
        let rig = SensorMount::default_rig();
        let nan_distance = transform(&reading(f64::NAN, 0.0, 0.0, 0.0), &rig);
        assert!(nan_distance.iter().all(|p| p.x.is_nan()));

        let inf_yaw = transform(&reading(10.0, 0.0, 0.0, f64::INFINITY), &rig);
        assert!(inf_yaw.iter().all(|p| p.x.is_nan() || p.y.is_nan()));
    }
}
