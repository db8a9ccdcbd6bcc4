//! Engine-space geometry: rotations and rigid transforms.
//!
//! The simulation engine uses a left-handed frame with X forward, Y right
//! and Z up. Rotations are pitch/yaw/roll in degrees (pitch about Y, yaw
//! about Z, roll about X), composed exactly the way the engine's client API
//! builds its world matrices.

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Orientation in degrees, engine convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotation {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// The 3x3 rotation block of the engine's world matrix.
    pub fn matrix(&self) -> Matrix3<f64> {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        let (sr, cr) = self.roll.to_radians().sin_cos();

        Matrix3::new(
            cp * cy,
            cy * sp * sr - sy * cr,
            -cy * sp * cr - sy * sr,
            sy * cp,
            sy * sp * sr + cy * cr,
            -sy * sp * cr + cy * sr,
            sp,
            -cp * sr,
            cp * cr,
        )
    }
}

/// A rigid transform: world location plus engine rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position in meters.
    pub location: Vector3<f64>,
    pub rotation: Rotation,
}

impl Transform {
    pub fn new(location: Vector3<f64>, rotation: Rotation) -> Self {
        Self { location, rotation }
    }

    /// A pure translation with no rotation.
    pub fn from_location(location: Vector3<f64>) -> Self {
        Self {
            location,
            rotation: Rotation::default(),
        }
    }

    /// Local-to-world matrix, identical to the engine client's `get_matrix`.
    pub fn matrix(&self) -> Matrix4<f64> {
        let r = self.rotation.matrix();
        let t = self.location;

        Matrix4::new(
            r[(0, 0)],
            r[(0, 1)],
            r[(0, 2)],
            t.x,
            r[(1, 0)],
            r[(1, 1)],
            r[(1, 2)],
            t.y,
            r[(2, 0)],
            r[(2, 1)],
            r[(2, 2)],
            t.z,
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    /// World-to-local matrix: the rigid inverse (transposed rotation, rotated
    /// and negated translation). Used as the world-to-camera matrix.
    pub fn inverse_matrix(&self) -> Matrix4<f64> {
        let rt = self.rotation.matrix().transpose();
        let t = -(rt * self.location);

        Matrix4::new(
            rt[(0, 0)],
            rt[(0, 1)],
            rt[(0, 2)],
            t.x,
            rt[(1, 0)],
            rt[(1, 1)],
            rt[(1, 2)],
            t.y,
            rt[(2, 0)],
            rt[(2, 1)],
            rt[(2, 2)],
            t.z,
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Unit vector along the transform's facing direction (local X axis).
    pub fn forward_vector(&self) -> Vector3<f64> {
        let (sp, cp) = self.rotation.pitch.to_radians().sin_cos();
        let (sy, cy) = self.rotation.yaw.to_radians().sin_cos();
        Vector3::new(cp * cy, cp * sy, sp)
    }

    /// Applies the transform to a local-space point.
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        (self.matrix() * Vector4::new(point.x, point.y, point.z, 1.0)).xyz()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            location: Vector3::zeros(),
            rotation: Rotation::default(),
        }
    }
}

/// Euclidean distance between two locations, meters.
pub fn distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_rotation_is_identity() {
        let r = Rotation::default();
        assert_relative_eq!(r.matrix(), Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn forward_vector_follows_yaw_and_pitch() {
        let level = Transform::default();
        assert_relative_eq!(
            level.forward_vector(),
            Vector3::new(1.0, 0.0, 0.0),
            epsilon = 1e-12
        );

        let left_turn = Transform::new(Vector3::zeros(), Rotation::new(0.0, 90.0, 0.0));
        assert_relative_eq!(
            left_turn.forward_vector(),
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );

        let straight_up = Transform::new(Vector3::zeros(), Rotation::new(90.0, 0.0, 0.0));
        assert_relative_eq!(
            straight_up.forward_vector(),
            Vector3::new(0.0, 0.0, 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn matrix_times_inverse_is_identity() {
        let transform = Transform::new(
            Vector3::new(12.0, -3.5, 1.8),
            Rotation::new(10.0, 25.0, -5.0),
        );

        let product = transform.matrix() * transform.inverse_matrix();
        assert_relative_eq!(product, Matrix4::identity(), epsilon = 1e-9);
    }

    #[test]
    fn transform_point_applies_translation_and_rotation() {
        let shift = Transform::from_location(Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(
            shift.transform_point(&Vector3::new(1.0, 0.0, 0.0)),
            Vector3::new(2.0, 2.0, 3.0),
            epsilon = 1e-12
        );

        // Yaw 90 maps local +X onto world +Y.
        let turned = Transform::new(Vector3::new(5.0, 0.0, 0.0), Rotation::new(0.0, 90.0, 0.0));
        assert_relative_eq!(
            turned.transform_point(&Vector3::new(2.0, 0.0, 0.0)),
            Vector3::new(5.0, 2.0, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Vector3::new(1.0, 2.0, 2.0);
        let b = Vector3::zeros();
        assert_relative_eq!(distance(&a, &b), 3.0, epsilon = 1e-12);
        assert_relative_eq!(distance(&b, &a), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn forward_vector_is_unit_length() {
        let transform = Transform::new(Vector3::zeros(), Rotation::new(33.0, -140.0, 72.0));
        assert_relative_eq!(transform.forward_vector().norm(), 1.0, epsilon = 1e-12);
    }
}
