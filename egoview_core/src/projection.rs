//! Pinhole projection from engine world space to image pixels.
//!
//! The projection pipeline mirrors the engine client's reference math:
//! world point -> camera space (world-to-camera matrix) -> axis reorder from
//! the engine's X-forward/Y-right/Z-up frame to the standard X-right/Y-down/
//! Z-forward camera frame -> intrinsic matrix -> perspective divide.

use nalgebra::{Matrix3, Matrix4, Point2, Vector3, Vector4};

use crate::geometry::Transform;

/// Minimum forward depth for a projectable point, meters. Anything at or
/// behind the image plane has no meaningful pixel.
const MIN_DEPTH: f64 = 1e-6;

/// Image size and horizontal field of view of a camera sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    pub fov_deg: f64,
}

impl CameraIntrinsics {
    pub fn new(width: u32, height: u32, fov_deg: f64) -> Self {
        Self {
            width,
            height,
            fov_deg,
        }
    }

    /// Focal length in pixels: `w / (2 * tan(fov / 2))`.
    pub fn focal(&self) -> f64 {
        self.width as f64 / (2.0 * (self.fov_deg * std::f64::consts::PI / 360.0).tan())
    }

    /// The 3x3 intrinsic matrix K, principal point at the image center.
    pub fn matrix(&self) -> Matrix3<f64> {
        let focal = self.focal();
        Matrix3::new(
            focal,
            0.0,
            self.width as f64 / 2.0,
            0.0,
            focal,
            self.height as f64 / 2.0,
            0.0,
            0.0,
            1.0,
        )
    }
}

/// Projects a world point to pixel coordinates.
///
/// Returns `None` when the point is at or behind the image plane.
pub fn project(
    world: &Vector3<f64>,
    k: &Matrix3<f64>,
    world_to_camera: &Matrix4<f64>,
) -> Option<Point2<f64>> {
    let cam = world_to_camera * Vector4::new(world.x, world.y, world.z, 1.0);

    // Engine camera space is X forward, Y right, Z up; the intrinsic matrix
    // wants X right, Y down, Z forward.
    let standard = Vector3::new(cam.y, -cam.z, cam.x);
    if standard.z <= MIN_DEPTH {
        return None;
    }

    let pixel = k * standard;
    Some(Point2::new(pixel.x / pixel.z, pixel.y / pixel.z))
}

/// An intrinsics + pose pair bound for one frame.
#[derive(Debug, Clone)]
pub struct PinholeCamera {
    k: Matrix3<f64>,
    world_to_camera: Matrix4<f64>,
}

impl PinholeCamera {
    /// Binds the camera's current world transform for projecting this frame.
    pub fn new(intrinsics: &CameraIntrinsics, camera_transform: &Transform) -> Self {
        Self {
            k: intrinsics.matrix(),
            world_to_camera: camera_transform.inverse_matrix(),
        }
    }

    pub fn project_world(&self, world: &Vector3<f64>) -> Option<Point2<f64>> {
        project(world, &self.k, &self.world_to_camera)
    }

    /// Forward depth of a world point in camera space, meters.
    pub fn depth(&self, world: &Vector3<f64>) -> f64 {
        (self.world_to_camera * Vector4::new(world.x, world.y, world.z, 1.0)).x
    }
}
