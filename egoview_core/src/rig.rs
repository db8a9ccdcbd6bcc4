//! Camera rig configuration.
//!
//! Which camera sensor to attach, at what resolution and field of view, and
//! where it sits on the ego vehicle. Rigs load from a JSON file or fall back
//! to the built-in front-center camera.

use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Rotation, Transform};
use crate::projection::CameraIntrinsics;

/// Errors for rig file loading.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("Failed to read rig file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rig file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No camera with id '{0}' in rig file")]
    UnknownCamera(String),
}

/// One mounted camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraRig {
    pub id: String,

    /// Engine sensor blueprint id.
    #[serde(default = "default_sensor_type")]
    pub sensor_type: String,

    pub width: u32,
    pub height: u32,

    #[serde(default = "default_fov")]
    pub fov_deg: f64,

    // Mount pose relative to the ego vehicle, meters and degrees.
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub roll: f64,
}

fn default_sensor_type() -> String {
    "sensor.camera.rgb".to_string()
}

fn default_fov() -> f64 {
    90.0
}

impl Default for CameraRig {
    /// The built-in front-center camera: 800x600 at 90 degrees, mounted on
    /// the hood line looking straight ahead.
    fn default() -> Self {
        Self {
            id: "Center".to_string(),
            sensor_type: default_sensor_type(),
            width: 800,
            height: 600,
            fov_deg: 90.0,
            x: 1.6,
            y: 0.0,
            z: 1.7,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
        }
    }
}

impl CameraRig {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::new(self.width, self.height, self.fov_deg)
    }

    /// Mount pose relative to the vehicle the camera attaches to.
    pub fn mount_transform(&self) -> Transform {
        Transform::new(
            Vector3::new(self.x, self.y, self.z),
            Rotation::new(self.pitch, self.yaw, self.roll),
        )
    }
}

/// A rig file: a JSON document listing the available cameras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigFile {
    pub cameras: Vec<CameraRig>,
}

impl RigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn find(&self, id: &str) -> Result<&CameraRig, RigError> {
        self.cameras
            .iter()
            .find(|camera| camera.id == id)
            .ok_or_else(|| RigError::UnknownCamera(id.to_string()))
    }
}

impl Default for RigFile {
    fn default() -> Self {
        Self {
            cameras: vec![CameraRig::default()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_rig_is_the_front_center_camera() {
        let rig = CameraRig::default();
        assert_eq!(rig.id, "Center");
        assert_eq!(rig.sensor_type, "sensor.camera.rgb");
        assert_eq!((rig.width, rig.height), (800, 600));
        assert_relative_eq!(rig.intrinsics().focal(), 400.0, epsilon = 1e-9);
        assert_relative_eq!(rig.mount_transform().location.z, 1.7);
    }

    #[test]
    fn rig_file_parses_with_defaults_filled_in() {
        let raw = r#"{
            "cameras": [
                {"id": "Center", "width": 1280, "height": 720, "fov_deg": 100.0, "x": 1.5, "z": 2.4},
                {"id": "Rear", "width": 640, "height": 480, "yaw": 180.0}
            ]
        }"#;

        let rig_file: RigFile = serde_json::from_str(raw).expect("valid rig json");
        let center = rig_file.find("Center").expect("center exists");
        assert_eq!(center.width, 1280);
        assert_relative_eq!(center.fov_deg, 100.0);
        assert_relative_eq!(center.y, 0.0);

        let rear = rig_file.find("Rear").expect("rear exists");
        assert_eq!(rear.sensor_type, "sensor.camera.rgb");
        assert_relative_eq!(rear.mount_transform().rotation.yaw, 180.0);
    }

    #[test]
    fn unknown_camera_id_is_an_error() {
        let rig_file = RigFile::default();
        assert!(matches!(
            rig_file.find("Left"),
            Err(RigError::UnknownCamera(_))
        ));
    }
}
