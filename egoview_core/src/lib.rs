//! EgoView Core - Camera Geometry and Overlay Rendering
//!
//! The client-side math and imaging for the ego camera viewer:
//! - Engine-space rigid transforms (X forward, Y right, Z up, degrees)
//! - Pinhole projection from world space to image pixels
//! - 3D bounding boxes in the engine's 8-vertex / 12-edge convention
//! - BGRA sensor buffer conversion and software overlay drawing

pub mod bbox;
pub mod frame;
pub mod geometry;
pub mod overlay;
pub mod projection;
pub mod rig;

#[cfg(feature = "visualization")]
pub mod visualization;

// Re-export key types for convenience
pub use bbox::{BoundingBox, BOX_EDGES};
pub use geometry::{Rotation, Transform};
pub use projection::{CameraIntrinsics, PinholeCamera};
pub use rig::{CameraRig, RigFile};
