//! 3D bounding boxes in the engine's vertex and edge convention.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geometry::Transform;

/// The 12 box edges as index pairs into the 8-vertex array: front face, back
/// face, and the four connectors, in the order the engine's client examples
/// draw them.
pub const BOX_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 3],
    [3, 2],
    [2, 0],
    [0, 4],
    [4, 5],
    [5, 1],
    [5, 7],
    [7, 6],
    [6, 4],
    [6, 2],
    [7, 3],
];

/// An oriented bounding box attached to an actor.
///
/// `location` is the box center in the owning actor's local frame, `extent`
/// the half-sizes along the local axes. Both in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub location: Vector3<f64>,
    pub extent: Vector3<f64>,
}

impl BoundingBox {
    pub fn new(location: Vector3<f64>, extent: Vector3<f64>) -> Self {
        Self { location, extent }
    }

    /// The 8 corners in the engine's fixed order: the sign of x is taken from
    /// bit 2 of the index, y from bit 1, z from bit 0 (0 = negative extent).
    ///
    /// `BOX_EDGES` assumes exactly this order.
    pub fn local_vertices(&self) -> [Vector3<f64>; 8] {
        let mut vertices = [Vector3::zeros(); 8];
        for (i, vertex) in vertices.iter_mut().enumerate() {
            let sx = if i & 0b100 != 0 { 1.0 } else { -1.0 };
            let sy = if i & 0b010 != 0 { 1.0 } else { -1.0 };
            let sz = if i & 0b001 != 0 { 1.0 } else { -1.0 };
            *vertex = self.location
                + Vector3::new(
                    sx * self.extent.x,
                    sy * self.extent.y,
                    sz * self.extent.z,
                );
        }
        vertices
    }

    /// The corners pushed through the owning actor's world transform.
    pub fn world_vertices(&self, transform: &Transform) -> [Vector3<f64>; 8] {
        let matrix = transform.matrix();
        self.local_vertices()
            .map(|v| (matrix * v.push(1.0)).xyz())
    }
}
