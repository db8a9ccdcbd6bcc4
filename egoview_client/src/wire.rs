//! Binary wire formats for the simulator bridge.
//!
//! Next to the JSON control protocol the bridge carries two binary channels:
//! per-tick world snapshots and camera image frames. All fields are
//! little-endian and packed; parsing is by hand, field by field, so a
//! truncated buffer can never panic.

use egoview_core::bbox::BoundingBox;
use egoview_core::geometry::{Rotation, Transform};
use egoview_core::projection::CameraIntrinsics;
use nalgebra::Vector3;

/// Snapshot packet header.
/// Layout: [frame_id: u64, timestamp: f64, actor_count: u32, padding: u32]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotHeader {
    pub frame_id: u64,
    /// Simulation time in seconds
    pub timestamp: f64,
    pub actor_count: u32,
}

impl SnapshotHeader {
    pub const SIZE: usize = 24; // 8 + 8 + 4 + 4 bytes

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }

        let frame_id = u64::from_le_bytes(data[0..8].try_into().ok()?);
        let timestamp = f64::from_le_bytes(data[8..16].try_into().ok()?);
        let actor_count = u32::from_le_bytes(data[16..20].try_into().ok()?);

        Some(Self {
            frame_id,
            timestamp,
            actor_count,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.frame_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        out[16..20].copy_from_slice(&self.actor_count.to_le_bytes());
        out
    }
}

/// Actor category on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Vehicle,
    Sensor,
    Other,
}

impl ActorKind {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Vehicle,
            1 => Self::Sensor,
            _ => Self::Other,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Vehicle => 0,
            Self::Sensor => 1,
            Self::Other => 2,
        }
    }
}

/// Per-actor state record.
/// Layout: { id: u32, kind: u8, padding: [u8; 3], pos: [f32; 3],
///           rot: [f32; 3], vel: [f32; 3], bbox_center: [f32; 3],
///           bbox_extent: [f32; 3] }
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorState {
    pub id: u32,
    pub kind: ActorKind,
    /// [x, y, z] world position in meters
    pub position: [f32; 3],
    /// [pitch, yaw, roll] in degrees
    pub rotation: [f32; 3],
    /// [vx, vy, vz] in m/s
    pub velocity: [f32; 3],
    /// Box center in the actor's local frame, meters
    pub bbox_center: [f32; 3],
    /// Box half-sizes, meters
    pub bbox_extent: [f32; 3],
}

impl ActorState {
    pub const SIZE: usize = 68; // 4 + 1 + 3 + 5 * 12 bytes

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }

        let id = u32::from_le_bytes(data[0..4].try_into().ok()?);
        let kind = ActorKind::from_u8(data[4]);
        let position = read_vec3(&data[8..20])?;
        let rotation = read_vec3(&data[20..32])?;
        let velocity = read_vec3(&data[32..44])?;
        let bbox_center = read_vec3(&data[44..56])?;
        let bbox_extent = read_vec3(&data[56..68])?;

        Some(Self {
            id,
            kind,
            position,
            rotation,
            velocity,
            bbox_center,
            bbox_extent,
        })
    }

    /// Parse multiple actors from a contiguous buffer. A truncated tail
    /// yields the records that fit.
    pub fn parse_batch(data: &[u8], count: usize) -> Vec<Self> {
        let mut actors = Vec::with_capacity(count);

        for i in 0..count {
            let start = i * Self::SIZE;
            let end = start + Self::SIZE;

            if end > data.len() {
                break;
            }

            if let Some(actor) = Self::from_bytes(&data[start..end]) {
                actors.push(actor);
            }
        }

        actors
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4] = self.kind.to_u8();
        write_vec3(&mut out[8..20], &self.position);
        write_vec3(&mut out[20..32], &self.rotation);
        write_vec3(&mut out[32..44], &self.velocity);
        write_vec3(&mut out[44..56], &self.bbox_center);
        write_vec3(&mut out[56..68], &self.bbox_extent);
        out
    }

    /// The actor's world transform as core geometry.
    pub fn transform(&self) -> Transform {
        Transform::new(
            Vector3::new(
                self.position[0] as f64,
                self.position[1] as f64,
                self.position[2] as f64,
            ),
            Rotation::new(
                self.rotation[0] as f64,
                self.rotation[1] as f64,
                self.rotation[2] as f64,
            ),
        )
    }

    /// The actor's bounding box as core geometry.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            Vector3::new(
                self.bbox_center[0] as f64,
                self.bbox_center[1] as f64,
                self.bbox_center[2] as f64,
            ),
            Vector3::new(
                self.bbox_extent[0] as f64,
                self.bbox_extent[1] as f64,
                self.bbox_extent[2] as f64,
            ),
        )
    }
}

fn read_vec3(data: &[u8]) -> Option<[f32; 3]> {
    Some([
        f32::from_le_bytes(data[0..4].try_into().ok()?),
        f32::from_le_bytes(data[4..8].try_into().ok()?),
        f32::from_le_bytes(data[8..12].try_into().ok()?),
    ])
}

fn write_vec3(out: &mut [u8], v: &[f32; 3]) {
    out[0..4].copy_from_slice(&v[0].to_le_bytes());
    out[4..8].copy_from_slice(&v[1].to_le_bytes());
    out[8..12].copy_from_slice(&v[2].to_le_bytes());
}

/// Complete snapshot packet for one tick.
#[derive(Debug, Clone)]
pub struct SnapshotPacket {
    pub header: SnapshotHeader,
    pub actors: Vec<ActorState>,
}

impl SnapshotPacket {
    /// Parse a complete packet from binary data
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let header = SnapshotHeader::from_bytes(data)?;
        let actors = ActorState::parse_batch(&data[SnapshotHeader::SIZE..], header.actor_count as usize);
        Some(Self { header, actors })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SnapshotHeader::SIZE + self.actors.len() * ActorState::SIZE);
        out.extend_from_slice(&self.header.to_bytes());
        for actor in &self.actors {
            out.extend_from_slice(&actor.to_bytes());
        }
        out
    }
}

/// Camera frame header.
/// Layout: [frame_id: u64, timestamp: f64, width: u32, height: u32,
///          fov_deg: f32, padding: u32]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageHeader {
    pub frame_id: u64,
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub fov_deg: f32,
}

impl ImageHeader {
    pub const SIZE: usize = 32; // 8 + 8 + 4 + 4 + 4 + 4 bytes

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }

        let frame_id = u64::from_le_bytes(data[0..8].try_into().ok()?);
        let timestamp = f64::from_le_bytes(data[8..16].try_into().ok()?);
        let width = u32::from_le_bytes(data[16..20].try_into().ok()?);
        let height = u32::from_le_bytes(data[20..24].try_into().ok()?);
        let fov_deg = f32::from_le_bytes(data[24..28].try_into().ok()?);

        Some(Self {
            frame_id,
            timestamp,
            width,
            height,
            fov_deg,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.frame_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        out[16..20].copy_from_slice(&self.width.to_le_bytes());
        out[20..24].copy_from_slice(&self.height.to_le_bytes());
        out[24..28].copy_from_slice(&self.fov_deg.to_le_bytes());
        out
    }

    /// BGRA payload size in bytes.
    pub fn payload_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::new(self.width, self.height, self.fov_deg as f64)
    }
}

/// A decoded camera frame: header plus the raw BGRA payload.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub header: ImageHeader,
    pub bgra: Vec<u8>,
}

impl CameraFrame {
    /// Parse a complete frame; the payload must match the header exactly.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let header = ImageHeader::from_bytes(data)?;
        let payload = &data[ImageHeader::SIZE..];
        if payload.len() != header.payload_len() {
            return None;
        }

        Some(Self {
            header,
            bgra: payload.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ImageHeader::SIZE + self.bgra.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.bgra);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_actor() -> ActorState {
        ActorState {
            id: 100,
            kind: ActorKind::Vehicle,
            position: [1.0, 2.0, 3.0],
            rotation: [10.0, 20.0, 30.0],
            velocity: [0.1, 0.2, 0.3],
            bbox_center: [0.0, 0.0, 0.7],
            bbox_extent: [2.4, 1.1, 0.8],
        }
    }

    #[test]
    fn test_header_parsing() {
        let mut data = vec![0u8; SnapshotHeader::SIZE];
        data[0..8].copy_from_slice(&42u64.to_le_bytes());
        data[8..16].copy_from_slice(&1.5f64.to_le_bytes());
        data[16..20].copy_from_slice(&3u32.to_le_bytes());

        let header = SnapshotHeader::from_bytes(&data).unwrap();
        assert_eq!(header.frame_id, 42);
        assert_relative_eq!(header.timestamp, 1.5);
        assert_eq!(header.actor_count, 3);

        // Too short: no header.
        assert!(SnapshotHeader::from_bytes(&data[..20]).is_none());
    }

    #[test]
    fn test_actor_state_roundtrip() {
        let actor = sample_actor();
        let parsed = ActorState::from_bytes(&actor.to_bytes()).unwrap();
        assert_eq!(parsed, actor);

        assert_eq!(parsed.kind, ActorKind::Vehicle);
        assert_relative_eq!(parsed.position[2], 3.0f32);
        assert_relative_eq!(parsed.bbox_extent[0], 2.4f32);
    }

    #[test]
    fn test_actor_geometry_conversion() {
        let actor = sample_actor();

        let transform = actor.transform();
        assert_relative_eq!(transform.location.x, 1.0);
        assert_relative_eq!(transform.rotation.yaw, 20.0, epsilon = 1e-6);

        let bbox = actor.bounding_box();
        assert_relative_eq!(bbox.extent.y, 1.1, epsilon = 1e-6);
        assert_relative_eq!(bbox.location.z, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_full_snapshot_parsing() {
        let mut first = sample_actor();
        first.id = 1;
        let mut second = sample_actor();
        second.id = 2;
        second.kind = ActorKind::Sensor;

        let packet = SnapshotPacket {
            header: SnapshotHeader {
                frame_id: 7,
                timestamp: 0.35,
                actor_count: 2,
            },
            actors: vec![first, second],
        };

        let parsed = SnapshotPacket::from_bytes(&packet.to_bytes()).unwrap();
        assert_eq!(parsed.header.frame_id, 7);
        assert_eq!(parsed.actors.len(), 2);
        assert_eq!(parsed.actors[0].id, 1);
        assert_eq!(parsed.actors[1].id, 2);
        assert_eq!(parsed.actors[1].kind, ActorKind::Sensor);
    }

    #[test]
    fn test_truncated_actor_tail_is_tolerated() {
        let packet = SnapshotPacket {
            header: SnapshotHeader {
                frame_id: 1,
                timestamp: 0.05,
                actor_count: 2,
            },
            actors: vec![sample_actor(), sample_actor()],
        };

        let mut bytes = packet.to_bytes();
        bytes.truncate(bytes.len() - 10);

        let parsed = SnapshotPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.actors.len(), 1);
    }

    #[test]
    fn test_image_frame_roundtrip() {
        let frame = CameraFrame {
            header: ImageHeader {
                frame_id: 12,
                timestamp: 0.6,
                width: 4,
                height: 2,
                fov_deg: 90.0,
            },
            bgra: vec![0x80; 4 * 2 * 4],
        };

        let parsed = CameraFrame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(parsed.header, frame.header);
        assert_eq!(parsed.bgra.len(), parsed.header.payload_len());
        assert_relative_eq!(parsed.header.intrinsics().focal(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_image_payload_must_match_header() {
        let frame = CameraFrame {
            header: ImageHeader {
                frame_id: 12,
                timestamp: 0.6,
                width: 4,
                height: 2,
                fov_deg: 90.0,
            },
            bgra: vec![0x80; 4 * 2 * 4],
        };

        let mut short = frame.to_bytes();
        short.pop();
        assert!(CameraFrame::from_bytes(&short).is_none());
    }
}
