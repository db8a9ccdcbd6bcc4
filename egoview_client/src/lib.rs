//! EgoView Simulator Bridge Client
//!
//! Blocking request/response client for the vehicle-simulation engine's TCP
//! bridge:
//! - JSON control channel (settings, blueprints, spawn/destroy, ticks)
//! - Binary world snapshots riding behind each tick reply
//! - A dedicated binary camera stream feeding a bounded frame queue

pub mod client;
pub mod error;
pub mod protocol;
pub mod stream;
pub mod transport;
pub mod wire;

// Re-export key types for convenience
pub use client::{ActorId, Blueprint, Simulator, WorldSettings, WorldSnapshot};
pub use error::{ClientError, StreamError};
pub use stream::CameraStream;
pub use wire::{ActorKind, ActorState, CameraFrame};
