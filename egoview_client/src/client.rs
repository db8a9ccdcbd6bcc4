//! Blocking simulator client facade.
//!
//! One request/response round trip per call, matching the engine's client
//! API surface: settings, blueprints, actor spawning, sensor control, and
//! per-tick world snapshots.

use std::collections::HashMap;
use std::time::Duration;

use egoview_core::geometry::Transform;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientError;
use crate::protocol::{Request, Response};
use crate::transport::{ControlChannel, TcpControlChannel};
use crate::wire::{ActorKind, ActorState, SnapshotPacket};

/// Engine-assigned actor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// World stepping configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    pub synchronous_mode: bool,
    /// Fixed step in seconds; `None` lets the engine run variable-step.
    pub fixed_delta_seconds: Option<f64>,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            synchronous_mode: false,
            fixed_delta_seconds: None,
        }
    }
}

/// A resolved actor blueprint.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub id: String,
    /// Paint colors the blueprint recommends, as opaque `"R,G,B"` strings.
    pub recommended_colors: Vec<String>,
}

/// One tick's world state.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub frame: u64,
    /// Simulation time in seconds
    pub timestamp: f64,
    pub actors: Vec<ActorState>,
}

impl WorldSnapshot {
    /// Looks up one actor by id.
    pub fn actor(&self, id: ActorId) -> Option<&ActorState> {
        self.actors.iter().find(|actor| actor.id == id.0)
    }

    /// All vehicle actors in the snapshot.
    pub fn vehicles(&self) -> impl Iterator<Item = &ActorState> {
        self.actors
            .iter()
            .filter(|actor| actor.kind == ActorKind::Vehicle)
    }
}

/// Blocking client for the simulator bridge.
pub struct Simulator {
    channel: Box<dyn ControlChannel>,
    host: String,
    timeout: Duration,
}

impl Simulator {
    /// Connects the control channel to the bridge.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let channel = TcpControlChannel::connect(host, port, timeout)?;
        debug!("Control channel connected to {}:{}", host, port);
        Ok(Self {
            channel: Box::new(channel),
            host: host.to_string(),
            timeout,
        })
    }

    /// Wraps an already-built channel (used with the scripted test channel).
    pub fn with_channel(channel: Box<dyn ControlChannel>) -> Self {
        Self {
            channel,
            host: "127.0.0.1".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// The bridge host, for opening sensor stream sockets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Handshake; returns the bridge version banner.
    pub fn hello(&mut self) -> Result<String, ClientError> {
        match self.channel.request(&Request::Hello)? {
            Response::Hello { version } => Ok(version),
            other => Err(ClientError::unexpected("hello", &other)),
        }
    }

    pub fn settings(&mut self) -> Result<WorldSettings, ClientError> {
        match self.channel.request(&Request::GetSettings)? {
            Response::Settings { settings } => Ok(settings),
            other => Err(ClientError::unexpected("get_settings", &other)),
        }
    }

    pub fn apply_settings(&mut self, settings: WorldSettings) -> Result<(), ClientError> {
        match self.channel.request(&Request::ApplySettings { settings })? {
            Response::Ok => Ok(()),
            other => Err(ClientError::unexpected("apply_settings", &other)),
        }
    }

    /// All vehicle spawn points on the current map.
    pub fn spawn_points(&mut self) -> Result<Vec<Transform>, ClientError> {
        match self.channel.request(&Request::SpawnPoints)? {
            Response::SpawnPoints { transforms } => Ok(transforms),
            other => Err(ClientError::unexpected("spawn_points", &other)),
        }
    }

    pub fn find_blueprint(&mut self, pattern: &str) -> Result<Blueprint, ClientError> {
        let request = Request::FindBlueprint {
            pattern: pattern.to_string(),
        };
        match self.channel.request(&request)? {
            Response::Blueprint {
                id,
                recommended_colors,
            } => Ok(Blueprint {
                id,
                recommended_colors,
            }),
            other => Err(ClientError::unexpected("find_blueprint", &other)),
        }
    }

    /// Spawns an actor, optionally attached to a parent (sensors on a
    /// vehicle use the parent-relative transform).
    pub fn spawn_actor(
        &mut self,
        blueprint: &str,
        attributes: HashMap<String, String>,
        transform: Transform,
        attach_to: Option<ActorId>,
    ) -> Result<ActorId, ClientError> {
        let request = Request::SpawnActor {
            blueprint: blueprint.to_string(),
            attributes,
            transform,
            attach_to,
        };
        match self.channel.request(&request)? {
            Response::Spawned { actor } => {
                debug!("Spawned {} from {}", actor, blueprint);
                Ok(actor)
            }
            other => Err(ClientError::unexpected("spawn_actor", &other)),
        }
    }

    pub fn set_autopilot(&mut self, actor: ActorId, enabled: bool) -> Result<(), ClientError> {
        match self
            .channel
            .request(&Request::SetAutopilot { actor, enabled })?
        {
            Response::Ok => Ok(()),
            other => Err(ClientError::unexpected("set_autopilot", &other)),
        }
    }

    /// Starts a sensor streaming; returns the port its binary stream serves on.
    pub fn listen(&mut self, actor: ActorId) -> Result<u16, ClientError> {
        match self.channel.request(&Request::Listen { actor })? {
            Response::Listening { port } => Ok(port),
            other => Err(ClientError::unexpected("listen", &other)),
        }
    }

    pub fn stop_sensor(&mut self, actor: ActorId) -> Result<(), ClientError> {
        match self.channel.request(&Request::StopSensor { actor })? {
            Response::Ok => Ok(()),
            other => Err(ClientError::unexpected("stop_sensor", &other)),
        }
    }

    pub fn destroy_actor(&mut self, actor: ActorId) -> Result<(), ClientError> {
        match self.channel.request(&Request::DestroyActor { actor })? {
            Response::Ok => Ok(()),
            other => Err(ClientError::unexpected("destroy_actor", &other)),
        }
    }

    /// Advances the world one step and returns its snapshot.
    pub fn tick(&mut self) -> Result<WorldSnapshot, ClientError> {
        let (response, payload) = self.channel.request_with_payload(&Request::Tick)?;
        let frame = match response {
            Response::Ticked { frame } => frame,
            other => return Err(ClientError::unexpected("tick", &other)),
        };

        let packet = SnapshotPacket::from_bytes(&payload)
            .ok_or_else(|| ClientError::protocol("malformed snapshot packet"))?;
        if packet.header.frame_id != frame {
            debug!(
                "Tick reply frame {} differs from snapshot frame {}",
                frame, packet.header.frame_id
            );
        }

        Ok(WorldSnapshot {
            frame: packet.header.frame_id,
            timestamp: packet.header.timestamp,
            actors: packet.actors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedChannel;
    use crate::wire::{SnapshotHeader, SnapshotPacket};

    fn vehicle_state(id: u32) -> ActorState {
        ActorState {
            id,
            kind: ActorKind::Vehicle,
            position: [0.0; 3],
            rotation: [0.0; 3],
            velocity: [0.0; 3],
            bbox_center: [0.0; 3],
            bbox_extent: [2.0, 1.0, 0.8],
        }
    }

    #[test]
    fn spawn_flow_returns_the_actor_id() {
        let mut channel = ScriptedChannel::new();
        channel.push_reply(Response::Blueprint {
            id: "vehicle.tesla.model3".to_string(),
            recommended_colors: vec!["17,37,103".to_string()],
        });
        channel.push_reply(Response::Spawned { actor: ActorId(42) });

        let mut sim = Simulator::with_channel(Box::new(channel));
        let blueprint = sim.find_blueprint("vehicle.tesla.model3").unwrap();
        assert_eq!(blueprint.recommended_colors.len(), 1);

        let actor = sim
            .spawn_actor(&blueprint.id, HashMap::new(), Transform::default(), None)
            .unwrap();
        assert_eq!(actor, ActorId(42));
    }

    #[test]
    fn settings_roundtrip_through_the_channel() {
        let mut channel = ScriptedChannel::new();
        channel.push_reply(Response::Settings {
            settings: WorldSettings::default(),
        });
        channel.push_reply(Response::Ok);

        let mut sim = Simulator::with_channel(Box::new(channel));
        let original = sim.settings().unwrap();
        assert!(!original.synchronous_mode);

        sim.apply_settings(WorldSettings {
            synchronous_mode: true,
            fixed_delta_seconds: Some(0.05),
        })
        .unwrap();
    }

    #[test]
    fn bridge_errors_surface_as_rejected() {
        let mut channel = ScriptedChannel::new();
        channel.push_reply(Response::Error {
            message: "spawn point occupied".to_string(),
        });

        let mut sim = Simulator::with_channel(Box::new(channel));
        let err = sim
            .spawn_actor("vehicle.tesla.model3", HashMap::new(), Transform::default(), None)
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)));
    }

    #[test]
    fn wrong_reply_variant_is_a_protocol_error() {
        let mut channel = ScriptedChannel::new();
        channel.push_reply(Response::Ok);

        let mut sim = Simulator::with_channel(Box::new(channel));
        assert!(matches!(sim.hello(), Err(ClientError::Protocol(_))));
    }

    #[test]
    fn tick_parses_the_snapshot_payload() {
        let packet = SnapshotPacket {
            header: SnapshotHeader {
                frame_id: 9,
                timestamp: 0.45,
                actor_count: 2,
            },
            actors: vec![vehicle_state(1), vehicle_state(2)],
        };

        let mut channel = ScriptedChannel::new();
        channel.push_reply_with_payload(Response::Ticked { frame: 9 }, packet.to_bytes());

        let mut sim = Simulator::with_channel(Box::new(channel));
        let snapshot = sim.tick().unwrap();
        assert_eq!(snapshot.frame, 9);
        assert_eq!(snapshot.vehicles().count(), 2);
        assert!(snapshot.actor(ActorId(2)).is_some());
        assert!(snapshot.actor(ActorId(3)).is_none());
    }

    #[test]
    fn malformed_snapshot_payload_is_a_protocol_error() {
        let mut channel = ScriptedChannel::new();
        channel.push_reply_with_payload(Response::Ticked { frame: 9 }, vec![1, 2, 3]);

        let mut sim = Simulator::with_channel(Box::new(channel));
        assert!(matches!(sim.tick(), Err(ClientError::Protocol(_))));
    }
}
