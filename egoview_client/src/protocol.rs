//! JSON control protocol for the simulator bridge.
//!
//! Requests and responses are tagged JSON documents exchanged over a u32
//! length-prefixed framing. The hot path (snapshots, camera frames) stays
//! binary; control traffic is low-frequency and favors debuggability.

use std::collections::HashMap;

use egoview_core::geometry::Transform;
use serde::{Deserialize, Serialize};

use crate::client::{ActorId, WorldSettings};

/// A control request to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Hello,
    GetSettings,
    ApplySettings {
        settings: WorldSettings,
    },
    SpawnPoints,
    FindBlueprint {
        pattern: String,
    },
    SpawnActor {
        blueprint: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        attributes: HashMap<String, String>,
        transform: Transform,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attach_to: Option<ActorId>,
    },
    SetAutopilot {
        actor: ActorId,
        enabled: bool,
    },
    Listen {
        actor: ActorId,
    },
    StopSensor {
        actor: ActorId,
    },
    DestroyActor {
        actor: ActorId,
    },
    Tick,
}

/// A control reply from the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Hello {
        version: String,
    },
    Settings {
        settings: WorldSettings,
    },
    SpawnPoints {
        transforms: Vec<Transform>,
    },
    Blueprint {
        id: String,
        #[serde(default)]
        recommended_colors: Vec<String>,
    },
    Spawned {
        actor: ActorId,
    },
    Listening {
        port: u16,
    },
    /// Tick acknowledged; the binary snapshot follows as a payload frame.
    Ticked {
        frame: u64,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_serialize_with_a_cmd_tag() {
        let encoded = serde_json::to_string(&Request::Tick).unwrap();
        assert_eq!(encoded, r#"{"cmd":"tick"}"#);

        let encoded = serde_json::to_string(&Request::SetAutopilot {
            actor: ActorId(42),
            enabled: true,
        })
        .unwrap();
        assert_eq!(
            encoded,
            r#"{"cmd":"set_autopilot","actor":42,"enabled":true}"#
        );
    }

    #[test]
    fn spawn_request_omits_empty_options() {
        let encoded = serde_json::to_string(&Request::SpawnActor {
            blueprint: "vehicle.tesla.model3".to_string(),
            attributes: HashMap::new(),
            transform: Transform::default(),
            attach_to: None,
        })
        .unwrap();

        assert!(!encoded.contains("attributes"));
        assert!(!encoded.contains("attach_to"));
    }

    #[test]
    fn responses_parse_from_bridge_json() {
        let response: Response =
            serde_json::from_str(r#"{"reply":"spawned","actor":7}"#).unwrap();
        assert!(matches!(response, Response::Spawned { actor: ActorId(7) }));

        let response: Response = serde_json::from_str(
            r#"{"reply":"error","message":"spawn point occupied"}"#,
        )
        .unwrap();
        assert!(matches!(response, Response::Error { .. }));

        // recommended_colors may be absent.
        let response: Response = serde_json::from_str(
            r#"{"reply":"blueprint","id":"vehicle.tesla.model3"}"#,
        )
        .unwrap();
        match response {
            Response::Blueprint { id, recommended_colors } => {
                assert_eq!(id, "vehicle.tesla.model3");
                assert!(recommended_colors.is_empty());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
