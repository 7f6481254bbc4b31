use serde::{Deserialize, Serialize};

use crate::controller::{LocalPlayer, RoundController};
use crate::round::Round;

#[derive(Debug)]
pub enum SnapshotError {
    Serialize(String),
    Deserialize(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "snapshot serialize error: {e}"),
            Self::Deserialize(e) => write!(f, "snapshot deserialize error: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Point-in-time view of a controller, for presentation bridges that live
/// outside the client process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: Round,
    pub local: LocalPlayer,
    pub now_ms: u64,
}

impl RoundSnapshot {
    pub fn capture(controller: &RoundController) -> Self {
        Self {
            round: controller.round().clone(),
            local: controller.local_player().clone(),
            now_ms: controller.now_ms(),
        }
    }

    /// MessagePack encoding.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        rmp_serde::to_vec(self).map_err(|e| SnapshotError::Serialize(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, SnapshotError> {
        rmp_serde::from_slice(data).map_err(|e| SnapshotError::Deserialize(e.to_string()))
    }
}

impl RoundController {
    /// Encode the current round and local player for broadcast.
    pub fn serialize_state(&self) -> Result<Vec<u8>, SnapshotError> {
        RoundSnapshot::capture(self).encode()
    }
}
