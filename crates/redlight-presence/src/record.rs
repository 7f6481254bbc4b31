use serde::{Deserialize, Serialize};
use serde_json::Value;

use redlight_core::player::{
    Player, PlayerId, PlayerStatus, Position, display_label, is_valid_slot,
};

use crate::store::StoreError;

/// Why a record from the shared store was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// The JSON did not have the expected shape.
    Shape(String),
    /// The record's `id` field disagrees with the key it is stored under.
    IdMismatch { key: String, id: String },
    SlotOutOfRange(u16),
    NonFinitePosition,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape(e) => write!(f, "malformed record: {e}"),
            Self::IdMismatch { key, id } => {
                write!(f, "record under {key:?} claims id {id:?}")
            },
            Self::SlotOutOfRange(slot) => write!(f, "slot {slot} out of range"),
            Self::NonFinitePosition => write!(f, "position is not finite"),
        }
    }
}

impl std::error::Error for RecordError {}

/// A player entry as stored at `players/<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub slot_number: u16,
    pub name: String,
    pub position: Position,
    pub status: PlayerStatus,
    pub connected: bool,
    #[serde(default)]
    pub joined_at: u64,
}

impl PlayerRecord {
    pub fn from_player(player: &Player, joined_at: u64) -> Self {
        Self {
            id: player.id.clone(),
            slot_number: player.slot_number,
            name: player.display_label.clone(),
            position: player.position,
            status: player.status,
            connected: player.connected,
            joined_at,
        }
    }

    /// Validate a raw store value stored under `key`.
    pub fn parse(key: &str, value: &Value) -> Result<Player, RecordError> {
        let record: PlayerRecord = serde_json::from_value(value.clone())
            .map_err(|e| RecordError::Shape(e.to_string()))?;
        if record.id != key {
            return Err(RecordError::IdMismatch {
                key: key.to_string(),
                id: record.id,
            });
        }
        if !is_valid_slot(record.slot_number) {
            return Err(RecordError::SlotOutOfRange(record.slot_number));
        }
        if !record.position.is_finite() {
            return Err(RecordError::NonFinitePosition);
        }
        Ok(Player {
            id: record.id,
            slot_number: record.slot_number,
            display_label: display_label(record.slot_number),
            position: record.position.clamped(),
            status: record.status,
            connected: record.connected,
        })
    }

    /// Store shape of this record. A non-finite position is refused, since
    /// it would serialize to `null` and writing `null` deletes the entry.
    pub fn to_value(&self) -> Result<Value, StoreError> {
        if !self.position.is_finite() {
            return Err(StoreError::Serialize(RecordError::NonFinitePosition.to_string()));
        }
        serde_json::to_value(self).map_err(|e| StoreError::Serialize(e.to_string()))
    }
}

/// The room entry at `lobby/<room>`, excluding its player subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub status: String,
    pub created: u64,
}

impl RoomRecord {
    pub fn active(created: u64) -> Self {
        Self {
            status: "active".to_string(),
            created,
        }
    }
}

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(id: &str, slot: u64) -> Value {
        json!({
            "id": id,
            "slotNumber": slot,
            "name": "whatever",
            "position": {"x": 1.5, "z": 40.0},
            "status": "alive",
            "connected": true,
            "joinedAt": 1700000000u64,
        })
    }

    #[test]
    fn parses_valid_record() {
        let p = PlayerRecord::parse("player_a", &raw("player_a", 7)).unwrap();
        assert_eq!(p.slot_number, 7);
        assert_eq!(p.display_label, "Player 007");
        assert_eq!(p.position, Position::new(1.5, 40.0));
        assert_eq!(p.status, PlayerStatus::Alive);
    }

    #[test]
    fn label_comes_from_slot_not_name() {
        let p = PlayerRecord::parse("player_a", &raw("player_a", 12)).unwrap();
        assert_eq!(p.display_label, "Player 012");
    }

    #[test]
    fn rejects_mismatched_id() {
        assert!(matches!(
            PlayerRecord::parse("player_a", &raw("player_b", 1)),
            Err(RecordError::IdMismatch { .. })
        ));
    }

    #[test]
    fn rejects_slot_out_of_range() {
        assert_eq!(
            PlayerRecord::parse("player_a", &raw("player_a", 0)),
            Err(RecordError::SlotOutOfRange(0))
        );
        assert_eq!(
            PlayerRecord::parse("player_a", &raw("player_a", 457)),
            Err(RecordError::SlotOutOfRange(457))
        );
    }

    #[test]
    fn rejects_wrong_shape() {
        let v = json!({"id": "player_a", "slotNumber": "seven"});
        assert!(matches!(
            PlayerRecord::parse("player_a", &v),
            Err(RecordError::Shape(_))
        ));
        assert!(matches!(
            PlayerRecord::parse("player_a", &json!("alive")),
            Err(RecordError::Shape(_))
        ));
    }

    #[test]
    fn out_of_field_position_is_clamped() {
        let mut v = raw("player_a", 3);
        v["position"] = json!({"x": 99.0, "z": -99.0});
        let p = PlayerRecord::parse("player_a", &v).unwrap();
        assert_eq!(p.position, Position::new(24.0, -44.0));
    }

    #[test]
    fn record_round_trips_through_store_shape() {
        let player = Player::new("player_a".to_string(), 9);
        let record = PlayerRecord::from_player(&player, 5);
        let value = record.to_value().unwrap();
        assert_eq!(value["slotNumber"], json!(9));
        assert_eq!(value["status"], json!("alive"));
        assert_eq!(value["name"], json!("Player 009"));
        assert_eq!(PlayerRecord::parse("player_a", &value).unwrap(), player);
    }

    #[test]
    fn non_finite_position_is_never_written_as_null() {
        let mut player = Player::new("player_a".to_string(), 2);
        player.position = Position::new(f32::NAN, 10.0);
        let record = PlayerRecord::from_player(&player, 5);
        assert!(matches!(record.to_value(), Err(StoreError::Serialize(_))));

        player.position = Position::new(0.0, f32::INFINITY);
        let record = PlayerRecord::from_player(&player, 5);
        assert!(record.to_value().is_err());
    }
}
