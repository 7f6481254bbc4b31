use serde::{Deserialize, Serialize};

/// Opaque, locally generated player identifier.
pub type PlayerId = String;

/// Slot numbers available in a room.
pub const MAX_SLOTS: u16 = 456;

/// Play-field bounds on the X axis.
pub const FIELD_MIN_X: f32 = -24.0;
pub const FIELD_MAX_X: f32 = 24.0;
/// Play-field bounds on the Z axis. Players start at the max and run toward the min.
pub const FIELD_MIN_Z: f32 = -44.0;
pub const FIELD_MAX_Z: f32 = 45.0;

/// Crossing this line (z at or below it) wins the round.
pub const FINISH_LINE_Z: f32 = FIELD_MIN_Z;

/// Where every player stands when a round begins.
pub const SPAWN_POSITION: Position = Position { x: 0.0, z: FIELD_MAX_Z };

/// Generate a fresh player id of the form `player_xxxxxxxxx`.
pub fn generate_player_id() -> PlayerId {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("player_{}", &raw[..9])
}

/// Display label derived from a slot number, e.g. `Player 007`.
pub fn display_label(slot: u16) -> String {
    format!("Player {slot:03}")
}

/// Whether a slot number is inside `[1, MAX_SLOTS]`.
pub fn is_valid_slot(slot: u16) -> bool {
    (1..=MAX_SLOTS).contains(&slot)
}

/// Ground-plane position on the play field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub z: f32,
}

impl Default for Position {
    fn default() -> Self {
        SPAWN_POSITION
    }
}

impl Position {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Clamp to the play-field bounds. Idempotent.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(FIELD_MIN_X, FIELD_MAX_X),
            z: self.z.clamp(FIELD_MIN_Z, FIELD_MAX_Z),
        }
    }

    /// Apply a delta and clamp the result to the field.
    pub fn moved_by(self, dx: f32, dz: f32) -> Self {
        Self::new(self.x + dx, self.z + dz).clamped()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.z.is_finite()
    }

    pub fn has_crossed_finish(&self) -> bool {
        self.z <= FINISH_LINE_Z
    }
}

/// Whether a player is still in the round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    #[default]
    Alive,
    Eliminated,
}

/// A player as seen by this client: either the local player or a
/// read-only copy of a remote one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub slot_number: u16,
    pub display_label: String,
    pub position: Position,
    pub status: PlayerStatus,
    pub connected: bool,
}

impl Player {
    /// A freshly joined player standing on the start line.
    pub fn new(id: PlayerId, slot_number: u16) -> Self {
        Self {
            id,
            slot_number,
            display_label: display_label(slot_number),
            position: SPAWN_POSITION,
            status: PlayerStatus::Alive,
            connected: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }
}
