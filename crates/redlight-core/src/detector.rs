use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::player::{PlayerId, Position};
use crate::signal::SignalState;

/// A player was seen moving while the light was red.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub player_id: PlayerId,
    pub detected_at_tick: u32,
}

/// Decide whether one movement sample is a violation.
///
/// `requested` must already be clamped. Movement that clamping fully absorbs
/// (pushing into a wall) leaves the position unchanged and is tolerated.
pub fn detect(
    player_id: &str,
    previous: Position,
    requested: Position,
    signal: SignalState,
    tick: u32,
) -> Option<Violation> {
    if !signal.looking_back || requested == previous {
        return None;
    }
    Some(Violation {
        player_id: player_id.to_string(),
        detected_at_tick: tick,
    })
}

/// Directional keys held during one input sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
}

impl MoveIntent {
    pub fn is_idle(&self) -> bool {
        !(self.forward || self.back || self.left || self.right)
    }

    /// Camera-relative delta for this sample. `heading` is the camera yaw in
    /// radians; zero faces the finish line (negative Z).
    pub fn delta(&self, heading: f32, config: &RoundConfig) -> (f32, f32) {
        let speed = if self.sprint {
            config.sprint_speed
        } else {
            config.walk_speed
        };
        let (sin, cos) = heading.sin_cos();
        let (mut dx, mut dz) = (0.0, 0.0);
        if self.forward {
            dx -= speed * sin;
            dz -= speed * cos;
        }
        if self.back {
            dx += speed * sin;
            dz += speed * cos;
        }
        if self.left {
            dx += speed * cos;
            dz -= speed * sin;
        }
        if self.right {
            dx -= speed * cos;
            dz += speed * sin;
        }
        (dx, dz)
    }
}
