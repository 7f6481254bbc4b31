use serde::{Deserialize, Serialize};

use crate::player::Position;
use crate::round::{EliminationReason, Phase, RoundOutcome};
use crate::signal::Signal;

/// Scripted lines the host voice reads out during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Announcement {
    Welcome,
    Rules,
    Instructions,
    Warning,
    Go,
    Caught,
    TimedOut,
    Victory,
    Restarting,
}

impl Announcement {
    /// Default English text. Presentation layers may localize by variant.
    pub fn text(&self) -> &'static str {
        match self {
            Self::Welcome => "Welcome to the game!",
            Self::Rules => "Red light, green light. You have 2 minutes to cross the finish line.",
            Self::Instructions => {
                "On green light you may move. On red light you must stop completely."
            },
            Self::Warning => "If you move during red light... you will be eliminated.",
            Self::Go => "Go!",
            Self::Caught => "Player eliminated. Moved during red light.",
            Self::TimedOut => "Time is up. Player eliminated.",
            Self::Victory => "Congratulations! You crossed the finish line.",
            Self::Restarting => "New attempt starting...",
        }
    }

    pub fn for_outcome(outcome: RoundOutcome) -> Self {
        match outcome {
            RoundOutcome::Victory => Self::Victory,
            RoundOutcome::Caught => Self::Caught,
            RoundOutcome::Timeout => Self::TimedOut,
        }
    }
}

/// Numbers shown on the victory screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryStats {
    pub time_used_secs: u32,
    pub survivors: u32,
}

/// Notifications from the round controller to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoundEvent {
    PhaseChanged(Phase),
    SignalChanged(Signal),
    CountdownTick(u8),
    TimeRemaining(u32),
    Announcement(Announcement),
    /// The local player's accepted position after a movement sample.
    LocalPlayerMoved(Position),
    PlayerEliminated(EliminationReason),
    Victory(VictoryStats),
    /// Local player back on the start line and alive after a restart.
    LocalPlayerReset(Position),
}
