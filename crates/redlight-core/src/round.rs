use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::signal::{Signal, SignalState};

/// Why the local player was taken out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationReason {
    /// Moved while the light was red.
    Caught,
    /// The clock ran out before the finish line.
    Timeout,
}

/// How a round ended for the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Victory,
    Caught,
    Timeout,
}

impl From<EliminationReason> for RoundOutcome {
    fn from(reason: EliminationReason) -> Self {
        match reason {
            EliminationReason::Caught => Self::Caught,
            EliminationReason::Timeout => Self::Timeout,
        }
    }
}

/// Coarse stage of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Loading,
    Preparing,
    Countdown,
    Playing,
    Eliminating(EliminationReason),
    Ended(RoundOutcome),
}

impl Phase {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended(_))
    }

    /// Whether the state machine has an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        matches!(
            (*self, next),
            (Self::Loading, Self::Preparing)
                | (Self::Preparing, Self::Countdown)
                | (Self::Countdown, Self::Playing)
                | (Self::Playing, Self::Eliminating(_))
                | (Self::Playing, Self::Ended(RoundOutcome::Victory))
                | (Self::Eliminating(_), Self::Ended(_))
                | (Self::Ended(_), Self::Preparing)
        )
    }
}

/// The shared game instance as this client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub phase: Phase,
    pub time_remaining_secs: u32,
    pub signal: SignalState,
    pub countdown_remaining: u8,
    /// Play seconds elapsed this round.
    pub play_tick: u32,
}

impl Round {
    pub fn new(config: &RoundConfig) -> Self {
        Self {
            phase: Phase::Loading,
            time_remaining_secs: config.round_secs,
            signal: SignalState::GREEN,
            countdown_remaining: config.countdown_steps,
            play_tick: 0,
        }
    }

    /// Re-initialize every field for a fresh attempt, landing in `Preparing`.
    pub fn reset(&mut self, config: &RoundConfig) {
        *self = Self {
            phase: Phase::Preparing,
            ..Self::new(config)
        };
    }

    pub fn signal(&self) -> Signal {
        self.signal.signal
    }

    /// Seconds used so far, for the victory screen.
    pub fn time_used_secs(&self, config: &RoundConfig) -> u32 {
        config.round_secs.saturating_sub(self.time_remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_round_is_loading_with_full_clock() {
        let round = Round::new(&RoundConfig::default());
        assert_eq!(round.phase, Phase::Loading);
        assert_eq!(round.time_remaining_secs, 120);
        assert_eq!(round.signal(), Signal::Green);
    }

    #[test]
    fn reset_lands_in_preparing() {
        let cfg = RoundConfig::default();
        let mut round = Round::new(&cfg);
        round.phase = Phase::Ended(RoundOutcome::Caught);
        round.time_remaining_secs = 3;
        round.signal = SignalState::RED;
        round.play_tick = 117;
        round.reset(&cfg);
        assert_eq!(round.phase, Phase::Preparing);
        assert_eq!(round.time_remaining_secs, 120);
        assert_eq!(round.signal, SignalState::GREEN);
        assert_eq!(round.play_tick, 0);
    }

    #[test]
    fn legal_edges() {
        use EliminationReason::*;
        assert!(Phase::Loading.can_transition_to(Phase::Preparing));
        assert!(Phase::Playing.can_transition_to(Phase::Eliminating(Caught)));
        assert!(Phase::Playing.can_transition_to(Phase::Ended(RoundOutcome::Victory)));
        assert!(Phase::Eliminating(Timeout).can_transition_to(Phase::Ended(RoundOutcome::Timeout)));
        assert!(Phase::Ended(RoundOutcome::Victory).can_transition_to(Phase::Preparing));
    }

    #[test]
    fn illegal_edges() {
        use EliminationReason::*;
        assert!(!Phase::Eliminating(Caught).can_transition_to(Phase::Playing));
        assert!(!Phase::Playing.can_transition_to(Phase::Ended(RoundOutcome::Caught)));
        assert!(!Phase::Loading.can_transition_to(Phase::Playing));
        assert!(!Phase::Countdown.can_transition_to(Phase::Preparing));
    }

    #[test]
    fn time_used_counts_down_from_round_length() {
        let cfg = RoundConfig::default();
        let mut round = Round::new(&cfg);
        round.time_remaining_secs = 75;
        assert_eq!(round.time_used_secs(&cfg), 45);
    }
}
