use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;

/// The light gating movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[default]
    Green,
    Red,
}

/// Read-only view of the signal handed to the movement detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalState {
    pub signal: Signal,
    /// True while the watcher faces the field. Tracks `signal == Red`.
    pub looking_back: bool,
}

impl SignalState {
    pub const GREEN: SignalState = SignalState {
        signal: Signal::Green,
        looking_back: false,
    };
    pub const RED: SignalState = SignalState {
        signal: Signal::Red,
        looking_back: true,
    };
}

/// Owns the green/red value and its randomized schedule.
///
/// Transitions are crate-private; the round controller is the only caller
/// and invokes them from discrete timer callbacks, so reads are never torn.
#[derive(Debug, Clone)]
pub struct SignalController {
    state: SignalState,
    red_probability: f64,
    min_red_ms: u64,
    red_span_ms: u64,
}

impl SignalController {
    pub fn new(config: &RoundConfig) -> Self {
        Self {
            state: SignalState::GREEN,
            red_probability: config.red_probability,
            min_red_ms: config.min_red_ms,
            red_span_ms: config.red_span_ms,
        }
    }

    pub fn signal(&self) -> Signal {
        self.state.signal
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn is_red(&self) -> bool {
        self.state.signal == Signal::Red
    }

    /// Roll for a green-to-red flip at the top of a play second.
    ///
    /// Returns how long the red light should last when a flip happened.
    /// Never re-triggers while already red.
    pub(crate) fn roll<R: Rng>(&mut self, rng: &mut R) -> Option<u64> {
        if self.is_red() {
            return None;
        }
        if rng.random::<f64>() >= self.red_probability {
            return None;
        }
        self.state = SignalState::RED;
        Some(self.draw_red_duration(rng))
    }

    fn draw_red_duration<R: Rng>(&self, rng: &mut R) -> u64 {
        rng.random_range(self.min_red_ms..=self.min_red_ms.saturating_add(self.red_span_ms))
    }

    /// Turn green. Returns false when the light already was green.
    pub(crate) fn turn_green(&mut self) -> bool {
        let changed = self.is_red();
        self.state = SignalState::GREEN;
        changed
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn controller(p: f64) -> SignalController {
        SignalController::new(&RoundConfig {
            red_probability: p,
            ..RoundConfig::default()
        })
    }

    #[test]
    fn starts_green_and_not_looking() {
        let c = controller(0.05);
        assert_eq!(c.state(), SignalState::GREEN);
    }

    #[test]
    fn certain_roll_turns_red_within_duration_window() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let mut c = controller(1.0);
            let red_ms = c.roll(&mut rng).expect("p = 1 always flips");
            assert!((2000..=5000).contains(&red_ms), "red lasted {red_ms}ms");
            assert_eq!(c.state(), SignalState::RED);
        }
    }

    #[test]
    fn zero_probability_never_flips() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut c = controller(0.0);
        for _ in 0..1000 {
            assert!(c.roll(&mut rng).is_none());
        }
        assert!(!c.is_red());
    }

    #[test]
    fn roll_is_a_noop_while_red() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut c = controller(1.0);
        assert!(c.roll(&mut rng).is_some());
        assert!(c.roll(&mut rng).is_none());
        assert!(c.is_red());
    }

    #[test]
    fn turn_green_reports_change() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut c = controller(1.0);
        assert!(!c.turn_green());
        c.roll(&mut rng);
        assert!(c.turn_green());
        assert_eq!(c.state(), SignalState::GREEN);
    }
}
