pub mod config;
pub mod controller;
pub mod detector;
pub mod events;
pub mod player;
pub mod round;
pub mod scheduler;
pub mod signal;
pub mod snapshot;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::config::RoundConfig;
    use crate::controller::RoundController;
    use crate::player::{Player, PlayerStatus, Position};
    use crate::round::Phase;

    /// Config where the light never turns red.
    pub fn green_config() -> RoundConfig {
        RoundConfig {
            red_probability: 0.0,
            seed: Some(7),
            ..RoundConfig::default()
        }
    }

    /// Config where the light turns red on the first play second.
    pub fn red_config() -> RoundConfig {
        RoundConfig {
            red_probability: 1.0,
            seed: Some(7),
            ..RoundConfig::default()
        }
    }

    /// Virtual time from `assets_ready` until play begins.
    pub fn countdown_done_ms(config: &RoundConfig) -> u64 {
        config.preparing_ms + u64::from(config.countdown_steps) * 1000
    }

    /// A controller with slot 1, already in `Playing`.
    pub fn playing_controller(config: RoundConfig) -> RoundController {
        let done = countdown_done_ms(&config);
        let mut c = RoundController::new(config, "player_test0001".to_string());
        c.assign_slot(1);
        c.assets_ready();
        c.advance(done);
        assert_eq!(c.phase(), Phase::Playing, "controller failed to reach Playing");
        c
    }

    /// Create `n` remote players with sequential slots starting at 1.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| {
                let mut p = Player::new(format!("player_remote{i:03}"), i as u16 + 1);
                p.position = Position::new(i as f32 % 24.0, 45.0);
                p
            })
            .collect()
    }

    /// Mark every other player eliminated.
    pub fn eliminate_every_other(players: &mut [Player]) {
        for p in players.iter_mut().step_by(2) {
            p.status = PlayerStatus::Eliminated;
        }
    }
}
