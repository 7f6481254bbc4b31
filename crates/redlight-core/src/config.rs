use serde::{Deserialize, Serialize};

/// Data-driven tuning for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Seconds on the clock when play begins.
    pub round_secs: u32,
    /// Steps in the pre-round countdown, one per second.
    pub countdown_steps: u8,
    /// Time spent in `Preparing` before the countdown starts (ms).
    pub preparing_ms: u64,
    /// Chance per play second that a green light turns red.
    pub red_probability: f64,
    /// Shortest red light (ms).
    pub min_red_ms: u64,
    /// Extra random red-light time on top of `min_red_ms` (ms).
    pub red_span_ms: u64,
    /// Delay between an elimination and the round ending (ms).
    pub elimination_delay_ms: u64,
    /// Pause after a restart before the preparing script begins again (ms).
    pub restart_delay_ms: u64,
    /// Movement per input sample while walking (units).
    pub walk_speed: f32,
    /// Movement per input sample while sprinting (units).
    pub sprint_speed: f32,
    /// Fixed RNG seed. `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_secs: 120,
            countdown_steps: 5,
            preparing_ms: 16_000,
            red_probability: 0.05,
            min_red_ms: 2000,
            red_span_ms: 3000,
            elimination_delay_ms: 2000,
            restart_delay_ms: 3000,
            walk_speed: 0.08,
            sprint_speed: 0.15,
            seed: None,
        }
    }
}

impl RoundConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("REDLIGHT_ROUND_CONFIG")
            && let Some(config) = Self::from_path(&path)
        {
            return config;
        }
        Self::from_path("config/round.toml").unwrap_or_default()
    }

    fn from_path(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&contents) {
            Ok(config) => Some(config.sanitized()),
            Err(e) => {
                tracing::warn!("Failed to parse {path}: {e}, using defaults");
                None
            },
        }
    }

    /// Replace out-of-range values with defaults, logging each replacement.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.round_secs == 0 {
            tracing::warn!("round_secs must be > 0, using {}", defaults.round_secs);
            self.round_secs = defaults.round_secs;
        }
        if self.countdown_steps == 0 {
            tracing::warn!("countdown_steps must be > 0, using {}", defaults.countdown_steps);
            self.countdown_steps = defaults.countdown_steps;
        }
        if self.min_red_ms.checked_add(self.red_span_ms).is_none() {
            tracing::warn!(
                min_red_ms = self.min_red_ms,
                red_span_ms = self.red_span_ms,
                "Red light range overflows, using {}..={}",
                defaults.min_red_ms,
                defaults.min_red_ms + defaults.red_span_ms
            );
            self.min_red_ms = defaults.min_red_ms;
            self.red_span_ms = defaults.red_span_ms;
        }
        if !(0.0..=1.0).contains(&self.red_probability) {
            tracing::warn!(
                value = self.red_probability,
                "red_probability must be within [0, 1], using {}",
                defaults.red_probability
            );
            self.red_probability = defaults.red_probability;
        }
        if !(self.walk_speed.is_finite() && self.walk_speed > 0.0) {
            self.walk_speed = defaults.walk_speed;
        }
        if !(self.sprint_speed.is_finite() && self.sprint_speed > 0.0) {
            self.sprint_speed = defaults.sprint_speed;
        }
        self
    }
}
