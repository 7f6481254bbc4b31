use std::time::Duration;

use serde::Deserialize;

use redlight_core::config::RoundConfig;
use redlight_core::player::PlayerId;
use redlight_presence::{PresenceConfig, SlotPolicy};

use crate::runtime::ClientSessionConfig;

/// Top-level client configuration, loaded from `redlight.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `"text"` or `"json"`.
    pub log_format: String,
    /// Round controller tick period.
    pub tick_interval_ms: u64,
    /// Autopilot clients the headless binary runs against one store.
    pub autopilot_clients: usize,
    /// Inline round tuning. Falls back to `RoundConfig::load()` when absent.
    pub round: Option<RoundConfig>,
    pub presence: PresenceConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            tick_interval_ms: 16,
            autopilot_clients: 3,
            round: None,
            presence: PresenceConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load config from `redlight.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("redlight.toml") {
            Ok(content) => match toml::from_str::<ClientConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from redlight.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse redlight.toml: {e}, using defaults");
                    ClientConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No redlight.toml found, using defaults");
                ClientConfig::default()
            },
        };

        if let Ok(format) = std::env::var("REDLIGHT_LOG_FORMAT")
            && !format.is_empty()
        {
            config.log_format = format;
        }
        if let Ok(room) = std::env::var("REDLIGHT_ROOM")
            && !room.is_empty()
        {
            config.presence.room = room;
        }
        if let Ok(val) = std::env::var("REDLIGHT_TICK_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.tick_interval_ms = n;
        }
        if let Ok(val) = std::env::var("REDLIGHT_JOIN_TIMEOUT_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.presence.join_timeout_ms = n;
        }
        if let Ok(val) = std::env::var("REDLIGHT_SLOT_POLICY")
            && let Some(policy) = parse_slot_policy(&val)
        {
            config.presence.slot_policy = policy;
        }
        if let Ok(val) = std::env::var("REDLIGHT_AUTOPILOT_CLIENTS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.autopilot_clients = n;
        }

        config
    }

    /// Replace invalid values with defaults, logging each problem.
    pub fn validate(&mut self) {
        let defaults = ClientConfig::default();
        let presence_defaults = PresenceConfig::default();

        if !matches!(self.log_format.as_str(), "text" | "json") {
            tracing::warn!(
                value = %self.log_format,
                "log_format must be \"text\" or \"json\", using text"
            );
            self.log_format = defaults.log_format;
        }
        if self.tick_interval_ms == 0 {
            tracing::warn!("tick_interval_ms must be > 0, using {}", defaults.tick_interval_ms);
            self.tick_interval_ms = defaults.tick_interval_ms;
        }
        if self.presence.room.is_empty() || self.presence.room.contains('/') {
            tracing::warn!(
                room = %self.presence.room,
                "presence.room must be a single non-empty key, using {}",
                presence_defaults.room
            );
            self.presence.room = presence_defaults.room;
        }
        if self.presence.join_timeout_ms == 0 {
            tracing::warn!(
                "presence.join_timeout_ms must be > 0, using {}",
                presence_defaults.join_timeout_ms
            );
            self.presence.join_timeout_ms = presence_defaults.join_timeout_ms;
        }
        if self.presence.max_claim_attempts == 0 {
            tracing::warn!(
                "presence.max_claim_attempts must be > 0, using {}",
                presence_defaults.max_claim_attempts
            );
            self.presence.max_claim_attempts = presence_defaults.max_claim_attempts;
        }
        if let Some(round) = self.round.take() {
            self.round = Some(round.sanitized());
        }
    }

    pub fn round_config(&self) -> RoundConfig {
        match &self.round {
            Some(round) => round.clone(),
            None => RoundConfig::load(),
        }
    }

    pub fn session_config(&self, player_id: PlayerId) -> ClientSessionConfig {
        ClientSessionConfig {
            player_id,
            round: self.round_config(),
            presence: self.presence.clone(),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }
}

fn parse_slot_policy(value: &str) -> Option<SlotPolicy> {
    match value.to_ascii_lowercase().as_str() {
        "snapshot" => Some(SlotPolicy::Snapshot),
        "claim" => Some(SlotPolicy::Claim),
        _ => {
            tracing::warn!(value, "Unknown REDLIGHT_SLOT_POLICY, ignoring");
            None
        },
    }
}
