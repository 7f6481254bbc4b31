use std::sync::Arc;

use redlight_core::detector::MoveIntent;
use redlight_core::events::RoundEvent;
use redlight_core::round::{Phase, RoundOutcome};
use redlight_core::signal::Signal;
use redlight_presence::SharedStore;

use crate::runtime::{ClientCommand, ClientEvent, ClientSessionConfig, spawn_client_session};

/// Headless stand-in for a keyboard: walks toward the finish on green and
/// stops as soon as it sees red.
#[derive(Debug, Clone)]
pub struct Autopilot {
    phase: Phase,
    signal: Signal,
    sprint: bool,
}

impl Autopilot {
    pub fn new(sprint: bool) -> Self {
        Self {
            phase: Phase::Loading,
            signal: Signal::Green,
            sprint,
        }
    }

    pub fn observe(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::Round(RoundEvent::PhaseChanged(phase)) => self.phase = *phase,
            ClientEvent::Round(RoundEvent::SignalChanged(signal)) => self.signal = *signal,
            ClientEvent::Round(RoundEvent::LocalPlayerReset(_)) => self.signal = Signal::Green,
            _ => {},
        }
    }

    /// Input for the next sample, if the autopilot wants to move.
    pub fn next_input(&self) -> Option<ClientCommand> {
        if !self.phase.is_playing() || self.signal == Signal::Red {
            return None;
        }
        Some(ClientCommand::MoveIntent {
            intent: MoveIntent {
                forward: true,
                sprint: self.sprint,
                ..MoveIntent::default()
            },
            heading: 0.0,
        })
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        match self.phase {
            Phase::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Run one autopilot client until its round ends. Returns `None` if the
/// session stopped first.
pub async fn run_autopilot(
    config: ClientSessionConfig,
    store: Arc<dyn SharedStore>,
    sprint: bool,
) -> Option<RoundOutcome> {
    let player_id = config.player_id.clone();
    let tick_interval = config.tick_interval;
    let (cmd_tx, mut event_rx, handle) = spawn_client_session(config, store);
    let _ = cmd_tx.send(ClientCommand::Join);
    let _ = cmd_tx.send(ClientCommand::AssetsReady);

    let mut pilot = Autopilot::new(sprint);
    let mut input = tokio::time::interval(tick_interval);
    input.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let outcome = loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break None };
                match &event {
                    ClientEvent::Joined(outcome) => tracing::info!(
                        player_id = %player_id,
                        slot = outcome.slot,
                        mode = ?outcome.mode,
                        "Autopilot joined"
                    ),
                    ClientEvent::Round(RoundEvent::Announcement(a)) => {
                        tracing::debug!(player_id = %player_id, "{}", a.text());
                    },
                    ClientEvent::RosterUpdated(players) => {
                        tracing::debug!(player_id = %player_id, remote = players.len(), "Roster updated");
                    },
                    _ => {},
                }
                pilot.observe(&event);
                if let Some(outcome) = pilot.outcome() {
                    break Some(outcome);
                }
            }
            _ = input.tick() => {
                if let Some(cmd) = pilot.next_input() {
                    let _ = cmd_tx.send(cmd);
                }
            }
        }
    };

    let _ = cmd_tx.send(ClientCommand::Stop);
    let _ = handle.await;
    outcome
}
