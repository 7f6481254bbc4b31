use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use redlight_core::config::RoundConfig;
use redlight_core::controller::RoundController;
use redlight_core::detector::MoveIntent;
use redlight_core::events::RoundEvent;
use redlight_core::player::{Player, PlayerId, PlayerStatus, Position};
use redlight_presence::{
    JoinOutcome, PresenceConfig, PresenceMode, PresenceSession, Roster, SharedStore, Subscription,
};

/// Commands sent from the presentation layer to the client loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Scene assets finished loading; the round may start preparing.
    AssetsReady,
    /// Join the shared room. Resolves in the background.
    Join,
    Move {
        dx: f32,
        dz: f32,
    },
    MoveIntent {
        intent: MoveIntent,
        heading: f32,
    },
    Restart,
    Stop,
}

/// Out-of-band conditions the presentation layer may want to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Join failed or timed out; remote players will not appear.
    SoloMode,
    /// The roster subscription ended; remote players are frozen.
    PresenceLost,
}

/// Everything the client loop reports to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Round(RoundEvent),
    /// Remote players ordered by slot, after any roster change.
    RosterUpdated(Vec<Player>),
    Joined(JoinOutcome),
    Notice(Notice),
}

/// Configuration for one client session.
#[derive(Debug, Clone)]
pub struct ClientSessionConfig {
    pub player_id: PlayerId,
    pub round: RoundConfig,
    pub presence: PresenceConfig,
    pub tick_interval: Duration,
}

/// Ordered writes to this player's own presence record.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PresenceWrite {
    Position(Position),
    Status(PlayerStatus),
    Leave,
}

type JoinResult = (JoinOutcome, Option<Subscription>);

/// Spawn a client loop as a tokio task.
/// Returns the command sender and event receiver.
pub fn spawn_client_session(
    config: ClientSessionConfig,
    store: Arc<dyn SharedStore>,
) -> (
    mpsc::UnboundedSender<ClientCommand>,
    mpsc::UnboundedReceiver<ClientEvent>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        run_client_loop(config, store, cmd_rx, event_tx).await;
    });

    (cmd_tx, event_rx, handle)
}

/// Owns the round controller. Ticks it, feeds it commands and relays its
/// events to presence and the presentation layer.
async fn run_client_loop(
    config: ClientSessionConfig,
    store: Arc<dyn SharedStore>,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
) {
    let player_id = config.player_id.clone();
    let mut controller = RoundController::new(config.round, player_id.clone());
    let mut roster = Roster::new(player_id.clone());
    let mut session = Some(PresenceSession::new(store, config.presence, player_id.clone()));

    let mut writer: Option<(mpsc::UnboundedSender<PresenceWrite>, JoinHandle<()>)> = None;
    let mut pending_join: Option<oneshot::Receiver<JoinResult>> = None;
    let mut subscription: Option<Subscription> = None;

    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();

    tracing::info!(player_id = %player_id, "Client session started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let elapsed = now.duration_since(last_tick).as_millis() as u64;
                last_tick = now;
                let events = controller.advance(elapsed);
                relay(events, writer.as_ref().map(|(tx, _)| tx), &event_tx);
            }
            cmd = cmd_rx.recv() => {
                let events = match cmd {
                    Some(ClientCommand::Stop) | None => break,
                    Some(ClientCommand::AssetsReady) => controller.assets_ready(),
                    Some(ClientCommand::Join) => {
                        match session.take() {
                            Some(session) => {
                                let (tx, rx) = oneshot::channel();
                                writer = Some(spawn_presence_writer(session, tx));
                                pending_join = Some(rx);
                            },
                            None => tracing::debug!("Ignoring repeated join"),
                        }
                        Vec::new()
                    },
                    Some(ClientCommand::Move { dx, dz }) => controller.request_move(dx, dz),
                    Some(ClientCommand::MoveIntent { intent, heading }) => {
                        controller.request_move_intent(intent, heading)
                    },
                    Some(ClientCommand::Restart) => controller.request_restart(),
                };
                relay(events, writer.as_ref().map(|(tx, _)| tx), &event_tx);
            }
            joined = wait_join(&mut pending_join) => {
                pending_join = None;
                let Ok((outcome, sub)) = joined else {
                    tracing::error!(player_id = %player_id, "Presence writer exited before join resolved");
                    continue;
                };
                controller.assign_slot(outcome.slot);
                let _ = event_tx.send(ClientEvent::Joined(outcome));
                if outcome.mode == PresenceMode::Solo {
                    let _ = event_tx.send(ClientEvent::Notice(Notice::SoloMode));
                }
                subscription = sub;
            }
            snapshot = next_snapshot(&mut subscription) => {
                match snapshot {
                    Some(snapshot) => {
                        let diff = roster.reconcile(snapshot.as_ref());
                        controller.set_remote_alive(roster.alive_count());
                        if !diff.is_empty() {
                            let _ = event_tx.send(ClientEvent::RosterUpdated(roster.players()));
                        }
                    },
                    None => {
                        tracing::warn!(player_id = %player_id, "Roster subscription ended");
                        subscription = None;
                        let _ = event_tx.send(ClientEvent::Notice(Notice::PresenceLost));
                    },
                }
            }
        }
    }

    if let Some((tx, handle)) = writer {
        let _ = tx.send(PresenceWrite::Leave);
        drop(tx);
        let _ = handle.await;
    }
    tracing::info!(player_id = %player_id, "Client session stopped");
}

/// Forward round events to the presentation layer, queueing the presence
/// writes the local player's changes require.
fn relay(
    events: Vec<RoundEvent>,
    writer: Option<&mpsc::UnboundedSender<PresenceWrite>>,
    event_tx: &mpsc::UnboundedSender<ClientEvent>,
) {
    for event in events {
        if let Some(writer) = writer {
            match &event {
                RoundEvent::LocalPlayerMoved(position) => {
                    let _ = writer.send(PresenceWrite::Position(*position));
                },
                RoundEvent::PlayerEliminated(_) => {
                    let _ = writer.send(PresenceWrite::Status(PlayerStatus::Eliminated));
                },
                RoundEvent::LocalPlayerReset(position) => {
                    let _ = writer.send(PresenceWrite::Position(*position));
                    let _ = writer.send(PresenceWrite::Status(PlayerStatus::Alive));
                },
                _ => {},
            }
        }
        let _ = event_tx.send(ClientEvent::Round(event));
    }
}

/// Join in the background, then apply presence writes strictly in order.
fn spawn_presence_writer(
    mut session: PresenceSession,
    joined_tx: oneshot::Sender<JoinResult>,
) -> (mpsc::UnboundedSender<PresenceWrite>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let joined = session.join().await;
        let _ = joined_tx.send(joined);

        while let Some(write) = rx.recv().await {
            let result = match write {
                PresenceWrite::Position(position) => session.publish_position(position).await,
                PresenceWrite::Status(status) => session.publish_status(status).await,
                PresenceWrite::Leave => break,
            };
            if let Err(e) = result {
                tracing::warn!(
                    player_id = %session.player_id(),
                    write = ?write,
                    error = %e,
                    "Presence write failed"
                );
            }
        }

        if let Err(e) = session.leave().await {
            tracing::warn!(player_id = %session.player_id(), error = %e, "Failed to leave room");
        }
    });
    (tx, handle)
}

async fn wait_join(
    pending: &mut Option<oneshot::Receiver<JoinResult>>,
) -> Result<JoinResult, oneshot::error::RecvError> {
    match pending {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

async fn next_snapshot(
    subscription: &mut Option<Subscription>,
) -> Option<Option<serde_json::Value>> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}
