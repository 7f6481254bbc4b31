use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use redlight_client::{ClientCommand, ClientEvent, ClientSessionConfig, spawn_client_session};
use redlight_core::config::RoundConfig;
use redlight_presence::{MemoryStore, PresenceConfig};

pub const ROOM: &str = "testRoom";

/// One client loop wired to a shared in-memory store.
pub struct TestClient {
    pub id: String,
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    handle: JoinHandle<()>,
}

impl TestClient {
    pub fn spawn(store: &MemoryStore, id: &str, round: RoundConfig) -> Self {
        let config = ClientSessionConfig {
            player_id: id.to_string(),
            round,
            presence: PresenceConfig {
                room: ROOM.to_string(),
                ..PresenceConfig::default()
            },
            tick_interval: Duration::from_millis(16),
        };
        let (cmd_tx, events, handle) = spawn_client_session(config, Arc::new(store.clone()));
        Self {
            id: id.to_string(),
            cmd_tx,
            events,
            handle,
        }
    }

    pub fn send(&self, cmd: ClientCommand) {
        self.cmd_tx.send(cmd).expect("client loop should be running");
    }

    /// Wait (in virtual time) for the first event matching `pred`.
    pub async fn expect<F>(&mut self, what: &str, mut pred: F) -> ClientEvent
    where
        F: FnMut(&ClientEvent) -> bool,
    {
        let wait = async {
            loop {
                match self.events.recv().await {
                    Some(event) if pred(&event) => return event,
                    Some(_) => continue,
                    None => panic!("event stream closed while waiting for {what}"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(300), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    /// Send `Stop` and wait for the loop (and its leave) to finish.
    pub async fn stop(self) {
        let _ = self.cmd_tx.send(ClientCommand::Stop);
        self.handle.await.expect("client loop should exit cleanly");
    }
}

pub fn player_path(id: &str) -> String {
    format!("lobby/{ROOM}/players/{id}")
}

/// Let the presence writer drain its queue.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
