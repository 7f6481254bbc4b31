use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use redlight_client::autopilot::run_autopilot;
use redlight_client::config::ClientConfig;
use redlight_core::player::generate_player_id;
use redlight_presence::{MemoryStore, SharedStore};

#[tokio::main]
async fn main() {
    let mut config = ClientConfig::load();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    config.validate();

    tracing::info!(
        clients = config.autopilot_clients,
        room = %config.presence.room,
        "Red Light starting"
    );

    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let mut handles = Vec::with_capacity(config.autopilot_clients);
    for i in 0..config.autopilot_clients {
        let session = config.session_config(generate_player_id());
        let player_id = session.player_id.clone();
        let handle = tokio::spawn(run_autopilot(session, Arc::clone(&store), i % 2 == 1));
        handles.push((player_id, handle));
    }

    let results = async {
        for (player_id, handle) in handles {
            match handle.await {
                Ok(Some(outcome)) => {
                    tracing::info!(player_id = %player_id, outcome = ?outcome, "Round finished");
                },
                Ok(None) => tracing::warn!(player_id = %player_id, "Client stopped early"),
                Err(e) => tracing::error!(player_id = %player_id, error = %e, "Client task failed"),
            }
        }
    };

    tokio::select! {
        _ = results => {},
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }
}
