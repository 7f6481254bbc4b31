#[allow(dead_code)]
mod common;

use serde_json::json;

use redlight_client::{ClientCommand, ClientEvent, Notice};
use redlight_core::events::RoundEvent;
use redlight_core::round::{EliminationReason, Phase, RoundOutcome};
use redlight_core::signal::Signal;
use redlight_core::test_helpers::{green_config, red_config};
use redlight_presence::{MemoryStore, PresenceMode};

use common::{TestClient, player_path, settle};

fn joined(event: &ClientEvent) -> bool {
    matches!(event, ClientEvent::Joined(_))
}

fn phase(expected: Phase) -> impl FnMut(&ClientEvent) -> bool {
    move |event| matches!(event, ClientEvent::Round(RoundEvent::PhaseChanged(p)) if *p == expected)
}

#[tokio::test(start_paused = true)]
async fn two_clients_see_each_other() {
    let store = MemoryStore::new();
    let mut alice = TestClient::spawn(&store, "player_alice", green_config());
    let mut bob = TestClient::spawn(&store, "player_bob", green_config());

    alice.send(ClientCommand::Join);
    match alice.expect("alice joined", joined).await {
        ClientEvent::Joined(outcome) => {
            assert_eq!(outcome.slot, 1);
            assert_eq!(outcome.mode, PresenceMode::Online);
            assert!(outcome.is_host);
        },
        other => panic!("Expected Joined, got: {other:?}"),
    }

    bob.send(ClientCommand::Join);
    match bob.expect("bob joined", joined).await {
        ClientEvent::Joined(outcome) => {
            assert_eq!(outcome.slot, 2);
            assert!(!outcome.is_host);
        },
        other => panic!("Expected Joined, got: {other:?}"),
    }

    let bob_id = bob.id.clone();
    let seen = alice
        .expect("alice sees bob", |e| {
            matches!(e, ClientEvent::RosterUpdated(players) if players.iter().any(|p| p.id == bob_id))
        })
        .await;
    match seen {
        ClientEvent::RosterUpdated(players) => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].slot_number, 2);
            assert_eq!(players[0].display_label, "Player 002");
        },
        other => panic!("Expected RosterUpdated, got: {other:?}"),
    }

    let alice_id = alice.id.clone();
    bob.expect("bob sees alice", |e| {
        matches!(e, ClientEvent::RosterUpdated(players) if players.iter().any(|p| p.id == alice_id))
    })
    .await;

    alice.stop().await;
    bob.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopping_a_client_removes_its_record() {
    let store = MemoryStore::new();
    let alice = TestClient::spawn(&store, "player_alice", green_config());
    let mut bob = TestClient::spawn(&store, "player_bob", green_config());

    alice.send(ClientCommand::Join);
    settle().await;
    bob.send(ClientCommand::Join);
    bob.expect("bob sees alice", |e| {
        matches!(e, ClientEvent::RosterUpdated(players) if players.len() == 1)
    })
    .await;
    assert!(store.snapshot(&player_path("player_alice")).is_some());

    alice.stop().await;
    assert_eq!(store.snapshot(&player_path("player_alice")), None);

    bob.expect("alice departs", |e| {
        matches!(e, ClientEvent::RosterUpdated(players) if players.is_empty())
    })
    .await;
    bob.stop().await;
    assert_eq!(store.snapshot("lobby/testRoom/players"), None);
}

#[tokio::test(start_paused = true)]
async fn unreachable_store_falls_back_to_solo() {
    let store = MemoryStore::new();
    store.set_available(false);
    let mut solo = TestClient::spawn(&store, "player_solo", green_config());

    solo.send(ClientCommand::Join);
    match solo.expect("solo join", joined).await {
        ClientEvent::Joined(outcome) => {
            assert_eq!(outcome.mode, PresenceMode::Solo);
            assert!((1..=456).contains(&outcome.slot));
        },
        other => panic!("Expected Joined, got: {other:?}"),
    }
    solo.expect("solo notice", |e| {
        matches!(e, ClientEvent::Notice(Notice::SoloMode))
    })
    .await;

    // The round still runs and accepts movement once a slot is assigned.
    solo.send(ClientCommand::AssetsReady);
    solo.expect("playing", phase(Phase::Playing)).await;
    solo.send(ClientCommand::Move { dx: 0.0, dz: -1.0 });
    solo.expect("solo move", |e| {
        matches!(e, ClientEvent::Round(RoundEvent::LocalPlayerMoved(_)))
    })
    .await;

    store.set_available(true);
    settle().await;
    assert_eq!(store.snapshot("lobby"), None);
    solo.stop().await;
}

#[tokio::test(start_paused = true)]
async fn movement_before_join_is_ignored() {
    let store = MemoryStore::new();
    let mut client = TestClient::spawn(&store, "player_early", green_config());

    client.send(ClientCommand::AssetsReady);
    client.expect("playing", phase(Phase::Playing)).await;
    client.send(ClientCommand::Move { dx: 0.0, dz: -1.0 });
    client
        .expect("next second", |e| {
            assert!(
                !matches!(e, ClientEvent::Round(RoundEvent::LocalPlayerMoved(_))),
                "moved without a slot"
            );
            matches!(e, ClientEvent::Round(RoundEvent::TimeRemaining(_)))
        })
        .await;
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn accepted_moves_are_published() {
    let store = MemoryStore::new();
    let mut client = TestClient::spawn(&store, "player_mover", green_config());

    client.send(ClientCommand::Join);
    client.expect("joined", joined).await;
    client.send(ClientCommand::AssetsReady);
    client.expect("playing", phase(Phase::Playing)).await;

    client.send(ClientCommand::Move { dx: 0.0, dz: -1.0 });
    client
        .expect("moved", |e| {
            matches!(e, ClientEvent::Round(RoundEvent::LocalPlayerMoved(_)))
        })
        .await;
    settle().await;

    let path = format!("{}/position", player_path("player_mover"));
    assert_eq!(store.snapshot(&path), Some(json!({"x": 0.0, "z": 44.0})));
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn elimination_and_restart_are_published() {
    let store = MemoryStore::new();
    let mut client = TestClient::spawn(&store, "player_unlucky", red_config());
    let status_path = format!("{}/status", player_path("player_unlucky"));
    let position_path = format!("{}/position", player_path("player_unlucky"));

    client.send(ClientCommand::Join);
    client.expect("joined", joined).await;
    client.send(ClientCommand::AssetsReady);
    client
        .expect("red light", |e| {
            matches!(e, ClientEvent::Round(RoundEvent::SignalChanged(Signal::Red)))
        })
        .await;

    client.send(ClientCommand::Move { dx: 0.0, dz: -1.0 });
    client
        .expect("caught", |e| {
            matches!(
                e,
                ClientEvent::Round(RoundEvent::PlayerEliminated(EliminationReason::Caught))
            )
        })
        .await;
    settle().await;
    assert_eq!(store.snapshot(&status_path), Some(json!("eliminated")));
    // Position stays where the player stood when caught.
    assert_eq!(store.snapshot(&position_path), Some(json!({"x": 0.0, "z": 45.0})));

    client
        .expect("ended", phase(Phase::Ended(RoundOutcome::Caught)))
        .await;
    client.send(ClientCommand::Restart);
    client
        .expect("reset", |e| {
            matches!(e, ClientEvent::Round(RoundEvent::LocalPlayerReset(_)))
        })
        .await;
    settle().await;
    assert_eq!(store.snapshot(&status_path), Some(json!("alive")));
    assert_eq!(store.snapshot(&position_path), Some(json!({"x": 0.0, "z": 45.0})));

    client.stop().await;
}
