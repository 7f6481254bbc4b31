use std::collections::BTreeMap;

use serde_json::Value;

use redlight_core::player::{Player, PlayerId};

use crate::record::PlayerRecord;

/// What changed between two roster deliveries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterDiff {
    pub joined: Vec<Player>,
    pub updated: Vec<Player>,
    pub departed: Vec<PlayerId>,
    /// Entries dropped because they failed validation.
    pub rejected: usize,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.updated.is_empty() && self.departed.is_empty()
    }
}

/// Local, read-only copies of every remote player.
///
/// Reconciling the same snapshot twice is a no-op, so at-least-once
/// delivery never duplicates a player.
#[derive(Debug, Clone)]
pub struct Roster {
    local_id: PlayerId,
    players: BTreeMap<PlayerId, Player>,
}

impl Roster {
    pub fn new(local_id: PlayerId) -> Self {
        Self {
            local_id,
            players: BTreeMap::new(),
        }
    }

    /// Fold a whole-subtree snapshot of `players/` into the local view.
    pub fn reconcile(&mut self, snapshot: Option<&Value>) -> RosterDiff {
        let mut diff = RosterDiff::default();
        let mut seen: BTreeMap<PlayerId, Player> = BTreeMap::new();

        if let Some(Value::Object(entries)) = snapshot {
            for (key, value) in entries {
                if *key == self.local_id {
                    continue;
                }
                match PlayerRecord::parse(key, value) {
                    Ok(player) => {
                        seen.insert(key.clone(), player);
                    },
                    Err(e) => {
                        tracing::debug!(key = %key, error = %e, "Dropped malformed player record");
                        diff.rejected += 1;
                    },
                }
            }
        }

        for (id, player) in &seen {
            match self.players.get(id) {
                None => diff.joined.push(player.clone()),
                Some(known) if known != player => diff.updated.push(player.clone()),
                Some(_) => {},
            }
        }
        diff.departed = self
            .players
            .keys()
            .filter(|id| !seen.contains_key(*id))
            .cloned()
            .collect();

        for id in &diff.departed {
            tracing::info!(player_id = %id, "Player left the room");
        }
        for p in &diff.joined {
            tracing::info!(player_id = %p.id, slot = p.slot_number, "Player joined the room");
        }

        self.players = seen;
        diff
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Remote players ordered by slot number.
    pub fn players(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| a.slot_number.cmp(&b.slot_number).then(a.id.cmp(&b.id)));
        players
    }

    /// Remote players still alive and connected.
    pub fn alive_count(&self) -> u32 {
        self.players
            .values()
            .filter(|p| p.is_alive() && p.connected)
            .count() as u32
    }
}
