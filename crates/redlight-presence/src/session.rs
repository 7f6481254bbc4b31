use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use redlight_core::player::{Player, PlayerId, PlayerStatus, Position};

use crate::record::{PlayerRecord, RecordError, RoomRecord, epoch_secs};
use crate::slots::{choose_slot, lowest_free_slot, random_slot, used_slots};
use crate::store::{SharedStore, StoreError, Subscription};

/// How a joining client picks its slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Read the roster, take the lowest free slot, write. Two clients
    /// joining at once can end up with the same slot.
    #[default]
    Snapshot,
    /// Claim `slots/<n>` with an atomic conditional write, moving to the
    /// next free slot when another client got there first.
    Claim,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Room key under `lobby/`.
    pub room: String,
    /// Give up joining and play solo after this long.
    pub join_timeout_ms: u64,
    pub slot_policy: SlotPolicy,
    /// Claim attempts before giving up under [`SlotPolicy::Claim`].
    pub max_claim_attempts: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            room: "waitingRoom".to_string(),
            join_timeout_ms: 5000,
            slot_policy: SlotPolicy::Snapshot,
            max_claim_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceMode {
    /// Joined the shared room; remote players are visible.
    Online,
    /// Store unreachable; playing alone and publishing nothing.
    Solo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub slot: u16,
    pub mode: PresenceMode,
    /// This client created the room. Grants no authority.
    pub is_host: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceError {
    Store(StoreError),
    Record(RecordError),
    /// Publish attempted before `join` resolved.
    NotJoined,
}

impl std::fmt::Display for PresenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{e}"),
            Self::Record(e) => write!(f, "{e}"),
            Self::NotJoined => write!(f, "presence session has not joined a room"),
        }
    }
}

impl std::error::Error for PresenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Record(e) => Some(e),
            Self::NotJoined => None,
        }
    }
}

impl From<StoreError> for PresenceError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<RecordError> for PresenceError {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

/// One client's membership in a shared room.
///
/// Every write goes to this player's own record (or its own slot claim).
/// Other players' records are only ever read.
pub struct PresenceSession {
    store: Arc<dyn SharedStore>,
    config: PresenceConfig,
    player_id: PlayerId,
    joined: Option<JoinOutcome>,
    /// Own record may exist in the store, including from a join that failed
    /// after writing it.
    record_written: bool,
    claimed_slot: Option<u16>,
    rng: StdRng,
}

impl PresenceSession {
    pub fn new(store: Arc<dyn SharedStore>, config: PresenceConfig, player_id: PlayerId) -> Self {
        Self {
            store,
            config,
            player_id,
            joined: None,
            record_written: false,
            claimed_slot: None,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn outcome(&self) -> Option<JoinOutcome> {
        self.joined
    }

    pub fn is_online(&self) -> bool {
        self.joined.is_some_and(|j| j.mode == PresenceMode::Online)
    }

    fn room_path(&self) -> String {
        format!("lobby/{}", self.config.room)
    }

    /// Path of the roster subtree other clients subscribe to.
    pub fn players_path(&self) -> String {
        format!("{}/players", self.room_path())
    }

    fn own_path(&self) -> String {
        format!("{}/{}", self.players_path(), self.player_id)
    }

    fn slot_path(&self, slot: u16) -> String {
        format!("{}/slots/{slot}", self.room_path())
    }

    /// Join the room, falling back to solo play on any failure or timeout.
    ///
    /// Returns the roster subscription when online.
    pub async fn join(&mut self) -> (JoinOutcome, Option<Subscription>) {
        let timeout = Duration::from_millis(self.config.join_timeout_ms);
        let result = match tokio::time::timeout(timeout, self.try_join()).await {
            Ok(result) => result,
            Err(_) => Err(PresenceError::Store(StoreError::Timeout)),
        };

        match result {
            Ok((outcome, subscription)) => {
                tracing::info!(
                    player_id = %self.player_id,
                    room = %self.config.room,
                    slot = outcome.slot,
                    is_host = outcome.is_host,
                    "Joined room"
                );
                self.joined = Some(outcome);
                (outcome, Some(subscription))
            },
            Err(e) => {
                // A solo player must not leave a record others would render.
                match tokio::time::timeout(timeout, self.remove_own_writes()).await {
                    Ok(Ok(())) => {},
                    Ok(Err(cleanup)) => tracing::warn!(
                        player_id = %self.player_id,
                        error = %cleanup,
                        "Could not remove partial join, retrying on leave"
                    ),
                    Err(_) => tracing::warn!(
                        player_id = %self.player_id,
                        "Removing partial join timed out, retrying on leave"
                    ),
                }
                let outcome = JoinOutcome {
                    slot: random_slot(&mut self.rng),
                    mode: PresenceMode::Solo,
                    is_host: false,
                };
                tracing::warn!(
                    player_id = %self.player_id,
                    slot = outcome.slot,
                    error = %e,
                    "Join failed, continuing in solo mode"
                );
                self.joined = Some(outcome);
                (outcome, None)
            },
        }
    }

    async fn try_join(&mut self) -> Result<(JoinOutcome, Subscription), PresenceError> {
        let room = self.room_path();
        let is_host = if self.store.get(&format!("{room}/status")).await?.is_none() {
            // Field by field, so a racing client's players subtree survives.
            let record = RoomRecord::active(epoch_secs());
            self.store
                .set(&format!("{room}/status"), json!(record.status))
                .await?;
            self.store
                .set(&format!("{room}/created"), json!(record.created))
                .await?;
            true
        } else {
            false
        };

        let slot = match self.config.slot_policy {
            SlotPolicy::Snapshot => {
                let roster = self.store.get(&self.players_path()).await?;
                choose_slot(&used_slots(roster.as_ref()), &mut self.rng)
            },
            SlotPolicy::Claim => self.claim_slot().await?,
        };

        let player = Player::new(self.player_id.clone(), slot);
        let record = PlayerRecord::from_player(&player, epoch_secs()).to_value()?;
        // Set first: the write may land even if this future is dropped.
        self.record_written = true;
        self.store.set(&self.own_path(), record).await?;

        let subscription = self.store.subscribe(&self.players_path()).await?;
        let outcome = JoinOutcome {
            slot,
            mode: PresenceMode::Online,
            is_host,
        };
        Ok((outcome, subscription))
    }

    /// Claim the lowest slot nobody has claimed or is sitting in.
    async fn claim_slot(&mut self) -> Result<u16, PresenceError> {
        for attempt in 1..=self.config.max_claim_attempts {
            let roster = self.store.get(&self.players_path()).await?;
            let claims = self.store.get(&format!("{}/slots", self.room_path())).await?;

            let mut used: BTreeSet<u16> = used_slots(roster.as_ref());
            if let Some(Value::Object(claims)) = &claims {
                used.extend(claims.keys().filter_map(|k| k.parse::<u16>().ok()));
            }

            let Some(slot) = lowest_free_slot(&used) else {
                tracing::warn!("No unclaimed slots left, picking a random one");
                return Ok(random_slot(&mut self.rng));
            };

            if self
                .store
                .set_if_absent(&self.slot_path(slot), json!(self.player_id))
                .await?
            {
                self.claimed_slot = Some(slot);
                return Ok(slot);
            }
            tracing::debug!(slot, attempt, "Slot claimed by another client, retrying");
        }
        Err(StoreError::Conflict.into())
    }

    fn joined_online(&self) -> Result<bool, PresenceError> {
        match self.joined {
            None => Err(PresenceError::NotJoined),
            Some(j) => Ok(j.mode == PresenceMode::Online),
        }
    }

    /// Write this player's position. No-op in solo mode.
    pub async fn publish_position(&self, position: Position) -> Result<(), PresenceError> {
        if !self.joined_online()? {
            return Ok(());
        }
        if !position.is_finite() {
            return Err(RecordError::NonFinitePosition.into());
        }
        let value =
            serde_json::to_value(position).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.store
            .set(&format!("{}/position", self.own_path()), value)
            .await?;
        Ok(())
    }

    /// Write this player's status. No-op in solo mode.
    pub async fn publish_status(&self, status: PlayerStatus) -> Result<(), PresenceError> {
        if !self.joined_online()? {
            return Ok(());
        }
        let value =
            serde_json::to_value(status).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.store
            .set(&format!("{}/status", self.own_path()), value)
            .await?;
        Ok(())
    }

    /// Read back and validate this player's own record.
    pub async fn own_record(&self) -> Result<Option<Player>, PresenceError> {
        if !self.joined_online()? {
            return Ok(None);
        }
        match self.store.get(&self.own_path()).await? {
            Some(value) => Ok(Some(PlayerRecord::parse(&self.player_id, &value)?)),
            None => Ok(None),
        }
    }

    /// Remove this player's record and slot claim. A crashed client never
    /// gets here, so its record stays behind.
    ///
    /// On error the session keeps its state, so calling `leave` again retries.
    pub async fn leave(&mut self) -> Result<(), PresenceError> {
        self.remove_own_writes().await?;
        if let Some(outcome) = self.joined.take()
            && outcome.mode == PresenceMode::Online
        {
            tracing::info!(player_id = %self.player_id, slot = outcome.slot, "Left room");
        }
        Ok(())
    }

    async fn remove_own_writes(&mut self) -> Result<(), PresenceError> {
        if self.record_written {
            self.store.remove(&self.own_path()).await?;
            self.record_written = false;
        }
        if let Some(slot) = self.claimed_slot {
            self.store.remove(&self.slot_path(slot)).await?;
            self.claimed_slot = None;
        }
        Ok(())
    }
}
