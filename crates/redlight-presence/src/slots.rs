use std::collections::BTreeSet;

use rand::Rng;
use serde_json::Value;

use redlight_core::player::{MAX_SLOTS, is_valid_slot};

/// Slot numbers claimed in a raw roster snapshot.
///
/// Reads `slotNumber` straight from each entry, so a record that fails full
/// validation still reserves its slot.
pub fn used_slots(roster: Option<&Value>) -> BTreeSet<u16> {
    let Some(Value::Object(players)) = roster else {
        return BTreeSet::new();
    };
    players
        .values()
        .filter_map(|p| p.get("slotNumber")?.as_u64())
        .filter_map(|n| u16::try_from(n).ok())
        .filter(|&n| is_valid_slot(n))
        .collect()
}

/// Lowest slot in `[1, MAX_SLOTS]` not in `used`.
pub fn lowest_free_slot(used: &BTreeSet<u16>) -> Option<u16> {
    (1..=MAX_SLOTS).find(|n| !used.contains(n))
}

/// Uniformly random slot, used when the room is full or unreachable.
pub fn random_slot<R: Rng>(rng: &mut R) -> u16 {
    rng.random_range(1..=MAX_SLOTS)
}

/// Lowest free slot, falling back to a random one when all are taken.
/// The fallback may collide with an existing player.
pub fn choose_slot<R: Rng>(used: &BTreeSet<u16>, rng: &mut R) -> u16 {
    match lowest_free_slot(used) {
        Some(slot) => slot,
        None => {
            tracing::warn!("All {MAX_SLOTS} slots taken, picking a random one");
            random_slot(rng)
        },
    }
}
