//! Presence for Red Light: each client advertises itself in a shared
//! key-value store and mirrors everyone else's record locally.

pub mod memory;
pub mod record;
pub mod roster;
pub mod session;
pub mod slots;
pub mod store;

pub use memory::MemoryStore;
pub use roster::{Roster, RosterDiff};
pub use session::{
    JoinOutcome, PresenceConfig, PresenceError, PresenceMode, PresenceSession, SlotPolicy,
};
pub use store::{SharedStore, StoreError, Subscription};
