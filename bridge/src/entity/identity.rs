//! Process-wide identity allocation for virtual entities

use std::sync::atomic::{AtomicI32, Ordering};
use tracing::error;
use uuid::Uuid;

/// First numeric id handed out. Kept far above the range the host assigns to
/// its own simulated entities so the two never collide during a server's life.
pub const FIRST_VIRTUAL_ENTITY_ID: i32 = 1_000_000_000;

static NEXT_ENTITY_ID: AtomicI32 = AtomicI32::new(FIRST_VIRTUAL_ENTITY_ID);

/// Identity of one virtual entity: the numeric id used on the wire plus its UUID.
///
/// Immutable once allocated; ids are not reused until the id space wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityIdentity {
    numeric_id: i32,
    uuid: Uuid,
}

impl EntityIdentity {
    /// Allocate a fresh identity from the process-wide counter
    pub fn allocate() -> Self {
        Self {
            numeric_id: next_id(&NEXT_ENTITY_ID),
            uuid: Uuid::new_v4(),
        }
    }

    /// Build an identity from known parts (decoding, tests)
    pub fn from_parts(numeric_id: i32, uuid: Uuid) -> Self {
        Self { numeric_id, uuid }
    }

    pub fn numeric_id(&self) -> i32 {
        self.numeric_id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// Take the next id. Past `i32::MAX` the counter restarts at
/// [`FIRST_VIRTUAL_ENTITY_ID`] and logs an error, since ids from the first
/// pass may still be live on clients.
fn next_id(counter: &AtomicI32) -> i32 {
    let result = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
        Some(id.checked_add(1).unwrap_or(FIRST_VIRTUAL_ENTITY_ID))
    });
    // The closure never declines, so both arms carry the previous value
    let id = result.unwrap_or_else(|id| id);
    if id == i32::MAX {
        error!(
            "Virtual entity id space exhausted, restarting at {}",
            FIRST_VIRTUAL_ENTITY_ID
        );
    }
    id
}
