//! Shared arm/disarm state.

use std::sync::{PoisonError, RwLock};

use crate::domain::AlarmState;

/// Holds the one alarm state shared by the chat side and the local listener.
///
/// Readers run concurrently; `set` is exclusive. No validation happens here: whatever the
/// caller stores is what the next `get` returns (last completed write wins).
#[derive(Debug, Default)]
pub struct Store {
    val: RwLock<AlarmState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> AlarmState {
        *self.val.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, v: AlarmState) {
        *self.val.write().unwrap_or_else(PoisonError::into_inner) = v;
    }
}
