//! Per-player interactive selection state for the challenge menu flow.
//!
//! This is deliberately a separate, smaller critical section from the
//! run/session registries: it only ever touches one player's in-progress
//! choice and never needs cross-referencing.
use crate::ids::{DifficultyId, MapId, PlayerId, ThemeId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A player's in-progress menu choices before confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerSelection {
    pub difficulty: Option<DifficultyId>,
    pub theme: Option<ThemeId>,
    /// `None` means "random eligible dungeon".
    pub map: Option<MapId>,
    pub scale_to_party: bool,
    pub roguelike: bool,
}

/// Mutex-guarded map of in-progress selections.
#[derive(Debug, Default)]
pub struct SelectionStore {
    inner: Mutex<HashMap<PlayerId, PlayerSelection>>,
}

impl SelectionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlayerId, PlayerSelection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fresh selection, discarding any previous one.
    pub fn begin(&self, player: PlayerId, roguelike: bool) {
        let selection = PlayerSelection {
            scale_to_party: true,
            roguelike,
            ..PlayerSelection::default()
        };
        self.lock().insert(player, selection);
    }

    /// Mutate the in-progress selection; returns false when none exists
    /// (the "selection expired" caller error).
    pub fn update(&self, player: PlayerId, f: impl FnOnce(&mut PlayerSelection)) -> bool {
        let mut store = self.lock();
        match store.get_mut(&player) {
            Some(selection) => {
                f(selection);
                true
            }
            None => false,
        }
    }

    /// Consume the selection on confirmation.
    pub fn take(&self, player: PlayerId) -> Option<PlayerSelection> {
        self.lock().remove(&player)
    }

    /// Drop the selection on cancel; absent entries are a no-op.
    pub fn cancel(&self, player: PlayerId) {
        self.lock().remove(&player);
    }

    #[must_use]
    pub fn get(&self, player: PlayerId) -> Option<PlayerSelection> {
        self.lock().get(&player).cloned()
    }
}
