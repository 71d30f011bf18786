//! Per-player aggregate statistics for both challenge modes.
use crate::ids::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifetime single-dungeon statistics for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub total_runs: u32,
    pub completed_runs: u32,
    pub failed_runs: u32,
    pub mobs_killed: u32,
    pub bosses_killed: u32,
    pub deaths: u32,
    /// Zero until a first completion is recorded.
    pub fastest_clear_secs: u32,
}

/// Lifetime roguelike statistics for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoguelikeStats {
    pub total_runs: u32,
    pub highest_tier: u32,
    pub most_floors: u32,
    pub total_floors: u32,
    pub mobs_killed: u32,
    pub bosses_killed: u32,
    pub deaths: u32,
    pub longest_run_secs: u32,
}

/// In-memory aggregate store; persisted statistics remain the host's
/// concern.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    normal: Mutex<HashMap<PlayerId, PlayerStats>>,
    roguelike: Mutex<HashMap<PlayerId, RoguelikeStats>>,
}

impl StatsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn normal_lock(&self) -> MutexGuard<'_, HashMap<PlayerId, PlayerStats>> {
        self.normal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roguelike_lock(&self) -> MutexGuard<'_, HashMap<PlayerId, RoguelikeStats>> {
        self.roguelike.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_normal(&self, player: PlayerId, f: impl FnOnce(&mut PlayerStats)) {
        f(self.normal_lock().entry(player).or_default());
    }

    pub fn record_roguelike(&self, player: PlayerId, f: impl FnOnce(&mut RoguelikeStats)) {
        f(self.roguelike_lock().entry(player).or_default());
    }

    #[must_use]
    pub fn normal_stats(&self, player: PlayerId) -> PlayerStats {
        self.normal_lock().get(&player).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn roguelike_stats(&self, player: PlayerId) -> RoguelikeStats {
        self.roguelike_lock().get(&player).copied().unwrap_or_default()
    }
}

/// Fold one session completion into the fastest-clear slot.
pub fn note_clear_time(stats: &mut PlayerStats, clear_secs: u32) {
    if stats.fastest_clear_secs == 0 || clear_secs < stats.fastest_clear_secs {
        stats.fastest_clear_secs = clear_secs;
    }
}
