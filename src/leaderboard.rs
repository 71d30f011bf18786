//! Leaderboard snapshots and top-N ranking.
//!
//! Persistence is the store collaborator's concern; this module only
//! defines the immutable entry shapes and the pure ranking over loaded
//! snapshots. Ranking never mutates stored state.
use crate::ids::{DifficultyId, MapId, PlayerId};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of one completed single-dungeon session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player: PlayerId,
    pub character: String,
    pub map: MapId,
    pub difficulty: DifficultyId,
    pub clear_secs: u32,
    pub party_size: u32,
    pub scaled: bool,
}

/// Immutable snapshot of one terminal roguelike run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLeaderboardEntry {
    pub player: PlayerId,
    pub character: String,
    pub tier_reached: u32,
    pub floors_cleared: u32,
    pub duration_secs: u32,
    pub total_kills: u32,
    pub party_size: u32,
    pub scaled: bool,
}

/// Ranking key for the roguelike board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunRanking {
    /// Highest tier first, floors as the secondary key.
    HighestTier,
    /// Most floors first, tier as the secondary key.
    MostFloors,
}

/// Top `limit` fastest clears, ascending by clear time. Entries arrive in
/// append order; ties go to the more recent record.
#[must_use]
pub fn top_sessions(entries: &[LeaderboardEntry], limit: usize) -> Vec<LeaderboardEntry> {
    let mut indexed: Vec<(usize, &LeaderboardEntry)> = entries.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| a.clear_secs.cmp(&b.clear_secs).then(ib.cmp(ia)));
    indexed
        .into_iter()
        .take(limit)
        .map(|(_, e)| e.clone())
        .collect()
}

/// Top `limit` roguelike runs under the chosen ranking, descending.
/// Ties go to the more recent record.
#[must_use]
pub fn top_runs(
    entries: &[RunLeaderboardEntry],
    limit: usize,
    ranking: RunRanking,
) -> Vec<RunLeaderboardEntry> {
    let mut indexed: Vec<(usize, &RunLeaderboardEntry)> = entries.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        let key = match ranking {
            RunRanking::HighestTier => (b.tier_reached, b.floors_cleared)
                .cmp(&(a.tier_reached, a.floors_cleared)),
            RunRanking::MostFloors => (b.floors_cleared, b.tier_reached)
                .cmp(&(a.floors_cleared, a.tier_reached)),
        };
        key.then(ib.cmp(ia))
    });
    indexed
        .into_iter()
        .take(limit)
        .map(|(_, e)| e.clone())
        .collect()
}
