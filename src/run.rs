//! A chained roguelike run: consecutive sessions with escalating tier.
use crate::affix::AffixKind;
use crate::constants::PARTY_SIZE_MAX;
use crate::ids::{DifficultyId, MapId, PlayerId, RunId, SessionId, ThemeId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Why a run reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The whole party died on a floor.
    Wiped,
    /// A participant quit via the player-facing option.
    Quit,
    /// Administrative teardown without results.
    Abandoned,
    /// No eligible next dungeon or the transition teleport failed.
    TransitionFailed,
}

impl EndReason {
    /// Whether this ending announces results and records a leaderboard
    /// entry. Pure abandons do neither.
    #[must_use]
    pub const fn announces_results(self) -> bool {
        !matches!(self, Self::Abandoned)
    }
}

/// Advisory countdown before the party lands on the next floor; drives
/// per-second announcements from the periodic sweep only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub seconds_remaining: u32,
    pub next_map: MapId,
}

/// One active roguelike run.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: RunId,
    pub leader: PlayerId,
    pub members: SmallVec<[PlayerId; PARTY_SIZE_MAX]>,
    pub difficulty: DifficultyId,
    pub theme: ThemeId,
    pub scale_to_party: bool,
    /// Monotonically non-decreasing within a run; starts at 1.
    pub tier: u32,
    pub floors_cleared: u32,
    /// One buff stack per cleared floor; never decreases while the run
    /// lives.
    pub buff_stacks: u32,
    pub active_session: SessionId,
    pub affixes: Vec<AffixKind>,
    pub total_kills: u32,
    /// Engine-time milliseconds accrued by the periodic sweep.
    pub elapsed_ms: u64,
    pub countdown: Option<Countdown>,
}

impl Run {
    #[must_use]
    pub fn new(
        id: RunId,
        leader: PlayerId,
        members: SmallVec<[PlayerId; PARTY_SIZE_MAX]>,
        difficulty: DifficultyId,
        theme: ThemeId,
        scale_to_party: bool,
        active_session: SessionId,
    ) -> Self {
        Self {
            id,
            leader,
            members,
            difficulty,
            theme,
            scale_to_party,
            tier: 1,
            floors_cleared: 0,
            buff_stacks: 0,
            active_session,
            affixes: Vec::new(),
            total_kills: 0,
            elapsed_ms: 0,
            countdown: None,
        }
    }

    /// Escalate after a cleared floor: floor count, tier, and buff stacks
    /// each advance by one.
    pub fn advance_floor(&mut self) {
        self.floors_cleared += 1;
        self.tier += 1;
        self.buff_stacks += 1;
    }

    #[must_use]
    pub const fn elapsed_secs(&self) -> u32 {
        (self.elapsed_ms / 1_000) as u32
    }
}
