//! Structured notification events emitted by the engine.
//!
//! The engine never formats chat text; it emits these payloads to the
//! world collaborator and the presentation layer renders them.
use crate::ids::{MapId, RunId, SessionId};
use crate::run::EndReason;
use serde::{Deserialize, Serialize};

/// One notification addressed to a session or run participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    /// A single-dungeon challenge has been created and teleports are
    /// underway.
    ChallengeStarted {
        session: SessionId,
        map: MapId,
        party_size: u32,
    },
    /// The instance is being populated.
    Preparing { session: SessionId },
    /// Population finished; the challenge is live.
    Populated {
        session: SessionId,
        mobs: u32,
        bosses: u32,
        level_min: u8,
        level_max: u8,
    },
    /// All bosses down; the session is complete.
    SessionCompleted {
        session: SessionId,
        clear_secs: u32,
    },
    /// The whole roster died.
    SessionFailed { session: SessionId },
    /// A roguelike run began on its first floor.
    RunStarted {
        run: RunId,
        map: MapId,
        tier: u32,
    },
    /// A floor was cleared and the run escalated.
    FloorCleared {
        run: RunId,
        tier: u32,
        floors_cleared: u32,
        buff_stacks: u32,
    },
    /// Advisory countdown before the party lands on the next floor.
    Countdown {
        run: RunId,
        seconds_remaining: u32,
        next_map: MapId,
    },
    /// The run reached a terminal state.
    RunEnded {
        run: RunId,
        reason: EndReason,
        tier: u32,
        floors_cleared: u32,
        duration_secs: u32,
        total_kills: u32,
    },
}
