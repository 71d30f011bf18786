//! Capability traits for the external collaborators the engine drives.
//!
//! The engine owns orchestration only; teleports, auras, spawning, and
//! leaderboard persistence are world-engine concerns injected at
//! construction, mirroring the platform seams of the host.
use crate::events::RunEvent;
use crate::ids::{CreatureId, InstanceId, MapId, PlayerId, SessionId};
use crate::leaderboard::{LeaderboardEntry, RunLeaderboardEntry};
use crate::scaling::SpawnParams;
use thiserror::Error;

/// What the spawning routine reported back for one populated instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationReport {
    pub mobs: Vec<CreatureId>,
    pub bosses: Vec<CreatureId>,
    pub level_min: u8,
    pub level_max: u8,
}

/// Failures surfaced by world-engine primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("teleport of player {player} to map {map} failed")]
    TeleportFailed { player: PlayerId, map: MapId },
    #[error("player {player} is not available")]
    PlayerUnavailable { player: PlayerId },
}

/// Failures surfaced by the population routine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PopulateError {
    #[error("instance {instance} is no longer available")]
    InstanceUnavailable { instance: InstanceId },
    #[error("no spawn points resolved for map {map}")]
    NoSpawns { map: MapId },
}

/// World-engine primitives: party membership, movement, auras, and
/// notification delivery.
pub trait WorldOps: Send + Sync {
    /// The leader's full party, leader included. A solo player yields a
    /// one-element roster.
    fn party_members(&self, leader: PlayerId) -> Vec<PlayerId>;

    fn player_level(&self, player: PlayerId) -> u8;

    fn character_name(&self, player: PlayerId) -> String;

    fn max_health(&self, player: PlayerId) -> u32;

    /// Move a player into a dungeon map.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] when the player cannot be moved; the caller
    /// performs compensating cleanup.
    fn teleport_to(&self, player: PlayerId, map: MapId) -> Result<(), WorldError>;

    /// Return a player to their pre-challenge location. Best-effort.
    fn teleport_out(&self, player: PlayerId);

    /// Resolve the instance a player currently occupies on `map`, if any.
    /// Used by the tick fallback when the map-enter hook never fired.
    fn instance_of(&self, player: PlayerId, map: MapId) -> Option<InstanceId>;

    /// Apply the run buff aura at the given stack count. Implementations
    /// replace any existing instance of the aura.
    fn apply_run_buff(&self, player: PlayerId, stacks: u32, bonus_pct: f32);

    /// Remove the run buff aura entirely.
    fn remove_run_buff(&self, player: PlayerId);

    /// Deliver a structured notification to one player.
    fn announce(&self, player: PlayerId, event: &RunEvent);
}

/// The enemy-spawning routine. Given a resolved instance and spawn
/// parameters, spawns scaled enemies and reports what it placed.
pub trait Populator: Send + Sync {
    /// # Errors
    ///
    /// Returns [`PopulateError`] when the instance cannot be populated;
    /// the engine abandons the session rather than leaving it dangling.
    fn populate(
        &self,
        session: SessionId,
        map: MapId,
        instance: InstanceId,
        params: &SpawnParams,
    ) -> Result<PopulationReport, PopulateError>;
}

/// Append-only persisted leaderboard storage.
pub trait LeaderboardStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append a terminal single-dungeon record.
    ///
    /// # Errors
    ///
    /// Returns the store's error; the engine logs and continues, since no
    /// persistence failure is fatal to orchestration.
    fn append_session(&self, entry: &LeaderboardEntry) -> Result<(), Self::Error>;

    /// Append a terminal roguelike record.
    ///
    /// # Errors
    ///
    /// Same policy as [`LeaderboardStore::append_session`].
    fn append_run(&self, entry: &RunLeaderboardEntry) -> Result<(), Self::Error>;

    /// Load all single-dungeon records.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    fn session_entries(&self) -> Result<Vec<LeaderboardEntry>, Self::Error>;

    /// Load all roguelike records.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    fn run_entries(&self) -> Result<Vec<RunLeaderboardEntry>, Self::Error>;
}
