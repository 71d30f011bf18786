//! Gauntlet Core Engine
//!
//! Platform-agnostic orchestration for the Gauntlet instanced dungeon
//! challenge mode: timed single-dungeon sessions and chained roguelike
//! runs with escalating tiers, affixes, and leaderboards. The crate
//! holds no world-engine code; hosts supply movement, spawning, and
//! persistence through the traits in [`world`].

pub mod affix;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod events;
pub mod ids;
pub mod leaderboard;
pub mod lifecycle;
pub mod manager;
pub mod registry;
pub mod run;
pub mod scaling;
pub mod selection;
pub mod session;
pub mod stats;
pub mod world;

// Re-export commonly used types
pub use affix::{AffixDef, AffixKind, AffixPool};
pub use catalog::{Catalog, DifficultyTier, DungeonInfo, Theme, pick_weighted_dungeon};
pub use config::{ConfigError, EngineConfig};
pub use events::RunEvent;
pub use ids::{
    CreatureId, DifficultyId, InstanceId, MapId, PlayerId, RunId, SessionId, ThemeId,
};
pub use leaderboard::{
    LeaderboardEntry, RunLeaderboardEntry, RunRanking, top_runs, top_sessions,
};
pub use lifecycle::RunLifecycle;
pub use manager::{ChallengeError, DeathOutcome, KillOutcome, SessionManager};
pub use registry::{RegistryError, RunRegistry, SessionRegistry};
pub use run::{Countdown, EndReason, Run};
pub use scaling::{
    AffixMultipliers, SpawnParams, affix_multipliers, clamp_environmental_damage,
    environmental_damage_scale,
};
pub use selection::{PlayerSelection, SelectionStore};
pub use session::{KillKind, Roster, Session, SessionMember, SessionState};
pub use stats::{PlayerStats, RoguelikeStats, StatsRegistry};
pub use world::{
    LeaderboardStore, PopulateError, PopulationReport, Populator, WorldError, WorldOps,
};
