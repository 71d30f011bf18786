//! Centralized balance and tuning constants for the Gauntlet engine.
//!
//! These values define the deterministic math for tier scaling, buff
//! accrual, and the periodic sweep. Keeping them together ensures the
//! challenge balance can only change via reviewed code, not external data.

// Periodic sweep ------------------------------------------------------------
pub(crate) const UPDATE_INTERVAL_MS: u32 = 1_000;
/// Grace before the tick fallback re-drives population for a session whose
/// map-enter hook never fired (async teleport edge cases).
pub(crate) const POPULATE_FALLBACK_GRACE_MS: u64 = 5_000;

// Tier scaling --------------------------------------------------------------
pub(crate) const TIER_HEALTH_STEP: f32 = 0.12;
pub(crate) const TIER_DAMAGE_STEP: f32 = 0.08;
pub(crate) const TIER_ARMOR_STEP: f32 = 0.05;
pub(crate) const BASE_ELITE_CHANCE: f32 = 0.08;
pub(crate) const TIER_ELITE_CHANCE_STEP: f32 = 0.015;
pub(crate) const ELITE_CHANCE_MAX: f32 = 0.50;

// Buff stacks ---------------------------------------------------------------
/// Player-facing bonus per cleared floor, in percent.
pub const BUFF_PCT_PER_STACK: f32 = 10.0;

// Affix selection -----------------------------------------------------------
pub(crate) const AFFIX_SLOT_BASE: u32 = 1;
pub(crate) const AFFIX_SLOT_TIER_STEP: u32 = 3;
pub(crate) const AFFIX_SLOT_MAX: u32 = 3;

// Environmental damage ------------------------------------------------------
/// Hard cap on a single non-session damage event, as a fraction of the
/// target's maximum health.
pub(crate) const ENV_DAMAGE_MAX_PCT: f32 = 0.03;
pub(crate) const ENV_SCALE_MIN: f32 = 0.10;

// Transition ----------------------------------------------------------------
pub(crate) const TRANSITION_COUNTDOWN_SECS: u32 = 5;

// Level banding -------------------------------------------------------------
/// Half-width of the spawn level band around the effective party level
/// when scaling to the party.
pub(crate) const LEVEL_BAND_SPREAD: u8 = 1;

// Admission defaults --------------------------------------------------------
pub(crate) const DEFAULT_MAX_ACTIVE_SESSIONS: u32 = 20;
pub(crate) const DEFAULT_COOLDOWN_SECS: u32 = 300;
pub(crate) const PARTY_SIZE_MAX: usize = 5;

#[cfg(test)]
pub(crate) const FLOAT_EPSILON: f32 = 1e-6;
