//! Pure scaling math: tier multipliers, affix combination, and the
//! environmental damage clamp.
//!
//! Nothing in this module mutates engine state; every function is a pure
//! query safe to call from any concurrent caller.
use crate::affix::{AffixKind, AffixPool};
use crate::constants::{
    BASE_ELITE_CHANCE, ELITE_CHANCE_MAX, ENV_DAMAGE_MAX_PCT, ENV_SCALE_MIN, TIER_ARMOR_STEP,
    TIER_DAMAGE_STEP, TIER_ELITE_CHANCE_STEP, TIER_HEALTH_STEP,
};
use crate::ids::ThemeId;
use serde::{Deserialize, Serialize};

/// Enemy health multiplier for a run tier. Non-decreasing in tier.
#[must_use]
pub fn tier_health_multiplier(tier: u32) -> f32 {
    affine_tier_mult(tier, TIER_HEALTH_STEP)
}

/// Enemy damage multiplier for a run tier. Non-decreasing in tier.
#[must_use]
pub fn tier_damage_multiplier(tier: u32) -> f32 {
    affine_tier_mult(tier, TIER_DAMAGE_STEP)
}

/// Enemy armor multiplier for a run tier. Non-decreasing in tier.
#[must_use]
pub fn tier_armor_multiplier(tier: u32) -> f32 {
    affine_tier_mult(tier, TIER_ARMOR_STEP)
}

/// Chance for a trash spawn to be promoted to elite at a run tier,
/// before affix modifiers. Capped so floors stay clearable.
#[must_use]
pub fn tier_elite_chance(tier: u32) -> f32 {
    let steps = tier.saturating_sub(1) as f32;
    TIER_ELITE_CHANCE_STEP
        .mul_add(steps, BASE_ELITE_CHANCE)
        .min(ELITE_CHANCE_MAX)
}

fn affine_tier_mult(tier: u32, step: f32) -> f32 {
    let steps = tier.saturating_sub(1) as f32;
    step.mul_add(steps, 1.0)
}

/// Combined health/damage/elite-chance multipliers from an active affix
/// set for a creature with the given flags. Affixes that do not apply to
/// the boss/elite combination contribute identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffixMultipliers {
    pub health: f32,
    pub damage: f32,
    pub elite_chance: f32,
}

impl Default for AffixMultipliers {
    fn default() -> Self {
        Self {
            health: 1.0,
            damage: 1.0,
            elite_chance: 1.0,
        }
    }
}

/// Fold the run's active affixes into one multiplier triple.
#[must_use]
pub fn affix_multipliers(
    pool: &AffixPool,
    active: &[AffixKind],
    is_boss: bool,
    is_elite: bool,
) -> AffixMultipliers {
    let mut out = AffixMultipliers::default();
    for kind in active {
        let Some(def) = pool.def(*kind) else {
            continue;
        };
        if !def.applies_to(is_boss, is_elite) {
            continue;
        }
        out.health *= def.health_mult;
        out.damage *= def.damage_mult;
        out.elite_chance *= def.elite_chance_mult;
    }
    out
}

/// Parameters handed to the population collaborator for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnParams {
    pub theme: ThemeId,
    pub level_min: u8,
    pub level_max: u8,
    pub health_mult: f32,
    pub damage_mult: f32,
    pub armor_mult: f32,
    pub elite_chance: f32,
    pub scale_to_party: bool,
}

impl SpawnParams {
    /// Baseline parameters for a non-roguelike session: identity
    /// multipliers, catalog elite chance.
    #[must_use]
    pub fn normal(theme: ThemeId, level_min: u8, level_max: u8, scale_to_party: bool) -> Self {
        Self {
            theme,
            level_min,
            level_max,
            health_mult: 1.0,
            damage_mult: 1.0,
            armor_mult: 1.0,
            elite_chance: BASE_ELITE_CHANCE,
            scale_to_party,
        }
    }

    /// Parameters for a roguelike floor at `tier`.
    #[must_use]
    pub fn for_tier(
        theme: ThemeId,
        level_min: u8,
        level_max: u8,
        scale_to_party: bool,
        tier: u32,
    ) -> Self {
        Self {
            theme,
            level_min,
            level_max,
            health_mult: tier_health_multiplier(tier),
            damage_mult: tier_damage_multiplier(tier),
            armor_mult: tier_armor_multiplier(tier),
            elite_chance: tier_elite_chance(tier),
            scale_to_party,
        }
    }
}

/// Level-scaling factor applied to damage from sources outside the
/// session's own spawns. A level-scaled party in an on-level dungeon
/// takes unscaled damage (factor 1); a party scaled down into low-level
/// content takes proportionally reduced environmental damage.
#[must_use]
pub fn environmental_damage_scale(party_level: u8, dungeon_min: u8, dungeon_max: u8) -> f32 {
    if party_level == 0 {
        return 1.0;
    }
    let band_mid = f32::from(dungeon_min) + f32::from(dungeon_max.max(dungeon_min));
    let band_mid = band_mid / 2.0;
    if band_mid <= 0.0 {
        return 1.0;
    }
    (band_mid / f32::from(party_level)).clamp(ENV_SCALE_MIN, 1.0)
}

/// Clamp one non-session damage event: apply `scale` when it reduces,
/// cap at [`ENV_DAMAGE_MAX_PCT`] of `max_health`, and never fully negate.
#[must_use]
pub fn clamp_environmental_damage(damage: u32, scale: f32, max_health: u32) -> u32 {
    if damage == 0 {
        return 0;
    }
    let mut out = damage;
    if scale < 1.0 {
        out = (out as f32 * scale.max(0.0)) as u32;
    }
    let cap = ((max_health as f32 * ENV_DAMAGE_MAX_PCT) as u32).max(1);
    out.min(cap).max(1)
}
