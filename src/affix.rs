//! Static weighted affix table and per-tier selection.
//!
//! Affixes modify the enemies of a roguelike floor. The pool is built once
//! at startup and read-only afterwards; selection happens on run start and
//! on every tier increment, independently of prior picks apart from the
//! minimum-tier gate.
use crate::constants::{AFFIX_SLOT_BASE, AFFIX_SLOT_MAX, AFFIX_SLOT_TIER_STEP};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The named enemy modifiers an active run can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffixKind {
    /// Non-boss enemies have more health and hit harder.
    Fortified,
    /// Bosses have more health and hit harder.
    Tyrannical,
    /// All enemies deal extra damage.
    Raging,
    /// Elites are markedly more common.
    Teeming,
    /// Elites gain extra health on top of tier scaling.
    Hardened,
    /// Everything hits harder; the deep-run gauntlet affix.
    Deadly,
}

/// Immutable definition of one affix: selection weight, tier gate, and
/// multiplier contributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffixDef {
    pub kind: AffixKind,
    pub weight: u32,
    pub min_tier: u32,
    /// Health multiplier and whether it gates on the boss flag.
    pub health_mult: f32,
    pub damage_mult: f32,
    pub elite_chance_mult: f32,
    /// `Some(true)` applies to bosses only, `Some(false)` to non-bosses
    /// only, `None` to everything.
    pub boss_only: Option<bool>,
    /// When true the multipliers apply only to elites.
    pub elite_only: bool,
}

impl AffixDef {
    /// Whether this affix contributes to a creature with the given flags.
    #[must_use]
    pub fn applies_to(&self, is_boss: bool, is_elite: bool) -> bool {
        let boss_ok = self.boss_only.is_none_or(|wants_boss| wants_boss == is_boss);
        let elite_ok = !self.elite_only || is_elite;
        boss_ok && elite_ok
    }
}

/// The static weighted affix table.
#[derive(Debug, Clone)]
pub struct AffixPool {
    defs: Vec<AffixDef>,
}

impl AffixPool {
    /// Build the standard pool. Called once at engine construction.
    #[must_use]
    pub fn standard() -> Self {
        let defs = vec![
            AffixDef {
                kind: AffixKind::Fortified,
                weight: 100,
                min_tier: 1,
                health_mult: 1.20,
                damage_mult: 1.10,
                elite_chance_mult: 1.0,
                boss_only: Some(false),
                elite_only: false,
            },
            AffixDef {
                kind: AffixKind::Tyrannical,
                weight: 100,
                min_tier: 1,
                health_mult: 1.25,
                damage_mult: 1.15,
                elite_chance_mult: 1.0,
                boss_only: Some(true),
                elite_only: false,
            },
            AffixDef {
                kind: AffixKind::Raging,
                weight: 80,
                min_tier: 2,
                health_mult: 1.0,
                damage_mult: 1.10,
                elite_chance_mult: 1.0,
                boss_only: None,
                elite_only: false,
            },
            AffixDef {
                kind: AffixKind::Teeming,
                weight: 70,
                min_tier: 3,
                health_mult: 1.0,
                damage_mult: 1.0,
                elite_chance_mult: 1.50,
                boss_only: Some(false),
                elite_only: false,
            },
            AffixDef {
                kind: AffixKind::Hardened,
                weight: 50,
                min_tier: 4,
                health_mult: 1.15,
                damage_mult: 1.0,
                elite_chance_mult: 1.0,
                boss_only: None,
                elite_only: true,
            },
            AffixDef {
                kind: AffixKind::Deadly,
                weight: 35,
                min_tier: 6,
                health_mult: 1.0,
                damage_mult: 1.20,
                elite_chance_mult: 1.10,
                boss_only: None,
                elite_only: false,
            },
        ];
        Self { defs }
    }

    /// Look up the definition backing an active affix.
    #[must_use]
    pub fn def(&self, kind: AffixKind) -> Option<&AffixDef> {
        self.defs.iter().find(|d| d.kind == kind)
    }

    /// Number of affix slots a run holds at `tier`.
    #[must_use]
    pub fn slots_for_tier(tier: u32) -> u32 {
        let extra = tier.saturating_sub(1) / AFFIX_SLOT_TIER_STEP;
        (AFFIX_SLOT_BASE + extra).min(AFFIX_SLOT_MAX)
    }

    /// Weighted selection of the active affix set for `tier`: filters by
    /// the minimum-tier gate, then draws distinct picks without
    /// replacement up to the tier's slot count.
    pub fn select_for_tier<R: Rng>(&self, tier: u32, rng: &mut R) -> Vec<AffixKind> {
        let mut eligible: Vec<&AffixDef> =
            self.defs.iter().filter(|d| d.min_tier <= tier).collect();
        let slots = Self::slots_for_tier(tier) as usize;
        let mut selected = Vec::with_capacity(slots.min(eligible.len()));

        while selected.len() < slots && !eligible.is_empty() {
            let total: u32 = eligible.iter().map(|d| d.weight.max(1)).sum();
            let roll = rng.gen_range(0..total);
            let mut current = 0;
            let mut chosen = 0;
            for (idx, def) in eligible.iter().enumerate() {
                current += def.weight.max(1);
                if roll < current {
                    chosen = idx;
                    break;
                }
            }
            selected.push(eligible.swap_remove(chosen).kind);
        }
        selected
    }
}
