//! Difficulty, theme, and dungeon catalog records.
//!
//! The catalog is loaded by the host (configuration I/O is external) and
//! handed to the engine at construction; lookups are read-only after that.
use crate::ids::{DifficultyId, MapId, ThemeId};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A selectable difficulty tier with its level band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyTier {
    pub id: DifficultyId,
    pub name: String,
    pub min_level: u8,
    pub max_level: u8,
}

impl DifficultyTier {
    /// Whether a character of `level` is allowed to attempt this tier.
    #[must_use]
    pub const fn is_valid_for_level(&self, level: u8) -> bool {
        level >= self.min_level
    }

    /// Whether the tier is a full-strength challenge for `level` rather
    /// than trivially under-leveled content.
    #[must_use]
    pub const fn is_on_level_for(&self, level: u8) -> bool {
        level >= self.min_level && level <= self.max_level
    }
}

/// A creature theme applied when populating an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    pub name: String,
}

/// One dungeon map entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonInfo {
    pub map_id: MapId,
    pub name: String,
    pub min_level: u8,
    pub max_level: u8,
    /// Relative selection weight for random picks.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

const fn default_weight() -> u32 {
    10
}

impl DungeonInfo {
    /// Whether this dungeon's band overlaps the given level range.
    #[must_use]
    pub const fn overlaps_band(&self, min_level: u8, max_level: u8) -> bool {
        self.min_level <= max_level && self.max_level >= min_level
    }
}

/// Complete catalog of difficulties, themes, and dungeons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub difficulties: Vec<DifficultyTier>,
    pub themes: Vec<Theme>,
    pub dungeons: Vec<DungeonInfo>,
}

impl Catalog {
    /// Parse a catalog from its JSON asset form.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error when the document does not match the
    /// catalog shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn difficulty(&self, id: DifficultyId) -> Option<&DifficultyTier> {
        self.difficulties.iter().find(|d| d.id == id)
    }

    #[must_use]
    pub fn theme(&self, id: ThemeId) -> Option<&Theme> {
        self.themes.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn dungeon(&self, map_id: MapId) -> Option<&DungeonInfo> {
        self.dungeons.iter().find(|d| d.map_id == map_id)
    }

    /// All dungeons whose level band overlaps `[min_level, max_level]`.
    #[must_use]
    pub fn dungeons_for_band(&self, min_level: u8, max_level: u8) -> Vec<&DungeonInfo> {
        self.dungeons
            .iter()
            .filter(|d| d.overlaps_band(min_level, max_level))
            .collect()
    }
}

/// Weighted random pick among candidate dungeons.
pub fn pick_weighted_dungeon<'a, R: Rng>(
    candidates: &[&'a DungeonInfo],
    rng: &mut R,
) -> Option<&'a DungeonInfo> {
    let total: u32 = candidates.iter().map(|d| d.weight.max(1)).sum();
    if total == 0 {
        return None;
    }
    let roll = rng.gen_range(0..total);
    let mut current = 0;
    for dungeon in candidates {
        current += dungeon.weight.max(1);
        if roll < current {
            return Some(dungeon);
        }
    }
    candidates.first().copied()
}
