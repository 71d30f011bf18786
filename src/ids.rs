//! Newtype identifiers shared across the engine.
//!
//! Every cross-referenced index in the registries is keyed by one of these
//! types; keeping them distinct prevents a session id from ever being used
//! where a run id is expected.
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $inner:ty) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Stable identifier of a player character.
    PlayerId,
    u64
);
id_type!(
    /// Identifier of a single instanced dungeon attempt.
    SessionId,
    u32
);
id_type!(
    /// Identifier of a chained roguelike run.
    RunId,
    u32
);
id_type!(
    /// Identifier of a dungeon map in the catalog.
    MapId,
    u32
);
id_type!(
    /// Identifier of a resolved instance of a map.
    InstanceId,
    u32
);
id_type!(
    /// Identifier of a spawned creature inside an instance.
    CreatureId,
    u64
);
id_type!(
    /// Identifier of a difficulty tier in the catalog.
    DifficultyId,
    u32
);
id_type!(
    /// Identifier of a creature theme in the catalog.
    ThemeId,
    u32
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_their_inner_value() {
        assert_eq!(RunId(7).to_string(), "7");
        assert_eq!(PlayerId(42).to_string(), "42");
    }

    #[test]
    fn ids_round_trip_through_serde_transparently() {
        let id: SessionId = serde_json::from_str("3").unwrap();
        assert_eq!(id, SessionId(3));
        assert_eq!(serde_json::to_string(&MapId(36)).unwrap(), "36");
    }
}
