//! Engine configuration with bounds validation.
use crate::constants::{DEFAULT_COOLDOWN_SECS, DEFAULT_MAX_ACTIVE_SESSIONS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host-supplied engine settings. Loading from disk is the host's concern;
/// the engine only validates and reads these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Master switch; when false every entry point refuses.
    pub enabled: bool,
    /// Whether chained roguelike runs may be started.
    pub roguelike_enabled: bool,
    /// Admission limit across concurrent sessions (runs count through
    /// their active session).
    pub max_active_sessions: u32,
    /// Per-player cooldown after a terminal session, in seconds.
    pub cooldown_secs: u32,
    /// Whether completion announcements are broadcast to the party.
    pub announce_completions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            roguelike_enabled: true,
            max_active_sessions: DEFAULT_MAX_ACTIVE_SESSIONS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            announce_completions: true,
        }
    }
}

/// Validation failures for [`EngineConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_active_sessions must be at least 1 (got {value})")]
    AdmissionLimitZero { value: u32 },
    #[error("cooldown_secs must not exceed {max} (got {value})")]
    CooldownTooLong { max: u32, value: u32 },
}

impl EngineConfig {
    /// Upper bound accepted for the cooldown, one day.
    pub const COOLDOWN_SECS_MAX: u32 = 86_400;

    /// Validate field bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active_sessions == 0 {
            return Err(ConfigError::AdmissionLimitZero {
                value: self.max_active_sessions,
            });
        }
        if self.cooldown_secs > Self::COOLDOWN_SECS_MAX {
            return Err(ConfigError::CooldownTooLong {
                max: Self::COOLDOWN_SECS_MAX,
                value: self.cooldown_secs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_admission_limit_is_rejected() {
        let cfg = EngineConfig {
            max_active_sessions: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::AdmissionLimitZero { value: 0 })
        );
    }

    #[test]
    fn oversized_cooldown_is_rejected() {
        let cfg = EngineConfig {
            cooldown_secs: EngineConfig::COOLDOWN_SECS_MAX + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CooldownTooLong { .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"cooldown_secs": 60}"#).unwrap();
        assert_eq!(cfg.cooldown_secs, 60);
        assert!(cfg.enabled);
        assert_eq!(cfg.max_active_sessions, 20);
    }
}
