//! A single instanced dungeon attempt.
use crate::constants::PARTY_SIZE_MAX;
use crate::ids::{CreatureId, DifficultyId, InstanceId, MapId, PlayerId, RunId, SessionId, ThemeId};
use crate::scaling::SpawnParams;
use crate::world::PopulationReport;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created and registered, teleports not yet issued.
    Created,
    /// Party is being moved in; instance not yet populated.
    Populating,
    /// Populated and live.
    InProgress,
    Completed,
    Failed,
    Abandoned,
}

impl SessionState {
    /// Whether the session still occupies an admission slot.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }

    /// Whether gameplay hooks (deaths, kills) apply.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Populating | Self::InProgress)
    }
}

/// One rostered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMember {
    pub player: PlayerId,
    pub name: String,
    pub alive: bool,
}

/// Roster storage; parties never exceed five members.
pub type Roster = SmallVec<[SessionMember; PARTY_SIZE_MAX]>;

/// The outcome classification for a creature kill inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillKind {
    Mob,
    Boss,
}

/// One instanced dungeon attempt bound to a party.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Set when the session is a floor of a roguelike run.
    pub run: Option<RunId>,
    pub map: MapId,
    pub difficulty: DifficultyId,
    pub theme: ThemeId,
    pub state: SessionState,
    pub instance: Option<InstanceId>,
    pub members: Roster,
    pub scale_to_party: bool,
    pub spawn: SpawnParams,
    pub total_mobs: u32,
    pub total_bosses: u32,
    pub mobs_killed: u32,
    pub bosses_killed: u32,
    pub level_min: u8,
    pub level_max: u8,
    /// Set once a population report lands, even if it carried zero trash
    /// mobs; guards against duplicate population triggers.
    pub populated: bool,
    /// Engine-time milliseconds accrued by the periodic sweep.
    pub elapsed_ms: u64,
    mob_ids: HashSet<CreatureId>,
    boss_ids: HashSet<CreatureId>,
}

impl Session {
    #[must_use]
    pub fn new(
        id: SessionId,
        map: MapId,
        difficulty: DifficultyId,
        theme: ThemeId,
        members: Roster,
        scale_to_party: bool,
        spawn: SpawnParams,
    ) -> Self {
        Self {
            id,
            run: None,
            map,
            difficulty,
            theme,
            state: SessionState::Created,
            instance: None,
            members,
            scale_to_party,
            spawn,
            total_mobs: 0,
            total_bosses: 0,
            mobs_killed: 0,
            bosses_killed: 0,
            level_min: 0,
            level_max: 0,
            populated: false,
            elapsed_ms: 0,
            mob_ids: HashSet::new(),
            boss_ids: HashSet::new(),
        }
    }

    /// Player ids of the whole roster.
    #[must_use]
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|m| m.player).collect()
    }

    #[must_use]
    pub fn has_member(&self, player: PlayerId) -> bool {
        self.members.iter().any(|m| m.player == player)
    }

    /// Record the population report and move to `InProgress`.
    pub fn record_population(&mut self, instance: InstanceId, report: &PopulationReport) {
        self.instance = Some(instance);
        self.total_mobs = report.mobs.len() as u32;
        self.total_bosses = report.bosses.len() as u32;
        self.level_min = report.level_min;
        self.level_max = report.level_max;
        self.mob_ids = report.mobs.iter().copied().collect();
        self.boss_ids = report.bosses.iter().copied().collect();
        self.populated = true;
        self.state = SessionState::InProgress;
    }

    /// Whether a creature was spawned into this session.
    #[must_use]
    pub fn owns_creature(&self, creature: CreatureId) -> bool {
        self.mob_ids.contains(&creature) || self.boss_ids.contains(&creature)
    }

    /// Count a session-creature kill; `None` for foreign creatures or
    /// repeated reports for the same creature.
    pub fn record_creature_death(&mut self, creature: CreatureId) -> Option<KillKind> {
        if self.boss_ids.remove(&creature) {
            self.bosses_killed += 1;
            return Some(KillKind::Boss);
        }
        if self.mob_ids.remove(&creature) {
            self.mobs_killed += 1;
            return Some(KillKind::Mob);
        }
        None
    }

    /// Whether every boss spawned for this session is dead.
    #[must_use]
    pub const fn all_bosses_down(&self) -> bool {
        self.total_bosses > 0 && self.bosses_killed >= self.total_bosses
    }

    /// Mark a member dead; returns true when the whole roster is down.
    pub fn mark_member_dead(&mut self, player: PlayerId) -> bool {
        if let Some(member) = self.members.iter_mut().find(|m| m.player == player) {
            member.alive = false;
        }
        self.members.iter().all(|m| !m.alive)
    }

    #[must_use]
    pub const fn elapsed_secs(&self) -> u32 {
        (self.elapsed_ms / 1_000) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn member(id: u64) -> SessionMember {
        SessionMember {
            player: PlayerId(id),
            name: format!("Char{id}"),
            alive: true,
        }
    }

    fn session() -> Session {
        Session::new(
            SessionId(1),
            MapId(36),
            DifficultyId(1),
            ThemeId(1),
            smallvec![member(10), member(11)],
            true,
            SpawnParams::normal(ThemeId(1), 15, 21, true),
        )
    }

    #[test]
    fn population_report_flips_state_and_counts() {
        let mut s = session();
        s.state = SessionState::Populating;
        let report = PopulationReport {
            mobs: vec![CreatureId(100), CreatureId(101)],
            bosses: vec![CreatureId(200)],
            level_min: 16,
            level_max: 20,
        };
        s.record_population(InstanceId(7), &report);
        assert_eq!(s.state, SessionState::InProgress);
        assert_eq!((s.total_mobs, s.total_bosses), (2, 1));
        assert!(s.populated);
        assert!(s.owns_creature(CreatureId(200)));
        assert!(!s.owns_creature(CreatureId(999)));
    }

    #[test]
    fn boss_kills_complete_the_count_once() {
        let mut s = session();
        s.record_population(
            InstanceId(7),
            &PopulationReport {
                mobs: vec![CreatureId(100)],
                bosses: vec![CreatureId(200)],
                level_min: 16,
                level_max: 20,
            },
        );
        assert_eq!(s.record_creature_death(CreatureId(200)), Some(KillKind::Boss));
        assert!(s.all_bosses_down());
        // Duplicate death report is ignored.
        assert_eq!(s.record_creature_death(CreatureId(200)), None);
        assert_eq!(s.bosses_killed, 1);
    }

    #[test]
    fn wipe_requires_every_member_down() {
        let mut s = session();
        assert!(!s.mark_member_dead(PlayerId(10)));
        assert!(s.mark_member_dead(PlayerId(11)));
    }

    #[test]
    fn zero_mob_report_still_counts_as_populated() {
        let mut s = session();
        s.record_population(
            InstanceId(7),
            &PopulationReport {
                mobs: vec![],
                bosses: vec![CreatureId(200)],
                level_min: 16,
                level_max: 20,
            },
        );
        assert!(s.populated);
        assert_eq!(s.total_mobs, 0);
    }
}
