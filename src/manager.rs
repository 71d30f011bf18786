//! Single-dungeon challenge orchestration.
//!
//! The manager owns the session registry, admission control, cooldowns,
//! the population flow (event hook plus tick fallback), and the death
//! hooks for normal sessions. Roguelike runs layer on top of it in
//! [`crate::lifecycle`].
use crate::catalog::{Catalog, DungeonInfo, pick_weighted_dungeon};
use crate::config::{ConfigError, EngineConfig};
use crate::constants::{
    LEVEL_BAND_SPREAD, PARTY_SIZE_MAX, POPULATE_FALLBACK_GRACE_MS, UPDATE_INTERVAL_MS,
};
use crate::events::RunEvent;
use crate::ids::{CreatureId, DifficultyId, InstanceId, MapId, PlayerId, RunId, SessionId, ThemeId};
use crate::leaderboard::{self, LeaderboardEntry};
use crate::registry::{RegistryError, SessionRegistry};
use crate::scaling::{self, SpawnParams};
use crate::session::{KillKind, Session, SessionMember, SessionState};
use crate::stats::{self, StatsRegistry};
use crate::world::{LeaderboardStore, PopulateError, Populator, WorldError, WorldOps};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use smallvec::SmallVec;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Refusals and failures for challenge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    #[error("the challenge system is disabled")]
    Disabled,
    #[error("roguelike mode is disabled")]
    RoguelikeDisabled,
    #[error("admission limit reached ({active}/{max} sessions active)")]
    TooManyActive { active: u32, max: u32 },
    #[error("player {player} must wait {remaining_secs}s before the next challenge")]
    OnCooldown {
        player: PlayerId,
        remaining_secs: u32,
    },
    #[error(transparent)]
    Busy(#[from] RegistryError),
    #[error("unknown difficulty {0}")]
    UnknownDifficulty(DifficultyId),
    #[error("unknown theme {0}")]
    UnknownTheme(ThemeId),
    #[error("unknown dungeon map {0}")]
    UnknownDungeon(MapId),
    #[error("level {level} does not meet the tier requirement of {required}")]
    LevelRequirement { required: u8, level: u8 },
    #[error("no eligible dungeon for the selected difficulty")]
    NoEligibleDungeon,
    #[error(transparent)]
    Teleport(#[from] WorldError),
    #[error(transparent)]
    Population(#[from] PopulateError),
    #[error("run {0} was not found")]
    RunNotFound(RunId),
    #[error("session {session} is not the active floor of run {run}")]
    SessionMismatch { run: RunId, session: SessionId },
    #[error("session {session} has not completed its floor of run {run}")]
    FloorNotCompleted { run: RunId, session: SessionId },
}

/// What a creature-death report amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// A kill was counted; the session continues.
    Counted(KillKind),
    /// The final boss fell; the session is complete. Run-bound sessions
    /// stay registered for the lifecycle to advance.
    SessionCompleted {
        session: SessionId,
        run: Option<RunId>,
    },
}

/// What a player-death report amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathOutcome {
    /// The member died but the roster still stands.
    MemberDown,
    /// The whole roster is down on a normal session; it has been failed
    /// and released.
    SessionWiped { session: SessionId },
    /// The whole roster is down on a run floor; the caller must route the
    /// wipe to the run lifecycle.
    RunWiped { run: RunId },
}

#[derive(Debug, Default)]
struct TickAccumulator {
    carry_ms: u64,
}

/// Orchestrates single-dungeon sessions against injected world
/// collaborators.
pub struct SessionManager<W, P, B>
where
    W: WorldOps,
    P: Populator,
    B: LeaderboardStore,
{
    config: EngineConfig,
    catalog: Catalog,
    world: W,
    populator: P,
    board: B,
    sessions: SessionRegistry,
    stats: StatsRegistry,
    cooldowns: Mutex<std::collections::HashMap<PlayerId, u32>>,
    rng: Mutex<SmallRng>,
    tick: Mutex<TickAccumulator>,
}

impl<W, P, B> SessionManager<W, P, B>
where
    W: WorldOps,
    P: Populator,
    B: LeaderboardStore,
{
    /// Construct the manager after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is out of bounds.
    pub fn new(
        config: EngineConfig,
        catalog: Catalog,
        world: W,
        populator: P,
        board: B,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            catalog,
            world,
            populator,
            board,
            sessions: SessionRegistry::new(),
            stats: StatsRegistry::new(),
            cooldowns: Mutex::new(std::collections::HashMap::new()),
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
            tick: Mutex::new(TickAccumulator::default()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn world(&self) -> &W {
        &self.world
    }

    pub(crate) fn registry(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub(crate) fn board(&self) -> &B {
        &self.board
    }

    pub(crate) fn stats_registry(&self) -> &StatsRegistry {
        &self.stats
    }

    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut SmallRng) -> T) -> T {
        f(&mut self.rng.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn cooldown_lock(&self) -> MutexGuard<'_, std::collections::HashMap<PlayerId, u32>> {
        self.cooldowns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- Admission ----

    /// Whether a new session may be admitted right now.
    #[must_use]
    pub fn can_create_new_session(&self) -> bool {
        self.config.enabled && self.sessions.active_count() < self.config.max_active_sessions
    }

    /// Remaining challenge cooldown for a player, in seconds.
    #[must_use]
    pub fn cooldown_remaining(&self, player: PlayerId) -> u32 {
        self.cooldown_lock().get(&player).copied().unwrap_or(0)
    }

    pub(crate) fn arm_cooldown(&self, player: PlayerId) {
        if self.config.cooldown_secs > 0 {
            self.cooldown_lock().insert(player, self.config.cooldown_secs);
        }
    }

    pub(crate) fn check_admission(&self, leader: PlayerId) -> Result<(), ChallengeError> {
        if !self.config.enabled {
            return Err(ChallengeError::Disabled);
        }
        let active = self.sessions.active_count();
        if active >= self.config.max_active_sessions {
            return Err(ChallengeError::TooManyActive {
                active,
                max: self.config.max_active_sessions,
            });
        }
        let remaining = self.cooldown_remaining(leader);
        if remaining > 0 {
            return Err(ChallengeError::OnCooldown {
                player: leader,
                remaining_secs: remaining,
            });
        }
        Ok(())
    }

    // ---- Queries ----

    #[must_use]
    pub fn session_by_player(&self, player: PlayerId) -> Option<SessionId> {
        self.sessions.find_by_player(player)
    }

    #[must_use]
    pub fn session_snapshot(&self, id: SessionId) -> Option<Session> {
        self.sessions.snapshot(id)
    }

    #[must_use]
    pub fn active_session_count(&self) -> u32 {
        self.sessions.active_count()
    }

    /// Highest level across the leader's party; the band a scaled
    /// challenge must hold up against.
    #[must_use]
    pub fn effective_party_level(&self, leader: PlayerId) -> u8 {
        self.world
            .party_members(leader)
            .into_iter()
            .map(|p| self.world.player_level(p))
            .max()
            .unwrap_or_else(|| self.world.player_level(leader))
    }

    #[must_use]
    pub fn normal_stats(&self, player: PlayerId) -> stats::PlayerStats {
        self.stats.normal_stats(player)
    }

    #[must_use]
    pub fn roguelike_stats(&self, player: PlayerId) -> stats::RoguelikeStats {
        self.stats.roguelike_stats(player)
    }

    /// Top fastest normal clears from persisted storage.
    ///
    /// # Errors
    ///
    /// Propagates the store's load error.
    pub fn fastest_clears(&self, limit: usize) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let entries = self.board.session_entries().map_err(anyhow::Error::new)?;
        Ok(leaderboard::top_sessions(&entries, limit))
    }

    // ---- Start flow ----

    /// Create and launch a single-dungeon challenge for the leader's
    /// party. `map = None` picks a random eligible dungeon. All-or-nothing:
    /// a teleport failure abandons the freshly created session.
    ///
    /// # Errors
    ///
    /// Returns a precondition refusal or the underlying world failure; in
    /// every error case the registries are left unchanged.
    pub fn start_challenge(
        &self,
        leader: PlayerId,
        difficulty: DifficultyId,
        theme: ThemeId,
        map: Option<MapId>,
        scale_to_party: bool,
    ) -> Result<SessionId, ChallengeError> {
        self.check_admission(leader)?;
        let (map, spawn) = self.resolve_challenge(leader, difficulty, theme, map, scale_to_party)?;
        let session =
            self.create_session(leader, difficulty, theme, map, scale_to_party, spawn, None)?;
        self.launch_session(session, map)?;
        info!("session {session}: challenge started on map {map} by player {leader}");
        Ok(session)
    }

    /// Validate catalog selections and derive spawn parameters for a
    /// normal session.
    fn resolve_challenge(
        &self,
        leader: PlayerId,
        difficulty: DifficultyId,
        theme: ThemeId,
        map: Option<MapId>,
        scale_to_party: bool,
    ) -> Result<(MapId, SpawnParams), ChallengeError> {
        let tier = self
            .catalog
            .difficulty(difficulty)
            .ok_or(ChallengeError::UnknownDifficulty(difficulty))?;
        let level = self.world.player_level(leader);
        if !tier.is_valid_for_level(level) {
            return Err(ChallengeError::LevelRequirement {
                required: tier.min_level,
                level,
            });
        }
        if self.catalog.theme(theme).is_none() {
            return Err(ChallengeError::UnknownTheme(theme));
        }
        let dungeon = self.resolve_dungeon(map, tier.min_level, tier.max_level)?;
        let (level_min, level_max) = if scale_to_party {
            band_around(self.effective_party_level(leader))
        } else {
            (dungeon.min_level, dungeon.max_level)
        };
        let map = dungeon.map_id;
        Ok((
            map,
            SpawnParams::normal(theme, level_min, level_max, scale_to_party),
        ))
    }

    fn resolve_dungeon(
        &self,
        map: Option<MapId>,
        min_level: u8,
        max_level: u8,
    ) -> Result<&DungeonInfo, ChallengeError> {
        match map {
            Some(map) => {
                let dungeon = self
                    .catalog
                    .dungeon(map)
                    .ok_or(ChallengeError::UnknownDungeon(map))?;
                if !dungeon.overlaps_band(min_level, max_level) {
                    return Err(ChallengeError::NoEligibleDungeon);
                }
                Ok(dungeon)
            }
            None => {
                let candidates = self.catalog.dungeons_for_band(min_level, max_level);
                self.with_rng(|rng| pick_weighted_dungeon(&candidates, rng))
                    .ok_or(ChallengeError::NoEligibleDungeon)
            }
        }
    }

    /// Register a session for the leader's party. Used by both the normal
    /// flow and the run lifecycle (which passes `run`).
    pub(crate) fn create_session(
        &self,
        leader: PlayerId,
        difficulty: DifficultyId,
        theme: ThemeId,
        map: MapId,
        scale_to_party: bool,
        spawn: SpawnParams,
        run: Option<RunId>,
    ) -> Result<SessionId, ChallengeError> {
        let roster = self.build_roster(leader);
        let players: Vec<PlayerId> = roster.iter().map(|m| m.player).collect();
        let id = self.sessions.register_with(&players, |id| {
            let mut session =
                Session::new(id, map, difficulty, theme, roster, scale_to_party, spawn);
            session.state = SessionState::Populating;
            session.run = run;
            session
        })?;
        Ok(id)
    }

    fn build_roster(&self, leader: PlayerId) -> SmallVec<[SessionMember; PARTY_SIZE_MAX]> {
        let mut members = self.world.party_members(leader);
        if members.is_empty() {
            members.push(leader);
        }
        members.truncate(PARTY_SIZE_MAX);
        members
            .into_iter()
            .map(|player| SessionMember {
                player,
                name: self.world.character_name(player),
                alive: true,
            })
            .collect()
    }

    /// Teleport the roster in and announce. Abandons the session on any
    /// teleport failure so no dangling registry entry survives.
    pub(crate) fn launch_session(
        &self,
        id: SessionId,
        map: MapId,
    ) -> Result<(), ChallengeError> {
        let (players, run) = self
            .sessions
            .with_session(id, |s| (s.player_ids(), s.run))
            .unwrap_or_default();
        for player in &players {
            if let Err(err) = self.world.teleport_to(*player, map) {
                warn!("session {id}: teleport failed ({err}); abandoning");
                self.abandon_session(id);
                return Err(err.into());
            }
        }
        for player in &players {
            if run.is_none() {
                self.stats.record_normal(*player, |s| s.total_runs += 1);
            }
            self.world.announce(
                *player,
                &RunEvent::ChallengeStarted {
                    session: id,
                    map,
                    party_size: players.len() as u32,
                },
            );
        }
        Ok(())
    }

    // ---- Population ----

    /// Fast-path population trigger from the map-enter hook. Guarded so a
    /// duplicate trigger (hook plus tick fallback) populates only once.
    /// Returns the run left without a floor when population fails on a
    /// run-bound session; the caller must end that run.
    pub fn on_map_enter(
        &self,
        player: PlayerId,
        map: MapId,
        instance: InstanceId,
    ) -> Option<RunId> {
        if !self.config.enabled {
            return None;
        }
        let claim = self.sessions.with_player_session(player, |session| {
            if session.state != SessionState::Populating
                || session.populated
                || session.map != map
            {
                return None;
            }
            // Claim before the external call so a racing trigger bails.
            session.populated = true;
            Some((session.id, session.spawn.clone()))
        });
        let Some(Some((session, spawn))) = claim else {
            return None;
        };
        debug!("session {session}: populating via map-enter (player {player}, map {map})");
        self.populate_session(session, map, instance, &spawn)
    }

    fn populate_session(
        &self,
        session: SessionId,
        map: MapId,
        instance: InstanceId,
        spawn: &SpawnParams,
    ) -> Option<RunId> {
        let players = self
            .sessions
            .with_session(session, |s| s.player_ids())
            .unwrap_or_default();
        self.announce_to(&players, &RunEvent::Preparing { session });

        match self.populator.populate(session, map, instance, spawn) {
            Ok(report) => {
                let populated = self.sessions.with_session(session, |s| {
                    s.record_population(instance, &report);
                    (s.total_mobs, s.total_bosses, s.level_min, s.level_max)
                });
                if let Some((mobs, bosses, level_min, level_max)) = populated {
                    info!(
                        "session {session}: populated with {mobs} mobs, {bosses} bosses on map {map}"
                    );
                    self.announce_to(
                        &players,
                        &RunEvent::Populated {
                            session,
                            mobs,
                            bosses,
                            level_min,
                            level_max,
                        },
                    );
                }
                None
            }
            Err(err) => {
                warn!("session {session}: population failed ({err}); abandoning");
                let run = self.sessions.with_session(session, |s| s.run).flatten();
                self.abandon_session(session);
                run
            }
        }
    }

    // ---- Death hooks ----

    /// Creature-death notification. Resolves the killer's session, counts
    /// the kill, and completes the session when its last boss falls.
    pub fn handle_creature_death(
        &self,
        killer: PlayerId,
        creature: CreatureId,
    ) -> Option<KillOutcome> {
        if !self.config.enabled {
            return None;
        }
        let counted = self.sessions.with_player_session(killer, |session| {
            if session.state != SessionState::InProgress {
                return None;
            }
            let kind = session.record_creature_death(creature)?;
            let done = session.all_bosses_down();
            if done {
                session.state = SessionState::Completed;
            }
            Some((session.id, session.run, kind, done, session.player_ids()))
        })??;

        let (session, run, kind, completed, players) = counted;
        if run.is_none() {
            for player in &players {
                self.stats.record_normal(*player, |s| match kind {
                    KillKind::Boss => s.bosses_killed += 1,
                    KillKind::Mob => s.mobs_killed += 1,
                });
            }
        }
        if !completed {
            return Some(KillOutcome::Counted(kind));
        }
        self.finish_completed_session(session, run, &players);
        Some(KillOutcome::SessionCompleted { session, run })
    }

    fn finish_completed_session(
        &self,
        session: SessionId,
        run: Option<RunId>,
        players: &[PlayerId],
    ) {
        let clear_secs = self
            .sessions
            .with_session(session, |s| s.elapsed_secs())
            .unwrap_or(0);
        info!("session {session}: completed in {clear_secs}s");
        if self.config.announce_completions {
            self.announce_to(players, &RunEvent::SessionCompleted {
                session,
                clear_secs,
            });
        }
        if run.is_some() {
            // Run floors stay registered; the lifecycle advances them.
            return;
        }
        for player in players {
            self.stats.record_normal(*player, |s| {
                s.completed_runs += 1;
                stats::note_clear_time(s, clear_secs);
            });
            self.arm_cooldown(*player);
        }
        if let Some(finished) = self.sessions.unregister(session) {
            self.append_session_entry(&finished, clear_secs);
        }
    }

    fn append_session_entry(&self, session: &Session, clear_secs: u32) {
        let Some(leader) = session.members.first() else {
            return;
        };
        let entry = LeaderboardEntry {
            player: leader.player,
            character: leader.name.clone(),
            map: session.map,
            difficulty: session.difficulty,
            clear_secs,
            party_size: session.members.len() as u32,
            scaled: session.scale_to_party,
        };
        if let Err(err) = self.board.append_session(&entry) {
            warn!("session {}: leaderboard append failed ({err})", session.id);
        }
    }

    /// Player-death notification. Marks the member down and fails normal
    /// sessions on a full wipe; run floors report the wipe upward.
    pub fn handle_player_death(&self, player: PlayerId) -> Option<DeathOutcome> {
        if !self.config.enabled {
            return None;
        }
        let wiped = self.sessions.with_player_session(player, |session| {
            if !session.state.is_active() {
                return None;
            }
            let all_down = session.mark_member_dead(player);
            Some((session.id, session.run, all_down))
        })??;

        let (session, run, all_down) = wiped;
        if let Some(run) = run {
            self.stats.record_roguelike(player, |s| s.deaths += 1);
            if all_down {
                return Some(DeathOutcome::RunWiped { run });
            }
            return Some(DeathOutcome::MemberDown);
        }
        self.stats.record_normal(player, |s| s.deaths += 1);
        if !all_down {
            return Some(DeathOutcome::MemberDown);
        }
        self.fail_session(session);
        Some(DeathOutcome::SessionWiped { session })
    }

    fn fail_session(&self, session: SessionId) {
        self.sessions
            .with_session(session, |s| s.state = SessionState::Failed);
        let Some(failed) = self.sessions.unregister(session) else {
            return;
        };
        info!("session {session}: party wiped");
        for member in &failed.members {
            self.stats.record_normal(member.player, |s| s.failed_runs += 1);
            self.arm_cooldown(member.player);
            self.world.teleport_out(member.player);
        }
        self.announce_to(
            &failed.player_ids(),
            &RunEvent::SessionFailed { session },
        );
    }

    /// Abandon a session without results: release the registry entry and
    /// return the party. Absent sessions are a no-op.
    pub fn abandon_session(&self, session: SessionId) -> bool {
        self.sessions
            .with_session(session, |s| s.state = SessionState::Abandoned);
        let Some(abandoned) = self.sessions.unregister(session) else {
            return false;
        };
        debug!("session {session}: abandoned");
        for member in &abandoned.members {
            self.world.teleport_out(member.player);
        }
        true
    }

    /// Release a run floor's registry entry without the normal-session
    /// bookkeeping; the lifecycle owns the run-level consequences.
    pub(crate) fn release_run_session(&self, session: SessionId) -> Option<Session> {
        self.sessions.unregister(session)
    }

    // ---- Damage scaling ----

    /// Damage-scaling query for non-session damage sources: attackers
    /// from the player's own session are exempt; anything else is
    /// level-scaled, capped, and floored.
    #[must_use]
    pub fn scale_incoming_damage(
        &self,
        player: PlayerId,
        attacker: Option<CreatureId>,
        damage: u32,
    ) -> u32 {
        if !self.config.enabled || damage == 0 {
            return damage;
        }
        let context = self.sessions.with_player_session(player, |session| {
            let own = attacker.is_some_and(|a| session.owns_creature(a));
            (own, session.scale_to_party, session.map)
        });
        let Some((own_creature, scale_to_party, map)) = context else {
            return damage;
        };
        if own_creature {
            return damage;
        }
        let scale = if scale_to_party {
            let Some(dungeon) = self.catalog.dungeon(map) else {
                return damage;
            };
            scaling::environmental_damage_scale(
                self.effective_party_level(player),
                dungeon.min_level,
                dungeon.max_level,
            )
        } else {
            1.0
        };
        scaling::clamp_environmental_damage(damage, scale, self.world.max_health(player))
    }

    // ---- Periodic sweep ----

    /// Advance engine time. Accumulates against the fixed 1000 ms
    /// interval and sweeps once per elapsed interval: session time
    /// accrual, cooldown expiry, and fallback population. Returns the
    /// runs whose floor was abandoned during the sweep; the caller must
    /// end them.
    pub fn update(&self, diff_ms: u64) -> Vec<RunId> {
        let intervals = {
            let mut tick = self.tick.lock().unwrap_or_else(PoisonError::into_inner);
            tick.carry_ms += diff_ms;
            let intervals = tick.carry_ms / u64::from(UPDATE_INTERVAL_MS);
            tick.carry_ms %= u64::from(UPDATE_INTERVAL_MS);
            intervals
        };
        let mut stranded = Vec::new();
        for _ in 0..intervals {
            stranded.extend(self.sweep_once());
        }
        stranded
    }

    fn sweep_once(&self) -> Vec<RunId> {
        let mut stranded = Vec::new();
        {
            let mut cooldowns = self.cooldown_lock();
            cooldowns.retain(|_, remaining| {
                *remaining = remaining.saturating_sub(1);
                *remaining > 0
            });
        }
        for id in self.sessions.ids() {
            let pending = self.sessions.with_session(id, |session| {
                session.elapsed_ms += u64::from(UPDATE_INTERVAL_MS);
                let needs_populate = session.state == SessionState::Populating
                    && !session.populated
                    && session.elapsed_ms >= POPULATE_FALLBACK_GRACE_MS;
                if needs_populate {
                    session.populated = true; // claim, as in on_map_enter
                    Some((session.map, session.spawn.clone(), session.player_ids()))
                } else {
                    None
                }
            });
            if let Some(Some((map, spawn, players))) = pending {
                stranded.extend(self.fallback_populate(id, map, &spawn, &players));
            }
        }
        stranded
    }

    /// Tick fallback for sessions whose map-enter hook never fired; the
    /// instance is resolved through whichever member already landed.
    fn fallback_populate(
        &self,
        session: SessionId,
        map: MapId,
        spawn: &SpawnParams,
        players: &[PlayerId],
    ) -> Option<RunId> {
        let instance = players
            .iter()
            .find_map(|p| self.world.instance_of(*p, map));
        match instance {
            Some(instance) => {
                debug!("session {session}: fallback population on map {map}");
                self.populate_session(session, map, instance, spawn)
            }
            None => {
                warn!("session {session}: no member reached map {map}; abandoning");
                let run = self.sessions.with_session(session, |s| s.run).flatten();
                self.abandon_session(session);
                run
            }
        }
    }

    pub(crate) fn announce_to(&self, players: &[PlayerId], event: &RunEvent) {
        for player in players {
            self.world.announce(*player, event);
        }
    }
}

pub(crate) const fn band_around(level: u8) -> (u8, u8) {
    (
        level.saturating_sub(LEVEL_BAND_SPREAD),
        level.saturating_add(LEVEL_BAND_SPREAD),
    )
}
