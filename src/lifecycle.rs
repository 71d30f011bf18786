//! Roguelike run lifecycle: chained floors on top of the session
//! manager, with tier escalation, affixes, and the run buff.
use crate::affix::AffixPool;
use crate::catalog::pick_weighted_dungeon;
use crate::constants::{
    BUFF_PCT_PER_STACK, PARTY_SIZE_MAX, TRANSITION_COUNTDOWN_SECS, UPDATE_INTERVAL_MS,
};
use crate::events::RunEvent;
use crate::ids::{CreatureId, DifficultyId, InstanceId, MapId, PlayerId, RunId, SessionId, ThemeId};
use crate::leaderboard::{self, RunLeaderboardEntry, RunRanking};
use crate::manager::{self, ChallengeError, DeathOutcome, KillOutcome, SessionManager};
use crate::registry::RunRegistry;
use crate::run::{Countdown, EndReason, Run};
use crate::scaling::SpawnParams;
use crate::session::SessionState;
use crate::world::{LeaderboardStore, Populator, WorldOps};
use log::{info, warn};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, PoisonError};

/// Orchestrates roguelike runs. Owns the run registry; floors are
/// ordinary sessions delegated to the [`SessionManager`].
pub struct RunLifecycle<W, P, B>
where
    W: WorldOps,
    P: Populator,
    B: LeaderboardStore,
{
    manager: Arc<SessionManager<W, P, B>>,
    runs: RunRegistry,
    affixes: AffixPool,
    carry_ms: Mutex<u64>,
}

impl<W, P, B> RunLifecycle<W, P, B>
where
    W: WorldOps,
    P: Populator,
    B: LeaderboardStore,
{
    #[must_use]
    pub fn new(manager: Arc<SessionManager<W, P, B>>) -> Self {
        Self {
            manager,
            runs: RunRegistry::new(),
            affixes: AffixPool::standard(),
            carry_ms: Mutex::new(0),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &SessionManager<W, P, B> {
        &self.manager
    }

    #[must_use]
    pub fn run_by_player(&self, player: PlayerId) -> Option<RunId> {
        self.runs.find_by_player(player)
    }

    #[must_use]
    pub fn run_snapshot(&self, id: RunId) -> Option<Run> {
        self.runs.snapshot(id)
    }

    #[must_use]
    pub fn active_run_count(&self) -> u32 {
        self.runs.active_count()
    }

    /// Top finished runs from persisted storage.
    ///
    /// # Errors
    ///
    /// Propagates the store's load error.
    pub fn top_runs(
        &self,
        ranking: RunRanking,
        limit: usize,
    ) -> anyhow::Result<Vec<RunLeaderboardEntry>> {
        let entries = self
            .manager
            .board()
            .run_entries()
            .map_err(anyhow::Error::new)?;
        Ok(leaderboard::top_runs(&entries, limit, ranking))
    }

    // ---- Start ----

    /// Start a roguelike run for the leader's party on floor one.
    /// All-or-nothing across both registries: any failure unwinds the
    /// session and the run record before returning.
    ///
    /// # Errors
    ///
    /// Returns a precondition refusal or the underlying world failure.
    pub fn start_run(
        &self,
        leader: PlayerId,
        difficulty: DifficultyId,
        theme: ThemeId,
        scale_to_party: bool,
    ) -> Result<RunId, ChallengeError> {
        if !self.manager.config().roguelike_enabled {
            return Err(ChallengeError::RoguelikeDisabled);
        }
        self.manager.check_admission(leader)?;
        let (map, spawn) = self.resolve_floor(leader, difficulty, theme, scale_to_party, 1, None)?;

        let session = self
            .manager
            .create_session(leader, difficulty, theme, map, scale_to_party, spawn, None)?;
        let members: SmallVec<[PlayerId; PARTY_SIZE_MAX]> = self
            .manager
            .registry()
            .with_session(session, |s| s.player_ids())
            .unwrap_or_default()
            .into_iter()
            .collect();

        let run = match self.runs.register_with(&members, session, |id| {
            let mut run = Run::new(
                id,
                leader,
                members.clone(),
                difficulty,
                theme,
                scale_to_party,
                session,
            );
            run.affixes = self
                .manager
                .with_rng(|rng| self.affixes.select_for_tier(1, rng));
            run
        }) {
            Ok(run) => run,
            Err(err) => {
                self.manager.abandon_session(session);
                return Err(err.into());
            }
        };
        self.manager
            .registry()
            .with_session(session, |s| s.run = Some(run));

        if let Err(err) = self.manager.launch_session(session, map) {
            // launch_session already abandoned the session
            self.runs.unregister(run);
            return Err(err);
        }
        for player in &members {
            self.manager
                .stats_registry()
                .record_roguelike(*player, |s| s.total_runs += 1);
        }
        self.manager.announce_to(
            &members,
            &RunEvent::RunStarted {
                run,
                map,
                tier: 1,
            },
        );
        info!("run {run}: started on map {map} by player {leader}");
        Ok(run)
    }

    /// Validate selections and derive the map plus spawn parameters for
    /// one floor. `exclude` drops the just-cleared map from the draw when
    /// another candidate exists.
    fn resolve_floor(
        &self,
        leader: PlayerId,
        difficulty: DifficultyId,
        theme: ThemeId,
        scale_to_party: bool,
        tier: u32,
        exclude: Option<MapId>,
    ) -> Result<(MapId, SpawnParams), ChallengeError> {
        let catalog = self.manager.catalog();
        let band = catalog
            .difficulty(difficulty)
            .ok_or(ChallengeError::UnknownDifficulty(difficulty))?;
        let level = self.manager.world().player_level(leader);
        if !band.is_valid_for_level(level) {
            return Err(ChallengeError::LevelRequirement {
                required: band.min_level,
                level,
            });
        }
        if catalog.theme(theme).is_none() {
            return Err(ChallengeError::UnknownTheme(theme));
        }
        let mut candidates = catalog.dungeons_for_band(band.min_level, band.max_level);
        if let Some(exclude) = exclude {
            if candidates.len() > 1 {
                candidates.retain(|d| d.map_id != exclude);
            }
        }
        let dungeon = self
            .manager
            .with_rng(|rng| pick_weighted_dungeon(&candidates, rng))
            .ok_or(ChallengeError::NoEligibleDungeon)?;
        let (level_min, level_max) = if scale_to_party {
            manager::band_around(self.manager.effective_party_level(leader))
        } else {
            (dungeon.min_level, dungeon.max_level)
        };
        Ok((
            dungeon.map_id,
            SpawnParams::for_tier(theme, level_min, level_max, scale_to_party, tier),
        ))
    }

    // ---- World hooks ----

    /// Map-enter facade. Delegates population to the manager; when a
    /// run floor fails to populate the whole run ends, with results.
    pub fn on_map_enter(&self, player: PlayerId, map: MapId, instance: InstanceId) {
        if let Some(run) = self.manager.on_map_enter(player, map, instance) {
            warn!("run {run}: floor population failed; ending run");
            self.end_run(run, EndReason::TransitionFailed);
        }
    }

    // ---- Death routing ----

    /// Creature-death facade: counts the kill through the manager and
    /// advances the run when the kill completed a floor.
    pub fn handle_creature_death(&self, killer: PlayerId, creature: CreatureId) {
        match self.manager.handle_creature_death(killer, creature) {
            Some(KillOutcome::SessionCompleted {
                session,
                run: Some(run),
            }) => {
                if let Err(err) = self.on_dungeon_completed(run, session) {
                    warn!("run {run}: floor advance failed ({err})");
                }
            }
            Some(KillOutcome::SessionCompleted { .. } | KillOutcome::Counted(_)) | None => {}
        }
    }

    /// Player-death facade: routes full wipes on run floors to
    /// [`Self::on_party_wipe`].
    pub fn handle_player_death(&self, player: PlayerId) {
        if let Some(DeathOutcome::RunWiped { run }) = self.manager.handle_player_death(player) {
            self.on_party_wipe(run);
        }
    }

    // ---- Floor advance ----

    /// Advance a run whose active floor just completed: escalate the
    /// tier, refresh affixes and the run buff, and move the party to the
    /// next dungeon. A failed transition ends the run with results.
    ///
    /// # Errors
    ///
    /// Returns [`ChallengeError::RunNotFound`] or
    /// [`ChallengeError::SessionMismatch`] when the completion does not
    /// match the run's active floor, and
    /// [`ChallengeError::FloorNotCompleted`] when the floor's bosses are
    /// still up.
    pub fn on_dungeon_completed(
        &self,
        run: RunId,
        session: SessionId,
    ) -> Result<(), ChallengeError> {
        let matches = self
            .runs
            .with_run(run, |r| r.active_session == session)
            .ok_or(ChallengeError::RunNotFound(run))?;
        if !matches {
            return Err(ChallengeError::SessionMismatch { run, session });
        }
        let floor_done = self
            .manager
            .registry()
            .with_session(session, |s| s.state == SessionState::Completed)
            .unwrap_or(false);
        if !floor_done {
            return Err(ChallengeError::FloorNotCompleted { run, session });
        }
        let advanced = self
            .runs
            .with_run(run, |r| {
                if r.active_session != session {
                    return None;
                }
                r.advance_floor();
                r.affixes = self
                    .manager
                    .with_rng(|rng| self.affixes.select_for_tier(r.tier, rng));
                Some((r.tier, r.floors_cleared, r.buff_stacks, r.members.clone()))
            })
            .ok_or(ChallengeError::RunNotFound(run))?
            .ok_or(ChallengeError::SessionMismatch { run, session })?;

        let (tier, floors_cleared, buff_stacks, members) = advanced;
        self.absorb_floor_kills(run, session);
        for player in &members {
            self.manager.stats_registry().record_roguelike(*player, |s| {
                s.total_floors += 1;
                s.most_floors = s.most_floors.max(floors_cleared);
                s.highest_tier = s.highest_tier.max(tier);
            });
        }
        info!("run {run}: floor {floors_cleared} cleared, advancing to tier {tier}");
        self.manager.announce_to(
            &members,
            &RunEvent::FloorCleared {
                run,
                tier,
                floors_cleared,
                buff_stacks,
            },
        );
        for player in &members {
            let world = self.manager.world();
            world.remove_run_buff(*player);
            world.apply_run_buff(*player, buff_stacks, buff_stacks as f32 * BUFF_PCT_PER_STACK);
        }
        self.transition_to_next_dungeon(run, session)
    }

    /// Fold the completed floor's kill counters into the run record and
    /// the roster's roguelike stats.
    fn absorb_floor_kills(&self, run: RunId, session: SessionId) {
        let Some(counts) = self
            .manager
            .registry()
            .with_session(session, |s| (s.mobs_killed, s.bosses_killed, s.player_ids()))
        else {
            return;
        };
        let (mobs, bosses, players) = counts;
        self.runs
            .with_run(run, |r| r.total_kills += mobs + bosses);
        for player in players {
            self.manager.stats_registry().record_roguelike(player, |s| {
                s.mobs_killed += mobs;
                s.bosses_killed += bosses;
            });
        }
    }

    /// Release the cleared floor, draw the next dungeon, and move the
    /// party. Any failure ends the run as [`EndReason::TransitionFailed`],
    /// which still announces and records results.
    fn transition_to_next_dungeon(
        &self,
        run: RunId,
        cleared: SessionId,
    ) -> Result<(), ChallengeError> {
        let Some(old) = self.manager.release_run_session(cleared) else {
            return Err(ChallengeError::SessionMismatch {
                run,
                session: cleared,
            });
        };
        let Some(record) = self.runs.snapshot(run) else {
            return Err(ChallengeError::RunNotFound(run));
        };

        let next = self
            .resolve_floor(
                record.leader,
                record.difficulty,
                record.theme,
                record.scale_to_party,
                record.tier,
                Some(old.map),
            )
            .and_then(|(map, spawn)| {
                let session = self.manager.create_session(
                    record.leader,
                    record.difficulty,
                    record.theme,
                    map,
                    record.scale_to_party,
                    spawn,
                    Some(run),
                )?;
                Ok((map, session))
            });
        let (map, session) = match next {
            Ok(next) => next,
            Err(err) => {
                warn!("run {run}: no next floor ({err}); ending run");
                self.end_run(run, EndReason::TransitionFailed);
                return Err(err);
            }
        };

        self.runs.reassign_session(run, session);
        self.runs.with_run(run, |r| {
            r.countdown = Some(Countdown {
                seconds_remaining: TRANSITION_COUNTDOWN_SECS,
                next_map: map,
            });
        });
        if let Err(err) = self.manager.launch_session(session, map) {
            // launch_session already abandoned the new session
            self.end_run(run, EndReason::TransitionFailed);
            return Err(err);
        }
        self.manager.announce_to(
            &record.members,
            &RunEvent::RunStarted {
                run,
                map,
                tier: record.tier,
            },
        );
        Ok(())
    }

    // ---- Endings ----

    /// End a run because its whole roster died on the active floor.
    pub fn on_party_wipe(&self, run: RunId) {
        self.end_run(run, EndReason::Wiped);
    }

    /// Player-facing quit. Resolves the player's run; players without one
    /// are a no-op. Ends the run for the whole party, with results.
    pub fn quit_run(&self, player: PlayerId) -> bool {
        let Some(run) = self.runs.find_by_player(player) else {
            return false;
        };
        self.end_run(run, EndReason::Quit);
        true
    }

    /// Administrative teardown without results or leaderboard entry.
    pub fn abandon_run(&self, run: RunId) -> bool {
        self.end_run(run, EndReason::Abandoned)
    }

    /// Tear a run down: release both registry entries, strip buffs,
    /// return the party, and record results when `reason` warrants them.
    /// Idempotent; ending an already-ended run is a no-op.
    pub fn end_run(&self, run: RunId, reason: EndReason) -> bool {
        let Some(mut record) = self.runs.unregister(run) else {
            return false;
        };
        if let Some(floor) = self.manager.release_run_session(record.active_session) {
            // Partial-floor kills still count toward the run total.
            record.total_kills += floor.mobs_killed + floor.bosses_killed;
            for player in floor.player_ids() {
                self.manager.stats_registry().record_roguelike(player, |s| {
                    s.mobs_killed += floor.mobs_killed;
                    s.bosses_killed += floor.bosses_killed;
                });
            }
        }
        let duration_secs = record.elapsed_secs();
        info!(
            "run {run}: ended ({reason:?}) at tier {} with {} floors cleared",
            record.tier, record.floors_cleared
        );
        for player in &record.members {
            let world = self.manager.world();
            world.remove_run_buff(*player);
            world.teleport_out(*player);
            self.manager.stats_registry().record_roguelike(*player, |s| {
                s.highest_tier = s.highest_tier.max(record.tier);
                s.most_floors = s.most_floors.max(record.floors_cleared);
                s.longest_run_secs = s.longest_run_secs.max(duration_secs);
            });
            if reason.announces_results() {
                self.manager.arm_cooldown(*player);
            }
        }
        if reason.announces_results() {
            self.manager.announce_to(
                &record.members,
                &RunEvent::RunEnded {
                    run,
                    reason,
                    tier: record.tier,
                    floors_cleared: record.floors_cleared,
                    duration_secs,
                    total_kills: record.total_kills,
                },
            );
            self.append_run_entry(&record, duration_secs);
        }
        true
    }

    fn append_run_entry(&self, record: &Run, duration_secs: u32) {
        let entry = RunLeaderboardEntry {
            player: record.leader,
            character: self.manager.world().character_name(record.leader),
            tier_reached: record.tier,
            floors_cleared: record.floors_cleared,
            duration_secs,
            total_kills: record.total_kills,
            party_size: record.members.len() as u32,
            scaled: record.scale_to_party,
        };
        if let Err(err) = self.manager.board().append_run(&entry) {
            warn!("run {}: leaderboard append failed ({err})", record.id);
        }
    }

    // ---- Damage scaling ----

    /// Damage-scaling passthrough; run floors share the session rules.
    #[must_use]
    pub fn scale_incoming_damage(
        &self,
        player: PlayerId,
        attacker: Option<CreatureId>,
        damage: u32,
    ) -> u32 {
        self.manager.scale_incoming_damage(player, attacker, damage)
    }

    // ---- Periodic sweep ----

    /// Advance engine time for the whole subsystem: the manager's session
    /// sweep plus run time accrual and countdown announcements.
    pub fn update(&self, diff_ms: u64) {
        for run in self.manager.update(diff_ms) {
            warn!("run {run}: active floor lost during sweep; ending run");
            self.end_run(run, EndReason::TransitionFailed);
        }
        let intervals = {
            let mut carry = self.carry_ms.lock().unwrap_or_else(PoisonError::into_inner);
            *carry += diff_ms;
            let intervals = *carry / u64::from(UPDATE_INTERVAL_MS);
            *carry %= u64::from(UPDATE_INTERVAL_MS);
            intervals
        };
        for _ in 0..intervals {
            self.sweep_once();
        }
    }

    fn sweep_once(&self) {
        for id in self.runs.ids() {
            let ticked = self.runs.with_run(id, |r| {
                r.elapsed_ms += u64::from(UPDATE_INTERVAL_MS);
                let Some(countdown) = r.countdown.as_mut() else {
                    return None;
                };
                countdown.seconds_remaining = countdown.seconds_remaining.saturating_sub(1);
                let out = *countdown;
                if out.seconds_remaining == 0 {
                    r.countdown = None;
                }
                Some((out, r.members.clone()))
            });
            let Some(Some((countdown, members))) = ticked else {
                continue;
            };
            if countdown.seconds_remaining > 0 {
                self.manager.announce_to(
                    &members,
                    &RunEvent::Countdown {
                        run: id,
                        seconds_remaining: countdown.seconds_remaining,
                        next_map: countdown.next_map,
                    },
                );
            }
        }
    }
}
