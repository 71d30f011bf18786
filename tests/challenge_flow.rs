mod common;

use common::{LEADER, ScriptedPopulator, enter_and_populate, harness, harness_with};
use gauntlet_core::{
    ChallengeError, DeathOutcome, DifficultyId, EngineConfig, KillOutcome, MapId, PlayerId,
    RunEvent, SessionState, ThemeId,
};

const DIFFICULTY: DifficultyId = DifficultyId(1);
const THEME: ThemeId = ThemeId(1);

#[test]
fn start_challenge_teleports_party_and_populates_on_entry() {
    let h = harness();
    let ally = PlayerId(101);
    h.world.set_party(LEADER, &[LEADER, ally]);

    let session = h
        .manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    assert_eq!(h.world.location_of(LEADER).unwrap().0, MapId(33));
    assert_eq!(h.world.location_of(ally).unwrap().0, MapId(33));

    enter_and_populate(&h, LEADER);
    let snapshot = h.manager().session_snapshot(session).unwrap();
    assert_eq!(snapshot.state, SessionState::InProgress);
    assert_eq!(snapshot.total_mobs, 2);
    assert_eq!(snapshot.total_bosses, 1);

    let events = h.world.events_for(ally);
    assert!(matches!(events[0], RunEvent::ChallengeStarted { .. }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, RunEvent::Populated { mobs: 2, bosses: 1, .. }))
    );
}

#[test]
fn duplicate_map_enter_populates_only_once() {
    let h = harness();
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    let (map, instance) = h.world.location_of(LEADER).unwrap();
    h.manager().on_map_enter(LEADER, map, instance);
    h.manager().on_map_enter(LEADER, map, instance);
    assert_eq!(h.populator.call_count(), 1);
}

#[test]
fn tick_fallback_populates_when_the_enter_hook_never_fires() {
    let h = harness();
    let session = h
        .manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(36)), true)
        .unwrap();
    // Teleport landed the player, but no map-enter hook arrives.
    h.manager().update(6_000);
    assert_eq!(h.populator.call_count(), 1);
    let snapshot = h.manager().session_snapshot(session).unwrap();
    assert_eq!(snapshot.state, SessionState::InProgress);
}

#[test]
fn population_failure_abandons_the_session() {
    let h = harness();
    h.populator.fail_next();
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    enter_and_populate_expect_gone(&h);
    assert_eq!(h.manager().active_session_count(), 0);
    assert!(h.world.teleported_out(LEADER));
}

fn enter_and_populate_expect_gone(h: &common::Harness) {
    let (map, instance) = h.world.location_of(LEADER).unwrap();
    h.manager().on_map_enter(LEADER, map, instance);
    assert!(h.manager().session_by_player(LEADER).is_none());
}

#[test]
fn busy_players_cannot_start_a_second_challenge() {
    let h = harness();
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    let err = h
        .manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(36)), true)
        .unwrap_err();
    assert!(matches!(err, ChallengeError::Busy(_)));
}

#[test]
fn admission_limit_refuses_further_sessions() {
    let h = harness_with(EngineConfig {
        max_active_sessions: 1,
        ..EngineConfig::default()
    });
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    let err = h
        .manager()
        .start_challenge(PlayerId(200), DIFFICULTY, THEME, Some(MapId(36)), true)
        .unwrap_err();
    assert!(matches!(err, ChallengeError::TooManyActive { .. }));
}

#[test]
fn level_requirement_is_enforced() {
    let h = harness();
    h.world.set_level(LEADER, 30);
    let err = h
        .manager()
        .start_challenge(LEADER, DifficultyId(2), THEME, None, true)
        .unwrap_err();
    assert_eq!(
        err,
        ChallengeError::LevelRequirement {
            required: 58,
            level: 30
        }
    );
}

#[test]
fn teleport_failure_unwinds_the_whole_start() {
    let h = harness();
    h.world.fail_teleport(LEADER);
    let err = h
        .manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap_err();
    assert!(matches!(err, ChallengeError::Teleport(_)));
    assert_eq!(h.manager().active_session_count(), 0);
}

#[test]
fn killing_the_last_boss_completes_and_records_the_session() {
    let h = harness();
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    let session = enter_and_populate(&h, LEADER);
    h.manager().update(65_000);

    let outcome = h
        .manager()
        .handle_creature_death(LEADER, ScriptedPopulator::mob_id(session, 0))
        .unwrap();
    assert_eq!(outcome, KillOutcome::Counted(gauntlet_core::KillKind::Mob));

    let outcome = h
        .manager()
        .handle_creature_death(LEADER, ScriptedPopulator::boss_id(session))
        .unwrap();
    assert_eq!(
        outcome,
        KillOutcome::SessionCompleted { session, run: None }
    );
    assert!(h.manager().session_by_player(LEADER).is_none());
    assert_eq!(h.board.session_count(), 1);
    let entries = h.manager().fastest_clears(10).unwrap();
    assert_eq!(entries[0].clear_secs, 65);

    // Terminal sessions arm the per-player cooldown.
    let err = h
        .manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap_err();
    assert!(matches!(err, ChallengeError::OnCooldown { .. }));
}

#[test]
fn cooldown_expires_through_the_periodic_sweep() {
    let h = harness_with(EngineConfig {
        cooldown_secs: 3,
        ..EngineConfig::default()
    });
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    let session = enter_and_populate(&h, LEADER);
    h.manager()
        .handle_creature_death(LEADER, ScriptedPopulator::boss_id(session));
    assert_eq!(h.manager().cooldown_remaining(LEADER), 3);
    h.manager().update(3_000);
    assert_eq!(h.manager().cooldown_remaining(LEADER), 0);
    assert!(
        h.manager()
            .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
            .is_ok()
    );
}

#[test]
fn full_wipe_fails_the_session_without_a_leaderboard_entry() {
    let h = harness();
    let ally = PlayerId(101);
    h.world.set_party(LEADER, &[LEADER, ally]);
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    enter_and_populate(&h, LEADER);

    assert_eq!(
        h.manager().handle_player_death(ally),
        Some(DeathOutcome::MemberDown)
    );
    let outcome = h.manager().handle_player_death(LEADER).unwrap();
    assert!(matches!(outcome, DeathOutcome::SessionWiped { .. }));
    assert_eq!(h.board.session_count(), 0);
    assert!(h.world.teleported_out(LEADER));
    assert!(h.world.teleported_out(ally));
    assert!(
        h.world
            .events_for(LEADER)
            .iter()
            .any(|e| matches!(e, RunEvent::SessionFailed { .. }))
    );
}

#[test]
fn environmental_damage_is_scaled_and_capped_for_scaled_parties() {
    let h = harness();
    h.manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, Some(MapId(33)), true)
        .unwrap();
    let session = enter_and_populate(&h, LEADER);

    // Session-owned attackers bypass the clamp entirely.
    let own = ScriptedPopulator::mob_id(session, 0);
    assert_eq!(h.manager().scale_incoming_damage(LEADER, Some(own), 400), 400);

    // A level-60 party in a 13-18 dungeon takes reduced, capped damage;
    // the cap is 3% of max health.
    let scaled = h.manager().scale_incoming_damage(LEADER, None, 400);
    assert!(scaled <= 30, "expected cap of 30, got {scaled}");
    assert!(scaled >= 1);

    // Damage never fully vanishes.
    assert_eq!(h.manager().scale_incoming_damage(LEADER, None, 1), 1);
    assert_eq!(h.manager().scale_incoming_damage(LEADER, None, 0), 0);

    // Players outside any session are untouched.
    assert_eq!(
        h.manager().scale_incoming_damage(PlayerId(999), None, 400),
        400
    );
}

#[test]
fn disabled_engine_refuses_every_entry_point() {
    let h = harness_with(EngineConfig {
        enabled: false,
        ..EngineConfig::default()
    });
    let err = h
        .manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, None, true)
        .unwrap_err();
    assert_eq!(err, ChallengeError::Disabled);
    assert!(h.manager().handle_player_death(LEADER).is_none());
    assert_eq!(h.manager().scale_incoming_damage(LEADER, None, 50), 50);
}

#[test]
fn random_dungeon_draw_respects_the_difficulty_band() {
    let h = harness();
    let session = h
        .manager()
        .start_challenge(LEADER, DIFFICULTY, THEME, None, false)
        .unwrap();
    let snapshot = h.manager().session_snapshot(session).unwrap();
    let dungeon = h.manager().catalog().dungeon(snapshot.map).unwrap();
    assert!(dungeon.overlaps_band(10, 60));
    // Unscaled sessions spawn at the dungeon's own band.
    assert_eq!(snapshot.spawn.level_min, dungeon.min_level);
    assert_eq!(snapshot.spawn.level_max, dungeon.max_level);
}
