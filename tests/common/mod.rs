//! Shared harness for the integration suites: in-memory collaborators
//! standing in for the world engine, the spawner, and persistence.
#![allow(dead_code)]
use gauntlet_core::{
    Catalog, CreatureId, DifficultyId, DifficultyTier, DungeonInfo, EngineConfig, InstanceId,
    LeaderboardEntry, LeaderboardStore, MapId, PlayerId, PopulateError, PopulationReport,
    Populator, RunEvent, RunLeaderboardEntry, RunLifecycle, SessionId, SessionManager,
    SpawnParams, Theme, ThemeId, WorldError, WorldOps,
};
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

pub const LEADER: PlayerId = PlayerId(100);

#[derive(Default)]
struct WorldState {
    parties: HashMap<PlayerId, Vec<PlayerId>>,
    levels: HashMap<PlayerId, u8>,
    fail_teleports: HashSet<PlayerId>,
    locations: HashMap<PlayerId, (MapId, InstanceId)>,
    buffs: HashMap<PlayerId, (u32, f32)>,
    events: Vec<(PlayerId, RunEvent)>,
    teleported_out: Vec<PlayerId>,
}

/// Cheap cloneable handle so tests can inspect world state after the
/// engine has taken ownership of its copy.
#[derive(Clone, Default)]
pub struct MockWorld {
    inner: Arc<Mutex<WorldState>>,
}

impl MockWorld {
    pub fn set_party(&self, leader: PlayerId, members: &[PlayerId]) {
        self.inner
            .lock()
            .unwrap()
            .parties
            .insert(leader, members.to_vec());
    }

    pub fn set_level(&self, player: PlayerId, level: u8) {
        self.inner.lock().unwrap().levels.insert(player, level);
    }

    pub fn fail_teleport(&self, player: PlayerId) {
        self.inner.lock().unwrap().fail_teleports.insert(player);
    }

    pub fn location_of(&self, player: PlayerId) -> Option<(MapId, InstanceId)> {
        self.inner.lock().unwrap().locations.get(&player).copied()
    }

    pub fn buff_of(&self, player: PlayerId) -> Option<(u32, f32)> {
        self.inner.lock().unwrap().buffs.get(&player).copied()
    }

    pub fn events_for(&self, player: PlayerId) -> Vec<RunEvent> {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn teleported_out(&self, player: PlayerId) -> bool {
        self.inner.lock().unwrap().teleported_out.contains(&player)
    }
}

impl WorldOps for MockWorld {
    fn party_members(&self, leader: PlayerId) -> Vec<PlayerId> {
        self.inner
            .lock()
            .unwrap()
            .parties
            .get(&leader)
            .cloned()
            .unwrap_or_else(|| vec![leader])
    }

    fn player_level(&self, player: PlayerId) -> u8 {
        self.inner
            .lock()
            .unwrap()
            .levels
            .get(&player)
            .copied()
            .unwrap_or(60)
    }

    fn character_name(&self, player: PlayerId) -> String {
        format!("char-{player}")
    }

    fn max_health(&self, _player: PlayerId) -> u32 {
        1_000
    }

    fn teleport_to(&self, player: PlayerId, map: MapId) -> Result<(), WorldError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_teleports.contains(&player) {
            return Err(WorldError::TeleportFailed { player, map });
        }
        let instance = InstanceId(map.0 + 9_000);
        state.locations.insert(player, (map, instance));
        Ok(())
    }

    fn teleport_out(&self, player: PlayerId) {
        let mut state = self.inner.lock().unwrap();
        state.locations.remove(&player);
        state.teleported_out.push(player);
    }

    fn instance_of(&self, player: PlayerId, map: MapId) -> Option<InstanceId> {
        let state = self.inner.lock().unwrap();
        state
            .locations
            .get(&player)
            .filter(|(m, _)| *m == map)
            .map(|(_, i)| *i)
    }

    fn apply_run_buff(&self, player: PlayerId, stacks: u32, bonus_pct: f32) {
        self.inner
            .lock()
            .unwrap()
            .buffs
            .insert(player, (stacks, bonus_pct));
    }

    fn remove_run_buff(&self, player: PlayerId) {
        self.inner.lock().unwrap().buffs.remove(&player);
    }

    fn announce(&self, player: PlayerId, event: &RunEvent) {
        self.inner
            .lock()
            .unwrap()
            .events
            .push((player, event.clone()));
    }
}

#[derive(Default)]
struct PopulatorState {
    fail: bool,
    calls: Vec<SessionId>,
}

/// Deterministic spawner: two trash mobs and one boss per instance, with
/// creature ids derived from the session id.
#[derive(Clone, Default)]
pub struct ScriptedPopulator {
    inner: Arc<Mutex<PopulatorState>>,
}

impl ScriptedPopulator {
    pub fn fail_next(&self) {
        self.inner.lock().unwrap().fail = true;
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    pub fn mob_id(session: SessionId, index: u64) -> CreatureId {
        CreatureId(u64::from(session.0) * 1_000 + index)
    }

    pub fn boss_id(session: SessionId) -> CreatureId {
        CreatureId(u64::from(session.0) * 1_000 + 900)
    }
}

impl Populator for ScriptedPopulator {
    fn populate(
        &self,
        session: SessionId,
        _map: MapId,
        instance: InstanceId,
        params: &SpawnParams,
    ) -> Result<PopulationReport, PopulateError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail {
            state.fail = false;
            return Err(PopulateError::InstanceUnavailable { instance });
        }
        state.calls.push(session);
        Ok(PopulationReport {
            mobs: vec![Self::mob_id(session, 0), Self::mob_id(session, 1)],
            bosses: vec![Self::boss_id(session)],
            level_min: params.level_min,
            level_max: params.level_max,
        })
    }
}

/// Leaderboard persistence backed by plain vectors.
#[derive(Clone, Default)]
pub struct MemoryBoard {
    sessions: Arc<Mutex<Vec<LeaderboardEntry>>>,
    runs: Arc<Mutex<Vec<RunLeaderboardEntry>>>,
}

impl MemoryBoard {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn last_run(&self) -> Option<RunLeaderboardEntry> {
        self.runs.lock().unwrap().last().cloned()
    }
}

impl LeaderboardStore for MemoryBoard {
    type Error = Infallible;

    fn append_session(&self, entry: &LeaderboardEntry) -> Result<(), Self::Error> {
        self.sessions.lock().unwrap().push(entry.clone());
        Ok(())
    }

    fn append_run(&self, entry: &RunLeaderboardEntry) -> Result<(), Self::Error> {
        self.runs.lock().unwrap().push(entry.clone());
        Ok(())
    }

    fn session_entries(&self) -> Result<Vec<LeaderboardEntry>, Self::Error> {
        Ok(self.sessions.lock().unwrap().clone())
    }

    fn run_entries(&self) -> Result<Vec<RunLeaderboardEntry>, Self::Error> {
        Ok(self.runs.lock().unwrap().clone())
    }
}

pub type Engine = SessionManager<MockWorld, ScriptedPopulator, MemoryBoard>;

pub struct Harness {
    pub world: MockWorld,
    pub populator: ScriptedPopulator,
    pub board: MemoryBoard,
    pub lifecycle: Arc<RunLifecycle<MockWorld, ScriptedPopulator, MemoryBoard>>,
}

impl Harness {
    pub fn manager(&self) -> &Engine {
        self.lifecycle.manager()
    }
}

pub fn fixture_catalog() -> Catalog {
    Catalog {
        difficulties: vec![
            DifficultyTier {
                id: DifficultyId(1),
                name: "Adventurer".into(),
                min_level: 10,
                max_level: 60,
            },
            DifficultyTier {
                id: DifficultyId(2),
                name: "Champion".into(),
                min_level: 58,
                max_level: 60,
            },
        ],
        themes: vec![
            Theme {
                id: ThemeId(1),
                name: "Undead".into(),
            },
            Theme {
                id: ThemeId(2),
                name: "Demonic".into(),
            },
        ],
        dungeons: vec![
            DungeonInfo {
                map_id: MapId(33),
                name: "Shadowfang Keep".into(),
                min_level: 13,
                max_level: 18,
                weight: 10,
            },
            DungeonInfo {
                map_id: MapId(36),
                name: "The Deadmines".into(),
                min_level: 17,
                max_level: 24,
                weight: 10,
            },
            DungeonInfo {
                map_id: MapId(43),
                name: "Wailing Caverns".into(),
                min_level: 15,
                max_level: 21,
                weight: 10,
            },
        ],
    }
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let world = MockWorld::default();
    let populator = ScriptedPopulator::default();
    let board = MemoryBoard::default();
    let manager = SessionManager::new(
        config,
        fixture_catalog(),
        world.clone(),
        populator.clone(),
        board.clone(),
        0xC0FFEE,
    )
    .unwrap();
    Harness {
        world,
        populator,
        board,
        lifecycle: Arc::new(RunLifecycle::new(Arc::new(manager))),
    }
}

/// Drive a freshly started session through the map-enter hook so its
/// instance gets populated.
pub fn enter_and_populate(h: &Harness, player: PlayerId) -> SessionId {
    let (map, instance) = h.world.location_of(player).unwrap();
    h.lifecycle.on_map_enter(player, map, instance);
    h.manager().session_by_player(player).unwrap()
}
