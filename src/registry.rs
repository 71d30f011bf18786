//! Concurrency-safe stores for sessions and runs.
//!
//! Each registry guards its primary store and every secondary index with
//! one mutex; a structural mutation is either fully applied or fully
//! refused, and resolving an id to a record goes through the same
//! exclusive section as writers. Callers never retain references across
//! calls; access happens through short-lived closures.
use crate::ids::{PlayerId, RunId, SessionId};
use crate::run::Run;
use crate::session::Session;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Refusals for structural registry mutations. No variant leaves a
/// partially-updated index behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("player {player} already has an active session")]
    PlayerInSession { player: PlayerId },
    #[error("player {player} already participates in an active run")]
    PlayerInRun { player: PlayerId },
    #[error("session {session} is already bound to run {run}")]
    SessionBound { session: SessionId, run: RunId },
}

fn relock<'a, T>(
    guard: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    guard.unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    by_player: HashMap<PlayerId, SessionId>,
    next_id: u32,
}

/// Store of single-dungeon sessions, indexed by id and by participant.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<SessionStore>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionStore> {
        relock(self.inner.lock())
    }

    /// Allocate an id and insert the built session across both indices,
    /// all inside one critical section. Refuses without mutation when any
    /// rostered player already has a session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PlayerInSession`] on a roster conflict.
    pub fn register_with(
        &self,
        members: &[PlayerId],
        build: impl FnOnce(SessionId) -> Session,
    ) -> Result<SessionId, RegistryError> {
        let mut store = self.lock();
        for player in members {
            if store.by_player.contains_key(player) {
                return Err(RegistryError::PlayerInSession { player: *player });
            }
        }
        store.next_id += 1;
        let id = SessionId(store.next_id);
        let session = build(id);
        for player in session.player_ids() {
            store.by_player.insert(player, id);
        }
        store.sessions.insert(id, session);
        Ok(id)
    }

    /// Remove a session and its player index entries. Absent ids are a
    /// no-op returning `None`.
    pub fn unregister(&self, id: SessionId) -> Option<Session> {
        let mut store = self.lock();
        let session = store.sessions.remove(&id)?;
        for player in session.player_ids() {
            store.by_player.remove(&player);
        }
        Some(session)
    }

    /// Run `f` against the session under the registry lock.
    pub fn with_session<T>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut store = self.lock();
        store.sessions.get_mut(&id).map(f)
    }

    /// Resolve a participant to their session and run `f` under the lock.
    pub fn with_player_session<T>(
        &self,
        player: PlayerId,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Option<T> {
        let mut store = self.lock();
        let id = *store.by_player.get(&player)?;
        store.sessions.get_mut(&id).map(f)
    }

    #[must_use]
    pub fn find_by_player(&self, player: PlayerId) -> Option<SessionId> {
        self.lock().by_player.get(&player).copied()
    }

    /// Owned copy of a session record for read-only inspection.
    #[must_use]
    pub fn snapshot(&self, id: SessionId) -> Option<Session> {
        self.lock().sessions.get(&id).cloned()
    }

    #[must_use]
    pub fn active_count(&self) -> u32 {
        self.lock().sessions.len() as u32
    }

    /// Ids of every registered session, for the periodic sweep.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.lock().sessions.keys().copied().collect()
    }

    /// Every player index entry resolves to a session that rosters the
    /// player, and vice versa.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let store = self.lock();
        let forward = store
            .by_player
            .iter()
            .all(|(player, id)| store.sessions.get(id).is_some_and(|s| s.has_member(*player)));
        let backward = store.sessions.iter().all(|(id, session)| {
            session
                .player_ids()
                .iter()
                .all(|p| store.by_player.get(p) == Some(id))
        });
        forward && backward
    }
}

#[derive(Debug, Default)]
struct RunStore {
    runs: HashMap<RunId, Run>,
    by_session: HashMap<SessionId, RunId>,
    by_player: HashMap<PlayerId, RunId>,
    next_id: u32,
}

/// Store of roguelike runs, indexed by id, by active session, and by
/// participant.
#[derive(Debug, Default)]
pub struct RunRegistry {
    inner: Mutex<RunStore>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunStore> {
        relock(self.inner.lock())
    }

    /// Allocate an id and insert the built run across all three indices
    /// inside one critical section. Refuses without mutation when any
    /// member is already in a run or the active session is already bound.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PlayerInRun`] or
    /// [`RegistryError::SessionBound`] on a conflict.
    pub fn register_with(
        &self,
        members: &[PlayerId],
        active_session: SessionId,
        build: impl FnOnce(RunId) -> Run,
    ) -> Result<RunId, RegistryError> {
        let mut store = self.lock();
        for player in members {
            if store.by_player.contains_key(player) {
                return Err(RegistryError::PlayerInRun { player: *player });
            }
        }
        if let Some(run) = store.by_session.get(&active_session) {
            return Err(RegistryError::SessionBound {
                session: active_session,
                run: *run,
            });
        }
        store.next_id += 1;
        let id = RunId(store.next_id);
        let run = build(id);
        for player in &run.members {
            store.by_player.insert(*player, id);
        }
        store.by_session.insert(active_session, id);
        store.runs.insert(id, run);
        Ok(id)
    }

    /// Remove a run and every index entry referring to it. Absent ids are
    /// a no-op returning `None`.
    pub fn unregister(&self, id: RunId) -> Option<Run> {
        let mut store = self.lock();
        let run = store.runs.remove(&id)?;
        store.by_session.remove(&run.active_session);
        for player in &run.members {
            store.by_player.remove(player);
        }
        Some(run)
    }

    /// Rebind the run to a fresh session: updates the record and the
    /// session index in one critical section.
    pub fn reassign_session(&self, id: RunId, new_session: SessionId) -> bool {
        let mut store = self.lock();
        let Some(old) = store.runs.get(&id).map(|r| r.active_session) else {
            return false;
        };
        store.by_session.remove(&old);
        store.by_session.insert(new_session, id);
        if let Some(run) = store.runs.get_mut(&id) {
            run.active_session = new_session;
        }
        true
    }

    /// Run `f` against the run under the registry lock.
    pub fn with_run<T>(&self, id: RunId, f: impl FnOnce(&mut Run) -> T) -> Option<T> {
        let mut store = self.lock();
        store.runs.get_mut(&id).map(f)
    }

    #[must_use]
    pub fn find_by_player(&self, player: PlayerId) -> Option<RunId> {
        self.lock().by_player.get(&player).copied()
    }

    #[must_use]
    pub fn find_by_session(&self, session: SessionId) -> Option<RunId> {
        self.lock().by_session.get(&session).copied()
    }

    /// Owned copy of a run record for read-only inspection.
    #[must_use]
    pub fn snapshot(&self, id: RunId) -> Option<Run> {
        self.lock().runs.get(&id).cloned()
    }

    #[must_use]
    pub fn active_count(&self) -> u32 {
        self.lock().runs.len() as u32
    }

    /// Ids of every registered run, for the periodic sweep.
    #[must_use]
    pub fn ids(&self) -> Vec<RunId> {
        self.lock().runs.keys().copied().collect()
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let store = self.lock();
        let sessions_ok = store
            .by_session
            .iter()
            .all(|(session, id)| store.runs.get(id).is_some_and(|r| r.active_session == *session));
        let players_ok = store
            .by_player
            .iter()
            .all(|(player, id)| store.runs.get(id).is_some_and(|r| r.members.contains(player)));
        let backward = store.runs.iter().all(|(id, run)| {
            store.by_session.get(&run.active_session) == Some(id)
                && run.members.iter().all(|p| store.by_player.get(p) == Some(id))
        });
        sessions_ok && players_ok && backward
    }
}
