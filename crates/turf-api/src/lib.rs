//! In-process control API facade: applies each operation to a candidate
//! copy of the arena, commits the drained delta to SQLite in one
//! transaction, and only then publishes the candidate as current state.
//! Version conflicts from a concurrent writer on the same database reload
//! the authoritative state and retry with backoff, bounded at three
//! attempts.

mod persistence;
mod server;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use contracts::{
    ArenaConfig, BattleOutcome, BattleRecord, Club, ClubFilter, ClubPatch, CreateClubRequest,
    DomainError, GeoBounds, MemberView, Territory, TerritoryDescriptor, UserProfile,
};
use turf_core::audit::InvariantViolation;
use turf_core::Arena;

pub use persistence::{PersistenceError, SqliteControlStore};
pub use server::{serve, ServerError};

const COMMIT_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 10;

#[derive(Debug)]
pub enum ApiOpError {
    Domain(DomainError),
    Persistence(PersistenceError),
}

impl fmt::Display for ApiOpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "persistence error: {err}"),
        }
    }
}

impl std::error::Error for ApiOpError {}

impl From<DomainError> for ApiOpError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

impl From<PersistenceError> for ApiOpError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

#[derive(Debug)]
pub struct ControlApi {
    arena: Arena,
    store: Option<SqliteControlStore>,
    last_persistence_error: Option<String>,
}

impl ControlApi {
    pub fn from_config(config: ArenaConfig) -> Self {
        Self {
            arena: Arena::new(config),
            store: None,
            last_persistence_error: None,
        }
    }

    /// Attach a SQLite store. A populated store wins: the arena is rebuilt
    /// from its documents. An empty store receives a snapshot of whatever
    /// state the arena already holds.
    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let mut store = SqliteControlStore::open(path)?;
        if store.is_empty()? {
            store.save_snapshot(
                &self.arena.clubs().values().cloned().collect::<Vec<_>>(),
                &self.arena.territories().values().cloned().collect::<Vec<_>>(),
                &self.arena.directory().users().cloned().collect::<Vec<_>>(),
                self.arena.battles(),
            )?;
        } else {
            self.arena = Self::restored_arena(self.arena.config().clone(), &store)?;
        }
        self.store = Some(store);
        Ok(())
    }

    fn restored_arena(
        config: ArenaConfig,
        store: &SqliteControlStore,
    ) -> Result<Arena, PersistenceError> {
        let profiles = store.load_users()?;
        let clubs = store.load_clubs()?;
        let territories = store.load_territories()?;
        let battles = store.load_battles()?;
        Ok(Arena::restore(config, profiles, clubs, territories, battles))
    }

    fn reload_from_store(&mut self) -> Result<(), PersistenceError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        self.arena = Self::restored_arena(self.arena.config().clone(), store)?;
        Ok(())
    }

    /// Read-validate-write with all-or-nothing visibility: the arena the
    /// callers observe only advances when the store commit succeeded.
    fn apply<T>(&mut self, op: impl Fn(&mut Arena) -> Result<T, DomainError>) -> Result<T, ApiOpError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut candidate = self.arena.clone();
            let output = op(&mut candidate).map_err(ApiOpError::Domain)?;
            let delta = candidate.drain_delta();

            if let Some(store) = self.store.as_mut() {
                match store.apply_delta(&delta) {
                    Ok(()) => {}
                    Err(PersistenceError::VersionConflict(entity)) => {
                        if attempt >= COMMIT_ATTEMPTS {
                            return Err(ApiOpError::Domain(DomainError::conflict(
                                "concurrent update detected; re-fetch and retry",
                                Some(entity),
                            )));
                        }
                        tracing::warn!(attempt, entity = %entity, "commit conflict, reloading and retrying");
                        self.reload_from_store().map_err(ApiOpError::Persistence)?;
                        std::thread::sleep(Duration::from_millis(BACKOFF_BASE_MS << attempt));
                        continue;
                    }
                    Err(other) => {
                        self.last_persistence_error = Some(other.to_string());
                        tracing::warn!(error = %other, "persistence commit failed");
                        return Err(ApiOpError::Persistence(other));
                    }
                }
            }

            self.arena = candidate;
            return Ok(output);
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        self.arena.config()
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    pub fn create_club(
        &mut self,
        founder_id: &str,
        request: &CreateClubRequest,
    ) -> Result<Club, ApiOpError> {
        self.apply(|arena| arena.create_club(founder_id, request))
    }

    pub fn join_club(&mut self, user_id: &str, club_id: &str) -> Result<String, ApiOpError> {
        self.apply(|arena| arena.join_club(user_id, club_id))
    }

    pub fn leave_club(&mut self, user_id: &str) -> Result<String, ApiOpError> {
        self.apply(|arena| arena.leave_club(user_id))
    }

    pub fn update_club(
        &mut self,
        caller_id: &str,
        club_id: &str,
        patch: &ClubPatch,
    ) -> Result<Club, ApiOpError> {
        self.apply(|arena| arena.update_club(caller_id, club_id, patch))
    }

    pub fn promote_officer(
        &mut self,
        caller_id: &str,
        club_id: &str,
        member_id: &str,
    ) -> Result<Club, ApiOpError> {
        self.apply(|arena| arena.promote_officer(caller_id, club_id, member_id))
    }

    pub fn sync_profile(&mut self, profile: &UserProfile) -> Result<UserProfile, ApiOpError> {
        self.apply(|arena| arena.upsert_profile(profile.clone()))
    }

    pub fn sync_territory(
        &mut self,
        descriptor: &TerritoryDescriptor,
    ) -> Result<Territory, ApiOpError> {
        self.apply(|arena| arena.register_territory(descriptor))
    }

    pub fn claim(&mut self, user_id: &str, territory_id: &str) -> Result<String, ApiOpError> {
        self.apply(|arena| arena.claim(user_id, territory_id))
    }

    pub fn add_defender(&mut self, user_id: &str, territory_id: &str) -> Result<String, ApiOpError> {
        self.apply(|arena| arena.add_defender(user_id, territory_id))
    }

    pub fn challenge(
        &mut self,
        user_id: &str,
        territory_id: &str,
    ) -> Result<BattleOutcome, ApiOpError> {
        self.apply(|arena| arena.challenge(user_id, territory_id))
    }

    pub fn get_club(&self, club_id: &str) -> Result<Club, DomainError> {
        self.arena.get_club(club_id).map(Club::clone)
    }

    pub fn list_clubs(&self, filter: &ClubFilter, limit: usize) -> Vec<Club> {
        self.arena.list_clubs(filter, limit)
    }

    pub fn members(&self, club_id: &str) -> Result<Vec<MemberView>, DomainError> {
        self.arena.members(club_id)
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<Club> {
        self.arena.leaderboard(limit)
    }

    pub fn get_territory(&self, territory_id: &str) -> Result<Territory, DomainError> {
        self.arena.get_territory(territory_id).map(Territory::clone)
    }

    pub fn list_territories(&self, bounds: Option<&GeoBounds>, limit: usize) -> Vec<Territory> {
        self.arena.list_territories(bounds, limit)
    }

    pub fn battles_for_territory(&self, territory_id: &str) -> Vec<BattleRecord> {
        self.arena.battles_for_territory(territory_id)
    }

    pub fn audit(&self) -> Vec<InvariantViolation> {
        turf_core::audit::check_invariants(&self.arena)
    }
}
