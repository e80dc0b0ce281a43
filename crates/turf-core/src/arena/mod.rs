//! The arena aggregate root: clubs, territories, the append-only battle
//! log, and the mirrored user directory, with dirty-document tracking so
//! each operation's writes drain as one commit unit.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{
    ArenaConfig, BattleRecord, Club, ClubRole, DomainError, Territory, UserProfile,
};

use crate::battle::BattleRules;
use crate::directory::UserDirectory;

mod battles;
mod clubs;
mod leaderboard;
mod territories;

/// Documents touched by the operations applied since the last drain.
/// The persistence layer writes one delta per operation inside a single
/// transaction, which is what makes `challenge` atomic across the
/// territory and both clubs.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    pub upserted_clubs: Vec<Club>,
    pub deleted_club_ids: Vec<String>,
    pub upserted_territories: Vec<Territory>,
    pub upserted_users: Vec<UserProfile>,
    pub appended_battles: Vec<BattleRecord>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.upserted_clubs.is_empty()
            && self.deleted_club_ids.is_empty()
            && self.upserted_territories.is_empty()
            && self.upserted_users.is_empty()
            && self.appended_battles.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    config: ArenaConfig,
    rules: BattleRules,
    directory: UserDirectory,
    clubs: BTreeMap<String, Club>,
    territories: BTreeMap<String, Territory>,
    battle_log: Vec<BattleRecord>,
    battle_sequence: u64,
    club_sequence: u64,
    touched_clubs: BTreeSet<String>,
    deleted_clubs: BTreeSet<String>,
    touched_territories: BTreeSet<String>,
    touched_users: BTreeSet<String>,
    emitted_battle_count: usize,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Self {
        let rules = BattleRules::from_config(&config);
        Self {
            config,
            rules,
            directory: UserDirectory::new(),
            clubs: BTreeMap::new(),
            territories: BTreeMap::new(),
            battle_log: Vec::new(),
            battle_sequence: 0,
            club_sequence: 0,
            touched_clubs: BTreeSet::new(),
            deleted_clubs: BTreeSet::new(),
            touched_territories: BTreeSet::new(),
            touched_users: BTreeSet::new(),
            emitted_battle_count: 0,
        }
    }

    /// Rebuild an arena from persisted documents. Sequence counters resume
    /// past the highest persisted ids so new documents never collide.
    pub fn restore(
        config: ArenaConfig,
        profiles: Vec<UserProfile>,
        clubs: Vec<Club>,
        territories: Vec<Territory>,
        battles: Vec<BattleRecord>,
    ) -> Self {
        let mut arena = Self::new(config);
        for profile in profiles {
            arena.directory.upsert_profile(profile);
        }
        // battle records can reference clubs that disbanded since; scan them
        // too so a reissued id never aliases a dead club
        arena.club_sequence = clubs
            .iter()
            .map(|club| club.club_id.as_str())
            .chain(battles.iter().flat_map(|record| {
                [
                    record.attacker_club_id.as_str(),
                    record.defender_club_id.as_str(),
                ]
            }))
            .filter_map(|id| parse_sequence(id, "club:"))
            .max()
            .unwrap_or(0);
        for club in clubs {
            arena.clubs.insert(club.club_id.clone(), club);
        }
        for territory in territories {
            arena
                .territories
                .insert(territory.territory_id.clone(), territory);
        }
        arena.battle_sequence = battles.iter().map(|record| record.sequence).max().unwrap_or(0);
        arena.battle_log = battles;
        arena.emitted_battle_count = arena.battle_log.len();
        arena
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn clubs(&self) -> &BTreeMap<String, Club> {
        &self.clubs
    }

    pub fn territories(&self) -> &BTreeMap<String, Territory> {
        &self.territories
    }

    pub fn battles(&self) -> &[BattleRecord] {
        &self.battle_log
    }

    /// Sync a profile record from the external store. The club link is
    /// preserved, and a level change flows into the club's power aggregate
    /// so `total_power` stays equal to the sum of current member levels.
    pub fn upsert_profile(&mut self, incoming: UserProfile) -> Result<UserProfile, DomainError> {
        let user_id = incoming.user_id.clone();
        if user_id.trim().is_empty() {
            return Err(DomainError::invalid_query("user_id must not be blank", None));
        }

        let previous = self.directory.upsert_profile(incoming);
        if let Some(previous) = &previous {
            if let Some(membership) = &previous.club {
                let synced_level = self
                    .directory
                    .get(&user_id)
                    .map(|profile| profile.level)
                    .unwrap_or(previous.level);
                let delta = synced_level - previous.level;
                if delta != 0 {
                    let club_id = membership.club_id.clone();
                    self.touch_club(&club_id);
                    if let Some(club) = self.clubs.get_mut(&club_id) {
                        club.total_power += delta;
                    }
                }
            }
        }

        self.touched_users.insert(user_id.clone());
        self.directory.require(&user_id).map(UserProfile::clone)
    }

    /// Collect every document touched since the last drain. Versions were
    /// already bumped exactly once per touched document.
    pub fn drain_delta(&mut self) -> StateDelta {
        let upserted_clubs = self
            .touched_clubs
            .iter()
            .filter_map(|id| self.clubs.get(id).cloned())
            .collect();
        let deleted_club_ids = self.deleted_clubs.iter().cloned().collect();
        let upserted_territories = self
            .touched_territories
            .iter()
            .filter_map(|id| self.territories.get(id).cloned())
            .collect();
        let upserted_users = self
            .touched_users
            .iter()
            .filter_map(|id| self.directory.get(id).cloned())
            .collect();
        let appended_battles = self.battle_log[self.emitted_battle_count..].to_vec();

        self.touched_clubs.clear();
        self.deleted_clubs.clear();
        self.touched_territories.clear();
        self.touched_users.clear();
        self.emitted_battle_count = self.battle_log.len();

        StateDelta {
            upserted_clubs,
            deleted_club_ids,
            upserted_territories,
            upserted_users,
            appended_battles,
        }
    }

    /// Mark a club dirty, bumping its version on the first touch in the
    /// current drain window.
    pub(super) fn touch_club(&mut self, club_id: &str) {
        if self.touched_clubs.insert(club_id.to_string()) {
            if let Some(club) = self.clubs.get_mut(club_id) {
                club.version += 1;
            }
        }
    }

    /// Register a freshly created club (version already 1, no bump).
    pub(super) fn mark_club_created(&mut self, club_id: &str) {
        self.touched_clubs.insert(club_id.to_string());
    }

    pub(super) fn mark_club_deleted(&mut self, club_id: &str) {
        self.touched_clubs.remove(club_id);
        self.deleted_clubs.insert(club_id.to_string());
    }

    pub(super) fn touch_territory(&mut self, territory_id: &str) {
        if self.touched_territories.insert(territory_id.to_string()) {
            if let Some(territory) = self.territories.get_mut(territory_id) {
                territory.version += 1;
            }
        }
    }

    pub(super) fn mark_territory_created(&mut self, territory_id: &str) {
        self.touched_territories.insert(territory_id.to_string());
    }

    pub(super) fn mark_user_touched(&mut self, user_id: &str) {
        self.touched_users.insert(user_id.to_string());
    }

    pub(super) fn link_user_to_club(
        &mut self,
        user_id: &str,
        club_id: &str,
        role: ClubRole,
    ) -> Result<(), DomainError> {
        self.directory.set_user_club(user_id, club_id, role)?;
        self.mark_user_touched(user_id);
        Ok(())
    }

    pub(super) fn unlink_user_from_club(&mut self, user_id: &str) -> Result<(), DomainError> {
        self.directory.clear_user_club(user_id)?;
        self.mark_user_touched(user_id);
        Ok(())
    }

    pub(super) fn next_club_id(&mut self) -> String {
        self.club_sequence += 1;
        format!("club:{:04}", self.club_sequence)
    }

    pub(super) fn next_battle_sequence(&mut self) -> u64 {
        self.battle_sequence += 1;
        self.battle_sequence
    }

    pub(super) fn rules(&self) -> &BattleRules {
        &self.rules
    }
}

fn parse_sequence(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests;
