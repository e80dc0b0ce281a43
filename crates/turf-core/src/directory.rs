//! In-memory mirror of the external identity/profile store.
//!
//! Profile fields (username, handle, level, avatar) are owned by that
//! service and arrive through sync upserts; the club link is owned by the
//! arena and survives re-syncs untouched.

use std::collections::BTreeMap;

use contracts::{ClubMembership, ClubRole, DomainError, UserProfile};

#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: BTreeMap<String, UserProfile>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<&UserProfile> {
        self.users.get(user_id)
    }

    pub fn require(&self, user_id: &str) -> Result<&UserProfile, DomainError> {
        self.users.get(user_id).ok_or_else(|| {
            DomainError::not_found("user is not registered", Some(format!("user_id={user_id}")))
        })
    }

    /// Replace externally-owned fields, keeping any existing club link.
    /// Returns the previous record so the caller can reconcile aggregates
    /// that depend on the user's level.
    pub fn upsert_profile(&mut self, incoming: UserProfile) -> Option<UserProfile> {
        let previous = self.users.get(&incoming.user_id).cloned();
        let club = previous.as_ref().and_then(|profile| profile.club.clone());
        let merged = UserProfile { club, ..incoming };
        self.users.insert(merged.user_id.clone(), merged);
        previous
    }

    pub fn set_user_club(
        &mut self,
        user_id: &str,
        club_id: &str,
        role: ClubRole,
    ) -> Result<(), DomainError> {
        let profile = self.users.get_mut(user_id).ok_or_else(|| {
            DomainError::not_found("user is not registered", Some(format!("user_id={user_id}")))
        })?;
        profile.club = Some(ClubMembership {
            club_id: club_id.to_string(),
            role,
        });
        Ok(())
    }

    pub fn clear_user_club(&mut self, user_id: &str) -> Result<(), DomainError> {
        let profile = self.users.get_mut(user_id).ok_or_else(|| {
            DomainError::not_found("user is not registered", Some(format!("user_id={user_id}")))
        })?;
        profile.club = None;
        Ok(())
    }

    pub fn users(&self) -> impl Iterator<Item = &UserProfile> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
