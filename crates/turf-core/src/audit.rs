//! Whole-arena invariant checks.
//!
//! Aggregates (`member_count`, `total_power`, `territories_controlled`,
//! `control_strength`) are maintained incrementally by the arena; this
//! module recomputes them from the source-of-truth sets and reports every
//! divergence. A violation always indicates a bug, never a gameplay state.

use std::collections::BTreeMap;

use crate::arena::Arena;

#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

#[must_use]
pub fn check_invariants(arena: &Arena) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut violation = |message: String| violations.push(InvariantViolation { message });

    let mut controlled_counts = BTreeMap::<String, u32>::new();

    for territory in arena.territories().values() {
        let id = &territory.territory_id;

        if territory.is_controlled() != !territory.defenders.is_empty() {
            violation(format!(
                "{id}: controlling_club_id set={} but defender roster len={}",
                territory.is_controlled(),
                territory.defenders.len()
            ));
        }
        if territory.defenders.len() > arena.config().max_defenders {
            violation(format!(
                "{id}: roster size {} exceeds capacity {}",
                territory.defenders.len(),
                arena.config().max_defenders
            ));
        }
        if territory.control_strength != territory.recomputed_strength() {
            violation(format!(
                "{id}: control_strength {} != roster sum {}",
                territory.control_strength,
                territory.recomputed_strength()
            ));
        }

        if let Some(club_id) = &territory.controlling_club_id {
            *controlled_counts.entry(club_id.clone()).or_insert(0) += 1;
            if !arena.clubs().contains_key(club_id) {
                violation(format!("{id}: controlled by nonexistent club {club_id}"));
            }
        }
    }

    for club in arena.clubs().values() {
        let id = &club.club_id;

        if club.member_count as usize != club.members.len() {
            violation(format!(
                "{id}: member_count {} != members set size {}",
                club.member_count,
                club.members.len()
            ));
        }
        if !club.members.contains(&club.founder_id) {
            violation(format!("{id}: founder {} not in members", club.founder_id));
        }
        if club.officers.contains(&club.founder_id) {
            violation(format!("{id}: founder {} listed as officer", club.founder_id));
        }
        for officer in &club.officers {
            if !club.members.contains(officer) {
                violation(format!("{id}: officer {officer} not in members"));
            }
        }

        let live_power = club
            .members
            .iter()
            .filter_map(|member| arena.directory().get(member))
            .map(|profile| profile.level)
            .sum::<i64>();
        if club.total_power != live_power {
            violation(format!(
                "{id}: total_power {} != member level sum {live_power}",
                club.total_power
            ));
        }

        let controlled = controlled_counts.get(id).copied().unwrap_or(0);
        if club.territories_controlled != controlled {
            violation(format!(
                "{id}: territories_controlled {} != live count {controlled}",
                club.territories_controlled
            ));
        }

        for member in &club.members {
            match arena.directory().get(member) {
                None => violation(format!("{id}: member {member} missing from directory")),
                Some(profile) => match &profile.club {
                    Some(membership) if membership.club_id == *id => {}
                    _ => violation(format!("{id}: member {member} club link does not point back")),
                },
            }
        }
    }

    // a user's club link must reference a live club that lists them
    for profile in arena.directory().users() {
        if let Some(membership) = &profile.club {
            match arena.clubs().get(&membership.club_id) {
                None => violation(format!(
                    "user {}: linked to nonexistent club {}",
                    profile.user_id, membership.club_id
                )),
                Some(club) if !club.is_member(&profile.user_id) => violation(format!(
                    "user {}: linked to {} which does not list them",
                    profile.user_id, membership.club_id
                )),
                Some(_) => {}
            }
        }
    }

    violations
}
