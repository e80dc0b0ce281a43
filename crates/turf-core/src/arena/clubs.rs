use contracts::{
    Club, ClubFilter, ClubPatch, ClubRole, CreateClubRequest, DomainError, MemberView,
    SCHEMA_VERSION_V1,
};

use super::Arena;
use crate::club;

impl Arena {
    pub fn create_club(
        &mut self,
        founder_id: &str,
        request: &CreateClubRequest,
    ) -> Result<Club, DomainError> {
        let founder = self.directory.require(founder_id)?.clone();
        if founder.club.is_some() {
            return Err(DomainError::invalid_state(
                "user already belongs to a club",
                Some(format!("user_id={founder_id}")),
            ));
        }

        let name = club::validate_name(&request.name)?;
        let tag = club::validate_tag(&request.tag)?;
        let min_level_to_join = club::validate_min_level(request.min_level_to_join)?;
        if self.club_name_taken(&name, None) {
            return Err(DomainError::conflict(
                "club name is already taken",
                Some(format!("name={name}")),
            ));
        }

        let club_id = self.next_club_id();
        let club = Club {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            club_id: club_id.clone(),
            name,
            tag,
            description: request.description.clone(),
            color: request.color.clone(),
            emblem: request.emblem.clone().unwrap_or_default(),
            founder_id: founder_id.to_string(),
            officers: Default::default(),
            members: [founder_id.to_string()].into_iter().collect(),
            member_count: 1,
            total_power: founder.level,
            territories_controlled: 0,
            wins: 0,
            losses: 0,
            is_recruiting: true,
            min_level_to_join,
            version: 1,
        };

        self.clubs.insert(club_id.clone(), club.clone());
        self.mark_club_created(&club_id);
        self.link_user_to_club(founder_id, &club_id, ClubRole::Founder)?;
        Ok(club)
    }

    pub fn join_club(&mut self, user_id: &str, club_id: &str) -> Result<String, DomainError> {
        let user = self.directory.require(user_id)?.clone();
        let club = self
            .clubs
            .get(club_id)
            .ok_or_else(|| club_not_found(club_id))?;

        if user.club.is_some() {
            return Err(DomainError::invalid_state(
                "user already belongs to a club",
                Some(format!("user_id={user_id}")),
            ));
        }
        if !club.is_recruiting {
            return Err(DomainError::forbidden(
                "club is not recruiting",
                Some(format!("club_id={club_id}")),
            ));
        }
        if user.level < club.min_level_to_join {
            return Err(DomainError::forbidden(
                "level below the club's entry requirement",
                Some(format!(
                    "level={} min_level_to_join={}",
                    user.level, club.min_level_to_join
                )),
            ));
        }

        self.touch_club(club_id);
        let club = self
            .clubs
            .get_mut(club_id)
            .ok_or_else(|| club_not_found(club_id))?;
        club.members.insert(user_id.to_string());
        club.member_count += 1;
        club.total_power += user.level;
        let club_name = club.name.clone();

        self.link_user_to_club(user_id, club_id, ClubRole::Member)?;
        Ok(format!("joined {club_name}"))
    }

    pub fn leave_club(&mut self, user_id: &str) -> Result<String, DomainError> {
        let user = self.directory.require(user_id)?.clone();
        let membership = user.club.as_ref().ok_or_else(|| {
            DomainError::invalid_state(
                "user does not belong to a club",
                Some(format!("user_id={user_id}")),
            )
        })?;
        let club_id = membership.club_id.clone();

        let club = self.clubs.get(&club_id).ok_or_else(|| {
            DomainError::internal(
                "membership references a missing club",
                Some(format!("club_id={club_id}")),
            )
        })?;
        let club_name = club.name.clone();
        let is_founder = club.founder_id == user_id;
        let sole_member = club.member_count <= 1;

        if is_founder && sole_member {
            self.disband_club(&club_id);
            self.unlink_user_from_club(user_id)?;
            return Ok(format!("{club_name} disbanded"));
        }

        self.touch_club(&club_id);
        let club = self
            .clubs
            .get_mut(&club_id)
            .ok_or_else(|| club_not_found(&club_id))?;
        club.members.remove(user_id);
        club.officers.remove(user_id);
        club.member_count = club.member_count.saturating_sub(1);
        club.total_power -= user.level;

        let mut promoted = None;
        if is_founder {
            if let Some(next) = club::successor(club) {
                club.officers.remove(&next);
                club.founder_id = next.clone();
                promoted = Some(next);
            }
        }
        if let Some(next) = promoted {
            self.link_user_to_club(&next, &club_id, ClubRole::Founder)?;
        }

        self.unlink_user_from_club(user_id)?;
        Ok(format!("left {club_name}"))
    }

    /// Delete the club and release everything it controls in the same
    /// commit unit, so no territory is left pointing at a dead club.
    fn disband_club(&mut self, club_id: &str) {
        let released = self
            .territories
            .values()
            .filter(|territory| territory.controlling_club_id.as_deref() == Some(club_id))
            .map(|territory| territory.territory_id.clone())
            .collect::<Vec<_>>();
        for territory_id in released {
            self.touch_territory(&territory_id);
            if let Some(territory) = self.territories.get_mut(&territory_id) {
                territory.controlling_club_id = None;
                territory.controlling_club_name = None;
                territory.controlling_club_color = None;
                territory.defenders.clear();
                territory.control_strength = 0;
            }
        }

        self.clubs.remove(club_id);
        self.mark_club_deleted(club_id);
    }

    pub fn update_club(
        &mut self,
        caller_id: &str,
        club_id: &str,
        patch: &ClubPatch,
    ) -> Result<Club, DomainError> {
        let club = self
            .clubs
            .get(club_id)
            .ok_or_else(|| club_not_found(club_id))?;
        let role = club.role_of(caller_id).ok_or_else(|| {
            DomainError::forbidden(
                "caller is not a member of this club",
                Some(format!("user_id={caller_id}")),
            )
        })?;
        if role == ClubRole::Member {
            return Err(DomainError::forbidden(
                "only the founder or an officer may update the club",
                Some(format!("user_id={caller_id}")),
            ));
        }

        let allowed = club::allowed_fields(role);

        // validate fields the caller is actually permitted to write
        let mut validated = patch.clone();
        if allowed.contains(&club::ClubField::Name) {
            if let Some(name) = &validated.name {
                let name = club::validate_name(name)?;
                if self.club_name_taken(&name, Some(club_id)) {
                    return Err(DomainError::conflict(
                        "club name is already taken",
                        Some(format!("name={name}")),
                    ));
                }
                validated.name = Some(name);
            }
        }
        if allowed.contains(&club::ClubField::Tag) {
            if let Some(tag) = &validated.tag {
                validated.tag = Some(club::validate_tag(tag)?);
            }
        }
        if allowed.contains(&club::ClubField::MinLevelToJoin) {
            if let Some(min_level) = validated.min_level_to_join {
                validated.min_level_to_join = Some(club::validate_min_level(min_level)?);
            }
        }

        // peek: does the permitted subset write anything at all?
        let mut probe = self
            .clubs
            .get(club_id)
            .cloned()
            .ok_or_else(|| club_not_found(club_id))?;
        if club::apply_patch(&mut probe, &validated, allowed).is_empty() {
            return Ok(probe);
        }

        self.touch_club(club_id);
        let club = self
            .clubs
            .get_mut(club_id)
            .ok_or_else(|| club_not_found(club_id))?;
        club::apply_patch(club, &validated, allowed);
        Ok(club.clone())
    }

    pub fn get_club(&self, club_id: &str) -> Result<&Club, DomainError> {
        self.clubs.get(club_id).ok_or_else(|| club_not_found(club_id))
    }

    pub fn list_clubs(&self, filter: &ClubFilter, limit: usize) -> Vec<Club> {
        self.clubs
            .values()
            .filter(|club| {
                filter
                    .recruiting
                    .map(|wanted| club.is_recruiting == wanted)
                    .unwrap_or(true)
            })
            .filter(|club| {
                filter
                    .joinable_at_level
                    .map(|level| club.min_level_to_join <= level)
                    .unwrap_or(true)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Roster for display: founder first, then officers, then plain
    /// members, each group by descending level (ties by id).
    pub fn members(&self, club_id: &str) -> Result<Vec<MemberView>, DomainError> {
        let club = self
            .clubs
            .get(club_id)
            .ok_or_else(|| club_not_found(club_id))?;

        let view = |user_id: &String, role: ClubRole| {
            self.directory.get(user_id).map(|profile| MemberView {
                user_id: profile.user_id.clone(),
                username: profile.username.clone(),
                handle: profile.handle.clone(),
                level: profile.level,
                avatar_url: profile.avatar_url.clone(),
                role,
            })
        };

        let mut officers = club
            .officers
            .iter()
            .filter_map(|id| view(id, ClubRole::Officer))
            .collect::<Vec<_>>();
        let mut plain = club
            .members
            .iter()
            .filter(|id| **id != club.founder_id && !club.officers.contains(*id))
            .filter_map(|id| view(id, ClubRole::Member))
            .collect::<Vec<_>>();

        let by_level_desc = |a: &MemberView, b: &MemberView| {
            b.level.cmp(&a.level).then_with(|| a.user_id.cmp(&b.user_id))
        };
        officers.sort_by(by_level_desc);
        plain.sort_by(by_level_desc);

        let mut roster = Vec::with_capacity(club.members.len());
        roster.extend(view(&club.founder_id, ClubRole::Founder));
        roster.extend(officers);
        roster.extend(plain);
        Ok(roster)
    }

    /// Promote a member to officer. Founder only.
    pub fn promote_officer(
        &mut self,
        caller_id: &str,
        club_id: &str,
        member_id: &str,
    ) -> Result<Club, DomainError> {
        let club = self
            .clubs
            .get(club_id)
            .ok_or_else(|| club_not_found(club_id))?;
        if club.founder_id != caller_id {
            return Err(DomainError::forbidden(
                "only the founder may promote officers",
                Some(format!("user_id={caller_id}")),
            ));
        }
        if member_id == club.founder_id {
            return Err(DomainError::invalid_state(
                "the founder cannot also be an officer",
                None,
            ));
        }
        if !club.is_member(member_id) {
            return Err(DomainError::not_found(
                "user is not a member of this club",
                Some(format!("user_id={member_id}")),
            ));
        }
        if club.officers.contains(member_id) {
            return Err(DomainError::conflict(
                "user is already an officer",
                Some(format!("user_id={member_id}")),
            ));
        }

        self.touch_club(club_id);
        let club = self
            .clubs
            .get_mut(club_id)
            .ok_or_else(|| club_not_found(club_id))?;
        club.officers.insert(member_id.to_string());
        let updated = club.clone();
        self.link_user_to_club(member_id, club_id, ClubRole::Officer)?;
        Ok(updated)
    }

    fn club_name_taken(&self, name: &str, excluding: Option<&str>) -> bool {
        let wanted = name.to_lowercase();
        self.clubs.values().any(|club| {
            club.name.to_lowercase() == wanted && excluding != Some(club.club_id.as_str())
        })
    }
}

fn club_not_found(club_id: &str) -> DomainError {
    DomainError::not_found("club does not exist", Some(format!("club_id={club_id}")))
}
