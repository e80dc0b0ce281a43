//! Club validation rules, the role→field capability table for permissioned
//! updates, and founder succession.

use contracts::{Club, ClubPatch, ClubRole, DomainError};

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_TAG_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClubField {
    Name,
    Tag,
    Description,
    Color,
    Emblem,
    IsRecruiting,
    MinLevelToJoin,
}

const FOUNDER_FIELDS: &[ClubField] = &[
    ClubField::Name,
    ClubField::Tag,
    ClubField::Description,
    ClubField::Color,
    ClubField::Emblem,
    ClubField::IsRecruiting,
    ClubField::MinLevelToJoin,
];

const OFFICER_FIELDS: &[ClubField] = &[ClubField::Description, ClubField::IsRecruiting];

/// Which patch fields each role may change. Fields outside the set are
/// dropped silently, matching the upstream contract.
pub fn allowed_fields(role: ClubRole) -> &'static [ClubField] {
    match role {
        ClubRole::Founder => FOUNDER_FIELDS,
        ClubRole::Officer => OFFICER_FIELDS,
        ClubRole::Member => &[],
    }
}

pub fn validate_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_NAME_LEN {
        return Err(DomainError::invalid_query(
            "club name must be at least 3 characters",
            Some(format!("name={trimmed}")),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_tag(tag: &str) -> Result<String, DomainError> {
    let trimmed = tag.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_TAG_LEN {
        return Err(DomainError::invalid_query(
            "club tag must be 1-5 characters",
            Some(format!("tag={trimmed}")),
        ));
    }
    Ok(trimmed.to_uppercase())
}

pub fn validate_min_level(min_level_to_join: i64) -> Result<i64, DomainError> {
    if min_level_to_join < 1 {
        return Err(DomainError::invalid_query(
            "min_level_to_join must be >= 1",
            Some(format!("min_level_to_join={min_level_to_join}")),
        ));
    }
    Ok(min_level_to_join)
}

/// Apply the permitted subset of `patch` to `club`. Name and tag must have
/// been validated by the caller. Returns the fields actually written.
pub fn apply_patch(club: &mut Club, patch: &ClubPatch, allowed: &[ClubField]) -> Vec<ClubField> {
    let mut applied = Vec::new();

    for field in allowed {
        match field {
            ClubField::Name => {
                if let Some(name) = &patch.name {
                    club.name = name.clone();
                    applied.push(ClubField::Name);
                }
            }
            ClubField::Tag => {
                if let Some(tag) = &patch.tag {
                    club.tag = tag.clone();
                    applied.push(ClubField::Tag);
                }
            }
            ClubField::Description => {
                if let Some(description) = &patch.description {
                    club.description = description.clone();
                    applied.push(ClubField::Description);
                }
            }
            ClubField::Color => {
                if let Some(color) = &patch.color {
                    club.color = color.clone();
                    applied.push(ClubField::Color);
                }
            }
            ClubField::Emblem => {
                if let Some(emblem) = &patch.emblem {
                    club.emblem = emblem.clone();
                    applied.push(ClubField::Emblem);
                }
            }
            ClubField::IsRecruiting => {
                if let Some(is_recruiting) = patch.is_recruiting {
                    club.is_recruiting = is_recruiting;
                    applied.push(ClubField::IsRecruiting);
                }
            }
            ClubField::MinLevelToJoin => {
                if let Some(min_level) = patch.min_level_to_join {
                    club.min_level_to_join = min_level;
                    applied.push(ClubField::MinLevelToJoin);
                }
            }
        }
    }

    applied
}

/// Replacement founder when the current founder leaves a multi-member club:
/// the first officer, else the first remaining member.
pub fn successor(club: &Club) -> Option<String> {
    club.officers
        .iter()
        .next()
        .cloned()
        .or_else(|| {
            club.members
                .iter()
                .find(|member| **member != club.founder_id)
                .cloned()
        })
}
