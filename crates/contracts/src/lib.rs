//! v1 cross-boundary contracts for the control core, API, persistence, and clients.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod serde_u64_string;

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Defender roster capacity per territory.
pub const DEFAULT_MAX_DEFENDERS: usize = 5;
/// Attacker bonus window for challenge resolution, inclusive upper bound.
pub const DEFAULT_ATTACKER_ROLL_SPREAD: i64 = 10;
/// Defender bonus window for challenge resolution, inclusive upper bound.
pub const DEFAULT_DEFENDER_ROLL_SPREAD: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArenaConfig {
    pub schema_version: String,
    pub arena_id: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    pub attacker_roll_spread: i64,
    pub defender_roll_spread: i64,
    pub max_defenders: usize,
    pub notes: Option<String>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            arena_id: "arena_local_001".to_string(),
            seed: 1337,
            attacker_roll_spread: DEFAULT_ATTACKER_ROLL_SPREAD,
            defender_roll_spread: DEFAULT_DEFENDER_ROLL_SPREAD,
            max_defenders: DEFAULT_MAX_DEFENDERS,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClubRole {
    Founder,
    Officer,
    Member,
}

impl ClubRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Founder => "founder",
            Self::Officer => "officer",
            Self::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClubMembership {
    pub club_id: String,
    pub role: ClubRole,
}

/// Mirror of a profile record owned by the external identity/profile store.
/// The club link is the one field the control core owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub schema_version: String,
    pub user_id: String,
    pub username: String,
    pub handle: String,
    pub level: i64,
    pub avatar_url: Option<String>,
    pub club: Option<ClubMembership>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Club {
    pub schema_version: String,
    pub club_id: String,
    pub name: String,
    pub tag: String,
    pub description: String,
    pub color: String,
    pub emblem: String,
    pub founder_id: String,
    pub officers: BTreeSet<String>,
    pub members: BTreeSet<String>,
    pub member_count: u32,
    pub total_power: i64,
    pub territories_controlled: u32,
    pub wins: u64,
    pub losses: u64,
    pub is_recruiting: bool,
    pub min_level_to_join: i64,
    pub version: u64,
}

impl Club {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    pub fn role_of(&self, user_id: &str) -> Option<ClubRole> {
        if self.founder_id == user_id {
            Some(ClubRole::Founder)
        } else if self.officers.contains(user_id) {
            Some(ClubRole::Officer)
        } else if self.members.contains(user_id) {
            Some(ClubRole::Member)
        } else {
            None
        }
    }
}

/// Point-in-time snapshot of a club member on a territory roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Defender {
    pub user_id: String,
    pub username: String,
    pub level: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Territory {
    pub schema_version: String,
    pub territory_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: f64,
    pub controlling_club_id: Option<String>,
    pub controlling_club_name: Option<String>,
    pub controlling_club_color: Option<String>,
    pub defenders: Vec<Defender>,
    pub control_strength: i64,
    pub total_battles: u64,
    pub version: u64,
}

impl Territory {
    pub fn is_controlled(&self) -> bool {
        self.controlling_club_id.is_some()
    }

    pub fn has_defender(&self, user_id: &str) -> bool {
        self.defenders.iter().any(|entry| entry.user_id == user_id)
    }

    /// Sum of roster levels; the value `control_strength` must hold whenever
    /// the roster changes.
    pub fn recomputed_strength(&self) -> i64 {
        self.defenders.iter().map(|entry| entry.level).sum()
    }
}

/// Descriptive fields resolved by the external place-lookup service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerritoryDescriptor {
    pub territory_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: f64,
}

/// Append-only battle log entry. Never mutated after the commit that wrote it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattleRecord {
    pub schema_version: String,
    pub battle_id: String,
    pub sequence: u64,
    pub territory_id: String,
    pub attacker_club_id: String,
    pub attacker_user_id: String,
    pub defender_club_id: String,
    pub attacker_power: i64,
    pub defender_strength: i64,
    pub victory: bool,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattleOutcome {
    pub schema_version: String,
    pub battle_id: String,
    pub victory: bool,
    pub attacker_roll: i64,
    pub defense_roll: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClubRequest {
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub emblem: Option<String>,
    pub min_level_to_join: i64,
}

/// Partial club update. Fields outside the caller's permitted set are
/// dropped, not rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClubPatch {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub emblem: Option<String>,
    pub is_recruiting: Option<bool>,
    pub min_level_to_join: Option<i64>,
}

impl ClubPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tag.is_none()
            && self.description.is_none()
            && self.color.is_none()
            && self.emblem.is_none()
            && self.is_recruiting.is_none()
            && self.min_level_to_join.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClubFilter {
    pub recruiting: Option<bool>,
    pub joinable_at_level: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl GeoBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }
}

/// Display row for the club roster, founder first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberView {
    pub user_id: String,
    pub username: String,
    pub handle: String,
    pub level: i64,
    pub avatar_url: Option<String>,
    pub role: ClubRole,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Conflict,
    InvalidState,
    Forbidden,
    CapacityExceeded,
    InvalidQuery,
    DeadlineExceeded,
    InternalError,
}

/// Domain failure detected before any write, or a concurrency conflict that
/// survived the bounded retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl DomainError {
    fn new(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(ErrorCode::NotFound, message, details)
    }

    pub fn conflict(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(ErrorCode::Conflict, message, details)
    }

    pub fn invalid_state(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message, details)
    }

    pub fn forbidden(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message, details)
    }

    pub fn capacity(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(ErrorCode::CapacityExceeded, message, details)
    }

    pub fn invalid_query(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(ErrorCode::InvalidQuery, message, details)
    }

    pub fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(ErrorCode::InternalError, message, details)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{:?}: {} ({details})", self.code, self.message),
            None => write!(f, "{:?}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for DomainError {}

/// Wire envelope for errors returned to API callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        Self::new(value.code, value.message, value.details)
    }
}
