use super::*;

use contracts::{ClubFilter, ClubPatch, CreateClubRequest, ErrorCode, TerritoryDescriptor};

fn profile(user_id: &str, level: i64) -> UserProfile {
    UserProfile {
        schema_version: contracts::SCHEMA_VERSION_V1.to_string(),
        user_id: user_id.to_string(),
        username: format!("user {user_id}"),
        handle: format!("@{user_id}"),
        level,
        avatar_url: None,
        club: None,
    }
}

fn descriptor(territory_id: &str) -> TerritoryDescriptor {
    TerritoryDescriptor {
        territory_id: territory_id.to_string(),
        name: format!("gym {territory_id}"),
        address: "1 main st".to_string(),
        latitude: 40.0,
        longitude: -74.0,
        rating: 4.5,
    }
}

fn create_request(name: &str, tag: &str) -> CreateClubRequest {
    CreateClubRequest {
        name: name.to_string(),
        tag: tag.to_string(),
        description: String::new(),
        color: "#ff0000".to_string(),
        emblem: None,
        min_level_to_join: 1,
    }
}

fn arena_with_seed(seed: u64) -> Arena {
    let mut arena = Arena::new(ArenaConfig {
        seed,
        ..ArenaConfig::default()
    });
    for (user, level) in [("alice", 5), ("bob", 8), ("carol", 6), ("dave", 3)] {
        arena.upsert_profile(profile(user, level)).expect("profile");
    }
    arena.register_territory(&descriptor("place:t1")).expect("territory");
    arena.register_territory(&descriptor("place:t2")).expect("territory");
    arena
}

/// Seed whose first battle between the given sides resolves as requested.
fn seed_for_outcome(victory: bool, attacker_level: i64, strength: i64) -> u64 {
    (0..10_000u64)
        .find(|seed| {
            let rules = crate::battle::BattleRules::from_config(&ArenaConfig {
                seed: *seed,
                ..ArenaConfig::default()
            });
            rules.resolve(1, attacker_level, strength).victory == victory
        })
        .expect("some seed produces the outcome")
}

#[test]
fn create_club_links_founder_and_seeds_aggregates() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "night"))
        .expect("created");

    assert_eq!(club.member_count, 1);
    assert_eq!(club.total_power, 5);
    assert_eq!(club.tag, "NIGHT");
    let alice = arena.directory().get("alice").expect("alice");
    let membership = alice.club.as_ref().expect("linked");
    assert_eq!(membership.club_id, club.club_id);
    assert_eq!(membership.role, ClubRole::Founder);
}

#[test]
fn duplicate_club_name_is_a_conflict_even_with_different_case() {
    let mut arena = arena_with_seed(1);
    arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    let err = arena
        .create_club("bob", &create_request("night runners", "NR"))
        .expect_err("duplicate");
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[test]
fn founder_with_existing_club_cannot_create_another() {
    let mut arena = arena_with_seed(1);
    arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    let err = arena
        .create_club("alice", &create_request("Second Wind", "SW"))
        .expect_err("already in a club");
    assert_eq!(err.code, ErrorCode::InvalidState);
}

#[test]
fn join_updates_member_count_and_power() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.join_club("bob", &club.club_id).expect("joined");

    let club = arena.get_club(&club.club_id).expect("club");
    assert_eq!(club.member_count, 2);
    assert_eq!(club.member_count as usize, club.members.len());
    assert_eq!(club.total_power, 13);
}

#[test]
fn join_enforces_recruiting_flag_and_entry_level() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club(
            "alice",
            &CreateClubRequest {
                min_level_to_join: 6,
                ..create_request("Night Runners", "NGT")
            },
        )
        .expect("created");

    let err = arena.join_club("dave", &club.club_id).expect_err("level 3 < 6");
    assert_eq!(err.code, ErrorCode::Forbidden);

    arena
        .update_club(
            "alice",
            &club.club_id,
            &ClubPatch {
                is_recruiting: Some(false),
                ..ClubPatch::default()
            },
        )
        .expect("updated");
    let err = arena.join_club("bob", &club.club_id).expect_err("closed");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[test]
fn founder_leaving_promotes_first_officer() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.join_club("carol", &club.club_id).expect("carol");
    arena.join_club("dave", &club.club_id).expect("dave");
    arena
        .promote_officer("alice", &club.club_id, "carol")
        .expect("promoted");

    arena.leave_club("alice").expect("left");

    let club = arena.get_club(&club.club_id).expect("club");
    assert_eq!(club.founder_id, "carol");
    assert!(!club.officers.contains("carol"));
    assert_eq!(club.member_count, 2);
    assert_eq!(club.total_power, 9);
    let carol = arena.directory().get("carol").expect("carol");
    assert_eq!(carol.club.as_ref().expect("linked").role, ClubRole::Founder);
    assert!(arena.directory().get("alice").expect("alice").club.is_none());
}

#[test]
fn founder_leaving_without_officers_promotes_a_member() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.join_club("dave", &club.club_id).expect("dave");

    arena.leave_club("alice").expect("left");

    let club = arena.get_club(&club.club_id).expect("club");
    assert_eq!(club.founder_id, "dave");
    assert_eq!(club.member_count, 1);
}

#[test]
fn sole_founder_leaving_disbands_the_club() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    let club_id = club.club_id.clone();

    let message = arena.leave_club("alice").expect("left");

    assert!(message.contains("disbanded"));
    assert!(arena.get_club(&club_id).is_err());
    assert!(arena.list_clubs(&ClubFilter::default(), 50).is_empty());
    assert!(arena.directory().get("alice").expect("alice").club.is_none());
}

#[test]
fn disband_releases_controlled_territories() {
    let mut arena = arena_with_seed(1);
    arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.claim("alice", "place:t1").expect("claimed");

    arena.leave_club("alice").expect("disband");

    let territory = arena.get_territory("place:t1").expect("territory");
    assert!(territory.controlling_club_id.is_none());
    assert!(territory.defenders.is_empty());
    assert_eq!(territory.control_strength, 0);
    assert!(crate::audit::check_invariants(&arena).is_empty());
}

#[test]
fn leave_without_club_is_invalid_state() {
    let mut arena = arena_with_seed(1);
    let err = arena.leave_club("bob").expect_err("no club");
    assert_eq!(err.code, ErrorCode::InvalidState);
}

#[test]
fn officer_update_drops_disallowed_fields_silently() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.join_club("carol", &club.club_id).expect("carol");
    arena
        .promote_officer("alice", &club.club_id, "carol")
        .expect("promoted");

    let updated = arena
        .update_club(
            "carol",
            &club.club_id,
            &ClubPatch {
                name: Some("Hijacked".to_string()),
                description: Some("tuesday intervals".to_string()),
                ..ClubPatch::default()
            },
        )
        .expect("updated");

    assert_eq!(updated.name, "Night Runners");
    assert_eq!(updated.description, "tuesday intervals");
}

#[test]
fn plain_member_cannot_update_the_club() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.join_club("dave", &club.club_id).expect("dave");

    let err = arena
        .update_club(
            "dave",
            &club.club_id,
            &ClubPatch {
                description: Some("mine now".to_string()),
                ..ClubPatch::default()
            },
        )
        .expect_err("member");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[test]
fn claim_takes_an_unclaimed_territory() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");

    arena.claim("alice", "place:t1").expect("claimed");

    let territory = arena.get_territory("place:t1").expect("territory");
    assert_eq!(territory.controlling_club_id.as_deref(), Some(club.club_id.as_str()));
    assert_eq!(territory.defenders.len(), 1);
    assert_eq!(territory.defenders[0].user_id, "alice");
    assert_eq!(territory.defenders[0].level, 5);
    assert_eq!(territory.control_strength, 5);
    assert_eq!(territory.total_battles, 0);
    assert_eq!(arena.get_club(&club.club_id).expect("club").territories_controlled, 1);
}

#[test]
fn second_claim_on_the_same_territory_conflicts() {
    let mut arena = arena_with_seed(1);
    arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("club a");
    arena
        .create_club("bob", &create_request("Iron Pack", "IRON"))
        .expect("club b");

    arena.claim("alice", "place:t1").expect("first claim");
    let err = arena.claim("bob", "place:t1").expect_err("second claim");

    assert_eq!(err.code, ErrorCode::Conflict);
    let territory = arena.get_territory("place:t1").expect("territory");
    assert_eq!(
        territory.controlling_club_name.as_deref(),
        Some("Night Runners")
    );
}

#[test]
fn claim_without_club_is_forbidden() {
    let mut arena = arena_with_seed(1);
    let err = arena.claim("bob", "place:t1").expect_err("no club");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[test]
fn add_defender_is_rejected_on_repeat_and_at_capacity() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    for (user, level) in [("d1", 2), ("d2", 2), ("d3", 2), ("d4", 2), ("d5", 2)] {
        arena.upsert_profile(profile(user, level)).expect("profile");
        arena.join_club(user, &club.club_id).expect("joined");
    }
    arena.claim("alice", "place:t1").expect("claimed");

    let repeat = arena.add_defender("alice", "place:t1").expect_err("repeat");
    assert_eq!(repeat.code, ErrorCode::Conflict);

    for user in ["d1", "d2", "d3", "d4"] {
        arena.add_defender(user, "place:t1").expect("defending");
    }
    let territory = arena.get_territory("place:t1").expect("territory");
    assert_eq!(territory.defenders.len(), 5);
    assert_eq!(territory.control_strength, 5 + 2 * 4);

    let full = arena.add_defender("d5", "place:t1").expect_err("full");
    assert_eq!(full.code, ErrorCode::CapacityExceeded);
}

#[test]
fn outsider_cannot_defend_a_foreign_territory() {
    let mut arena = arena_with_seed(1);
    arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("club a");
    arena
        .create_club("bob", &create_request("Iron Pack", "IRON"))
        .expect("club b");
    arena.claim("alice", "place:t1").expect("claimed");

    let err = arena.add_defender("bob", "place:t1").expect_err("foreign");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[test]
fn winning_challenge_transfers_ownership_and_counters_atomically() {
    let seed = seed_for_outcome(true, 8, 5);
    let mut arena = arena_with_seed(seed);
    let club_a = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("club a");
    let club_b = arena
        .create_club("bob", &create_request("Iron Pack", "IRON"))
        .expect("club b");
    arena.claim("alice", "place:t1").expect("claimed");
    arena.drain_delta();

    let outcome = arena.challenge("bob", "place:t1").expect("battle");
    assert!(outcome.victory);
    assert!(outcome.attacker_roll > outcome.defense_roll);

    let territory = arena.get_territory("place:t1").expect("territory");
    assert_eq!(territory.controlling_club_id.as_deref(), Some(club_b.club_id.as_str()));
    assert_eq!(territory.defenders.len(), 1);
    assert_eq!(territory.defenders[0].user_id, "bob");
    assert_eq!(territory.control_strength, 8);
    assert_eq!(territory.total_battles, 1);

    let a = arena.get_club(&club_a.club_id).expect("a");
    let b = arena.get_club(&club_b.club_id).expect("b");
    assert_eq!((a.territories_controlled, a.losses, a.wins), (0, 1, 0));
    assert_eq!((b.territories_controlled, b.wins, b.losses), (1, 1, 0));

    // the transfer drains as one commit unit
    let delta = arena.drain_delta();
    assert_eq!(delta.upserted_territories.len(), 1);
    assert_eq!(delta.upserted_clubs.len(), 2);
    assert_eq!(delta.appended_battles.len(), 1);
    let record = &delta.appended_battles[0];
    assert_eq!(record.attacker_power, 8);
    assert_eq!(record.defender_strength, 5);
    assert!(record.victory);

    assert!(crate::audit::check_invariants(&arena).is_empty());
}

#[test]
fn losing_challenge_leaves_territory_untouched() {
    let seed = seed_for_outcome(false, 8, 5);
    let mut arena = arena_with_seed(seed);
    let club_a = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("club a");
    let club_b = arena
        .create_club("bob", &create_request("Iron Pack", "IRON"))
        .expect("club b");
    arena.claim("alice", "place:t1").expect("claimed");

    let outcome = arena.challenge("bob", "place:t1").expect("battle");
    assert!(!outcome.victory);

    let territory = arena.get_territory("place:t1").expect("territory");
    assert_eq!(territory.controlling_club_id.as_deref(), Some(club_a.club_id.as_str()));
    assert_eq!(territory.defenders[0].user_id, "alice");
    assert_eq!(territory.total_battles, 1);

    let a = arena.get_club(&club_a.club_id).expect("a");
    let b = arena.get_club(&club_b.club_id).expect("b");
    assert_eq!((a.territories_controlled, a.wins), (1, 1));
    assert_eq!((b.losses, b.territories_controlled), (1, 0));
}

#[test]
fn challenge_rejects_unclaimed_and_own_territory() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.join_club("bob", &club.club_id).expect("bob");

    let unclaimed = arena.challenge("alice", "place:t1").expect_err("unclaimed");
    assert_eq!(unclaimed.code, ErrorCode::InvalidState);

    arena.claim("alice", "place:t1").expect("claimed");
    let own = arena.challenge("bob", "place:t1").expect_err("own turf");
    assert_eq!(own.code, ErrorCode::InvalidState);
}

#[test]
fn members_are_listed_founder_first_then_by_level() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("dave", &create_request("Night Runners", "NGT"))
        .expect("created");
    for user in ["alice", "bob", "carol"] {
        arena.join_club(user, &club.club_id).expect("joined");
    }
    arena
        .promote_officer("dave", &club.club_id, "alice")
        .expect("promoted");

    let roster = arena.members(&club.club_id).expect("roster");
    let ids = roster.iter().map(|member| member.user_id.as_str()).collect::<Vec<_>>();
    // founder dave (3), officer alice (5), then bob (8) and carol (6) by level
    assert_eq!(ids, vec!["dave", "alice", "bob", "carol"]);
    assert_eq!(roster[0].role, ClubRole::Founder);
    assert_eq!(roster[1].role, ClubRole::Officer);
}

#[test]
fn leaderboard_ranks_by_territories_then_power() {
    let mut arena = arena_with_seed(1);
    let club_a = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("club a");
    let club_b = arena
        .create_club("bob", &create_request("Iron Pack", "IRON"))
        .expect("club b");
    arena.join_club("carol", &club_b.club_id).expect("carol");
    arena.claim("alice", "place:t1").expect("claimed");

    let ranked = arena.leaderboard(10);
    assert_eq!(ranked[0].club_id, club_a.club_id);
    assert_eq!(ranked[1].club_id, club_b.club_id);

    // equal territories: higher combined power wins
    arena.challenge("bob", "place:t2").expect_err("unclaimed");
    arena.claim("bob", "place:t2").expect("claimed");
    let ranked = arena.leaderboard(10);
    assert_eq!(ranked[0].club_id, club_b.club_id);
}

#[test]
fn profile_resync_adjusts_club_power_by_level_delta() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.join_club("bob", &club.club_id).expect("bob");
    arena.drain_delta();

    arena.upsert_profile(profile("bob", 12)).expect("resync");

    let club = arena.get_club(&club.club_id).expect("club");
    assert_eq!(club.total_power, 17);
    let delta = arena.drain_delta();
    assert_eq!(delta.upserted_clubs.len(), 1);
    assert_eq!(delta.upserted_users.len(), 1);
    assert!(crate::audit::check_invariants(&arena).is_empty());
}

#[test]
fn territory_resync_updates_descriptors_but_not_control() {
    let mut arena = arena_with_seed(1);
    arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    arena.claim("alice", "place:t1").expect("claimed");

    let renamed = TerritoryDescriptor {
        name: "gym renamed".to_string(),
        rating: 3.9,
        ..descriptor("place:t1")
    };
    arena.register_territory(&renamed).expect("resync");

    let territory = arena.get_territory("place:t1").expect("territory");
    assert_eq!(territory.name, "gym renamed");
    assert!(territory.controlling_club_id.is_some());
    assert_eq!(territory.defenders.len(), 1);
}

#[test]
fn versions_bump_once_per_drain_window() {
    let mut arena = arena_with_seed(1);
    let club = arena
        .create_club("alice", &create_request("Night Runners", "NGT"))
        .expect("created");
    let delta = arena.drain_delta();
    assert_eq!(delta.upserted_clubs[0].version, 1);

    arena.join_club("bob", &club.club_id).expect("bob");
    arena.join_club("carol", &club.club_id).expect("carol");
    let delta = arena.drain_delta();
    // two joins in one window still bump the club document once
    assert_eq!(delta.upserted_clubs[0].version, 2);
}
