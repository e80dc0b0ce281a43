use std::env;
use std::net::SocketAddr;

use contracts::{
    ArenaConfig, ClubPatch, CreateClubRequest, TerritoryDescriptor, UserProfile,
    SCHEMA_VERSION_V1,
};
use turf_api::{serve, ControlApi};

fn print_usage() {
    println!("turf-cli <command>");
    println!("commands:");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  demo <seed> [sqlite_path]");
    println!("    seeds profiles and territories, plays a scripted season,");
    println!("    audits invariants, and prints the leaderboard");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn parse_seed(value: Option<&String>) -> Result<u64, String> {
    let raw = value.ok_or_else(|| "missing seed".to_string())?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid seed: {raw}"))
}

fn default_sqlite_path() -> Option<String> {
    env::var("TURF_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_sqlite_path(value: Option<&String>) -> Option<String> {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .or_else(default_sqlite_path)
}

fn profile(user_id: &str, username: &str, level: i64) -> UserProfile {
    UserProfile {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        user_id: user_id.to_string(),
        username: username.to_string(),
        handle: format!("@{user_id}"),
        level,
        avatar_url: None,
        club: None,
    }
}

fn run_demo(args: &[String]) -> Result<(), String> {
    let seed = parse_seed(args.get(2))?;
    let sqlite_path = parse_sqlite_path(args.get(3));

    let mut api = ControlApi::from_config(ArenaConfig {
        seed,
        ..ArenaConfig::default()
    });
    if let Some(path) = &sqlite_path {
        api.attach_sqlite_store(path).map_err(|err| err.to_string())?;
        println!("persisting to {path}");
    }

    let roster = [
        ("alice", "Alice", 5),
        ("bob", "Bob", 8),
        ("carol", "Carol", 6),
        ("dave", "Dave", 3),
        ("erin", "Erin", 11),
        ("frank", "Frank", 2),
    ];
    for (user_id, username, level) in roster {
        api.sync_profile(&profile(user_id, username, level))
            .map_err(|err| err.to_string())?;
    }

    let places = [
        ("place:docks", "Harborside Gym", 40.701, -74.012),
        ("place:forge", "The Forge", 40.714, -74.006),
        ("place:plaza", "Plaza Courts", 40.758, -73.985),
        ("place:summit", "Summit Boulders", 40.768, -73.981),
    ];
    for (territory_id, name, latitude, longitude) in places {
        api.sync_territory(&TerritoryDescriptor {
            territory_id: territory_id.to_string(),
            name: name.to_string(),
            address: "new york, ny".to_string(),
            latitude,
            longitude,
            rating: 4.0,
        })
        .map_err(|err| err.to_string())?;
    }

    let night = api
        .create_club(
            "alice",
            &CreateClubRequest {
                name: "Night Runners".to_string(),
                tag: "NGT".to_string(),
                description: "evening crew".to_string(),
                color: "#3b2a6e".to_string(),
                emblem: None,
                min_level_to_join: 1,
            },
        )
        .map_err(|err| err.to_string())?;
    let iron = api
        .create_club(
            "bob",
            &CreateClubRequest {
                name: "Iron Pack".to_string(),
                tag: "IRON".to_string(),
                description: "lift heavy".to_string(),
                color: "#8a1f1f".to_string(),
                emblem: None,
                min_level_to_join: 1,
            },
        )
        .map_err(|err| err.to_string())?;

    for (user, club_id) in [
        ("carol", &night.club_id),
        ("dave", &night.club_id),
        ("erin", &iron.club_id),
        ("frank", &iron.club_id),
    ] {
        api.join_club(user, club_id).map_err(|err| err.to_string())?;
    }
    api.promote_officer("alice", &night.club_id, "carol")
        .map_err(|err| err.to_string())?;
    api.update_club(
        "carol",
        &night.club_id,
        &ClubPatch {
            description: Some("tuesday intervals, thursday hills".to_string()),
            ..ClubPatch::default()
        },
    )
    .map_err(|err| err.to_string())?;

    api.claim("alice", "place:docks").map_err(|err| err.to_string())?;
    api.claim("erin", "place:forge").map_err(|err| err.to_string())?;
    api.claim("carol", "place:plaza").map_err(|err| err.to_string())?;
    api.add_defender("dave", "place:plaza").map_err(|err| err.to_string())?;

    let season = [
        ("bob", "place:docks"),
        ("frank", "place:plaza"),
        ("alice", "place:forge"),
        ("erin", "place:docks"),
        ("dave", "place:forge"),
    ];
    for (attacker, territory_id) in season {
        match api.challenge(attacker, territory_id) {
            Ok(outcome) => println!(
                "battle {territory_id}: {} (attacker {} vs defense {})",
                outcome.message, outcome.attacker_roll, outcome.defense_roll
            ),
            // a failed precondition just means the map moved under the script
            Err(err) => println!("battle {territory_id}: skipped ({err})"),
        }
    }

    println!();
    println!("leaderboard:");
    for (rank, club) in api.leaderboard(10).iter().enumerate() {
        println!(
            "  #{} {} [{}] territories={} power={} wins={} losses={}",
            rank + 1,
            club.name,
            club.tag,
            club.territories_controlled,
            club.total_power,
            club.wins,
            club.losses
        );
    }

    let violations = api.audit();
    if violations.is_empty() {
        println!("audit: clean");
        Ok(())
    } else {
        for violation in &violations {
            eprintln!("audit: {violation}");
        }
        Err(format!("{} invariant violations", violations.len()))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                println!("serving control api on http://{addr}");
                let sqlite_path = default_sqlite_path();
                if let Err(err) = serve(addr, ArenaConfig::default(), sqlite_path).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        },
        Some("demo") => {
            if let Err(err) = run_demo(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}
