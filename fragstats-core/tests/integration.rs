//! Integration tests for the fragstats parser and ingestion pipeline
//!
//! These tests use fixture files in `tests/fixtures/` to verify the
//! end-to-end flow: raw log file -> parsed events -> stored frags and
//! updated player statistics.

use std::io::Write;
use std::path::PathBuf;

use fragstats_core::db::Database;
use fragstats_core::ingest::IngestCoordinator;
use fragstats_core::types::{Game, Position, Server, Weapon, DEFAULT_SKILL};
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Copy a fixture into a temp dir so tests can append to it
fn staged_fixture(dir: &TempDir, name: &str) -> PathBuf {
    let dest = dir.path().join(name);
    std::fs::copy(fixture_path(name), &dest).unwrap();
    dest
}

fn open_db(dir: &TempDir) -> Database {
    let db = Database::open(&dir.path().join("data.db")).unwrap();
    db.migrate().unwrap();
    db.upsert_game(&Game {
        code: "cstrike".to_string(),
        name: "Counter-Strike".to_string(),
        enabled: true,
    })
    .unwrap();
    db
}

fn seed_server(db: &Database) -> i64 {
    db.insert_server(&Server {
        id: 0,
        game_code: "cstrike".to_string(),
        name: "integration".to_string(),
        address: "127.0.0.1".to_string(),
        port: 27015,
        enabled: true,
        // Stale map: the fixture's Loading map line should replace it
        map: Some("de_inferno".to_string()),
        last_activity: None,
    })
    .unwrap()
}

#[test]
fn test_full_match_log_end_to_end() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let server_id = seed_server(&db);
    let log_path = staged_fixture(&dir, "match.log");

    let mut coordinator = IngestCoordinator::new(&db);
    let result = coordinator.sync_file(server_id, &log_path).unwrap();

    // 9 lines: 8 recognized events plus the unmatched cvar line
    assert_eq!(result.lines_read, 9);
    assert_eq!(result.events_parsed, 8);
    assert_eq!(result.unmatched_lines, 1);
    assert_eq!(result.parse_errors, 0);
    assert_eq!(result.kills_processed, 1);

    // Players were created on first sight and rated from the single
    // headshot kill between two fresh 1000-rated players.
    let alice = db.get_player_by_steam_id("STEAM_1:0:111").unwrap().unwrap();
    let bob = db.get_player_by_steam_id("STEAM_1:0:222").unwrap().unwrap();
    assert_eq!(alice.last_name, "Alice");
    assert!((alice.skill - 1020.0).abs() < 1e-9);
    assert_eq!(alice.kills, 1);
    assert_eq!(alice.headshots, 1);
    assert_eq!(alice.deaths, 0);
    assert!((bob.skill - 984.0).abs() < 1e-9);
    assert_eq!(bob.deaths, 1);
    assert_eq!(bob.kills, 0);

    // The frag carries the map loaded earlier in the log and the killer's
    // position from the kill line.
    let frags = db.recent_frags(server_id, 10).unwrap();
    assert_eq!(frags.len(), 1);
    assert_eq!(frags[0].weapon_code, "ak47");
    assert!(frags[0].headshot);
    assert_eq!(frags[0].map.as_deref(), Some("de_dust2"));
    assert_eq!(
        frags[0].position,
        Some(Position {
            x: 120,
            y: -45,
            z: 36
        })
    );

    // ak47 was unknown and got auto-created with the neutral modifier
    let weapon = db.get_weapon("ak47", "cstrike").unwrap().unwrap();
    assert_eq!(weapon.name, "Ak47");
    assert!((weapon.modifier - 1.0).abs() < f64::EPSILON);

    // Server state reflects the log
    let server = db.get_server(server_id).unwrap().unwrap();
    assert_eq!(server.map.as_deref(), Some("de_dust2"));
    assert!(server.last_activity.is_some());
}

#[test]
fn test_resync_and_append_are_incremental() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let server_id = seed_server(&db);
    let log_path = staged_fixture(&dir, "match.log");

    let mut coordinator = IngestCoordinator::new(&db);
    coordinator.sync_file(server_id, &log_path).unwrap();
    assert_eq!(db.frag_count().unwrap(), 1);

    // Re-running must not double-count anything
    let second = coordinator.sync_file(server_id, &log_path).unwrap();
    assert_eq!(second.lines_read, 0);
    assert_eq!(db.frag_count().unwrap(), 1);
    let alice = db.get_player_by_steam_id("STEAM_1:0:111").unwrap().unwrap();
    assert!((alice.skill - 1020.0).abs() < 1e-9);

    // Append a revenge kill; only the new line is processed
    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .open(&log_path)
        .unwrap();
    writeln!(
        f,
        r#"L 08/15/2025 - 21:05:00: "Bob<7><STEAM_1:0:222><TERRORIST>" killed "Alice<5><STEAM_1:0:111><CT>" with "awp""#
    )
    .unwrap();

    let third = coordinator.sync_file(server_id, &log_path).unwrap();
    assert_eq!(third.lines_read, 1);
    assert_eq!(third.kills_processed, 1);
    assert_eq!(db.frag_count().unwrap(), 2);

    let alice = db.get_player_by_steam_id("STEAM_1:0:111").unwrap().unwrap();
    let bob = db.get_player_by_steam_id("STEAM_1:0:222").unwrap().unwrap();
    assert_eq!(alice.kills, 1);
    assert_eq!(alice.deaths, 1);
    assert_eq!(bob.kills, 1);
    assert_eq!(bob.deaths, 1);
    // Bob was behind, so his kill is worth more than the baseline 16
    assert!(bob.skill > 984.0 + 16.0);
    assert!(alice.skill < 1020.0);
}

#[test]
fn test_seeded_weapon_modifier_scales_rating() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let server_id = seed_server(&db);
    let log_path = staged_fixture(&dir, "match.log");

    // Knife kills are worth more
    db.upsert_weapon(&Weapon {
        code: "ak47".to_string(),
        game_code: "cstrike".to_string(),
        name: "Ak47".to_string(),
        modifier: 1.5,
        enabled: true,
    })
    .unwrap();

    let mut coordinator = IngestCoordinator::new(&db);
    coordinator.sync_file(server_id, &log_path).unwrap();

    // 32 * 0.5 * 1.5 * 1.25 = 30
    let alice = db.get_player_by_steam_id("STEAM_1:0:111").unwrap().unwrap();
    assert!((alice.skill - 1030.0).abs() < 1e-9);

    // Victim loss ignores the weapon modifier
    let bob = db.get_player_by_steam_id("STEAM_1:0:222").unwrap().unwrap();
    assert!((bob.skill - 984.0).abs() < 1e-9);
}

#[test]
fn test_ranking_reflects_ingested_match() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let server_id = seed_server(&db);
    let log_path = staged_fixture(&dir, "match.log");

    let mut coordinator = IngestCoordinator::new(&db);
    coordinator.sync_file(server_id, &log_path).unwrap();

    let ranking = db.top_players("cstrike", 10).unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].rank, 1);
    assert_eq!(ranking[0].player.last_name, "Alice");
    assert!(ranking[0].player.skill > DEFAULT_SKILL);
    assert_eq!(ranking[1].player.last_name, "Bob");
    assert!(ranking[1].player.skill < DEFAULT_SKILL);
}

#[test]
fn test_sync_dir_discovers_only_log_files() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let server_id = seed_server(&db);

    let logs = TempDir::new().unwrap();
    std::fs::copy(fixture_path("match.log"), logs.path().join("match.log")).unwrap();
    std::fs::write(logs.path().join("readme.txt"), "not a log\n").unwrap();

    let mut coordinator = IngestCoordinator::new(&db);
    let result = coordinator.sync_dir(server_id, logs.path()).unwrap();

    assert_eq!(result.files_processed, 1);
    assert_eq!(result.kills_processed, 1);
    assert!(result.errors.is_empty());
}
