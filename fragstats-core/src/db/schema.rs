//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS games (
        code             TEXT PRIMARY KEY,
        name             TEXT NOT NULL,
        enabled          INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS servers (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        game_code        TEXT NOT NULL REFERENCES games(code),
        name             TEXT NOT NULL,
        address          TEXT NOT NULL,
        port             INTEGER NOT NULL DEFAULT 27015,
        enabled          INTEGER NOT NULL DEFAULT 1,
        map              TEXT,
        last_activity    DATETIME
    );

    CREATE INDEX IF NOT EXISTS idx_servers_game ON servers(game_code);
    CREATE INDEX IF NOT EXISTS idx_servers_enabled ON servers(enabled);

    CREATE TABLE IF NOT EXISTS players (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        game_code        TEXT NOT NULL REFERENCES games(code),
        steam_id         TEXT NOT NULL UNIQUE,
        last_name        TEXT NOT NULL,
        skill            REAL NOT NULL,
        kills            INTEGER NOT NULL,
        deaths           INTEGER NOT NULL,
        headshots        INTEGER NOT NULL,
        hide_ranking     INTEGER NOT NULL DEFAULT 0,
        last_event       DATETIME
    );

    CREATE INDEX IF NOT EXISTS idx_players_game_skill ON players(game_code, skill DESC, hide_ranking);
    CREATE INDEX IF NOT EXISTS idx_players_skill_kills ON players(skill, kills);

    CREATE TABLE IF NOT EXISTS weapons (
        code             TEXT NOT NULL,
        game_code        TEXT NOT NULL REFERENCES games(code),
        name             TEXT NOT NULL,
        modifier         REAL NOT NULL,
        enabled          INTEGER NOT NULL DEFAULT 1,

        PRIMARY KEY (code, game_code)
    );

    CREATE INDEX IF NOT EXISTS idx_weapons_game ON weapons(game_code);

    CREATE TABLE IF NOT EXISTS frags (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        server_id        INTEGER NOT NULL REFERENCES servers(id),
        killer_id        INTEGER NOT NULL REFERENCES players(id),
        victim_id        INTEGER NOT NULL REFERENCES players(id),
        weapon_code      TEXT NOT NULL,
        headshot         INTEGER NOT NULL,
        map              TEXT,
        pos_x            INTEGER,
        pos_y            INTEGER,
        pos_z            INTEGER,
        event_time       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_frags_killer ON frags(killer_id);
    CREATE INDEX IF NOT EXISTS idx_frags_victim ON frags(victim_id);
    CREATE INDEX IF NOT EXISTS idx_frags_server_time ON frags(server_id, event_time);
    CREATE INDEX IF NOT EXISTS idx_frags_weapon ON frags(weapon_code);

    -- Ingest checkpoints: byte offset reached per server log file
    CREATE TABLE IF NOT EXISTS log_files (
        path             TEXT PRIMARY KEY,
        server_id        INTEGER NOT NULL REFERENCES servers(id),
        byte_offset      INTEGER NOT NULL,
        last_parsed_at   DATETIME
    );

    CREATE INDEX IF NOT EXISTS idx_log_files_server ON log_files(server_id);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
