//! Database repository layer
//!
//! Provides query and insert operations for all entity types.
//!
//! The ingestion pipeline runs its storage steps inside a single immediate
//! transaction via [`Database::with_immediate_tx`]; the row-level operations
//! live in [`queries`] so they work against either the shared handle or an
//! open transaction.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::PathBuf;
use std::sync::Mutex;

/// One row of the ranking view: a player plus their rank position.
#[derive(Debug, Clone)]
pub struct RankedPlayer {
    pub rank: i64,
    pub player: Player,
}

/// Aggregate kill statistics for one weapon.
#[derive(Debug, Clone)]
pub struct WeaponStats {
    pub code: String,
    pub name: String,
    pub modifier: f64,
    pub kills: i64,
    pub headshots: i64,
}

/// Database handle with a single shared connection
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Run `f` inside a single immediate-mode transaction.
    ///
    /// Immediate mode takes the write lock up front, so concurrent workers
    /// serialize their read-modify-write sequences instead of losing updates.
    /// Any error rolls the whole transaction back; partial state is never
    /// committed.
    pub fn with_immediate_tx<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // ============================================
    // Game operations
    // ============================================

    /// Insert or update a game
    pub fn upsert_game(&self, game: &Game) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO games (code, name, enabled)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                enabled = excluded.enabled
            "#,
            params![game.code, game.name, game.enabled],
        )?;
        Ok(())
    }

    /// Get a game by code
    pub fn get_game(&self, code: &str) -> Result<Option<Game>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM games WHERE code = ?", [code], |row| {
            queries::row_to_game(row)
        })
        .optional()
        .map_err(Error::from)
    }

    // ============================================
    // Server operations
    // ============================================

    /// Insert a server, returning its assigned id
    pub fn insert_server(&self, server: &Server) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO servers (game_code, name, address, port, enabled, map, last_activity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                server.game_code,
                server.name,
                server.address,
                server.port,
                server.enabled,
                server.map,
                server.last_activity.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a server by id
    pub fn get_server(&self, id: i64) -> Result<Option<Server>> {
        let conn = self.conn.lock().unwrap();
        queries::get_server(&conn, id)
    }

    /// All registered servers, ordered by id
    pub fn list_servers(&self) -> Result<Vec<Server>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM servers ORDER BY id")?;
        let servers = stmt
            .query_map([], queries::row_to_server)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(servers)
    }

    /// Record a map change on a server; subsequent frags use the new map
    pub fn update_server_map(&self, server_id: i64, map: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE servers SET map = ?1, last_activity = ?2 WHERE id = ?3",
            params![map, at.to_rfc3339(), server_id],
        )?;
        Ok(())
    }

    // ============================================
    // Player operations
    // ============================================

    /// Get a player by persistent id
    pub fn get_player_by_steam_id(&self, steam_id: &str) -> Result<Option<Player>> {
        let conn = self.conn.lock().unwrap();
        queries::get_player_by_steam_id(&conn, steam_id)
    }

    /// Ranking: top players by skill within a game, hidden players excluded
    pub fn top_players(&self, game_code: &str, limit: i64) -> Result<Vec<RankedPlayer>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM players
            WHERE game_code = ?1 AND hide_ranking = 0
            ORDER BY skill DESC, kills DESC
            LIMIT ?2
            "#,
        )?;

        let players = stmt
            .query_map(params![game_code, limit], queries::row_to_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(players
            .into_iter()
            .enumerate()
            .map(|(i, player)| RankedPlayer {
                rank: (i + 1) as i64,
                player,
            })
            .collect())
    }

    /// Total player count
    pub fn player_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM players", [], |r| r.get(0))
            .map_err(Error::from)
    }

    // ============================================
    // Weapon operations
    // ============================================

    /// Insert or update a weapon
    pub fn upsert_weapon(&self, weapon: &Weapon) -> Result<()> {
        if weapon.modifier < 0.0 {
            tracing::warn!(
                code = %weapon.code,
                modifier = weapon.modifier,
                "Weapon has a negative modifier; kills with it will reduce killer skill"
            );
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO weapons (code, game_code, name, modifier, enabled)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(code, game_code) DO UPDATE SET
                name = excluded.name,
                modifier = excluded.modifier,
                enabled = excluded.enabled
            "#,
            params![
                weapon.code,
                weapon.game_code,
                weapon.name,
                weapon.modifier,
                weapon.enabled
            ],
        )?;
        Ok(())
    }

    /// Get a weapon by code within a game scope
    pub fn get_weapon(&self, code: &str, game_code: &str) -> Result<Option<Weapon>> {
        let conn = self.conn.lock().unwrap();
        queries::get_weapon(&conn, code, game_code)
    }

    /// Kill/headshot totals per weapon for a game, busiest first
    pub fn weapon_stats(&self, game_code: &str) -> Result<Vec<WeaponStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT w.code, w.name, w.modifier,
                   COUNT(f.id) AS kills,
                   COALESCE(SUM(f.headshot), 0) AS headshots
            FROM weapons w
            LEFT JOIN frags f ON f.weapon_code = w.code
                AND f.server_id IN (SELECT id FROM servers WHERE game_code = w.game_code)
            WHERE w.game_code = ?1
            GROUP BY w.code, w.name, w.modifier
            ORDER BY kills DESC
            "#,
        )?;

        let stats = stmt
            .query_map([game_code], |row| {
                Ok(WeaponStats {
                    code: row.get("code")?,
                    name: row.get("name")?,
                    modifier: row.get("modifier")?,
                    kills: row.get("kills")?,
                    headshots: row.get("headshots")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(stats)
    }

    // ============================================
    // Frag operations
    // ============================================

    /// Total frag count
    pub fn frag_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM frags", [], |r| r.get(0))
            .map_err(Error::from)
    }

    /// Most recent frags for a server, newest first
    pub fn recent_frags(&self, server_id: i64, limit: i64) -> Result<Vec<Frag>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM frags WHERE server_id = ?1 ORDER BY event_time DESC, id DESC LIMIT ?2",
        )?;
        let frags = stmt
            .query_map(params![server_id, limit], queries::row_to_frag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(frags)
    }

    // ============================================
    // Ingest checkpoint operations
    // ============================================

    /// Byte offset reached in a log file, or 0 if never parsed
    pub fn get_log_offset(&self, path: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let offset: Option<i64> = conn
            .query_row(
                "SELECT byte_offset FROM log_files WHERE path = ?",
                [path],
                |r| r.get(0),
            )
            .optional()?;
        Ok(offset.unwrap_or(0).max(0) as u64)
    }

    /// Record the byte offset reached in a log file
    pub fn set_log_offset(&self, path: &str, server_id: i64, offset: u64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO log_files (path, server_id, byte_offset, last_parsed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(path) DO UPDATE SET
                byte_offset = excluded.byte_offset,
                last_parsed_at = excluded.last_parsed_at
            "#,
            params![path, server_id, offset as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// Row-level operations usable on the shared handle or inside a transaction.
pub(crate) mod queries {
    use super::*;

    pub fn get_server(conn: &Connection, id: i64) -> Result<Option<Server>> {
        conn.query_row("SELECT * FROM servers WHERE id = ?", [id], row_to_server)
            .optional()
            .map_err(Error::from)
    }

    pub fn get_player_by_steam_id(conn: &Connection, steam_id: &str) -> Result<Option<Player>> {
        conn.query_row(
            "SELECT * FROM players WHERE steam_id = ?",
            [steam_id],
            row_to_player,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Create a player with explicit defaults, returning the stored record.
    pub fn create_player(
        conn: &Connection,
        game_code: &str,
        steam_id: &str,
        last_name: &str,
        last_event: DateTime<Utc>,
    ) -> Result<Player> {
        conn.execute(
            r#"
            INSERT INTO players
                (game_code, steam_id, last_name, skill, kills, deaths, headshots, hide_ranking, last_event)
            VALUES (?1, ?2, ?3, ?4, 0, 0, 0, 0, ?5)
            "#,
            params![
                game_code,
                steam_id,
                last_name,
                DEFAULT_SKILL,
                last_event.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Player {
            id,
            game_code: game_code.to_string(),
            steam_id: steam_id.to_string(),
            last_name: last_name.to_string(),
            skill: DEFAULT_SKILL,
            kills: 0,
            deaths: 0,
            headshots: 0,
            hide_ranking: false,
            last_event: Some(last_event),
        })
    }

    pub fn get_weapon(conn: &Connection, code: &str, game_code: &str) -> Result<Option<Weapon>> {
        conn.query_row(
            "SELECT * FROM weapons WHERE code = ?1 AND game_code = ?2",
            params![code, game_code],
            row_to_weapon,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn create_weapon(conn: &Connection, weapon: &Weapon) -> Result<()> {
        conn.execute(
            "INSERT INTO weapons (code, game_code, name, modifier, enabled) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                weapon.code,
                weapon.game_code,
                weapon.name,
                weapon.modifier,
                weapon.enabled
            ],
        )?;
        Ok(())
    }

    pub fn insert_frag(conn: &Connection, frag: &Frag) -> Result<i64> {
        conn.execute(
            r#"
            INSERT INTO frags
                (server_id, killer_id, victim_id, weapon_code, headshot, map,
                 pos_x, pos_y, pos_z, event_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                frag.server_id,
                frag.killer_id,
                frag.victim_id,
                frag.weapon_code,
                frag.headshot,
                frag.map,
                frag.position.map(|p| p.x),
                frag.position.map(|p| p.y),
                frag.position.map(|p| p.z),
                frag.event_time.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Counter increments are expressed in SQL so they are atomic under
    /// concurrent workers.
    pub fn record_kill_counters(
        conn: &Connection,
        killer_id: i64,
        victim_id: i64,
        headshot: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            r#"
            UPDATE players
            SET kills = kills + 1,
                headshots = headshots + ?1,
                last_event = ?2
            WHERE id = ?3
            "#,
            params![headshot as i64, at.to_rfc3339(), killer_id],
        )?;
        conn.execute(
            "UPDATE players SET deaths = deaths + 1, last_event = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), victim_id],
        )?;
        Ok(())
    }

    pub fn update_player_skill(conn: &Connection, player_id: i64, skill: f64) -> Result<()> {
        conn.execute(
            "UPDATE players SET skill = ?1 WHERE id = ?2",
            params![skill, player_id],
        )?;
        Ok(())
    }

    /// Keep the stored display name current with what the log last reported.
    pub fn update_player_name(conn: &Connection, player_id: i64, name: &str) -> Result<()> {
        conn.execute(
            "UPDATE players SET last_name = ?1 WHERE id = ?2",
            params![name, player_id],
        )?;
        Ok(())
    }

    pub fn touch_server(conn: &Connection, server_id: i64, at: DateTime<Utc>) -> Result<()> {
        conn.execute(
            "UPDATE servers SET last_activity = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), server_id],
        )?;
        Ok(())
    }

    // ============================================
    // Row mappers
    // ============================================

    pub fn row_to_game(row: &Row) -> rusqlite::Result<Game> {
        Ok(Game {
            code: row.get("code")?,
            name: row.get("name")?,
            enabled: row.get("enabled")?,
        })
    }

    pub fn row_to_server(row: &Row) -> rusqlite::Result<Server> {
        Ok(Server {
            id: row.get("id")?,
            game_code: row.get("game_code")?,
            name: row.get("name")?,
            address: row.get("address")?,
            port: row.get("port")?,
            enabled: row.get("enabled")?,
            map: row.get("map")?,
            last_activity: parse_datetime(row.get::<_, Option<String>>("last_activity")?),
        })
    }

    pub fn row_to_player(row: &Row) -> rusqlite::Result<Player> {
        Ok(Player {
            id: row.get("id")?,
            game_code: row.get("game_code")?,
            steam_id: row.get("steam_id")?,
            last_name: row.get("last_name")?,
            skill: row.get("skill")?,
            kills: row.get("kills")?,
            deaths: row.get("deaths")?,
            headshots: row.get("headshots")?,
            hide_ranking: row.get("hide_ranking")?,
            last_event: parse_datetime(row.get::<_, Option<String>>("last_event")?),
        })
    }

    pub fn row_to_weapon(row: &Row) -> rusqlite::Result<Weapon> {
        Ok(Weapon {
            code: row.get("code")?,
            game_code: row.get("game_code")?,
            name: row.get("name")?,
            modifier: row.get("modifier")?,
            enabled: row.get("enabled")?,
        })
    }

    pub fn row_to_frag(row: &Row) -> rusqlite::Result<Frag> {
        let pos_x: Option<i32> = row.get("pos_x")?;
        let pos_y: Option<i32> = row.get("pos_y")?;
        let pos_z: Option<i32> = row.get("pos_z")?;
        let position = match (pos_x, pos_y, pos_z) {
            (Some(x), Some(y), Some(z)) => Some(Position { x, y, z }),
            _ => None,
        };

        let event_time: String = row.get("event_time")?;
        Ok(Frag {
            id: row.get("id")?,
            server_id: row.get("server_id")?,
            killer_id: row.get("killer_id")?,
            victim_id: row.get("victim_id")?,
            weapon_code: row.get("weapon_code")?,
            headshot: row.get("headshot")?,
            map: row.get("map")?,
            position,
            event_time: DateTime::parse_from_rfc3339(&event_time)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn parse_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
        value.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
    }
}
