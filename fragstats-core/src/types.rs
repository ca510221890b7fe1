//! Core domain types for fragstats
//!
//! These types form the canonical data model shared by the parser, the skill
//! engine, the storage layer, and the kill feed.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Game** | A supported game title, keyed by a short code (e.g. `cstrike`) |
//! | **Server** | A game server instance whose log stream we ingest |
//! | **Player** | A durable player record, keyed by steam id across sessions |
//! | **Weapon** | A weapon code within a game, carrying a skill modifier |
//! | **Frag** | One recorded kill: killer, victim, weapon, map, time, position |
//! | **Skill** | ELO-style rating attached 1:1 to a player |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Starting skill for a freshly created player.
pub const DEFAULT_SKILL: f64 = 1000.0;

/// Default modifier assigned when a weapon is auto-created during ingest.
pub const DEFAULT_WEAPON_MODIFIER: f64 = 1.0;

// ============================================
// Parsed log events
// ============================================

/// A world position captured from a bracketed `[x y z]` block.
///
/// Coordinates are signed; absence of the block means `None`, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// A player reference as it appears in a log line: the quoted
/// `"name<slot><steam_id><team>"` quadruple, plus the optional position
/// that may precede/follow it in kill lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Display name at the time of the event
    pub name: String,
    /// In-server slot id (not durable across sessions)
    pub slot: i64,
    /// Persistent platform id, the durable player key
    pub steam_id: String,
    /// Team tag; empty on connect lines where no team is assigned yet
    pub team: String,
    /// World position, when the line carried a `[x y z]` block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// One typed event extracted from a raw log line.
///
/// Every variant carries the absolute event timestamp. Only `Kill` is
/// processed further by the ingestion pipeline; the other variants are in
/// scope for parsing but handed back to the caller untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Kill {
        timestamp: DateTime<Utc>,
        killer: Actor,
        victim: Actor,
        weapon: String,
        headshot: bool,
    },
    Connect {
        timestamp: DateTime<Utc>,
        player: Actor,
        ip_address: String,
        port: i64,
    },
    Disconnect {
        timestamp: DateTime<Utc>,
        player: Actor,
        reason: String,
    },
    Chat {
        timestamp: DateTime<Utc>,
        player: Actor,
        message: String,
    },
    TeamChat {
        timestamp: DateTime<Utc>,
        player: Actor,
        message: String,
    },
    MapChange {
        timestamp: DateTime<Utc>,
        map: String,
    },
    RoundEnd {
        timestamp: DateTime<Utc>,
    },
}

impl LogEvent {
    /// The absolute time this event occurred.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LogEvent::Kill { timestamp, .. }
            | LogEvent::Connect { timestamp, .. }
            | LogEvent::Disconnect { timestamp, .. }
            | LogEvent::Chat { timestamp, .. }
            | LogEvent::TeamChat { timestamp, .. }
            | LogEvent::MapChange { timestamp, .. }
            | LogEvent::RoundEnd { timestamp } => *timestamp,
        }
    }

    /// Stable identifier used in logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            LogEvent::Kill { .. } => "kill",
            LogEvent::Connect { .. } => "connect",
            LogEvent::Disconnect { .. } => "disconnect",
            LogEvent::Chat { .. } => "chat",
            LogEvent::TeamChat { .. } => "team_chat",
            LogEvent::MapChange { .. } => "map_change",
            LogEvent::RoundEnd { .. } => "round_end",
        }
    }
}

// ============================================
// Stored entities
// ============================================

/// A supported game title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    /// Short code, primary key (e.g. "cstrike")
    pub code: String,
    pub name: String,
    pub enabled: bool,
}

/// A game server whose logs feed the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    /// Game this server hosts
    pub game_code: String,
    pub name: String,
    pub address: String,
    pub port: i64,
    pub enabled: bool,
    /// Map currently being played; used as the frag map context
    pub map: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// A durable player record.
///
/// `steam_id` is the unique lookup key; `last_name` is whatever name the
/// player most recently used and carries no identity weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub game_code: String,
    pub steam_id: String,
    pub last_name: String,
    /// ELO-style rating, floored at zero
    pub skill: f64,
    pub kills: i64,
    pub deaths: i64,
    pub headshots: i64,
    /// Excluded from ranking queries when set
    pub hide_ranking: bool,
    pub last_event: Option<DateTime<Utc>>,
}

impl Player {
    /// Kills per death; whole kill count when the player has never died.
    pub fn kd_ratio(&self) -> f64 {
        if self.deaths == 0 {
            self.kills as f64
        } else {
            self.kills as f64 / self.deaths as f64
        }
    }
}

/// A weapon within a game scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    /// Weapon code as it appears in kill lines, primary key
    pub code: String,
    pub game_code: String,
    pub name: String,
    /// Skill-change multiplier for kills with this weapon
    pub modifier: f64,
    pub enabled: bool,
}

/// One recorded kill. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frag {
    pub id: i64,
    pub server_id: i64,
    pub killer_id: i64,
    pub victim_id: i64,
    pub weapon_code: String,
    pub headshot: bool,
    pub map: Option<String>,
    /// Killer position at the time of the kill, when the line carried one
    pub position: Option<Position>,
    pub event_time: DateTime<Utc>,
}

/// Title-case a weapon code into a display name ("ak47" -> "Ak47",
/// "desert_eagle" -> "Desert Eagle"). Used when auto-creating weapons.
pub fn weapon_title(code: &str) -> String {
    code.split(['_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
