//! Event ingestion pipeline
//!
//! Takes a parsed [`LogEvent`] plus the server it came from and applies it to
//! the database: find-or-create players, resolve the weapon, insert the frag,
//! bump counters, and recompute both skill ratings.
//!
//! All storage steps for one kill run inside a single immediate transaction,
//! so a failure anywhere leaves no partial state and concurrent workers
//! serialize their read-modify-write sequences. The optional kill feed
//! notification goes out only after the transaction commits; delivery failure
//! never fails ingest.

use chrono::{DateTime, Utc};

use crate::db::repo::queries;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::feed::{game_channel, KillFeed, SyncPublisher};
use crate::skill;
use crate::types::{
    Actor, Frag, LogEvent, Player, Server, Weapon, weapon_title, DEFAULT_WEAPON_MODIFIER,
};

/// Result of applying one event to the database.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// A kill was recorded; ratings reflect the post-update values.
    Recorded {
        frag_id: i64,
        killer_skill: f64,
        victim_skill: f64,
    },
    /// The event is a recognized type the pipeline does not store.
    Skipped { kind: &'static str },
}

impl ProcessOutcome {
    /// True when the event produced a frag row.
    pub fn recorded(&self) -> bool {
        matches!(self, ProcessOutcome::Recorded { .. })
    }
}

/// Applies parsed events to the database and (optionally) the kill feed.
pub struct EventPipeline<'a> {
    db: &'a Database,
    publisher: Option<SyncPublisher>,
}

impl<'a> EventPipeline<'a> {
    /// Create a pipeline without feed delivery.
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            publisher: None,
        }
    }

    /// Create a pipeline that also publishes kill feed events.
    pub fn with_publisher(db: &'a Database, publisher: Option<SyncPublisher>) -> Self {
        Self { db, publisher }
    }

    /// Apply one event originating from `server_id`.
    ///
    /// Only `Kill` events write anything; every other variant is acknowledged
    /// as skipped with zero database writes. A missing server is a hard error:
    /// events must never be attributed to a server we do not know.
    pub fn process(&mut self, server_id: i64, event: &LogEvent) -> Result<ProcessOutcome> {
        match event {
            LogEvent::Kill {
                timestamp,
                killer,
                victim,
                weapon,
                headshot,
            } => self.process_kill(server_id, *timestamp, killer, victim, weapon, *headshot),
            other => {
                tracing::trace!(kind = other.kind(), server_id, "Skipping non-kill event");
                Ok(ProcessOutcome::Skipped { kind: other.kind() })
            }
        }
    }

    fn process_kill(
        &mut self,
        server_id: i64,
        timestamp: DateTime<Utc>,
        killer: &Actor,
        victim: &Actor,
        weapon_code: &str,
        headshot: bool,
    ) -> Result<ProcessOutcome> {
        let (outcome, feed) = self.db.with_immediate_tx(|tx| {
            let server = queries::get_server(tx, server_id)?
                .ok_or(Error::ServerNotFound(server_id))?;

            let killer_row = find_or_create_player(tx, &server.game_code, killer, timestamp)?;
            let victim_row = find_or_create_player(tx, &server.game_code, victim, timestamp)?;

            let weapon = resolve_weapon(tx, weapon_code, &server.game_code)?;

            let frag_id = queries::insert_frag(
                tx,
                &Frag {
                    id: 0,
                    server_id,
                    killer_id: killer_row.id,
                    victim_id: victim_row.id,
                    weapon_code: weapon.code.clone(),
                    headshot,
                    map: server.map.clone(),
                    position: killer.position,
                    event_time: timestamp,
                },
            )?;

            queries::record_kill_counters(tx, killer_row.id, victim_row.id, headshot, timestamp)?;

            // Ratings are computed from the skills read inside this same
            // transaction, so concurrent kills cannot interleave between
            // read and write.
            let new_killer_skill =
                skill::kill_rating(killer_row.skill, victim_row.skill, weapon.modifier, headshot);
            let new_victim_skill = skill::death_rating(victim_row.skill, killer_row.skill);

            queries::update_player_skill(tx, killer_row.id, new_killer_skill)?;
            queries::update_player_skill(tx, victim_row.id, new_victim_skill)?;

            queries::touch_server(tx, server_id, timestamp)?;

            let frag = Frag {
                id: frag_id,
                server_id,
                killer_id: killer_row.id,
                victim_id: victim_row.id,
                weapon_code: weapon.code,
                headshot,
                map: server.map.clone(),
                position: killer.position,
                event_time: timestamp,
            };
            let feed = KillFeed::from_frag(&frag, &killer_row, &victim_row);

            Ok((
                ProcessOutcome::Recorded {
                    frag_id,
                    killer_skill: new_killer_skill,
                    victim_skill: new_victim_skill,
                },
                (server, feed),
            ))
        })?;

        let (server, feed_event) = feed;
        self.publish(&server, feed_event);

        Ok(outcome)
    }

    /// Queue the feed notification; failures are logged and swallowed.
    fn publish(&mut self, server: &Server, event: KillFeed) {
        let Some(publisher) = self.publisher.as_mut() else {
            return;
        };

        let channel = game_channel(&server.game_code);
        if let Err(e) = publisher.queue(&channel, event) {
            tracing::warn!(
                channel = %channel,
                error = %e,
                "Failed to queue kill feed event"
            );
        }
    }

    /// Flush any buffered feed events; call before shutdown.
    pub fn flush_feed(&mut self) -> Result<usize> {
        match self.publisher.as_mut() {
            Some(publisher) => publisher.flush_all(),
            None => Ok(0),
        }
    }
}

/// Look a player up by steam id, creating the record on first sight.
///
/// New players start at the default skill with zero counters. For existing
/// players the stored display name is refreshed when the log reports a
/// different one.
fn find_or_create_player(
    conn: &rusqlite::Connection,
    game_code: &str,
    actor: &Actor,
    at: DateTime<Utc>,
) -> Result<Player> {
    if actor.steam_id.is_empty() {
        return Err(Error::InvalidEvent(
            "kill event actor has an empty steam id".to_string(),
        ));
    }

    let display_name = if actor.name.is_empty() {
        format!("Player {}", actor.steam_id)
    } else {
        actor.name.clone()
    };

    match queries::get_player_by_steam_id(conn, &actor.steam_id)? {
        Some(mut player) => {
            if player.last_name != display_name {
                queries::update_player_name(conn, player.id, &display_name)?;
                player.last_name = display_name;
            }
            Ok(player)
        }
        None => {
            tracing::debug!(
                steam_id = %actor.steam_id,
                name = %display_name,
                "Creating new player"
            );
            queries::create_player(conn, game_code, &actor.steam_id, &display_name, at)
        }
    }
}

/// Look a weapon up within the game scope, auto-creating unknown codes with
/// the neutral modifier so a new weapon never drops kills on the floor.
fn resolve_weapon(
    conn: &rusqlite::Connection,
    code: &str,
    game_code: &str,
) -> Result<Weapon> {
    if let Some(weapon) = queries::get_weapon(conn, code, game_code)? {
        return Ok(weapon);
    }

    let weapon = Weapon {
        code: code.to_string(),
        game_code: game_code.to_string(),
        name: weapon_title(code),
        modifier: DEFAULT_WEAPON_MODIFIER,
        enabled: true,
    };
    tracing::info!(
        code = %code,
        game_code = %game_code,
        "Auto-creating unknown weapon with neutral modifier"
    );
    queries::create_weapon(conn, &weapon)?;
    Ok(weapon)
}
