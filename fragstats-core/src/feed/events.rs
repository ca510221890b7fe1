//! Kill feed payload construction
//!
//! Converts a stored frag plus its resolved players into the wire payload
//! delivered to the feed endpoint. Receivers fan the payload out to game
//! channels; this module has no knowledge of the transport beyond the shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Frag, Player};

/// Player reference embedded in a feed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPlayer {
    pub id: i64,
    pub name: String,
}

/// One kill feed notification.
///
/// Field shape is the broadcast contract: `{killer:{id,name},
/// victim:{id,name}, weapon, headshot, timestamp}` plus a content hash the
/// receiver can use for dedup when a batch is redelivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillFeed {
    pub killer: FeedPlayer,
    pub victim: FeedPlayer,
    pub weapon: String,
    pub headshot: bool,
    pub timestamp: DateTime<Utc>,
    /// Content-based hash for deduplication (32-char hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_hash: Option<String>,
}

impl KillFeed {
    /// Build the feed payload for a newly created frag.
    pub fn from_frag(frag: &Frag, killer: &Player, victim: &Player) -> Self {
        let mut feed = KillFeed {
            killer: FeedPlayer {
                id: killer.id,
                name: killer.last_name.clone(),
            },
            victim: FeedPlayer {
                id: victim.id,
                name: victim.last_name.clone(),
            },
            weapon: frag.weapon_code.clone(),
            headshot: frag.headshot,
            timestamp: frag.event_time,
            event_hash: None,
        };
        feed.event_hash = Some(feed.compute_hash());
        feed
    }

    /// SHA-256 over the identifying fields, truncated to 32 hex chars.
    fn compute_hash(&self) -> String {
        let input = format!(
            "{}:{}:{}:{}:{}",
            self.killer.id,
            self.victim.id,
            self.weapon,
            self.headshot,
            self.timestamp.to_rfc3339()
        );

        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        let result = hasher.finalize();

        hex::encode(&result[..16])
    }
}

/// Channel name for a game's kill feed (`game.{game_code}`).
pub fn game_channel(game_code: &str) -> String {
    format!("game.{}", game_code)
}

/// Batch of feed events bound for one channel.
#[derive(Debug, Clone, Serialize)]
pub struct FeedBatch {
    /// Delivery channel (e.g. "game.cstrike")
    pub channel: String,
    /// Events to send
    pub events: Vec<KillFeed>,
}
