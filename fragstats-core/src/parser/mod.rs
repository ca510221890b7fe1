//! Log line parser
//!
//! Classifies one line of raw server log text against a fixed, ordered table
//! of event rules and extracts a typed [`LogEvent`] on match.
//!
//! ## Matching policy
//!
//! Rules are tried in a fixed priority order; the first whose pattern matches
//! wins and no further rules are evaluated. A line matching none of the rules
//! is a valid "no event" outcome (`Ok(None)`), never an error. The only
//! per-line error is a timestamp that fails to parse on a line that
//! structurally matched a rule, which indicates rule/text mismatch and is
//! propagated loudly.
//!
//! ## Line format
//!
//! Every recognized line starts with `L MM/DD/YYYY - HH:MM:SS:` followed by
//! one of seven event bodies:
//!
//! ```text
//! "name<slot><steam_id><team>" [x y z] killed "..." [x y z] with "ak47" (headshot)
//! "name<slot><steam_id><>" connected, address "1.2.3.4:27005"
//! "name<slot><steam_id><team>" disconnected (reason "...")
//! "name<slot><steam_id><team>" say "..."
//! "name<slot><steam_id><team>" say_team "..."
//! Loading map "de_dust2"
//! World triggered "Round_End"
//! ```

pub mod timestamp;

pub use timestamp::{format_timestamp, parse_timestamp, LOG_TIME_FORMAT};

use crate::error::{Error, Result};
use crate::types::{Actor, LogEvent, Position};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Extraction function applied to a rule's captures.
type Extract = fn(&Captures) -> Result<LogEvent>;

/// One entry in the classification table.
struct EventRule {
    kind: &'static str,
    regex: Regex,
    extract: Extract,
}

/// Rule table, in priority order. First match wins.
static RULES: LazyLock<Vec<EventRule>> = LazyLock::new(|| {
    vec![
        EventRule {
            kind: "kill",
            regex: Regex::new(
                r#"^L (\d{2}/\d{2}/\d{4} - \d{2}:\d{2}:\d{2}): "(.+?)<(\d+)><(.+?)><(.+?)>" (?:\[(-?\d+) (-?\d+) (-?\d+)\] )?killed "(.+?)<(\d+)><(.+?)><(.+?)>" (?:\[(-?\d+) (-?\d+) (-?\d+)\] )?with "(.+?)"(?: \((.+?)\))?"#,
            )
            .expect("kill pattern is valid"),
            extract: extract_kill,
        },
        EventRule {
            kind: "connect",
            regex: Regex::new(
                r#"^L (\d{2}/\d{2}/\d{4} - \d{2}:\d{2}:\d{2}): "(.+?)<(\d+)><(.+?)><>" connected, address "(.+?):(\d+)""#,
            )
            .expect("connect pattern is valid"),
            extract: extract_connect,
        },
        EventRule {
            kind: "disconnect",
            regex: Regex::new(
                r#"^L (\d{2}/\d{2}/\d{4} - \d{2}:\d{2}:\d{2}): "(.+?)<(\d+)><(.+?)><(.+?)>" disconnected \(reason "(.+?)"\)"#,
            )
            .expect("disconnect pattern is valid"),
            extract: extract_disconnect,
        },
        EventRule {
            kind: "chat",
            regex: Regex::new(
                r#"^L (\d{2}/\d{2}/\d{4} - \d{2}:\d{2}:\d{2}): "(.+?)<(\d+)><(.+?)><(.+?)>" say "(.+?)""#,
            )
            .expect("chat pattern is valid"),
            extract: extract_chat,
        },
        EventRule {
            kind: "team_chat",
            regex: Regex::new(
                r#"^L (\d{2}/\d{2}/\d{4} - \d{2}:\d{2}:\d{2}): "(.+?)<(\d+)><(.+?)><(.+?)>" say_team "(.+?)""#,
            )
            .expect("team_chat pattern is valid"),
            extract: extract_team_chat,
        },
        EventRule {
            kind: "map_change",
            regex: Regex::new(
                r#"^L (\d{2}/\d{2}/\d{4} - \d{2}:\d{2}:\d{2}): Loading map "(.+?)""#,
            )
            .expect("map_change pattern is valid"),
            extract: extract_map_change,
        },
        EventRule {
            kind: "round_end",
            regex: Regex::new(
                r#"^L (\d{2}/\d{2}/\d{4} - \d{2}:\d{2}:\d{2}): World triggered "Round_End""#,
            )
            .expect("round_end pattern is valid"),
            extract: extract_round_end,
        },
    ]
});

/// Classify one log line.
///
/// Returns `Ok(Some(event))` when a rule matched, `Ok(None)` for
/// unrecognized lines, and `Err` only when a matched line carries an
/// unparsable timestamp or numeric field.
pub fn parse_line(line: &str) -> Result<Option<LogEvent>> {
    for rule in RULES.iter() {
        if let Some(caps) = rule.regex.captures(line) {
            tracing::trace!(kind = rule.kind, "Log line matched rule");
            return (rule.extract)(&caps).map(Some);
        }
    }
    Ok(None)
}

// ============================================
// Capture helpers
// ============================================

/// Required string capture; rules guarantee presence, so absence is a bug in
/// the rule table itself.
fn group<'c>(caps: &'c Captures, index: usize) -> Result<&'c str> {
    caps.get(index)
        .map(|m| m.as_str())
        .ok_or_else(|| Error::InvalidEvent(format!("missing capture group {index}")))
}

fn int_group<T: std::str::FromStr>(caps: &Captures, index: usize) -> Result<T> {
    let text = group(caps, index)?;
    text.parse()
        .map_err(|_| Error::InvalidEvent(format!("invalid integer {text:?} in group {index}")))
}

/// Optional `[x y z]` block starting at `base`. The three groups match or
/// fail together, so checking the first is enough.
fn position_at(caps: &Captures, base: usize) -> Result<Option<Position>> {
    if caps.get(base).is_none() {
        return Ok(None);
    }
    Ok(Some(Position {
        x: int_group(caps, base)?,
        y: int_group(caps, base + 1)?,
        z: int_group(caps, base + 2)?,
    }))
}

/// Identity quadruple starting at `base`: name, slot, steam_id, team.
fn actor_at(caps: &Captures, base: usize) -> Result<Actor> {
    Ok(Actor {
        name: group(caps, base)?.to_string(),
        slot: int_group(caps, base + 1)?,
        steam_id: group(caps, base + 2)?.to_string(),
        team: group(caps, base + 3)?.to_string(),
        position: None,
    })
}

// ============================================
// Per-rule extractors
// ============================================

fn extract_kill(caps: &Captures) -> Result<LogEvent> {
    let mut killer = actor_at(caps, 2)?;
    killer.position = position_at(caps, 6)?;

    let mut victim = actor_at(caps, 9)?;
    victim.position = position_at(caps, 13)?;

    // The trailing parenthesized block is free text; headshot is flagged by
    // the literal substring, matching source server behavior.
    let headshot = caps
        .get(17)
        .map(|m| m.as_str().contains("headshot"))
        .unwrap_or(false);

    Ok(LogEvent::Kill {
        timestamp: parse_timestamp(group(caps, 1)?)?,
        killer,
        victim,
        weapon: group(caps, 16)?.to_string(),
        headshot,
    })
}

fn extract_connect(caps: &Captures) -> Result<LogEvent> {
    Ok(LogEvent::Connect {
        timestamp: parse_timestamp(group(caps, 1)?)?,
        player: Actor {
            name: group(caps, 2)?.to_string(),
            slot: int_group(caps, 3)?,
            steam_id: group(caps, 4)?.to_string(),
            // No team assigned yet at connect time
            team: String::new(),
            position: None,
        },
        ip_address: group(caps, 5)?.to_string(),
        port: int_group(caps, 6)?,
    })
}

fn extract_disconnect(caps: &Captures) -> Result<LogEvent> {
    Ok(LogEvent::Disconnect {
        timestamp: parse_timestamp(group(caps, 1)?)?,
        player: actor_at(caps, 2)?,
        reason: group(caps, 6)?.to_string(),
    })
}

fn extract_chat(caps: &Captures) -> Result<LogEvent> {
    Ok(LogEvent::Chat {
        timestamp: parse_timestamp(group(caps, 1)?)?,
        player: actor_at(caps, 2)?,
        message: group(caps, 6)?.to_string(),
    })
}

fn extract_team_chat(caps: &Captures) -> Result<LogEvent> {
    Ok(LogEvent::TeamChat {
        timestamp: parse_timestamp(group(caps, 1)?)?,
        player: actor_at(caps, 2)?,
        message: group(caps, 6)?.to_string(),
    })
}

fn extract_map_change(caps: &Captures) -> Result<LogEvent> {
    Ok(LogEvent::MapChange {
        timestamp: parse_timestamp(group(caps, 1)?)?,
        map: group(caps, 2)?.to_string(),
    })
}

fn extract_round_end(caps: &Captures) -> Result<LogEvent> {
    Ok(LogEvent::RoundEnd {
        timestamp: parse_timestamp(group(caps, 1)?)?,
    })
}
