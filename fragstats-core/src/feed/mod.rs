//! Kill feed delivery
//!
//! Optional integration with a broadcast endpoint that fans kill
//! notifications out to dashboards and spectator views.
//!
//! ## Architecture
//!
//! The feed follows a "local-first" principle:
//! - Frags are always committed to the local SQLite database first
//! - Publishing happens after the transaction commits
//! - Network failures never block ingest; at most the notification is lost
//!
//! ## Usage
//!
//! Enable the feed in `~/.config/fragstats/config.toml`:
//!
//! ```toml
//! [feed]
//! enabled = true
//! server_url = "https://feed.example.com"
//! api_key = "fs_live_xxxxxxxxxxxx"
//! ```

mod client;
mod events;
mod publisher;

pub use client::FeedClient;
pub use events::{game_channel, FeedBatch, FeedPlayer, KillFeed};
pub use publisher::{Publisher, PublishStats, SyncPublisher};
