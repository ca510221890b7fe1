//! # fragstats-core
//!
//! Core library for fragstats - a game server statistics tracker.
//!
//! This library provides:
//! - A log line parser turning raw server log text into typed events
//! - An ELO-style skill rating engine
//! - An ingestion pipeline that stores frags and updates player statistics
//! - Database storage layer with SQLite
//! - Configuration management and an optional kill feed publisher
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Parse:** Raw log lines are classified into typed [`LogEvent`]s
//! - **Process:** Kill events flow through the [`pipeline::EventPipeline`],
//!   which resolves players and weapons, records the frag, and updates
//!   both skill ratings atomically
//! - **Publish:** Committed frags optionally fan out to a kill feed channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use fragstats_core::{Config, Database};
//! use fragstats_core::ingest::IngestCoordinator;
//!
//! # fn main() -> fragstats_core::Result<()> {
//! let config = Config::load()?;
//! let db = Database::open(&config.resolved_database_path())?;
//! db.migrate()?;
//!
//! let mut coordinator = IngestCoordinator::new(&db);
//! let result = coordinator.sync_dir(1, std::path::Path::new("/var/log/hlds"))?;
//! println!("Recorded {} kills", result.kills_processed);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, RankedPlayer, WeaponStats};
pub use error::{Error, Result};
pub use ingest::{IngestCoordinator, SyncResult};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod skill;
pub mod types;
