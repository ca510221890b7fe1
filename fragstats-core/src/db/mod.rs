//! Database layer for fragstats
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - Checkpoint tracking for incremental log ingestion

pub mod repo;
pub mod schema;

pub use repo::{Database, RankedPlayer, WeaponStats};
