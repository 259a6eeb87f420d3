//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for the address registry, transaction log,
//!   position snapshots and market parameters

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
