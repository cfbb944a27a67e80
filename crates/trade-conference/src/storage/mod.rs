//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for conference jobs.

mod database;

pub use database::SqliteJobStore;
