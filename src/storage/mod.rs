//! Storage layer for fitqueue.
//!
//! SQLite-based persistence for the offline request queue.

mod database;
mod migrations;

pub use database::Database;
