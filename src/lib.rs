//! fitqueue - durable offline request queue for the fitness tracker API
//!
//! Mutating requests made while the backend is unreachable are persisted in a
//! local `SQLite` database and replayed in order, with bounded retries and an
//! `Idempotency-Key` on every attempt, once connectivity returns.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod queue;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::QueueError;
pub use queue::QueueManager;
