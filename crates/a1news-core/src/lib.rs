//! Core domain + application logic for the simplified-news bot.
//!
//! This crate is intentionally framework-agnostic. Telegram / SQLite / the
//! language-model HTTP API live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod drain;
pub mod errors;
pub mod formatting;
pub mod ingestion;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod ports;
pub mod translation;
pub mod utils;

pub use errors::{Error, Result};
