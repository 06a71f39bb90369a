//! Core of the Telegram/IRC bridge: routing, formatting, the audit log and
//! shutdown.
//!
//! This crate knows nothing about the wire protocols. IRC, Telegram and the
//! image host live behind ports (traits) implemented in adapter crates.

pub mod bridge;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod events;
pub mod formatting;
pub mod journal;
pub mod logging;
pub mod mapping;
pub mod ports;
pub mod record;
pub mod shutdown;
pub mod split;

pub use errors::{Error, Result};
