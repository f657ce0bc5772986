//! Core domain + application logic for the home alarm bot.
//!
//! This crate is intentionally framework-agnostic. Telegram, the alarm device and the
//! local HTTP listener live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod device;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod orchestrator;
pub mod poller;
pub mod registry;
pub mod state;

pub use errors::{Error, Result};
