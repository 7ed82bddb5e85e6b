//! # ORDREG Common Library
//!
//! Shared code for the ORDREG order-intake services including:
//! - Error types (`Error` enum, `Result` alias)
//! - Event types (`OrdregEvent` enum) and the broadcast `EventBus`
//! - Configuration loading and root folder resolution
//! - Database initialization and the settings table

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod fingerprint;

pub use error::{Error, Result};
pub use events::{EventBus, OrdregEvent};
