//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the transfer crates:
//! - Logging and tracing setup
//! - Transfer configuration (builder + validation)
//! - Progress event bus
//!
//! ## Overview
//!
//! Nothing in here knows how a transfer works. The engine in `core-transfer`
//! consumes [`config::TransferConfig`] and publishes [`events::TransferEvent`]s;
//! binaries call [`logging::init_logging`] once at startup.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
