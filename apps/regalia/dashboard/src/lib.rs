//! Terminal dashboard for the Regalia telemetry relay.
//!
//! Subscribes to the relay's websocket, discovers telemetry keys as they
//! arrive and keeps one card per key up to date.

pub mod app;
pub mod bootstrap;
pub mod cards;
pub mod config;
pub mod logging;
pub mod sort;
pub mod staleness;
pub mod terminal;
pub mod transport;
pub mod ui;
