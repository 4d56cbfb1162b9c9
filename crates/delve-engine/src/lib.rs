//! # Delve Engine
//!
//! Headless game loop for the Delve terrain engine: configuration, the
//! fixed-step drill simulation, and the mined inventory.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod app;
pub mod config;
pub mod inventory;

pub use app::{DelveApp, RunSummary};
pub use config::EngineConfig;
pub use inventory::Inventory;
