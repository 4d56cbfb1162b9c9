//! # Delve
//!
//! Entry point for the headless Delve runner.
//!
//! Usage: `delve [config.toml]` (defaults to `delve.toml` in the working
//! directory, or built-in defaults when that file is missing).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use delve_engine::{app, EngineConfig};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("delve=info".parse()?))
        .init();

    info!("Delve starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = EngineConfig::load(path.as_deref())?;

    app::run(config)?;

    info!("Delve shutdown complete");
    Ok(())
}
