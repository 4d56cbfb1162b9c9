//! Error types for Delve.
//!
//! Only startup-time problems are errors. Runtime terrain queries degrade to
//! documented defaults instead of failing.

use thiserror::Error;

/// Top-level error type for Delve operations.
#[derive(Debug, Error)]
pub enum DelveError {
    /// Material registry errors
    #[error("Tile database error: {0}")]
    Tiles(#[from] TileError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Material registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TileError {
    /// The database was initialized more than once
    #[error("Tile database is already initialized")]
    AlreadyInitialized,

    /// No materials were supplied (air must always be present)
    #[error("Material list is empty; air must be registered first")]
    NoMaterials,

    /// More materials than the ID space can address
    #[error("{count} materials exceed the ID space of {max}")]
    TooManyMaterials {
        /// Number of materials supplied
        count: usize,
        /// Largest supported count
        max: usize,
    },

    /// A name did not match any registered material
    #[error("Unknown material: {0}")]
    UnknownMaterial(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The values parsed but are inconsistent
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type alias for Delve operations.
pub type DelveResult<T> = Result<T, DelveError>;
