//! # Delve World
//!
//! The chunked destructible-terrain engine.
//!
//! This crate handles:
//! - The material registry
//! - Noise-driven chunk generation
//! - Threaded and stepped chunk producers
//! - Chunk streaming around a moving focus
//! - Point, region and line tile queries

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod cellular;
pub mod chunk;
pub mod config;
pub mod generation;
pub mod noise_field;
pub mod producer;
pub mod queries;
pub mod spiral;
pub mod streaming;
pub mod tiles;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cellular::*;
    pub use crate::chunk::*;
    pub use crate::config::*;
    pub use crate::generation::*;
    pub use crate::noise_field::*;
    pub use crate::producer::*;
    pub use crate::queries::*;
    pub use crate::spiral::*;
    pub use crate::streaming::*;
    pub use crate::tiles::*;
}

pub use prelude::*;
