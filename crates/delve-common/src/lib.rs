//! # Delve Common
//!
//! Common types shared by the Delve terrain engine and its hosts.
//!
//! This crate provides:
//! - Coordinate types (world, chunk grid, local and global pixels)
//! - The packed `Rgba` color used by tile grids
//! - Material ID definitions
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod color;
pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::color::*;
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::{MaterialId, AIR, MAX_MATERIALS};
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_pixel_conversion() {
        let geometry = ChunkGeometry::new(32, 32);
        let pixel = PixelCoord::new(100, 200);
        let (chunk, local) = geometry.split_pixel(pixel);

        assert_eq!(chunk, ChunkCoord::new(96, 192));
        assert_eq!(local, LocalCoord::new(4, 8));
    }

    #[test]
    fn test_material_space() {
        assert_eq!(MAX_MATERIALS, 256);
        assert_eq!(AIR, 0);
    }

    #[test]
    fn test_error_wrapping() {
        let err: DelveError = TileError::AlreadyInitialized.into();
        assert!(err.to_string().contains("already initialized"));
    }
}
