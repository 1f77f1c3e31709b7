//! Reader and writer for the Westwood W3D chunk format, with the animation
//! channel model used to export skeletal animation.

pub mod error;
pub mod export;
pub mod format;
pub mod util;

pub use error::{ChunkError, Warning, Warnings};
pub use format::file::{Decoded, W3dChunk, W3dFile};
