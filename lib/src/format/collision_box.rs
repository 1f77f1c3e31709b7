use std::io::Write;

use anyhow::Result;
use binrw::binrw;
use serde_derive::Serialize;

use crate::format::{
    chunk::{write_struct_chunk, Chunk},
    LargeName, Rgba, Vector3, Version, K_CHUNK_BOX,
};

pub const BOX_VERSION: Version = Version::new(1, 0);

/// Box used for collision or bounding.
#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CollisionBox {
    pub version: Version,
    /// Orientation and collision type flags.
    pub box_type: u32,
    #[br(map = LargeName::into_string)]
    #[bw(map = LargeName::from_string)]
    pub name: String,
    pub color: Rgba,
    pub center: Vector3,
    pub extend: Vector3,
}

impl CollisionBox {
    #[inline]
    pub fn name(&self) -> &str { &self.name }

    pub fn read(chunk: &Chunk) -> Result<Self> { chunk.read_struct() }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> { write_struct_chunk(w, K_CHUNK_BOX, self) }
}
