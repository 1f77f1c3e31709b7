use std::io::Write;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_derive::Serialize;

use crate::{
    error::{Warning, Warnings},
    format::{
        animation::Animation,
        chunk::{ChunkReader, OpaqueChunk},
        collision_box::CollisionBox,
        compressed_animation::CompressedAnimation,
        dazzle::Dazzle,
        hierarchy::Hierarchy,
        hlod::Hlod,
        mesh::Mesh,
        ChunkType, K_CHUNK_ANIMATION, K_CHUNK_BOX, K_CHUNK_COMPRESSED_ANIMATION, K_CHUNK_DAZZLE,
        K_CHUNK_HIERARCHY, K_CHUNK_HLOD, K_CHUNK_MESH,
    },
};

/// Top-level chunk of a W3D file.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum W3dChunk {
    Mesh(Mesh),
    Hierarchy(Hierarchy),
    Animation(Animation),
    CompressedAnimation(CompressedAnimation),
    Hlod(Hlod),
    CollisionBox(CollisionBox),
    Dazzle(Dazzle),
    /// Unknown or unsupported chunk, retained byte for byte.
    Opaque(OpaqueChunk),
}

impl W3dChunk {
    pub fn kind(&self) -> ChunkType {
        match self {
            W3dChunk::Mesh(_) => K_CHUNK_MESH,
            W3dChunk::Hierarchy(_) => K_CHUNK_HIERARCHY,
            W3dChunk::Animation(_) => K_CHUNK_ANIMATION,
            W3dChunk::CompressedAnimation(_) => K_CHUNK_COMPRESSED_ANIMATION,
            W3dChunk::Hlod(_) => K_CHUNK_HLOD,
            W3dChunk::CollisionBox(_) => K_CHUNK_BOX,
            W3dChunk::Dazzle(_) => K_CHUNK_DAZZLE,
            W3dChunk::Opaque(c) => c.kind,
        }
    }

    /// Name of the contained structure, if it carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            W3dChunk::Mesh(m) => Some(m.name()),
            W3dChunk::Hierarchy(h) => Some(h.name()),
            W3dChunk::Animation(a) => Some(a.name()),
            W3dChunk::CompressedAnimation(a) => Some(a.name()),
            W3dChunk::Hlod(h) => Some(h.name()),
            W3dChunk::CollisionBox(b) => Some(b.name()),
            W3dChunk::Dazzle(d) => Some(d.name()),
            W3dChunk::Opaque(_) => None,
        }
    }

    /// Position in an exported file: hierarchy, animations, meshes and
    /// dazzles, HLOD, boxes.
    fn export_rank(&self) -> u8 {
        match self {
            W3dChunk::Hierarchy(_) => 0,
            W3dChunk::Animation(_) | W3dChunk::CompressedAnimation(_) => 1,
            W3dChunk::Mesh(_) | W3dChunk::Dazzle(_) => 2,
            W3dChunk::Hlod(_) => 3,
            W3dChunk::CollisionBox(_) => 4,
            W3dChunk::Opaque(_) => 5,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            W3dChunk::Mesh(m) => m.write(w),
            W3dChunk::Hierarchy(h) => h.write(w),
            W3dChunk::Animation(a) => a.write(w),
            W3dChunk::CompressedAnimation(a) => a.write(w),
            W3dChunk::Hlod(h) => h.write(w),
            W3dChunk::CollisionBox(b) => b.write(w),
            W3dChunk::Dazzle(d) => d.write(w),
            W3dChunk::Opaque(c) => c.write(w),
        }
    }
}

/// Result of decoding a file.
#[derive(Clone, Debug)]
pub struct Decoded {
    pub file: W3dFile,
    pub warnings: Warnings,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct W3dFile {
    pub chunks: Vec<W3dChunk>,
}

macro_rules! chunk_accessor {
    ($fn:ident, $variant:ident, $ty:ty) => {
        pub fn $fn(&self) -> impl Iterator<Item = &$ty> {
            self.chunks.iter().filter_map(|c| match c {
                W3dChunk::$variant(v) => Some(v),
                _ => None,
            })
        }
    };
}

impl W3dFile {
    /// Decodes a whole file. Fatal errors abort without a partial result.
    pub fn read(data: &[u8]) -> Result<Decoded> {
        let mut warnings = Warnings::new();
        let mut chunks = vec![];
        let mut reader = ChunkReader::new(data);
        while let Some(chunk) = reader.next_chunk()? {
            let kind = chunk.kind();
            let context = || format!("Failed to decode {:?} chunk at {:#X}", kind, chunk.offset);
            chunks.push(match kind {
                K_CHUNK_MESH => {
                    W3dChunk::Mesh(Mesh::read(&chunk, &mut warnings).with_context(context)?)
                }
                K_CHUNK_HIERARCHY => W3dChunk::Hierarchy(
                    Hierarchy::read(&chunk, &mut warnings).with_context(context)?,
                ),
                K_CHUNK_ANIMATION => W3dChunk::Animation(
                    Animation::read(&chunk, &mut warnings).with_context(context)?,
                ),
                K_CHUNK_COMPRESSED_ANIMATION => W3dChunk::CompressedAnimation(
                    CompressedAnimation::read(&chunk, &mut warnings).with_context(context)?,
                ),
                K_CHUNK_HLOD => {
                    W3dChunk::Hlod(Hlod::read(&chunk, &mut warnings).with_context(context)?)
                }
                K_CHUNK_BOX => {
                    W3dChunk::CollisionBox(CollisionBox::read(&chunk).with_context(context)?)
                }
                K_CHUNK_DAZZLE => {
                    W3dChunk::Dazzle(Dazzle::read(&chunk, &mut warnings).with_context(context)?)
                }
                kind => {
                    let size = chunk.head.size;
                    if kind.is_known() {
                        warnings.push(Warning::UnsupportedChunk { kind, size });
                    } else {
                        warnings.push(Warning::UnknownChunk { kind, size, parent: None });
                    }
                    W3dChunk::Opaque(OpaqueChunk::from(&chunk))
                }
            });
        }
        log::debug!("Decoded {} top level chunks, {} warnings", chunks.len(), warnings.len());
        Ok(Decoded { file: W3dFile { chunks }, warnings })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        for chunk in &self.chunks {
            chunk.write(w)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    chunk_accessor!(meshes, Mesh, Mesh);
    chunk_accessor!(hierarchies, Hierarchy, Hierarchy);
    chunk_accessor!(animations, Animation, Animation);
    chunk_accessor!(compressed_animations, CompressedAnimation, CompressedAnimation);
    chunk_accessor!(hlods, Hlod, Hlod);
    chunk_accessor!(boxes, CollisionBox, CollisionBox);
    chunk_accessor!(dazzles, Dazzle, Dazzle);

    /// Dazzles placed by the sub objects of `hlod`, matched by name.
    pub fn hlod_dazzles<'a>(&'a self, hlod: &'a Hlod) -> impl Iterator<Item = &'a Dazzle> + 'a {
        self.dazzles().filter(move |d| {
            hlod.lod_arrays
                .iter()
                .chain(&hlod.aggregate_array)
                .chain(&hlod.proxy_array)
                .any(|array| array.sub_objects.iter().any(|s| s.name == d.name))
        })
    }

    /// Stable reorder into export order.
    pub fn sort_for_export(&mut self) { self.chunks.sort_by_key(W3dChunk::export_rank); }

    /// Splits into one file per hierarchy, mesh, box and animation. Everything
    /// else goes to `<main_name>.w3d`. Chunks sharing a name share a file.
    pub fn split_individual(&self, main_name: &str) -> Result<IndexMap<String, Vec<u8>>> {
        let mut files: IndexMap<String, Vec<u8>> = IndexMap::new();
        for chunk in &self.chunks {
            let name = match chunk {
                W3dChunk::Hierarchy(_)
                | W3dChunk::Mesh(_)
                | W3dChunk::CollisionBox(_)
                | W3dChunk::Animation(_)
                | W3dChunk::CompressedAnimation(_) => chunk.name().unwrap_or(main_name),
                W3dChunk::Hlod(_) | W3dChunk::Dazzle(_) | W3dChunk::Opaque(_) => main_name,
            };
            chunk.write(files.entry(format!("{name}.w3d")).or_default())?;
        }
        Ok(files)
    }
}
