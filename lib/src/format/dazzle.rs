use std::io::Write;

use anyhow::{bail, Result};
use serde_derive::Serialize;

use crate::{
    error::{Warning, Warnings},
    format::{
        chunk::{write_chunk, write_string_chunk, Chunk},
        K_CHUNK_DAZZLE, K_CHUNK_DAZZLE_NAME, K_CHUNK_DAZZLE_TYPENAME,
    },
};

/// Lens flare attached to a bone through an HLOD sub object of the same name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dazzle {
    /// `container.object` name.
    pub name: String,
    /// Entry of the game's dazzle definitions, e.g. `REN_HEADLIGHT`.
    pub type_name: String,
}

impl Dazzle {
    #[inline]
    pub fn name(&self) -> &str { &self.name }

    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut name = None;
        let mut type_name = None;
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_DAZZLE_NAME => name = Some(child.read_string()),
                K_CHUNK_DAZZLE_TYPENAME => type_name = Some(child.read_string()),
                kind => warnings.push(Warning::UnknownChunk {
                    kind,
                    size: child.head.size,
                    parent: Some(chunk.kind()),
                }),
            }
        }
        let (Some(name), Some(type_name)) = (name, type_name) else {
            bail!("Dazzle at {:#X} needs both a name and a type name", chunk.offset);
        };
        Ok(Self { name, type_name })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, K_CHUNK_DAZZLE, true, |w| {
            write_string_chunk(w, K_CHUNK_DAZZLE_NAME, &self.name)?;
            write_string_chunk(w, K_CHUNK_DAZZLE_TYPENAME, &self.type_name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::chunk::ChunkReader;

    #[test]
    fn dazzle_layout() {
        let dazzle = Dazzle { name: "tank.flare".to_string(), type_name: "REN_HEADLIGHT".to_string() };
        let mut data = Vec::new();
        dazzle.write(&mut data).unwrap();
        // container, name "tank.flare\0", type "REN_HEADLIGHT\0"
        assert_eq!(data.len(), 8 + (8 + 11) + (8 + 14));
        assert_eq!(&data[4..8], &(0x8000_0000u32 | 41).to_le_bytes());

        let chunk = ChunkReader::new(&data).next_chunk().unwrap().unwrap();
        let mut warnings = Warnings::new();
        assert_eq!(Dazzle::read(&chunk, &mut warnings).unwrap(), dazzle);
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_type_name_is_fatal() {
        let mut data = Vec::new();
        write_chunk(&mut data, K_CHUNK_DAZZLE, true, |w| {
            write_string_chunk(w, K_CHUNK_DAZZLE_NAME, "tank.flare")
        })
        .unwrap();
        let chunk = ChunkReader::new(&data).next_chunk().unwrap().unwrap();
        assert!(Dazzle::read(&chunk, &mut Warnings::new()).is_err());
    }
}
