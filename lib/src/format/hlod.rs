use std::io::Write;

use anyhow::{bail, Result};
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    error::{Warning, Warnings},
    format::{
        chunk::{write_chunk, write_struct_chunk, Chunk},
        ChunkType, LargeName, Name, Version, K_CHUNK_HLOD, K_CHUNK_HLOD_AGGREGATE_ARRAY,
        K_CHUNK_HLOD_HEADER, K_CHUNK_HLOD_LOD_ARRAY, K_CHUNK_HLOD_PROXY_ARRAY,
        K_CHUNK_HLOD_SUB_OBJECT, K_CHUNK_HLOD_SUB_OBJECT_ARRAY_HEADER,
    },
};

pub const HLOD_VERSION: Version = Version::new(1, 0);

#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HlodHeader {
    pub version: Version,
    pub lod_count: u32,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub model_name: String,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub hierarchy_name: String,
}

#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HlodSubObjectArrayHeader {
    pub model_count: u32,
    pub max_screen_size: f32,
}

#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HlodSubObject {
    pub bone_index: u32,
    /// `container.object` name.
    #[br(map = LargeName::into_string)]
    #[bw(map = LargeName::from_string)]
    pub name: String,
}

/// One level of detail, or the aggregate/proxy array.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HlodArray {
    pub max_screen_size: f32,
    pub sub_objects: Vec<HlodSubObject>,
}

impl HlodArray {
    fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut header: Option<HlodSubObjectArrayHeader> = None;
        let mut sub_objects = vec![];
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_HLOD_SUB_OBJECT_ARRAY_HEADER => header = Some(child.read_struct()?),
                K_CHUNK_HLOD_SUB_OBJECT => sub_objects.push(child.read_struct()?),
                kind => warnings.push(Warning::UnknownChunk {
                    kind,
                    size: child.head.size,
                    parent: Some(chunk.kind()),
                }),
            }
        }
        let Some(header) = header else {
            bail!("HLOD array at {:#X} has no header chunk", chunk.offset);
        };
        if header.model_count as usize != sub_objects.len() {
            warnings.push(Warning::CountMismatch {
                owner: format!("HLOD array at {:#X}", chunk.offset),
                item: "sub objects",
                declared: header.model_count,
                actual: sub_objects.len(),
            });
        }
        Ok(Self { max_screen_size: header.max_screen_size, sub_objects })
    }

    fn write<W: Write>(&self, w: &mut W, kind: ChunkType) -> Result<()> {
        write_chunk(w, kind, true, |w| {
            write_struct_chunk(w, K_CHUNK_HLOD_SUB_OBJECT_ARRAY_HEADER, &HlodSubObjectArrayHeader {
                model_count: self.sub_objects.len() as u32,
                max_screen_size: self.max_screen_size,
            })?;
            for sub_object in &self.sub_objects {
                write_struct_chunk(w, K_CHUNK_HLOD_SUB_OBJECT, sub_object)?;
            }
            Ok(())
        })
    }
}

/// Hierarchical level-of-detail model description.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Hlod {
    pub header: HlodHeader,
    pub lod_arrays: Vec<HlodArray>,
    pub aggregate_array: Option<HlodArray>,
    pub proxy_array: Option<HlodArray>,
}

impl Hlod {
    pub fn new(model_name: &str, hierarchy_name: &str) -> Self {
        Self {
            header: HlodHeader {
                version: HLOD_VERSION,
                lod_count: 0,
                model_name: model_name.to_string(),
                hierarchy_name: hierarchy_name.to_string(),
            },
            lod_arrays: vec![],
            aggregate_array: None,
            proxy_array: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str { &self.header.model_name }

    /// Appends a level of detail and keeps `lod_count` in step.
    pub fn push_lod_array(&mut self, array: HlodArray) {
        self.lod_arrays.push(array);
        self.header.lod_count = self.lod_arrays.len() as u32;
    }

    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut header: Option<HlodHeader> = None;
        let mut lod_arrays = vec![];
        let mut aggregate_array = None;
        let mut proxy_array = None;
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_HLOD_HEADER => header = Some(child.read_struct()?),
                K_CHUNK_HLOD_LOD_ARRAY => lod_arrays.push(HlodArray::read(&child, warnings)?),
                K_CHUNK_HLOD_AGGREGATE_ARRAY => {
                    aggregate_array = Some(HlodArray::read(&child, warnings)?)
                }
                K_CHUNK_HLOD_PROXY_ARRAY => proxy_array = Some(HlodArray::read(&child, warnings)?),
                kind => warnings.push(Warning::UnknownChunk {
                    kind,
                    size: child.head.size,
                    parent: Some(chunk.kind()),
                }),
            }
        }
        let Some(mut header) = header else {
            bail!("HLOD at {:#X} has no header chunk", chunk.offset);
        };
        if header.lod_count as usize != lod_arrays.len() {
            warnings.push(Warning::CountMismatch {
                owner: header.model_name.clone(),
                item: "LOD arrays",
                declared: header.lod_count,
                actual: lod_arrays.len(),
            });
            header.lod_count = lod_arrays.len() as u32;
        }
        Ok(Self { header, lod_arrays, aggregate_array, proxy_array })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let header = HlodHeader { lod_count: self.lod_arrays.len() as u32, ..self.header.clone() };
        write_chunk(w, K_CHUNK_HLOD, true, |w| {
            write_struct_chunk(w, K_CHUNK_HLOD_HEADER, &header)?;
            for array in &self.lod_arrays {
                array.write(w, K_CHUNK_HLOD_LOD_ARRAY)?;
            }
            if let Some(array) = &self.aggregate_array {
                array.write(w, K_CHUNK_HLOD_AGGREGATE_ARRAY)?;
            }
            if let Some(array) = &self.proxy_array {
                array.write(w, K_CHUNK_HLOD_PROXY_ARRAY)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::chunk::ChunkReader;

    #[test]
    fn counts_follow_contents() {
        let mut hlod = Hlod::new("tank", "tank_skl");
        hlod.push_lod_array(HlodArray {
            max_screen_size: 0.0,
            sub_objects: vec![
                HlodSubObject { bone_index: 1, name: "tank.hull".to_string() },
                HlodSubObject { bone_index: 2, name: "tank.turret".to_string() },
            ],
        });
        hlod.proxy_array = Some(HlodArray { max_screen_size: 1.0, sub_objects: vec![] });

        let mut data = Vec::new();
        hlod.write(&mut data).unwrap();
        // container, header(40), lod array(header 8, 2 * 36), proxy array(header 8)
        assert_eq!(data.len(), 8 + (8 + 40) + (8 + (8 + 8) + 2 * (8 + 36)) + (8 + (8 + 8)));

        let chunk = ChunkReader::new(&data).next_chunk().unwrap().unwrap();
        let mut warnings = Warnings::new();
        let decoded = Hlod::read(&chunk, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(decoded.header.lod_count, 1);
        assert_eq!(decoded, hlod);
        assert!(decoded.aggregate_array.is_none());
    }

    #[test]
    fn stale_counts_are_reported() {
        let mut hlod = Hlod::new("tank", "tank_skl");
        hlod.lod_arrays.push(HlodArray { max_screen_size: 0.0, sub_objects: vec![] });
        let mut data = Vec::new();
        hlod.write(&mut data).unwrap();
        // lod_count in the header, model_count in the first array header.
        data[20..24].copy_from_slice(&3u32.to_le_bytes());
        data[8 + 48 + 16..8 + 48 + 20].copy_from_slice(&4u32.to_le_bytes());

        let chunk = ChunkReader::new(&data).next_chunk().unwrap().unwrap();
        let mut warnings = Warnings::new();
        let decoded = Hlod::read(&chunk, &mut warnings).unwrap();
        assert_eq!(decoded.header.lod_count, 1);
        let mismatches: Vec<_> = warnings
            .iter()
            .filter_map(|w| match w {
                Warning::CountMismatch { item, declared, actual, .. } => Some((*item, *declared, *actual)),
                _ => None,
            })
            .collect();
        assert_eq!(mismatches, [("sub objects", 4, 0), ("LOD arrays", 3, 1)]);
    }
}
