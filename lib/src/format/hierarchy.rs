use std::io::Write;

use anyhow::{bail, Result};
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    error::{Warning, Warnings},
    format::{
        chunk::{write_chunk, write_list_chunk, write_struct_chunk, Chunk},
        Name, Quaternion, Vector3, Version, K_CHUNK_HIERARCHY, K_CHUNK_HIERARCHY_HEADER,
        K_CHUNK_PIVOTS, K_CHUNK_PIVOT_FIXUPS,
    },
};

pub const HIERARCHY_VERSION: Version = Version::new(4, 1);
pub const ROOT_TRANSFORM: &str = "ROOTTRANSFORM";

#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HierarchyHeader {
    pub version: Version,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub name: String,
    pub num_pivots: u32,
    pub center_pos: Vector3,
}

#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pivot {
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub name: String,
    /// -1 for the root.
    pub parent_id: i32,
    pub translation: Vector3,
    pub euler_angles: Vector3,
    pub rotation: Quaternion,
}

impl Pivot {
    pub fn root() -> Self {
        Self {
            name: ROOT_TRANSFORM.to_string(),
            parent_id: -1,
            translation: Vector3::default(),
            euler_angles: Vector3::default(),
            rotation: Quaternion::IDENTITY,
        }
    }
}

/// Bone description handed over by a host.
#[derive(Clone, Debug, Default)]
pub struct Bone {
    pub name: String,
    /// `None`, or a name that is not part of the list, attaches the bone to the root.
    pub parent: Option<String>,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

/// Ordered pivot table. Pivot indices are positions in `pivots`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Hierarchy {
    pub header: HierarchyHeader,
    pub pivots: Vec<Pivot>,
    /// One fixup per pivot when present; empty when the file has none.
    pub pivot_fixups: Vec<Vector3>,
}

impl Hierarchy {
    /// A hierarchy holding only the implicit root pivot.
    pub fn new(name: &str) -> Self {
        Self {
            header: HierarchyHeader {
                version: HIERARCHY_VERSION,
                name: name.to_string(),
                num_pivots: 1,
                center_pos: Vector3::default(),
            },
            pivots: vec![Pivot::root()],
            pivot_fixups: vec![],
        }
    }

    /// Builds a hierarchy from host bones, keeping host order after the root.
    /// Pivot names are stored as they will be encoded and must stay unique.
    pub fn from_bones(name: &str, bones: &[Bone]) -> Result<Self> {
        let mut hierarchy = Self::new(name);
        for bone in bones {
            if let Some(existing) = hierarchy.find_pivot(&bone.name) {
                bail!(
                    "Pivot name '{}' collides with '{}' in hierarchy '{}'",
                    bone.name,
                    hierarchy.pivots[existing].name,
                    name
                );
            }
            let pivot_name = Name::truncate(&bone.name);
            if pivot_name.len() < bone.name.len() {
                log::warn!("Bone name '{}' truncated to '{}'", bone.name, pivot_name);
            }
            let parent_id = bone
                .parent
                .as_deref()
                .and_then(|parent| hierarchy.find_pivot(parent))
                .unwrap_or(0);
            hierarchy.push_pivot(Pivot {
                name: pivot_name.to_string(),
                parent_id: parent_id as i32,
                translation: bone.translation,
                euler_angles: Vector3::default(),
                rotation: bone.rotation,
            });
        }
        Ok(hierarchy)
    }

    #[inline]
    pub fn name(&self) -> &str { &self.header.name }

    /// Appends a pivot and keeps `num_pivots` in step.
    pub fn push_pivot(&mut self, pivot: Pivot) {
        self.pivots.push(pivot);
        self.header.num_pivots = self.pivots.len() as u32;
    }

    /// Looks a pivot up by its encoded name, so over-long host names still match.
    pub fn find_pivot(&self, name: &str) -> Option<usize> {
        let name = Name::truncate(name);
        self.pivots.iter().position(|p| Name::truncate(&p.name) == name)
    }

    /// Index of the named pivot. Unknown names resolve to the root.
    pub fn resolve_pivot_index(&self, name: &str, warnings: &mut Warnings) -> usize {
        match self.find_pivot(name) {
            Some(index) => index,
            None => {
                warnings.push(Warning::UnresolvedPivot { name: name.to_string() });
                0
            }
        }
    }

    #[inline]
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        let parent = self.pivots.get(index)?.parent_id;
        (parent >= 0).then_some(parent as usize)
    }

    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut header: Option<HierarchyHeader> = None;
        let mut pivots = vec![];
        let mut pivot_fixups = vec![];
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_HIERARCHY_HEADER => header = Some(child.read_struct()?),
                K_CHUNK_PIVOTS => pivots = child.read_list()?,
                K_CHUNK_PIVOT_FIXUPS => pivot_fixups = child.read_list()?,
                kind => warnings.push(Warning::UnknownChunk {
                    kind,
                    size: child.head.size,
                    parent: Some(chunk.kind()),
                }),
            }
        }
        let Some(mut header) = header else {
            bail!("Hierarchy at {:#X} has no header chunk", chunk.offset);
        };
        if header.num_pivots as usize != pivots.len() {
            warnings.push(Warning::PivotCountMismatch {
                hierarchy: header.name.clone(),
                declared: header.num_pivots,
                actual: pivots.len(),
            });
        }
        header.num_pivots = pivots.len() as u32;
        log::debug!("Read hierarchy '{}' with {} pivots", header.name, pivots.len());
        Ok(Self { header, pivots, pivot_fixups })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let header = HierarchyHeader { num_pivots: self.pivots.len() as u32, ..self.header.clone() };
        write_chunk(w, K_CHUNK_HIERARCHY, true, |w| {
            write_struct_chunk(w, K_CHUNK_HIERARCHY_HEADER, &header)?;
            write_list_chunk(w, K_CHUNK_PIVOTS, &self.pivots)?;
            if !self.pivot_fixups.is_empty() {
                write_list_chunk(w, K_CHUNK_PIVOT_FIXUPS, &self.pivot_fixups)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::chunk::ChunkReader;

    fn bone(name: &str, parent: Option<&str>) -> Bone {
        Bone { name: name.to_string(), parent: parent.map(str::to_string), ..Default::default() }
    }

    fn decode(data: &[u8], warnings: &mut Warnings) -> Hierarchy {
        let chunk = ChunkReader::new(data).next_chunk().unwrap().unwrap();
        assert_eq!(chunk.kind(), K_CHUNK_HIERARCHY);
        Hierarchy::read(&chunk, warnings).unwrap()
    }

    #[test]
    fn from_bones_inserts_root() {
        let hierarchy = Hierarchy::from_bones("skel", &[
            bone("bone_a", None),
            bone("bone_b", Some("bone_a")),
            bone("bone_c", Some("missing")),
        ])
        .unwrap();
        let names: Vec<_> = hierarchy.pivots.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, [ROOT_TRANSFORM, "bone_a", "bone_b", "bone_c"]);
        assert_eq!(hierarchy.parent_of(0), None);
        assert_eq!(hierarchy.parent_of(2), Some(1));
        assert_eq!(hierarchy.parent_of(3), Some(0));
        assert_eq!(hierarchy.parent_of(9), None);
        assert_eq!(hierarchy.header.num_pivots, 4);
    }

    #[test]
    fn from_bones_rejects_duplicates() {
        assert!(Hierarchy::from_bones("skel", &[bone("a", None), bone("a", None)]).is_err());
        assert!(Hierarchy::from_bones("skel", &[bone(ROOT_TRANSFORM, None)]).is_err());
    }

    #[test]
    fn long_names_truncate_uniquely() {
        let hierarchy = Hierarchy::from_bones("skel", &[
            bone("very_long_bone_name", None),
            bone("short", Some("very_long_bone_name")),
        ])
        .unwrap();
        assert_eq!(hierarchy.pivots[1].name, "very_long_bone_");
        assert_eq!(hierarchy.parent_of(2), Some(1));
        let mut warnings = Warnings::new();
        assert_eq!(hierarchy.resolve_pivot_index("very_long_bone_name", &mut warnings), 1);
        assert!(warnings.is_empty());

        let mut data = Vec::new();
        hierarchy.write(&mut data).unwrap();
        assert_eq!(decode(&data, &mut warnings), hierarchy);

        let err = Hierarchy::from_bones("skel", &[
            bone("very_long_bone_name_left", None),
            bone("very_long_bone_name_right", None),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("collides"));
        // Multi-byte characters are never split.
        let hierarchy = Hierarchy::from_bones("skel", &[bone("bone_aéééééé", None)]).unwrap();
        assert_eq!(hierarchy.pivots[1].name, "bone_aéééé");
    }

    #[test]
    fn resolve_falls_back_to_root() {
        let hierarchy = Hierarchy::from_bones("skel", &[bone("bone_a", None)]).unwrap();
        let mut warnings = Warnings::new();
        assert_eq!(hierarchy.resolve_pivot_index("bone_a", &mut warnings), 1);
        assert!(warnings.is_empty());
        assert_eq!(hierarchy.resolve_pivot_index("nope", &mut warnings), 0);
        assert_eq!(warnings.iter().collect::<Vec<_>>(), [&Warning::UnresolvedPivot {
            name: "nope".to_string()
        }]);
    }

    #[test]
    fn pivot_table_layout() {
        let hierarchy = Hierarchy::new("root_only");
        let mut data = Vec::new();
        hierarchy.write(&mut data).unwrap();
        // container + header(36) + pivots(60)
        assert_eq!(data.len(), 8 + 8 + 36 + 8 + 60);
        assert_eq!(&data[8..12], &K_CHUNK_HIERARCHY_HEADER.0.to_le_bytes());
        assert_eq!(&data[12..16], &36u32.to_le_bytes());
        // version 4.1
        assert_eq!(&data[16..20], &[1, 0, 4, 0]);

        let mut warnings = Warnings::new();
        assert_eq!(decode(&data, &mut warnings), hierarchy);
        assert!(warnings.is_empty());
    }

    #[test]
    fn count_mismatch_warns() {
        let mut hierarchy = Hierarchy::new("skel");
        hierarchy.header.num_pivots = 7;
        let mut data = Vec::new();
        hierarchy.write(&mut data).unwrap();
        let mut warnings = Warnings::new();
        // Encoding derives the count from the table.
        assert_eq!(decode(&data, &mut warnings).header.num_pivots, 1);
        assert!(warnings.is_empty());

        // Patch the declared count in place.
        data[36..40].copy_from_slice(&3u32.to_le_bytes());
        let decoded = decode(&data, &mut warnings);
        assert_eq!(decoded, Hierarchy::new("skel"));
        assert!(matches!(warnings.iter().next(), Some(Warning::PivotCountMismatch {
            declared: 3,
            actual: 1,
            ..
        })));
    }

    #[test]
    fn short_pivot_table_is_fatal() {
        let mut data = Vec::new();
        write_chunk(&mut data, K_CHUNK_HIERARCHY, true, |w| {
            write_struct_chunk(w, K_CHUNK_HIERARCHY_HEADER, &Hierarchy::new("x").header)?;
            write_chunk(w, K_CHUNK_PIVOTS, false, |w| {
                w.write_all(&[0u8; 30])?;
                Ok(())
            })
        })
        .unwrap();
        let chunk = ChunkReader::new(&data).next_chunk().unwrap().unwrap();
        assert!(Hierarchy::read(&chunk, &mut Warnings::new()).is_err());
    }
}
