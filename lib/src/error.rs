use std::slice;

use thiserror::Error;

use crate::format::ChunkType;

/// Fatal container errors. These travel inside `anyhow::Error`; use
/// `err.downcast_ref::<ChunkError>()` to tell them apart.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("Malformed chunk header at {offset:#X}: need 8 bytes, {remaining} remain")]
    MalformedHeader { offset: u64, remaining: u64 },
    #[error(
        "Truncated chunk {kind} at {offset:#X}: declared size {size:#X}, {remaining:#X} bytes remain"
    )]
    TruncatedChunk { kind: ChunkType, offset: u64, size: u32, remaining: u64 },
    #[error("Corrupt sub chunks in {parent} at {offset:#X}: {detail}")]
    StructuralCorruption { parent: ChunkType, offset: u64, detail: String },
    #[error("Chunk {kind} body of {size:#X} bytes does not fit in 31 bits")]
    Oversize { kind: ChunkType, size: usize },
}

/// Non-fatal conditions collected while decoding or exporting.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Warning {
    #[error("Unknown chunk type {kind} ({size} bytes) in {}, skipped", parent_name(.parent))]
    UnknownChunk { kind: ChunkType, size: u32, parent: Option<ChunkType> },
    #[error("Unsupported chunk {kind:?} ({size} bytes) kept as raw data")]
    UnsupportedChunk { kind: ChunkType, size: u32 },
    #[error("Compressed animation '{animation}' uses flavor {flavor}, its channels are kept as raw data")]
    UnsupportedFlavor { animation: String, flavor: u16 },
    #[error("Pivot '{name}' not found in hierarchy, using the root transform")]
    UnresolvedPivot { name: String },
    #[error("Hierarchy '{hierarchy}' declares {declared} pivots but contains {actual}")]
    PivotCountMismatch { hierarchy: String, declared: u32, actual: usize },
    #[error("'{owner}' declares {declared} {item} but contains {actual}")]
    CountMismatch { owner: String, item: &'static str, declared: u32, actual: usize },
    #[error("Mesh '{name}' is animated, animate its parent bone instead!")]
    AnimatedMesh { name: String },
    #[error("Rotation of pivot '{pivot}' has no final component curve, channel dropped")]
    IncompleteRotation { pivot: String },
    #[error("Scene contains {count} meshes, exporting only the first: '{exported}'")]
    MultipleMeshes { count: usize, exported: String },
}

fn parent_name(parent: &Option<ChunkType>) -> String {
    match parent {
        Some(kind) => format!("{kind:?}"),
        None => "file".to_string(),
    }
}

/// Accumulated warnings. Every warning is logged as it is recorded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, warning: Warning) {
        match &warning {
            Warning::UnsupportedChunk { .. } | Warning::UnsupportedFlavor { .. } => {
                log::info!("{warning}")
            }
            _ => log::warn!("{warning}"),
        }
        self.0.push(warning);
    }

    pub fn extend(&mut self, other: Warnings) { self.0.extend(other.0); }

    #[inline]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[inline]
    pub fn len(&self) -> usize { self.0.len() }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Warning> { self.0.iter() }

    pub fn into_vec(self) -> Vec<Warning> { self.0 }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a Warning;
    type IntoIter = slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_messages() {
        let w = Warning::UnknownChunk { kind: ChunkType(0x1), size: 1, parent: None };
        assert_eq!(w.to_string(), "Unknown chunk type 0x1 (1 bytes) in file, skipped");
        let w = Warning::AnimatedMesh { name: "sword".to_string() };
        assert_eq!(w.to_string(), "Mesh 'sword' is animated, animate its parent bone instead!");
    }

    #[test]
    fn warnings_accumulate() {
        let mut warnings = Warnings::new();
        assert!(warnings.is_empty());
        warnings.push(Warning::UnresolvedPivot { name: "missing".to_string() });
        warnings.push(Warning::UnsupportedChunk { kind: ChunkType(0x460), size: 0 });
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings.iter().next(), Some(Warning::UnresolvedPivot { .. })));
    }
}
