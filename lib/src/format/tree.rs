use std::io::Write;

use anyhow::Result;

use crate::format::chunk::{write_chunk, Chunk, ChunkHead, ChunkReader};

#[derive(Clone, Debug, PartialEq)]
pub enum NodeBody {
    Children(Vec<ChunkNode>),
    Leaf(Vec<u8>),
}

/// Untyped chunk tree, used for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkNode {
    pub head: ChunkHead,
    /// Absolute offset of the body.
    pub offset: u64,
    pub body: NodeBody,
}

impl ChunkNode {
    /// Known container chunks are descended; everything else is a leaf.
    pub fn decode(chunk: &Chunk) -> Result<Self> {
        let body = if chunk.head.has_sub_chunks && chunk.kind().is_known() {
            NodeBody::Children(decode_nodes(chunk.children())?)
        } else {
            NodeBody::Leaf(chunk.data.to_vec())
        };
        Ok(Self { head: chunk.head, offset: chunk.offset, body })
    }

    pub fn children(&self) -> &[ChunkNode] {
        match &self.body {
            NodeBody::Children(children) => children,
            NodeBody::Leaf(_) => &[],
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, self.head.kind, self.head.has_sub_chunks, |w| {
            match &self.body {
                NodeBody::Children(children) => {
                    for child in children {
                        child.write(w)?;
                    }
                }
                NodeBody::Leaf(data) => w.write_all(data)?,
            }
            Ok(())
        })
    }
}

fn decode_nodes(reader: ChunkReader) -> Result<Vec<ChunkNode>> {
    let mut nodes = vec![];
    for chunk in reader {
        nodes.push(ChunkNode::decode(&chunk?)?);
    }
    Ok(nodes)
}

/// Decodes every top-level chunk of a file into a tree.
pub fn decode_tree(data: &[u8]) -> Result<Vec<ChunkNode>> { decode_nodes(ChunkReader::new(data)) }

/// Recursively dump a run of chunks
pub fn dump_chunks<W: Write>(w: &mut W, data: &[u8]) -> Result<()> {
    for node in decode_tree(data)? {
        dump_node(w, &node, 0)?;
    }
    Ok(())
}

fn dump_node<W: Write>(w: &mut W, node: &ChunkNode, indent: usize) -> Result<()> {
    let indstr = "  ".repeat(indent);
    match &node.body {
        NodeBody::Children(children) => {
            writeln!(w, "{indstr}{:?} @ {:#X}, {} bytes", node.head.kind, node.offset, node.head.size)?;
            for child in children {
                dump_node(w, child, indent + 1)?;
            }
        }
        NodeBody::Leaf(_) => {
            writeln!(w, "{indstr}- {:?} @ {:#X}, {} bytes", node.head.kind, node.offset, node.head.size)?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ChunkError,
        format::{
            chunk::{write_chunk_head, write_list_chunk},
            hierarchy::Hierarchy,
            ChunkType, K_CHUNK_HIERARCHY, K_CHUNK_HIERARCHY_HEADER, K_CHUNK_PIVOTS,
        },
    };

    #[test]
    fn tree_mirrors_structure() {
        let mut data = Vec::new();
        Hierarchy::new("skel").write(&mut data).unwrap();
        write_list_chunk(&mut data, ChunkType(0x1234_5678), &[0u8; 5]).unwrap();

        let tree = decode_tree(&data).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].head.kind, K_CHUNK_HIERARCHY);
        let kinds: Vec<_> = tree[0].children().iter().map(|n| n.head.kind).collect();
        assert_eq!(kinds, [K_CHUNK_HIERARCHY_HEADER, K_CHUNK_PIVOTS]);
        assert_eq!(tree[1].body, NodeBody::Leaf(vec![0; 5]));

        let mut again = Vec::new();
        for node in &tree {
            node.write(&mut again).unwrap();
        }
        assert_eq!(again, data);

        let mut text = Vec::new();
        dump_chunks(&mut text, &data).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.starts_with("HIERARCHY (0x100) @ 0x8"));
        assert!(text.contains("\n  - PIVOTS (0x102)"));
        assert!(text.contains("\n- 0x12345678 @ "));
    }

    #[test]
    fn size_mismatch_is_structural() {
        // Container declares 20 bytes: one 8 byte child plus 12 bytes that overrun.
        let mut data = Vec::new();
        write_chunk_head(&mut data, K_CHUNK_HIERARCHY, 20, true).unwrap();
        write_chunk_head(&mut data, K_CHUNK_HIERARCHY_HEADER, 0, false).unwrap();
        write_chunk_head(&mut data, K_CHUNK_PIVOTS, 60, false).unwrap();
        data.extend_from_slice(&[0; 4]);

        let err = decode_tree(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChunkError>(),
            Some(ChunkError::StructuralCorruption { parent: K_CHUNK_HIERARCHY, .. })
        ));
    }
}
