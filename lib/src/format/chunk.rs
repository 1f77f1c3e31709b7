use std::{
    io::{Cursor, Read, Seek, SeekFrom, Write},
    mem::size_of,
};

use anyhow::{Context, Result};
use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use serde_derive::Serialize;
use zerocopy::{AsBytes, FromBytes, FromZeroes, LittleEndian, U32};

use crate::{
    error::ChunkError,
    format::{read_cstring, write_cstring, ChunkType},
};

pub const CHUNK_HEAD_SIZE: usize = size_of::<ChunkDescriptor>();

const SUB_CHUNK_FLAG: u32 = 0x8000_0000;
const SIZE_MASK: u32 = !SUB_CHUNK_FLAG;

/// On-disk chunk header.
#[derive(Clone, Debug, Default, PartialEq, FromBytes, FromZeroes, AsBytes)]
#[repr(C, packed)]
pub struct ChunkDescriptor {
    pub id: U32<LittleEndian>,
    pub size: U32<LittleEndian>,
}

/// Decoded chunk header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChunkHead {
    pub kind: ChunkType,
    /// Body length, excluding the header.
    pub size: u32,
    pub has_sub_chunks: bool,
}

impl From<&ChunkDescriptor> for ChunkHead {
    fn from(desc: &ChunkDescriptor) -> Self {
        let size = desc.size.get();
        Self {
            kind: ChunkType(desc.id.get()),
            size: size & SIZE_MASK,
            has_sub_chunks: size & SUB_CHUNK_FLAG != 0,
        }
    }
}

impl ChunkHead {
    pub fn descriptor(&self) -> ChunkDescriptor {
        let flag = if self.has_sub_chunks { SUB_CHUNK_FLAG } else { 0 };
        ChunkDescriptor { id: U32::new(self.kind.0), size: U32::new((self.size & SIZE_MASK) | flag) }
    }
}

fn stream_remaining<S: Seek>(stream: &mut S) -> Result<(u64, u64)> {
    let pos = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(pos))?;
    Ok((pos, end.saturating_sub(pos)))
}

/// Reads exactly 8 header bytes.
pub fn read_chunk_head<R: Read + Seek>(reader: &mut R) -> Result<ChunkHead> {
    let (offset, remaining) = stream_remaining(reader)?;
    if remaining < CHUNK_HEAD_SIZE as u64 {
        return Err(ChunkError::MalformedHeader { offset, remaining }.into());
    }
    let mut desc = ChunkDescriptor::new_zeroed();
    reader.read_exact(desc.as_bytes_mut())?;
    Ok(ChunkHead::from(&desc))
}

/// Reads exactly `head.size` body bytes.
pub fn read_chunk_body<R: Read + Seek>(reader: &mut R, head: &ChunkHead) -> Result<Vec<u8>> {
    let (offset, remaining) = stream_remaining(reader)?;
    if remaining < head.size as u64 {
        return Err(ChunkError::TruncatedChunk {
            kind: head.kind,
            offset,
            size: head.size,
            remaining,
        }
        .into());
    }
    let mut body = vec![0u8; head.size as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

pub fn write_chunk_head<W: Write>(
    w: &mut W,
    kind: ChunkType,
    size: u32,
    has_sub_chunks: bool,
) -> Result<()> {
    if size & SUB_CHUNK_FLAG != 0 {
        return Err(ChunkError::Oversize { kind, size: size as usize }.into());
    }
    w.write_all(ChunkHead { kind, size, has_sub_chunks }.descriptor().as_bytes())?;
    Ok(())
}

/// Writes a chunk whose body is produced by `cb`. The body goes to a scratch
/// buffer first, so the header is emitted with its final size and nested
/// chunks never need patching.
pub fn write_chunk<W, CB>(w: &mut W, kind: ChunkType, has_sub_chunks: bool, mut cb: CB) -> Result<()>
where
    W: Write,
    CB: FnMut(&mut Cursor<Vec<u8>>) -> Result<()>,
{
    let mut body = Cursor::new(Vec::new());
    cb(&mut body)?;
    let body = body.into_inner();
    let size = u32::try_from(body.len())
        .ok()
        .filter(|size| size & SUB_CHUNK_FLAG == 0)
        .ok_or(ChunkError::Oversize { kind, size: body.len() })?;
    write_chunk_head(w, kind, size, has_sub_chunks)?;
    w.write_all(&body)?;
    Ok(())
}

/// Writes a leaf chunk holding a single binrw value.
pub fn write_struct_chunk<W, T>(w: &mut W, kind: ChunkType, value: &T) -> Result<()>
where
    W: Write,
    T: BinWrite,
    for<'a> T::Args<'a>: Clone + Default,
{
    write_chunk(w, kind, false, |w| {
        w.write_le(value)?;
        Ok(())
    })
}

/// Writes a leaf chunk holding a packed array of binrw values.
pub fn write_list_chunk<W, T>(w: &mut W, kind: ChunkType, values: &[T]) -> Result<()>
where
    W: Write,
    T: BinWrite,
    for<'a> T::Args<'a>: Clone + Default,
{
    write_chunk(w, kind, false, |w| {
        for value in values {
            w.write_le(value)?;
        }
        Ok(())
    })
}

/// Writes a leaf chunk holding a NUL terminated string.
pub fn write_string_chunk<W: Write>(w: &mut W, kind: ChunkType, str: &str) -> Result<()> {
    write_chunk(w, kind, false, |w| {
        write_cstring(w, str)?;
        Ok(())
    })
}

/// A chunk sliced out of its parent.
#[derive(Copy, Clone, Debug)]
pub struct Chunk<'a> {
    pub head: ChunkHead,
    pub data: &'a [u8],
    /// Absolute offset of `data` within the file.
    pub offset: u64,
}

impl<'a> Chunk<'a> {
    #[inline]
    pub fn kind(&self) -> ChunkType { self.head.kind }

    /// Iterates this chunk's children.
    pub fn children(&self) -> ChunkReader<'a> {
        ChunkReader { data: self.data, pos: 0, base: self.offset, parent: Some(self.head) }
    }

    #[inline]
    pub fn read_string(&self) -> String { read_cstring(self.data) }

    /// Reads the whole body as one binrw value. Trailing bytes are ignored.
    pub fn read_struct<T>(&self) -> Result<T>
    where
        T: BinRead,
        for<'b> T::Args<'b>: Clone + Default,
    {
        let mut reader = Cursor::new(self.data);
        reader
            .read_le()
            .with_context(|| format!("Failed to read {:?} chunk at {:#X}", self.kind(), self.offset))
    }

    /// Reads the body as a packed array of binrw values.
    pub fn read_list<T>(&self) -> Result<Vec<T>>
    where
        T: BinRead,
        for<'b> T::Args<'b>: Clone + Default,
    {
        let mut reader = Cursor::new(self.data);
        let mut out = Vec::new();
        while (reader.position() as usize) < self.data.len() {
            let index = out.len();
            out.push(reader.read_le().with_context(|| {
                format!("Failed to read {:?} entry {} at {:#X}", self.kind(), index, self.offset)
            })?);
        }
        Ok(out)
    }
}

/// A chunk kept as raw bytes and written back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OpaqueChunk {
    pub kind: ChunkType,
    pub has_sub_chunks: bool,
    pub size: u32,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl OpaqueChunk {
    pub fn new(kind: ChunkType, has_sub_chunks: bool, data: Vec<u8>) -> Self {
        Self { kind, has_sub_chunks, size: data.len() as u32, data }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, self.kind, self.has_sub_chunks, |w| {
            w.write_all(&self.data)?;
            Ok(())
        })
    }
}

impl From<&Chunk<'_>> for OpaqueChunk {
    fn from(chunk: &Chunk<'_>) -> Self {
        Self::new(chunk.head.kind, chunk.head.has_sub_chunks, chunk.data.to_vec())
    }
}

/// Cursor over a run of sibling chunks. Inside a parent, running out of bytes
/// mid-header or mid-body means the children do not add up to the parent's
/// declared size.
#[derive(Clone, Debug)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
    parent: Option<ChunkHead>,
}

impl<'a> ChunkReader<'a> {
    /// Top-level reader over a whole file.
    pub fn new(data: &'a [u8]) -> Self { Self { data, pos: 0, base: 0, parent: None } }

    #[inline]
    pub fn remaining(&self) -> usize { self.data.len() - self.pos }

    #[inline]
    pub fn is_empty(&self) -> bool { self.remaining() == 0 }

    /// Absolute file offset of the cursor.
    #[inline]
    pub fn offset(&self) -> u64 { self.base + self.pos as u64 }

    pub fn read_chunk_head(&mut self) -> Result<ChunkHead> {
        let offset = self.offset();
        let remaining = self.remaining();
        let data = self.data;
        let desc = ChunkDescriptor::ref_from_prefix(&data[self.pos..]).ok_or_else(|| {
            match self.parent {
                Some(parent) => ChunkError::StructuralCorruption {
                    parent: parent.kind,
                    offset,
                    detail: format!(
                        "{remaining} trailing bytes cannot hold a chunk header (declared size {:#X})",
                        parent.size
                    ),
                },
                None => ChunkError::MalformedHeader { offset, remaining: remaining as u64 },
            }
        })?;
        let head = ChunkHead::from(desc);
        self.pos += CHUNK_HEAD_SIZE;
        Ok(head)
    }

    pub fn read_chunk_body(&mut self, head: &ChunkHead) -> Result<&'a [u8]> {
        let offset = self.offset();
        let remaining = self.remaining();
        let size = head.size as usize;
        if size > remaining {
            return Err(match self.parent {
                Some(parent) => ChunkError::StructuralCorruption {
                    parent: parent.kind,
                    offset,
                    detail: format!(
                        "child {:?} declares {size:#X} bytes but only {remaining:#X} remain",
                        head.kind
                    ),
                },
                None => ChunkError::TruncatedChunk {
                    kind: head.kind,
                    offset,
                    size: head.size,
                    remaining: remaining as u64,
                },
            }
            .into());
        }
        let data = self.data;
        let body = &data[self.pos..self.pos + size];
        self.pos += size;
        Ok(body)
    }

    /// Reads the next sibling, or `None` once the run is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>> {
        if self.is_empty() {
            return Ok(None);
        }
        let head = self.read_chunk_head()?;
        let offset = self.offset();
        let data = self.read_chunk_body(&head)?;
        Ok(Some(Chunk { head, data, offset }))
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                // Stop after the first error.
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}
