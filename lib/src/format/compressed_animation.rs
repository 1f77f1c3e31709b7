use std::io::{Cursor, Write};

use anyhow::{bail, ensure, Context, Result};
use binrw::{binrw, BinReaderExt, BinWriterExt};
use serde_derive::Serialize;

use crate::{
    error::{Warning, Warnings},
    format::{
        animation::{find_hierarchy, ChannelType, ChannelValue},
        chunk::{write_chunk, write_struct_chunk, Chunk, OpaqueChunk},
        hierarchy::Hierarchy,
        Name, Version, K_CHUNK_COMPRESSED_ANIMATION, K_CHUNK_COMPRESSED_ANIMATION_CHANNEL,
        K_CHUNK_COMPRESSED_ANIMATION_HEADER, K_CHUNK_COMPRESSED_ANIMATION_MOTION_CHANNEL,
        K_CHUNK_COMPRESSED_BIT_CHANNEL,
    },
};

pub const COMPRESSED_ANIMATION_VERSION: Version = Version::new(0, 1);

const TIME_CODE_FLAG: u32 = 0x8000_0000;
const TIME_CODE_MASK: u32 = !TIME_CODE_FLAG;

#[binrw]
#[brw(repr = u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum AnimationFlavor {
    TimeCoded = 0,
    AdaptiveDelta4 = 1,
    AdaptiveDelta8 = 2,
}

#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompressedAnimationHeader {
    pub version: Version,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub name: String,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub hierarchy_name: String,
    pub num_frames: u32,
    pub frame_rate: u16,
    pub flavor: AnimationFlavor,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct TimeCodedDatum {
    pub time_code: u32,
    /// Hold the previous value up to this key instead of interpolating.
    pub non_interpolated: bool,
    pub value: ChannelValue,
}

#[binrw]
#[derive(Clone, Debug)]
struct TimeCodedChannelHeader {
    num_time_codes: u32,
    pivot: u16,
    vector_len: u8,
    #[br(try_map = |v: u8| ChannelType::try_from(v as u16))]
    #[bw(map = |t: &ChannelType| *t as u8)]
    channel_type: ChannelType,
}

/// Sparse channel of keyframes with strictly increasing time codes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeCodedAnimationChannel {
    pub pivot: u16,
    pub vector_len: u8,
    pub channel_type: ChannelType,
    pub time_codes: Vec<TimeCodedDatum>,
}

fn check_increasing(mut frames: impl Iterator<Item = u32>) -> bool {
    let Some(mut last) = frames.next() else {
        return true;
    };
    frames.all(|frame| {
        let ok = frame > last;
        last = frame;
        ok
    })
}

impl TimeCodedAnimationChannel {
    /// Value of the last key at or before `frame`; the first key before that.
    pub fn value_at(&self, frame: u32) -> Option<ChannelValue> {
        let index = self.time_codes.partition_point(|d| d.time_code <= frame);
        self.time_codes.get(index.saturating_sub(1)).map(|d| d.value)
    }

    pub fn read(chunk: &Chunk) -> Result<Self> {
        let mut reader = Cursor::new(chunk.data);
        let header: TimeCodedChannelHeader = reader
            .read_le()
            .with_context(|| format!("Failed to read time coded channel at {:#X}", chunk.offset))?;
        let mut time_codes = Vec::with_capacity(header.num_time_codes as usize);
        for _ in 0..header.num_time_codes {
            let raw: u32 = reader.read_le().with_context(|| {
                format!(
                    "Time coded channel at {:#X} holds fewer than {} keys",
                    chunk.offset, header.num_time_codes
                )
            })?;
            let value = ChannelValue::read(&mut reader, header.vector_len)?;
            time_codes.push(TimeCodedDatum {
                time_code: raw & TIME_CODE_MASK,
                non_interpolated: raw & TIME_CODE_FLAG != 0,
                value,
            });
        }
        if !check_increasing(time_codes.iter().map(|d| d.time_code)) {
            log::warn!(
                "Time coded channel at {:#X} has unordered time codes (pivot {})",
                chunk.offset,
                header.pivot
            );
        }
        Ok(Self {
            pivot: header.pivot,
            vector_len: header.vector_len,
            channel_type: header.channel_type,
            time_codes,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        ensure!(
            check_increasing(self.time_codes.iter().map(|d| d.time_code)),
            "Time codes of channel {} on pivot {} are not strictly increasing",
            self.channel_type,
            self.pivot
        );
        ensure!(self.time_codes.iter().all(|d| d.time_code <= TIME_CODE_MASK
            && d.value.vector_len() == self.vector_len));
        write_chunk(w, K_CHUNK_COMPRESSED_ANIMATION_CHANNEL, false, |w| {
            w.write_le(&TimeCodedChannelHeader {
                num_time_codes: self.time_codes.len() as u32,
                pivot: self.pivot,
                vector_len: self.vector_len,
                channel_type: self.channel_type,
            })?;
            for datum in &self.time_codes {
                let flag = if datum.non_interpolated { TIME_CODE_FLAG } else { 0 };
                w.write_le(&(datum.time_code | flag))?;
                datum.value.write(w)?;
            }
            Ok(())
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TimeCodedBitDatum {
    pub time_code: u32,
    pub value: bool,
}

#[binrw]
#[derive(Clone, Debug)]
struct TimeCodedBitChannelHeader {
    num_time_codes: u32,
    pivot: u16,
    channel_type: u8,
    default_value: u8,
}

/// Sparse visibility channel. Frames without a key take `default_value`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeCodedBitChannel {
    pub pivot: u16,
    pub channel_type: u8,
    pub default_value: u8,
    pub time_codes: Vec<TimeCodedBitDatum>,
}

impl TimeCodedBitChannel {
    pub fn value_at(&self, frame: u32) -> bool {
        match self.time_codes.binary_search_by_key(&frame, |d| d.time_code) {
            Ok(index) => self.time_codes[index].value,
            Err(_) => self.default_value != 0,
        }
    }

    pub fn read(chunk: &Chunk) -> Result<Self> {
        let mut reader = Cursor::new(chunk.data);
        let header: TimeCodedBitChannelHeader = reader
            .read_le()
            .with_context(|| format!("Failed to read time coded bit channel at {:#X}", chunk.offset))?;
        let mut time_codes = Vec::with_capacity(header.num_time_codes as usize);
        for _ in 0..header.num_time_codes {
            let raw: u32 = reader.read_le().with_context(|| {
                format!(
                    "Time coded bit channel at {:#X} holds fewer than {} keys",
                    chunk.offset, header.num_time_codes
                )
            })?;
            time_codes.push(TimeCodedBitDatum {
                time_code: raw & TIME_CODE_MASK,
                value: raw & TIME_CODE_FLAG != 0,
            });
        }
        Ok(Self {
            pivot: header.pivot,
            channel_type: header.channel_type,
            default_value: header.default_value,
            time_codes,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        ensure!(
            check_increasing(self.time_codes.iter().map(|d| d.time_code)),
            "Time codes of bit channel on pivot {} are not strictly increasing",
            self.pivot
        );
        write_chunk(w, K_CHUNK_COMPRESSED_BIT_CHANNEL, false, |w| {
            w.write_le(&TimeCodedBitChannelHeader {
                num_time_codes: self.time_codes.len() as u32,
                pivot: self.pivot,
                channel_type: self.channel_type,
                default_value: self.default_value,
            })?;
            for datum in &self.time_codes {
                ensure!(datum.time_code <= TIME_CODE_MASK, "Time code {} out of range", datum.time_code);
                let flag = if datum.value { TIME_CODE_FLAG } else { 0 };
                w.write_le(&(datum.time_code | flag))?;
            }
            Ok(())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum CompressedChannel {
    TimeCoded(TimeCodedAnimationChannel),
    TimeCodedBit(TimeCodedBitChannel),
    /// Adaptive delta payloads and motion channels.
    Raw(OpaqueChunk),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompressedAnimation {
    pub header: CompressedAnimationHeader,
    pub channels: Vec<CompressedChannel>,
}

impl CompressedAnimation {
    pub fn new(name: &str, hierarchy_name: &str, num_frames: u32, frame_rate: u16) -> Self {
        Self {
            header: CompressedAnimationHeader {
                version: COMPRESSED_ANIMATION_VERSION,
                name: name.to_string(),
                hierarchy_name: hierarchy_name.to_string(),
                num_frames,
                frame_rate,
                flavor: AnimationFlavor::TimeCoded,
            },
            channels: vec![],
        }
    }

    #[inline]
    pub fn name(&self) -> &str { &self.header.name }

    pub fn time_coded_channels(&self) -> impl Iterator<Item = &TimeCodedAnimationChannel> {
        self.channels.iter().filter_map(|c| match c {
            CompressedChannel::TimeCoded(c) => Some(c),
            _ => None,
        })
    }

    pub fn time_coded_bit_channels(&self) -> impl Iterator<Item = &TimeCodedBitChannel> {
        self.channels.iter().filter_map(|c| match c {
            CompressedChannel::TimeCodedBit(c) => Some(c),
            _ => None,
        })
    }

    pub fn resolve_hierarchy<'a>(&self, hierarchies: &'a [Hierarchy]) -> Option<&'a Hierarchy> {
        find_hierarchy(hierarchies, &self.header.hierarchy_name)
    }

    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut header: Option<CompressedAnimationHeader> = None;
        for child in chunk.children() {
            let child = child?;
            if child.kind() == K_CHUNK_COMPRESSED_ANIMATION_HEADER {
                header = Some(child.read_struct()?);
                break;
            }
        }
        let Some(header) = header else {
            bail!("Compressed animation at {:#X} has no header chunk", chunk.offset);
        };
        let time_coded = header.flavor == AnimationFlavor::TimeCoded;
        if !time_coded {
            warnings.push(Warning::UnsupportedFlavor {
                animation: header.name.clone(),
                flavor: header.flavor as u16,
            });
        }

        let mut channels = vec![];
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_COMPRESSED_ANIMATION_HEADER => {}
                K_CHUNK_COMPRESSED_ANIMATION_CHANNEL if time_coded => channels
                    .push(CompressedChannel::TimeCoded(TimeCodedAnimationChannel::read(&child)?)),
                K_CHUNK_COMPRESSED_BIT_CHANNEL if time_coded => {
                    channels.push(CompressedChannel::TimeCodedBit(TimeCodedBitChannel::read(&child)?))
                }
                K_CHUNK_COMPRESSED_ANIMATION_CHANNEL | K_CHUNK_COMPRESSED_BIT_CHANNEL => {
                    channels.push(CompressedChannel::Raw(OpaqueChunk::from(&child)))
                }
                K_CHUNK_COMPRESSED_ANIMATION_MOTION_CHANNEL => {
                    warnings.push(Warning::UnsupportedChunk {
                        kind: child.kind(),
                        size: child.head.size,
                    });
                    channels.push(CompressedChannel::Raw(OpaqueChunk::from(&child)))
                }
                kind => warnings.push(Warning::UnknownChunk {
                    kind,
                    size: child.head.size,
                    parent: Some(chunk.kind()),
                }),
            }
        }
        log::debug!("Read compressed animation '{}' with {} channels", header.name, channels.len());
        Ok(Self { header, channels })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, K_CHUNK_COMPRESSED_ANIMATION, true, |w| {
            write_struct_chunk(w, K_CHUNK_COMPRESSED_ANIMATION_HEADER, &self.header)?;
            for channel in &self.channels {
                match channel {
                    CompressedChannel::TimeCoded(c) => c.write(w)?,
                    CompressedChannel::TimeCodedBit(c) => c.write(w)?,
                    CompressedChannel::Raw(c) => c.write(w)?,
                }
            }
            Ok(())
        })
    }
}
