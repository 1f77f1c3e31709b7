use std::io::{Cursor, Read, Seek, Write};

use anyhow::{bail, ensure, Context, Result};
use binrw::{binrw, BinReaderExt, BinWriterExt};
use serde_derive::Serialize;
use strum::{Display, FromRepr};
use thiserror::Error;

use crate::{
    error::{Warning, Warnings},
    format::{
        chunk::{write_chunk, write_struct_chunk, Chunk},
        hierarchy::Hierarchy,
        Name, Quaternion, Version, K_CHUNK_ANIMATION, K_CHUNK_ANIMATION_CHANNEL,
        K_CHUNK_ANIMATION_HEADER, K_CHUNK_BIT_CHANNEL,
    },
};

pub const ANIMATION_VERSION: Version = Version::new(4, 1);

#[derive(Debug, Error)]
#[error("Unknown channel type {0}")]
pub struct UnknownChannelType(pub u16);

/// Animated property of a pivot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Display, FromRepr)]
#[repr(u8)]
pub enum ChannelType {
    X = 0,
    Y = 1,
    Z = 2,
    XR = 3,
    YR = 4,
    ZR = 5,
    Q = 6,
}

impl ChannelType {
    /// Positional channel for an axis index.
    pub fn translation(axis: usize) -> Option<Self> {
        match axis {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            _ => None,
        }
    }

    #[inline]
    pub fn is_translation(self) -> bool { matches!(self, Self::X | Self::Y | Self::Z) }

    /// Values per sample: 4 for quaternions, 1 otherwise.
    #[inline]
    pub fn vector_len(self) -> u8 {
        if self == Self::Q {
            4
        } else {
            1
        }
    }
}

impl TryFrom<u16> for ChannelType {
    type Error = UnknownChannelType;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        u8::try_from(value).ok().and_then(Self::from_repr).ok_or(UnknownChannelType(value))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Display, FromRepr)]
#[repr(u8)]
pub enum BitChannelType {
    Vis = 0,
    TimeCodedVis = 1,
}

impl TryFrom<u16> for BitChannelType {
    type Error = UnknownChannelType;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        u8::try_from(value).ok().and_then(Self::from_repr).ok_or(UnknownChannelType(value))
    }
}

/// One sample of a channel.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Scalar(f32),
    Quaternion(Quaternion),
}

impl ChannelValue {
    pub fn read<R: Read + Seek>(reader: &mut R, vector_len: u8) -> Result<Self> {
        Ok(match vector_len {
            1 => Self::Scalar(reader.read_le()?),
            4 => Self::Quaternion(reader.read_le()?),
            n => bail!("Unsupported channel vector length {}", n),
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut W) -> Result<()> {
        match self {
            Self::Scalar(v) => w.write_le(v)?,
            Self::Quaternion(q) => w.write_le(q)?,
        }
        Ok(())
    }

    #[inline]
    pub fn vector_len(&self) -> u8 {
        match self {
            Self::Scalar(_) => 1,
            Self::Quaternion(_) => 4,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match *self {
            Self::Scalar(v) => Some(v),
            Self::Quaternion(_) => None,
        }
    }

    pub fn as_quaternion(&self) -> Option<Quaternion> {
        match *self {
            Self::Quaternion(q) => Some(q),
            Self::Scalar(_) => None,
        }
    }
}

#[binrw]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimationHeader {
    pub version: Version,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub name: String,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub hierarchy_name: String,
    pub num_frames: u32,
    pub frame_rate: u32,
}

#[binrw]
#[derive(Clone, Debug)]
struct ChannelHeader {
    first_frame: u16,
    last_frame: u16,
    vector_len: u16,
    #[br(try_map = |v: u16| ChannelType::try_from(v))]
    #[bw(map = |t: &ChannelType| *t as u16)]
    channel_type: ChannelType,
    pivot: u16,
    unknown: u16,
}

/// Dense channel: one value per frame in `first_frame..=last_frame`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimationChannel {
    pub first_frame: u16,
    pub last_frame: u16,
    pub vector_len: u8,
    pub channel_type: ChannelType,
    pub pivot: u16,
    pub unknown: u16,
    pub data: Vec<ChannelValue>,
    /// Bytes after the sample data, written back unchanged.
    #[serde(skip)]
    pub pad_bytes: Vec<u8>,
}

#[inline]
fn frame_count(first_frame: u16, last_frame: u16) -> Result<usize> {
    ensure!(last_frame >= first_frame, "Channel range {}..={} is inverted", first_frame, last_frame);
    Ok(last_frame as usize - first_frame as usize + 1)
}

impl AnimationChannel {
    /// Value at `frame`, holding the end values outside the range.
    pub fn value_at(&self, frame: u16) -> Option<ChannelValue> {
        if self.first_frame > self.last_frame {
            return None;
        }
        let frame = frame.clamp(self.first_frame, self.last_frame);
        self.data.get((frame - self.first_frame) as usize).copied()
    }

    pub fn read(chunk: &Chunk) -> Result<Self> {
        let mut reader = Cursor::new(chunk.data);
        let header: ChannelHeader = reader
            .read_le()
            .with_context(|| format!("Failed to read animation channel at {:#X}", chunk.offset))?;
        let vector_len = u8::try_from(header.vector_len)
            .ok()
            .filter(|&len| len == 1 || len == 4)
            .with_context(|| format!("Unsupported channel vector length {}", header.vector_len))?;
        let frames = frame_count(header.first_frame, header.last_frame)?;
        let mut data = Vec::with_capacity(frames);
        for _ in 0..frames {
            data.push(ChannelValue::read(&mut reader, vector_len).with_context(|| {
                format!("Animation channel at {:#X} holds fewer than {} samples", chunk.offset, frames)
            })?);
        }
        let mut pad_bytes = vec![];
        reader.read_to_end(&mut pad_bytes)?;
        Ok(Self {
            first_frame: header.first_frame,
            last_frame: header.last_frame,
            vector_len,
            channel_type: header.channel_type,
            pivot: header.pivot,
            unknown: header.unknown,
            data,
            pad_bytes,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let frames = frame_count(self.first_frame, self.last_frame)?;
        ensure!(
            self.data.len() == frames,
            "Channel {} of pivot {} holds {} samples for {} frames",
            self.channel_type,
            self.pivot,
            self.data.len(),
            frames
        );
        ensure!(self.data.iter().all(|v| v.vector_len() == self.vector_len));
        write_chunk(w, K_CHUNK_ANIMATION_CHANNEL, false, |w| {
            w.write_le(&ChannelHeader {
                first_frame: self.first_frame,
                last_frame: self.last_frame,
                vector_len: self.vector_len as u16,
                channel_type: self.channel_type,
                pivot: self.pivot,
                unknown: self.unknown,
            })?;
            for value in &self.data {
                value.write(w)?;
            }
            w.write_all(&self.pad_bytes)?;
            Ok(())
        })
    }
}

#[binrw]
#[derive(Clone, Debug)]
struct BitChannelHeader {
    first_frame: u16,
    last_frame: u16,
    #[br(try_map = |v: u16| BitChannelType::try_from(v))]
    #[bw(map = |t: &BitChannelType| *t as u16)]
    channel_type: BitChannelType,
    pivot: u16,
    default_value: f32,
}

/// Dense visibility channel, packed 8 frames per byte.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimationBitChannel {
    pub first_frame: u16,
    pub last_frame: u16,
    pub channel_type: BitChannelType,
    pub pivot: u16,
    pub default_value: f32,
    pub data: Vec<bool>,
}

impl AnimationBitChannel {
    /// Explicit value inside the range, `default_value` outside of it.
    pub fn value_at(&self, frame: u16) -> bool {
        if frame < self.first_frame || frame > self.last_frame {
            return self.default_value != 0.0;
        }
        self.data.get((frame - self.first_frame) as usize).copied().unwrap_or(self.default_value != 0.0)
    }

    pub fn read(chunk: &Chunk) -> Result<Self> {
        let mut reader = Cursor::new(chunk.data);
        let header: BitChannelHeader = reader
            .read_le()
            .with_context(|| format!("Failed to read bit channel at {:#X}", chunk.offset))?;
        let frames = frame_count(header.first_frame, header.last_frame)?;
        let mut packed = vec![0u8; frames.div_ceil(8)];
        reader.read_exact(&mut packed).with_context(|| {
            format!("Bit channel at {:#X} holds fewer than {} frames", chunk.offset, frames)
        })?;
        let data = (0..frames).map(|i| packed[i / 8] & (1 << (i % 8)) != 0).collect();
        Ok(Self {
            first_frame: header.first_frame,
            last_frame: header.last_frame,
            channel_type: header.channel_type,
            pivot: header.pivot,
            default_value: header.default_value,
            data,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let frames = frame_count(self.first_frame, self.last_frame)?;
        ensure!(
            self.data.len() == frames,
            "Bit channel of pivot {} holds {} samples for {} frames",
            self.pivot,
            self.data.len(),
            frames
        );
        let mut packed = vec![0u8; frames.div_ceil(8)];
        for (i, &bit) in self.data.iter().enumerate() {
            if bit {
                packed[i / 8] |= 1 << (i % 8);
            }
        }
        write_chunk(w, K_CHUNK_BIT_CHANNEL, false, |w| {
            w.write_le(&BitChannelHeader {
                first_frame: self.first_frame,
                last_frame: self.last_frame,
                channel_type: self.channel_type,
                pivot: self.pivot,
                default_value: self.default_value,
            })?;
            w.write_all(&packed)?;
            Ok(())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum AnimChannel {
    Channel(AnimationChannel),
    Bit(AnimationBitChannel),
}

impl AnimChannel {
    #[inline]
    pub fn pivot(&self) -> u16 {
        match self {
            Self::Channel(c) => c.pivot,
            Self::Bit(c) => c.pivot,
        }
    }
}

/// Uncompressed animation. Channel order is kept as read or as built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Animation {
    pub header: AnimationHeader,
    pub channels: Vec<AnimChannel>,
}

/// Case-insensitive lookup of the hierarchy an animation refers to.
pub fn find_hierarchy<'a>(hierarchies: &'a [Hierarchy], name: &str) -> Option<&'a Hierarchy> {
    hierarchies.iter().find(|h| h.name().eq_ignore_ascii_case(name))
}

impl Animation {
    pub fn new(name: &str, hierarchy_name: &str, num_frames: u32, frame_rate: u32) -> Self {
        Self {
            header: AnimationHeader {
                version: ANIMATION_VERSION,
                name: name.to_string(),
                hierarchy_name: hierarchy_name.to_string(),
                num_frames,
                frame_rate,
            },
            channels: vec![],
        }
    }

    #[inline]
    pub fn name(&self) -> &str { &self.header.name }

    pub fn channels(&self) -> impl Iterator<Item = &AnimationChannel> {
        self.channels.iter().filter_map(|c| match c {
            AnimChannel::Channel(c) => Some(c),
            AnimChannel::Bit(_) => None,
        })
    }

    pub fn bit_channels(&self) -> impl Iterator<Item = &AnimationBitChannel> {
        self.channels.iter().filter_map(|c| match c {
            AnimChannel::Bit(c) => Some(c),
            AnimChannel::Channel(_) => None,
        })
    }

    pub fn resolve_hierarchy<'a>(&self, hierarchies: &'a [Hierarchy]) -> Option<&'a Hierarchy> {
        find_hierarchy(hierarchies, &self.header.hierarchy_name)
    }

    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut header: Option<AnimationHeader> = None;
        let mut channels = vec![];
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_ANIMATION_HEADER => header = Some(child.read_struct()?),
                K_CHUNK_ANIMATION_CHANNEL => {
                    channels.push(AnimChannel::Channel(AnimationChannel::read(&child)?))
                }
                K_CHUNK_BIT_CHANNEL => {
                    channels.push(AnimChannel::Bit(AnimationBitChannel::read(&child)?))
                }
                kind => warnings.push(Warning::UnknownChunk {
                    kind,
                    size: child.head.size,
                    parent: Some(chunk.kind()),
                }),
            }
        }
        let Some(header) = header else {
            bail!("Animation at {:#X} has no header chunk", chunk.offset);
        };
        log::debug!("Read animation '{}' with {} channels", header.name, channels.len());
        Ok(Self { header, channels })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, K_CHUNK_ANIMATION, true, |w| {
            write_struct_chunk(w, K_CHUNK_ANIMATION_HEADER, &self.header)?;
            for channel in &self.channels {
                match channel {
                    AnimChannel::Channel(c) => c.write(w)?,
                    AnimChannel::Bit(c) => c.write(w)?,
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::format::chunk::ChunkReader;

    fn reread<T>(data: &[u8], read: impl Fn(&Chunk) -> Result<T>) -> T {
        let chunk = ChunkReader::new(data).next_chunk().unwrap().unwrap();
        read(&chunk).unwrap()
    }

    #[test]
    fn channel_type_repr() {
        assert_eq!(ChannelType::try_from(6).unwrap(), ChannelType::Q);
        assert!(ChannelType::try_from(7).is_err());
        assert!(ChannelType::try_from(0x106).is_err());
        assert_eq!(ChannelType::Q.vector_len(), 4);
        assert_eq!(ChannelType::translation(2), Some(ChannelType::Z));
        assert_eq!(ChannelType::translation(3), None);
    }

    #[test]
    fn channel_keeps_padding() {
        let channel = AnimationChannel {
            first_frame: 2,
            last_frame: 4,
            vector_len: 1,
            channel_type: ChannelType::Y,
            pivot: 1,
            unknown: 0,
            data: vec![ChannelValue::Scalar(1.0), ChannelValue::Scalar(2.0), ChannelValue::Scalar(3.0)],
            pad_bytes: vec![0, 0],
        };
        let mut data = Vec::new();
        channel.write(&mut data).unwrap();
        assert_eq!(data.len(), 8 + 12 + 12 + 2);
        let decoded = reread(&data, AnimationChannel::read);
        assert_eq!(decoded, channel);
        assert_eq!(decoded.value_at(0), Some(ChannelValue::Scalar(1.0)));
        assert_eq!(decoded.value_at(3), Some(ChannelValue::Scalar(2.0)));
        assert_eq!(decoded.value_at(100), Some(ChannelValue::Scalar(3.0)));

        let inverted = AnimationChannel { first_frame: 5, last_frame: 1, ..channel };
        assert_eq!(inverted.value_at(3), None);
        assert!(inverted.write(&mut Vec::new()).is_err());
    }

    #[test]
    fn channel_rejects_sparse_data() {
        let channel = AnimationChannel {
            first_frame: 0,
            last_frame: 4,
            vector_len: 1,
            channel_type: ChannelType::X,
            pivot: 0,
            unknown: 0,
            data: vec![ChannelValue::Scalar(1.0)],
            pad_bytes: vec![],
        };
        assert!(channel.write(&mut Vec::new()).is_err());
    }

    #[test]
    fn quaternion_channel_layout() {
        let q = Quaternion::new(0.5, 0.5, 0.5, 0.5);
        let channel = AnimationChannel {
            first_frame: 0,
            last_frame: 0,
            vector_len: 4,
            channel_type: ChannelType::Q,
            pivot: 2,
            unknown: 0,
            data: vec![ChannelValue::Quaternion(q)],
            pad_bytes: vec![],
        };
        let mut data = Vec::new();
        channel.write(&mut data).unwrap();
        assert_eq!(data.len(), 8 + 12 + 16);
        let decoded = reread(&data, AnimationChannel::read);
        let decoded = decoded.data[0].as_quaternion().unwrap();
        assert_relative_eq!(decoded.length(), 1.0, epsilon = 1e-5);
        assert_eq!(decoded, q);
    }

    #[test]
    fn bit_channel_packs_lsb_first() {
        let bits = vec![true, false, false, true, true, false, false, false, true, true];
        let channel = AnimationBitChannel {
            first_frame: 5,
            last_frame: 14,
            channel_type: BitChannelType::Vis,
            pivot: 3,
            default_value: 1.0,
            data: bits,
        };
        let mut data = Vec::new();
        channel.write(&mut data).unwrap();
        assert_eq!(data.len(), 8 + 12 + 2);
        assert_eq!(&data[20..], &[0b0001_1001, 0b0000_0011]);
        let decoded = reread(&data, AnimationBitChannel::read);
        assert_eq!(decoded, channel);
        assert!(decoded.value_at(5));
        assert!(!decoded.value_at(6));
        assert!(decoded.value_at(200));
    }

    #[test]
    fn animation_keeps_channel_order() {
        let mut animation = Animation::new("walk", "skel", 10, 30);
        animation.channels.push(AnimChannel::Bit(AnimationBitChannel {
            first_frame: 0,
            last_frame: 0,
            channel_type: BitChannelType::Vis,
            pivot: 1,
            default_value: 0.0,
            data: vec![true],
        }));
        animation.channels.push(AnimChannel::Channel(AnimationChannel {
            first_frame: 0,
            last_frame: 1,
            vector_len: 1,
            channel_type: ChannelType::X,
            pivot: 1,
            unknown: 0,
            data: vec![ChannelValue::Scalar(0.0), ChannelValue::Scalar(1.0)],
            pad_bytes: vec![],
        }));
        let mut data = Vec::new();
        animation.write(&mut data).unwrap();
        let chunk = ChunkReader::new(&data).next_chunk().unwrap().unwrap();
        let mut warnings = Warnings::new();
        let decoded = Animation::read(&chunk, &mut warnings).unwrap();
        assert_eq!(decoded, animation);
        assert!(matches!(decoded.channels[0], AnimChannel::Bit(_)));
        assert_eq!(decoded.channels().count(), 1);
        assert_eq!(decoded.bit_channels().count(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn finds_hierarchy_by_name() {
        let hierarchies = [Hierarchy::new("SKEL"), Hierarchy::new("other")];
        let animation = Animation::new("walk", "skel", 1, 30);
        assert_eq!(animation.resolve_hierarchy(&hierarchies).map(|h| h.name()), Some("SKEL"));
        assert!(Animation::new("walk", "none", 1, 30).resolve_hierarchy(&hierarchies).is_none());
    }
}
