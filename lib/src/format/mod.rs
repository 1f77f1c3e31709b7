pub mod animation;
pub mod chunk;
pub mod collision_box;
pub mod compressed_animation;
pub mod dazzle;
pub mod file;
pub mod hierarchy;
pub mod hlod;
pub mod material;
pub mod mesh;
pub mod tree;

use std::{
    fmt::{Debug, Display, Formatter},
    io::{Read, Seek, Write},
};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::ser;
use serde_derive::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct ChunkType(pub u32);

// Meshes
pub const K_CHUNK_MESH: ChunkType = ChunkType(0x0000);
pub const K_CHUNK_VERTICES: ChunkType = ChunkType(0x0002);
pub const K_CHUNK_VERTEX_NORMALS: ChunkType = ChunkType(0x0003);
pub const K_CHUNK_MESH_USER_TEXT: ChunkType = ChunkType(0x000C);
pub const K_CHUNK_VERTEX_INFLUENCES: ChunkType = ChunkType(0x000E);
pub const K_CHUNK_MESH_HEADER3: ChunkType = ChunkType(0x001F);
pub const K_CHUNK_TRIANGLES: ChunkType = ChunkType(0x0020);
pub const K_CHUNK_VERTEX_SHADE_INDICES: ChunkType = ChunkType(0x0022);
pub const K_CHUNK_PRELIT_UNLIT: ChunkType = ChunkType(0x0023);
pub const K_CHUNK_PRELIT_VERTEX: ChunkType = ChunkType(0x0024);
pub const K_CHUNK_PRELIT_LIGHTMAP_MULTI_PASS: ChunkType = ChunkType(0x0025);
pub const K_CHUNK_PRELIT_LIGHTMAP_MULTI_TEXTURE: ChunkType = ChunkType(0x0026);
// Materials
pub const K_CHUNK_MATERIAL_INFO: ChunkType = ChunkType(0x0028);
pub const K_CHUNK_SHADERS: ChunkType = ChunkType(0x0029);
pub const K_CHUNK_VERTEX_MATERIALS: ChunkType = ChunkType(0x002A);
pub const K_CHUNK_VERTEX_MATERIAL: ChunkType = ChunkType(0x002B);
pub const K_CHUNK_VERTEX_MATERIAL_NAME: ChunkType = ChunkType(0x002C);
pub const K_CHUNK_VERTEX_MATERIAL_INFO: ChunkType = ChunkType(0x002D);
pub const K_CHUNK_VERTEX_MAPPER_ARGS0: ChunkType = ChunkType(0x002E);
pub const K_CHUNK_VERTEX_MAPPER_ARGS1: ChunkType = ChunkType(0x002F);
pub const K_CHUNK_TEXTURES: ChunkType = ChunkType(0x0030);
pub const K_CHUNK_TEXTURE: ChunkType = ChunkType(0x0031);
pub const K_CHUNK_TEXTURE_NAME: ChunkType = ChunkType(0x0032);
pub const K_CHUNK_TEXTURE_INFO: ChunkType = ChunkType(0x0033);
pub const K_CHUNK_MATERIAL_PASS: ChunkType = ChunkType(0x0038);
pub const K_CHUNK_VERTEX_MATERIAL_IDS: ChunkType = ChunkType(0x0039);
pub const K_CHUNK_SHADER_IDS: ChunkType = ChunkType(0x003A);
pub const K_CHUNK_DCG: ChunkType = ChunkType(0x003B);
pub const K_CHUNK_DIG: ChunkType = ChunkType(0x003C);
pub const K_CHUNK_SCG: ChunkType = ChunkType(0x003E);
pub const K_CHUNK_SHADER_MATERIAL_ID: ChunkType = ChunkType(0x003F);
pub const K_CHUNK_TEXTURE_STAGE: ChunkType = ChunkType(0x0048);
pub const K_CHUNK_TEXTURE_IDS: ChunkType = ChunkType(0x0049);
pub const K_CHUNK_STAGE_TEXCOORDS: ChunkType = ChunkType(0x004A);
pub const K_CHUNK_PER_FACE_TEXCOORD_IDS: ChunkType = ChunkType(0x004B);
pub const K_CHUNK_SHADER_MATERIALS: ChunkType = ChunkType(0x0050);
pub const K_CHUNK_SHADER_MATERIAL: ChunkType = ChunkType(0x0051);
pub const K_CHUNK_SHADER_MATERIAL_HEADER: ChunkType = ChunkType(0x0052);
pub const K_CHUNK_SHADER_MATERIAL_PROPERTY: ChunkType = ChunkType(0x0053);
pub const K_CHUNK_TANGENTS: ChunkType = ChunkType(0x0060);
pub const K_CHUNK_BITANGENTS: ChunkType = ChunkType(0x0061);
pub const K_CHUNK_AABBTREE: ChunkType = ChunkType(0x0090);
// Hierarchy
pub const K_CHUNK_HIERARCHY: ChunkType = ChunkType(0x0100);
pub const K_CHUNK_HIERARCHY_HEADER: ChunkType = ChunkType(0x0101);
pub const K_CHUNK_PIVOTS: ChunkType = ChunkType(0x0102);
pub const K_CHUNK_PIVOT_FIXUPS: ChunkType = ChunkType(0x0103);
// Animation
pub const K_CHUNK_ANIMATION: ChunkType = ChunkType(0x0200);
pub const K_CHUNK_ANIMATION_HEADER: ChunkType = ChunkType(0x0201);
pub const K_CHUNK_ANIMATION_CHANNEL: ChunkType = ChunkType(0x0202);
pub const K_CHUNK_BIT_CHANNEL: ChunkType = ChunkType(0x0203);
pub const K_CHUNK_COMPRESSED_ANIMATION: ChunkType = ChunkType(0x0280);
pub const K_CHUNK_COMPRESSED_ANIMATION_HEADER: ChunkType = ChunkType(0x0281);
pub const K_CHUNK_COMPRESSED_ANIMATION_CHANNEL: ChunkType = ChunkType(0x0282);
pub const K_CHUNK_COMPRESSED_BIT_CHANNEL: ChunkType = ChunkType(0x0283);
pub const K_CHUNK_COMPRESSED_ANIMATION_MOTION_CHANNEL: ChunkType = ChunkType(0x0284);
pub const K_CHUNK_MORPH_ANIMATION: ChunkType = ChunkType(0x02C0);
// Legacy models and scene objects
pub const K_CHUNK_HMODEL: ChunkType = ChunkType(0x0300);
pub const K_CHUNK_LODMODEL: ChunkType = ChunkType(0x0400);
pub const K_CHUNK_COLLECTION: ChunkType = ChunkType(0x0420);
pub const K_CHUNK_POINTS: ChunkType = ChunkType(0x0440);
pub const K_CHUNK_LIGHT: ChunkType = ChunkType(0x0460);
pub const K_CHUNK_EMITTER: ChunkType = ChunkType(0x0500);
pub const K_CHUNK_AGGREGATE: ChunkType = ChunkType(0x0600);
// Hierarchical LOD
pub const K_CHUNK_HLOD: ChunkType = ChunkType(0x0700);
pub const K_CHUNK_HLOD_HEADER: ChunkType = ChunkType(0x0701);
pub const K_CHUNK_HLOD_LOD_ARRAY: ChunkType = ChunkType(0x0702);
pub const K_CHUNK_HLOD_SUB_OBJECT_ARRAY_HEADER: ChunkType = ChunkType(0x0703);
pub const K_CHUNK_HLOD_SUB_OBJECT: ChunkType = ChunkType(0x0704);
pub const K_CHUNK_HLOD_AGGREGATE_ARRAY: ChunkType = ChunkType(0x0705);
pub const K_CHUNK_HLOD_PROXY_ARRAY: ChunkType = ChunkType(0x0706);
// Primitives
pub const K_CHUNK_BOX: ChunkType = ChunkType(0x0740);
pub const K_CHUNK_SPHERE: ChunkType = ChunkType(0x0741);
pub const K_CHUNK_RING: ChunkType = ChunkType(0x0742);
pub const K_CHUNK_NULL_OBJECT: ChunkType = ChunkType(0x0750);
pub const K_CHUNK_LIGHTSCAPE: ChunkType = ChunkType(0x0800);
pub const K_CHUNK_DAZZLE: ChunkType = ChunkType(0x0900);
pub const K_CHUNK_DAZZLE_NAME: ChunkType = ChunkType(0x0901);
pub const K_CHUNK_DAZZLE_TYPENAME: ChunkType = ChunkType(0x0902);
pub const K_CHUNK_SOUNDROBJ: ChunkType = ChunkType(0x0A00);

const KNOWN_CHUNKS: &[(ChunkType, &str)] = &[
    (K_CHUNK_MESH, "MESH"),
    (K_CHUNK_VERTICES, "VERTICES"),
    (K_CHUNK_VERTEX_NORMALS, "VERTEX_NORMALS"),
    (K_CHUNK_MESH_USER_TEXT, "MESH_USER_TEXT"),
    (K_CHUNK_VERTEX_INFLUENCES, "VERTEX_INFLUENCES"),
    (K_CHUNK_MESH_HEADER3, "MESH_HEADER3"),
    (K_CHUNK_TRIANGLES, "TRIANGLES"),
    (K_CHUNK_VERTEX_SHADE_INDICES, "VERTEX_SHADE_INDICES"),
    (K_CHUNK_PRELIT_UNLIT, "PRELIT_UNLIT"),
    (K_CHUNK_PRELIT_VERTEX, "PRELIT_VERTEX"),
    (K_CHUNK_PRELIT_LIGHTMAP_MULTI_PASS, "PRELIT_LIGHTMAP_MULTI_PASS"),
    (K_CHUNK_PRELIT_LIGHTMAP_MULTI_TEXTURE, "PRELIT_LIGHTMAP_MULTI_TEXTURE"),
    (K_CHUNK_MATERIAL_INFO, "MATERIAL_INFO"),
    (K_CHUNK_SHADERS, "SHADERS"),
    (K_CHUNK_VERTEX_MATERIALS, "VERTEX_MATERIALS"),
    (K_CHUNK_VERTEX_MATERIAL, "VERTEX_MATERIAL"),
    (K_CHUNK_VERTEX_MATERIAL_NAME, "VERTEX_MATERIAL_NAME"),
    (K_CHUNK_VERTEX_MATERIAL_INFO, "VERTEX_MATERIAL_INFO"),
    (K_CHUNK_VERTEX_MAPPER_ARGS0, "VERTEX_MAPPER_ARGS0"),
    (K_CHUNK_VERTEX_MAPPER_ARGS1, "VERTEX_MAPPER_ARGS1"),
    (K_CHUNK_TEXTURES, "TEXTURES"),
    (K_CHUNK_TEXTURE, "TEXTURE"),
    (K_CHUNK_TEXTURE_NAME, "TEXTURE_NAME"),
    (K_CHUNK_TEXTURE_INFO, "TEXTURE_INFO"),
    (K_CHUNK_MATERIAL_PASS, "MATERIAL_PASS"),
    (K_CHUNK_VERTEX_MATERIAL_IDS, "VERTEX_MATERIAL_IDS"),
    (K_CHUNK_SHADER_IDS, "SHADER_IDS"),
    (K_CHUNK_DCG, "DCG"),
    (K_CHUNK_DIG, "DIG"),
    (K_CHUNK_SCG, "SCG"),
    (K_CHUNK_SHADER_MATERIAL_ID, "SHADER_MATERIAL_ID"),
    (K_CHUNK_TEXTURE_STAGE, "TEXTURE_STAGE"),
    (K_CHUNK_TEXTURE_IDS, "TEXTURE_IDS"),
    (K_CHUNK_STAGE_TEXCOORDS, "STAGE_TEXCOORDS"),
    (K_CHUNK_PER_FACE_TEXCOORD_IDS, "PER_FACE_TEXCOORD_IDS"),
    (K_CHUNK_SHADER_MATERIALS, "SHADER_MATERIALS"),
    (K_CHUNK_SHADER_MATERIAL, "SHADER_MATERIAL"),
    (K_CHUNK_SHADER_MATERIAL_HEADER, "SHADER_MATERIAL_HEADER"),
    (K_CHUNK_SHADER_MATERIAL_PROPERTY, "SHADER_MATERIAL_PROPERTY"),
    (K_CHUNK_TANGENTS, "TANGENTS"),
    (K_CHUNK_BITANGENTS, "BITANGENTS"),
    (K_CHUNK_AABBTREE, "AABBTREE"),
    (K_CHUNK_HIERARCHY, "HIERARCHY"),
    (K_CHUNK_HIERARCHY_HEADER, "HIERARCHY_HEADER"),
    (K_CHUNK_PIVOTS, "PIVOTS"),
    (K_CHUNK_PIVOT_FIXUPS, "PIVOT_FIXUPS"),
    (K_CHUNK_ANIMATION, "ANIMATION"),
    (K_CHUNK_ANIMATION_HEADER, "ANIMATION_HEADER"),
    (K_CHUNK_ANIMATION_CHANNEL, "ANIMATION_CHANNEL"),
    (K_CHUNK_BIT_CHANNEL, "BIT_CHANNEL"),
    (K_CHUNK_COMPRESSED_ANIMATION, "COMPRESSED_ANIMATION"),
    (K_CHUNK_COMPRESSED_ANIMATION_HEADER, "COMPRESSED_ANIMATION_HEADER"),
    (K_CHUNK_COMPRESSED_ANIMATION_CHANNEL, "COMPRESSED_ANIMATION_CHANNEL"),
    (K_CHUNK_COMPRESSED_BIT_CHANNEL, "COMPRESSED_BIT_CHANNEL"),
    (K_CHUNK_COMPRESSED_ANIMATION_MOTION_CHANNEL, "COMPRESSED_ANIMATION_MOTION_CHANNEL"),
    (K_CHUNK_MORPH_ANIMATION, "MORPH_ANIMATION"),
    (K_CHUNK_HMODEL, "HMODEL"),
    (K_CHUNK_LODMODEL, "LODMODEL"),
    (K_CHUNK_COLLECTION, "COLLECTION"),
    (K_CHUNK_POINTS, "POINTS"),
    (K_CHUNK_LIGHT, "LIGHT"),
    (K_CHUNK_EMITTER, "EMITTER"),
    (K_CHUNK_AGGREGATE, "AGGREGATE"),
    (K_CHUNK_HLOD, "HLOD"),
    (K_CHUNK_HLOD_HEADER, "HLOD_HEADER"),
    (K_CHUNK_HLOD_LOD_ARRAY, "HLOD_LOD_ARRAY"),
    (K_CHUNK_HLOD_SUB_OBJECT_ARRAY_HEADER, "HLOD_SUB_OBJECT_ARRAY_HEADER"),
    (K_CHUNK_HLOD_SUB_OBJECT, "HLOD_SUB_OBJECT"),
    (K_CHUNK_HLOD_AGGREGATE_ARRAY, "HLOD_AGGREGATE_ARRAY"),
    (K_CHUNK_HLOD_PROXY_ARRAY, "HLOD_PROXY_ARRAY"),
    (K_CHUNK_BOX, "BOX"),
    (K_CHUNK_SPHERE, "SPHERE"),
    (K_CHUNK_RING, "RING"),
    (K_CHUNK_NULL_OBJECT, "NULL_OBJECT"),
    (K_CHUNK_LIGHTSCAPE, "LIGHTSCAPE"),
    (K_CHUNK_DAZZLE, "DAZZLE"),
    (K_CHUNK_DAZZLE_NAME, "DAZZLE_NAME"),
    (K_CHUNK_DAZZLE_TYPENAME, "DAZZLE_TYPENAME"),
    (K_CHUNK_SOUNDROBJ, "SOUNDROBJ"),
];

impl ChunkType {
    /// Registry name of a known tag, `None` for tags this crate has never heard of.
    pub fn name(self) -> Option<&'static str> {
        KNOWN_CHUNKS.iter().find(|(kind, _)| *kind == self).map(|(_, name)| *name)
    }

    #[inline]
    pub fn is_known(self) -> bool { self.name().is_some() }
}

impl Display for ChunkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{:#X}", self.0) }
}

impl Debug for ChunkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({:#X})", name, self.0),
            None => write!(f, "{:#X}", self.0),
        }
    }
}

impl ser::Serialize for ChunkType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: ser::Serializer {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("{:?}", self))
        } else {
            serializer.serialize_u32(self.0)
        }
    }
}

/// Packed `(major << 16) | minor` version word.
#[binrw]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub minor: u16,
    pub major: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16) -> Self { Self { minor, major } }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[binrw]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self { Self { x, y, z } }
}

impl From<mint::Vector3<f32>> for Vector3 {
    fn from(v: mint::Vector3<f32>) -> Self { Self { x: v.x, y: v.y, z: v.z } }
}

impl From<Vector3> for mint::Vector3<f32> {
    fn from(v: Vector3) -> Self { Self { x: v.x, y: v.y, z: v.z } }
}

/// Stored on disk as x, y, z, w.
#[binrw]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self { Self::IDENTITY }
}

impl Quaternion {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
    /// Number of host-order components (w, x, y, z).
    pub const COMPONENTS: usize = 4;

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self { Self { x, y, z, w } }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Scales to unit length. A zero quaternion becomes the identity.
    pub fn normalize(&mut self) {
        let len = self.length();
        if len <= f32::EPSILON {
            *self = Self::IDENTITY;
            return;
        }
        self.x /= len;
        self.y /= len;
        self.z /= len;
        self.w /= len;
    }

    /// Component by host index: 0 = w, 1 = x, 2 = y, 3 = z.
    pub fn component(&self, index: usize) -> Option<f32> {
        match index {
            0 => Some(self.w),
            1 => Some(self.x),
            2 => Some(self.y),
            3 => Some(self.z),
            _ => None,
        }
    }

    /// Sets a component by host index. Returns `false` for an out of range index.
    pub fn set_component(&mut self, index: usize, value: f32) -> bool {
        match index {
            0 => self.w = value,
            1 => self.x = value,
            2 => self.y = value,
            3 => self.z = value,
            _ => return false,
        }
        true
    }
}

impl From<mint::Quaternion<f32>> for Quaternion {
    fn from(q: mint::Quaternion<f32>) -> Self { Self { x: q.v.x, y: q.v.y, z: q.v.z, w: q.s } }
}

impl From<Quaternion> for mint::Quaternion<f32> {
    fn from(q: Quaternion) -> Self {
        Self { v: mint::Vector3 { x: q.x, y: q.y, z: q.z }, s: q.w }
    }
}

#[binrw]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// NUL padded fixed-width text field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FixedString<const N: usize>(pub [u8; N]);

/// `W3D_NAME_LEN` names.
pub type Name = FixedString<16>;
/// Combined `container.object` names.
pub type LargeName = FixedString<32>;

impl<const N: usize> FixedString<N> {
    /// The part of `str` that fits: at most `N - 1` bytes, cut on a char boundary.
    pub fn truncate(str: &str) -> &str {
        let mut len = str.len().min(N.saturating_sub(1));
        while !str.is_char_boundary(len) {
            len -= 1;
        }
        &str[..len]
    }

    /// Truncates so the field always keeps its terminator.
    pub fn from_string(str: &String) -> Self {
        let mut bytes = [0u8; N];
        let src = Self::truncate(str);
        if src.len() < str.len() {
            log::warn!("Name '{}' exceeds {} bytes and was truncated", str, N - 1);
        }
        bytes[..src.len()].copy_from_slice(src.as_bytes());
        Self(bytes)
    }

    pub fn into_string(self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl<const N: usize> BinRead for FixedString<N> {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mut bytes = [0u8; N];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl<const N: usize> BinWrite for FixedString<N> {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

/// Reads a NUL terminated string chunk body. Bytes after the first NUL are ignored.
pub fn read_cstring(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Writes `str` followed by its NUL terminator.
pub fn write_cstring<W: Write>(w: &mut W, str: &str) -> std::io::Result<()> {
    w.write_all(str.as_bytes())?;
    w.write_all(&[0])
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn chunk_type_names() {
        assert_eq!(K_CHUNK_HIERARCHY.name(), Some("HIERARCHY"));
        assert_eq!(format!("{}", ChunkType(0x1)), "0x1");
        assert_eq!(format!("{:?}", K_CHUNK_BOX), "BOX (0x740)");
        assert!(!ChunkType(0xDEAD_BEEF).is_known());
    }

    #[test]
    fn fixed_string_truncates_and_terminates() {
        let name = Name::from_string(&"ABCDEFGHIJKLMNOPQRST".to_string());
        assert_eq!(name.0[15], 0);
        assert_eq!(name.into_string(), "ABCDEFGHIJKLMNO");
        assert_eq!(Name::from_string(&"bone_a".to_string()).into_string(), "bone_a");
    }

    #[test]
    fn quaternion_normalize() {
        let mut q = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        q.normalize();
        assert_eq!(q, Quaternion::IDENTITY);

        let mut q = Quaternion::new(0.5, 0.5, 0.5, 0.9);
        q.normalize();
        assert_relative_eq!(q.length(), 1.0, epsilon = 1e-6);

        let mut zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        zero.normalize();
        assert_eq!(zero, Quaternion::IDENTITY);
    }

    #[test]
    fn quaternion_host_component_order() {
        let mut q = Quaternion::IDENTITY;
        assert!(q.set_component(0, 0.25));
        assert!(q.set_component(3, 0.75));
        assert!(!q.set_component(4, 1.0));
        assert_eq!(q.w, 0.25);
        assert_eq!(q.z, 0.75);
        assert_eq!(q.component(1), Some(0.0));
    }

    #[test]
    fn cstring_roundtrip() {
        let mut out = Vec::new();
        write_cstring(&mut out, "texture.tga").unwrap();
        assert_eq!(out.last(), Some(&0));
        assert_eq!(read_cstring(&out), "texture.tga");
        assert_eq!(read_cstring(b"abc"), "abc");
    }
}
