use std::io::Write;

use anyhow::{bail, Result};
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    error::{Warning, Warnings},
    format::{
        chunk::{
            write_chunk, write_list_chunk, write_string_chunk, write_struct_chunk, Chunk,
            OpaqueChunk,
        },
        material::{unexpected, MaterialInfo, MaterialPass, Shader, Texture, VertexMaterial},
        ChunkType, Name, Vector3, Version, K_CHUNK_AABBTREE, K_CHUNK_BITANGENTS,
        K_CHUNK_MATERIAL_INFO, K_CHUNK_MATERIAL_PASS, K_CHUNK_MESH, K_CHUNK_MESH_HEADER3, K_CHUNK_MESH_USER_TEXT,
        K_CHUNK_PRELIT_LIGHTMAP_MULTI_PASS, K_CHUNK_PRELIT_LIGHTMAP_MULTI_TEXTURE,
        K_CHUNK_PRELIT_UNLIT, K_CHUNK_PRELIT_VERTEX, K_CHUNK_SHADERS, K_CHUNK_SHADER_MATERIALS,
        K_CHUNK_TANGENTS, K_CHUNK_TEXTURE, K_CHUNK_TEXTURES, K_CHUNK_TRIANGLES,
        K_CHUNK_VERTEX_INFLUENCES, K_CHUNK_VERTEX_MATERIAL, K_CHUNK_VERTEX_MATERIALS,
        K_CHUNK_VERTEX_NORMALS, K_CHUNK_VERTEX_SHADE_INDICES, K_CHUNK_VERTICES,
    },
};

pub const MESH_VERSION: Version = Version::new(4, 2);

#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MeshHeader {
    pub version: Version,
    pub attrs: u32,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub mesh_name: String,
    #[br(map = Name::into_string)]
    #[bw(map = Name::from_string)]
    pub container_name: String,
    pub face_count: u32,
    pub vert_count: u32,
    pub matl_count: u32,
    pub damage_stage_count: u32,
    pub sort_level: i32,
    pub prelit_version: u32,
    pub future_count: u32,
    pub vert_channel_flags: u32,
    pub face_channel_flags: u32,
    pub min_corner: Vector3,
    pub max_corner: Vector3,
    pub sph_center: Vector3,
    pub sph_radius: f32,
}

#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Triangle {
    pub vert_ids: [u32; 3],
    pub surface_type: u32,
    pub normal: Vector3,
    pub distance: f32,
}

#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VertexInfluence {
    pub bone_idx: u16,
    pub xtra_idx: u16,
    pub bone_inf: u16,
    pub xtra_inf: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Mesh {
    pub header: MeshHeader,
    pub user_text: Option<String>,
    pub verts: Vec<Vector3>,
    pub normals: Vec<Vector3>,
    pub influences: Vec<VertexInfluence>,
    pub triangles: Vec<Triangle>,
    pub shade_ids: Vec<u32>,
    pub material_info: Option<MaterialInfo>,
    pub shaders: Vec<Shader>,
    pub vert_materials: Vec<VertexMaterial>,
    pub textures: Vec<Texture>,
    pub material_passes: Vec<MaterialPass>,
    /// Prelit variants, tangents, shader materials and AABB trees, kept raw.
    pub extras: Vec<OpaqueChunk>,
}

/// Reads a container whose children are all of one kind.
fn read_container<T, F>(
    chunk: &Chunk,
    child_kind: ChunkType,
    warnings: &mut Warnings,
    mut read: F,
) -> Result<Vec<T>>
where
    F: FnMut(&Chunk, &mut Warnings) -> Result<T>,
{
    let mut out = vec![];
    for child in chunk.children() {
        let child = child?;
        if child.kind() == child_kind {
            out.push(read(&child, warnings)?);
        } else {
            unexpected(chunk, &child, warnings);
        }
    }
    Ok(out)
}

impl Mesh {
    pub fn new(mesh_name: &str, container_name: &str) -> Self {
        Self {
            header: MeshHeader {
                version: MESH_VERSION,
                mesh_name: mesh_name.to_string(),
                container_name: container_name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &str { &self.header.mesh_name }

    /// Syncs the header counts with the vertex and triangle lists.
    pub fn update_counts(&mut self) {
        self.header.vert_count = self.verts.len() as u32;
        self.header.face_count = self.triangles.len() as u32;
    }

    pub fn set_vertices(&mut self, verts: Vec<Vector3>, normals: Vec<Vector3>) {
        self.verts = verts;
        self.normals = normals;
        self.update_counts();
    }

    pub fn set_triangles(&mut self, triangles: Vec<Triangle>) {
        self.triangles = triangles;
        self.update_counts();
    }

    /// `container.mesh`, or the mesh name alone without a container.
    pub fn full_name(&self) -> String {
        if self.header.container_name.is_empty() {
            self.header.mesh_name.clone()
        } else {
            format!("{}.{}", self.header.container_name, self.header.mesh_name)
        }
    }

    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut header: Option<MeshHeader> = None;
        let mut result = Self::default();
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_MESH_HEADER3 => header = Some(child.read_struct()?),
                K_CHUNK_MESH_USER_TEXT => result.user_text = Some(child.read_string()),
                K_CHUNK_VERTICES => result.verts = child.read_list()?,
                K_CHUNK_VERTEX_NORMALS => result.normals = child.read_list()?,
                K_CHUNK_VERTEX_INFLUENCES => result.influences = child.read_list()?,
                K_CHUNK_TRIANGLES => result.triangles = child.read_list()?,
                K_CHUNK_VERTEX_SHADE_INDICES => result.shade_ids = child.read_list()?,
                K_CHUNK_MATERIAL_INFO => result.material_info = Some(child.read_struct()?),
                K_CHUNK_SHADERS => result.shaders = child.read_list()?,
                K_CHUNK_VERTEX_MATERIALS => {
                    result.vert_materials =
                        read_container(&child, K_CHUNK_VERTEX_MATERIAL, warnings, VertexMaterial::read)?
                }
                K_CHUNK_TEXTURES => {
                    result.textures = read_container(&child, K_CHUNK_TEXTURE, warnings, Texture::read)?
                }
                K_CHUNK_MATERIAL_PASS => {
                    result.material_passes.push(MaterialPass::read(&child, warnings)?)
                }
                K_CHUNK_PRELIT_UNLIT
                | K_CHUNK_PRELIT_VERTEX
                | K_CHUNK_PRELIT_LIGHTMAP_MULTI_PASS
                | K_CHUNK_PRELIT_LIGHTMAP_MULTI_TEXTURE
                | K_CHUNK_SHADER_MATERIALS
                | K_CHUNK_TANGENTS
                | K_CHUNK_BITANGENTS
                | K_CHUNK_AABBTREE => {
                    warnings.push(Warning::UnsupportedChunk {
                        kind: child.kind(),
                        size: child.head.size,
                    });
                    result.extras.push(OpaqueChunk::from(&child));
                }
                _ => unexpected(chunk, &child, warnings),
            }
        }
        let Some(header) = header else {
            bail!("Mesh at {:#X} has no header chunk", chunk.offset);
        };
        for (item, declared, actual) in [
            ("vertices", header.vert_count, result.verts.len()),
            ("triangles", header.face_count, result.triangles.len()),
        ] {
            if declared as usize != actual {
                warnings.push(Warning::CountMismatch {
                    owner: header.mesh_name.clone(),
                    item,
                    declared,
                    actual,
                });
            }
        }
        result.header = header;
        result.update_counts();
        Ok(result)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let header = MeshHeader {
            face_count: self.triangles.len() as u32,
            vert_count: self.verts.len() as u32,
            ..self.header.clone()
        };
        write_chunk(w, K_CHUNK_MESH, true, |w| {
            write_struct_chunk(w, K_CHUNK_MESH_HEADER3, &header)?;
            if let Some(text) = &self.user_text {
                write_string_chunk(w, K_CHUNK_MESH_USER_TEXT, text)?;
            }
            write_list_chunk(w, K_CHUNK_VERTICES, &self.verts)?;
            write_list_chunk(w, K_CHUNK_VERTEX_NORMALS, &self.normals)?;
            if !self.influences.is_empty() {
                write_list_chunk(w, K_CHUNK_VERTEX_INFLUENCES, &self.influences)?;
            }
            write_list_chunk(w, K_CHUNK_TRIANGLES, &self.triangles)?;
            if !self.shade_ids.is_empty() {
                write_list_chunk(w, K_CHUNK_VERTEX_SHADE_INDICES, &self.shade_ids)?;
            }
            if let Some(info) = &self.material_info {
                write_struct_chunk(w, K_CHUNK_MATERIAL_INFO, info)?;
            }
            if !self.shaders.is_empty() {
                write_list_chunk(w, K_CHUNK_SHADERS, &self.shaders)?;
            }
            if !self.vert_materials.is_empty() {
                write_chunk(w, K_CHUNK_VERTEX_MATERIALS, true, |w| {
                    for material in &self.vert_materials {
                        material.write(w)?;
                    }
                    Ok(())
                })?;
            }
            if !self.textures.is_empty() {
                write_chunk(w, K_CHUNK_TEXTURES, true, |w| {
                    for texture in &self.textures {
                        texture.write(w)?;
                    }
                    Ok(())
                })?;
            }
            for pass in &self.material_passes {
                pass.write(w)?;
            }
            for extra in &self.extras {
                extra.write(w)?;
            }
            Ok(())
        })
    }
}
