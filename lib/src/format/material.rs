use std::io::Write;

use anyhow::Result;
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    error::{Warning, Warnings},
    format::{
        chunk::{write_chunk, write_list_chunk, write_string_chunk, write_struct_chunk, Chunk},
        Rgba, Vector2, K_CHUNK_DCG, K_CHUNK_DIG, K_CHUNK_MATERIAL_PASS, K_CHUNK_PER_FACE_TEXCOORD_IDS,
        K_CHUNK_SCG, K_CHUNK_SHADER_IDS, K_CHUNK_SHADER_MATERIAL_ID, K_CHUNK_STAGE_TEXCOORDS,
        K_CHUNK_TEXTURE,
        K_CHUNK_TEXTURE_IDS, K_CHUNK_TEXTURE_INFO, K_CHUNK_TEXTURE_NAME, K_CHUNK_TEXTURE_STAGE,
        K_CHUNK_VERTEX_MAPPER_ARGS0, K_CHUNK_VERTEX_MAPPER_ARGS1, K_CHUNK_VERTEX_MATERIAL,
        K_CHUNK_VERTEX_MATERIAL_IDS, K_CHUNK_VERTEX_MATERIAL_INFO, K_CHUNK_VERTEX_MATERIAL_NAME,
    },
};

pub(crate) fn unexpected(chunk: &Chunk, child: &Chunk, warnings: &mut Warnings) {
    warnings.push(Warning::UnknownChunk {
        kind: child.kind(),
        size: child.head.size,
        parent: Some(chunk.kind()),
    });
}

#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MaterialInfo {
    pub pass_count: u32,
    pub vert_matl_count: u32,
    pub shader_count: u32,
    pub texture_count: u32,
}

/// Fixed function blend state.
#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Shader {
    pub depth_compare: u8,
    pub depth_mask: u8,
    pub color_mask: u8,
    pub dest_blend: u8,
    pub fog_func: u8,
    pub pri_gradient: u8,
    pub sec_gradient: u8,
    pub src_blend: u8,
    pub texturing: u8,
    pub detail_color_func: u8,
    pub detail_alpha_func: u8,
    pub shader_preset: u8,
    pub alpha_test: u8,
    pub post_detail_color_func: u8,
    pub post_detail_alpha_func: u8,
    pub pad: u8,
}

#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VertexMaterialInfo {
    pub attributes: u32,
    pub ambient: Rgba,
    pub diffuse: Rgba,
    pub specular: Rgba,
    pub emissive: Rgba,
    pub shininess: f32,
    pub opacity: f32,
    pub translucency: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VertexMaterial {
    pub name: String,
    pub info: VertexMaterialInfo,
    pub vm_args_0: Option<String>,
    pub vm_args_1: Option<String>,
}

impl VertexMaterial {
    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut result = Self::default();
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_VERTEX_MATERIAL_NAME => result.name = child.read_string(),
                K_CHUNK_VERTEX_MATERIAL_INFO => result.info = child.read_struct()?,
                K_CHUNK_VERTEX_MAPPER_ARGS0 => result.vm_args_0 = Some(child.read_string()),
                K_CHUNK_VERTEX_MAPPER_ARGS1 => result.vm_args_1 = Some(child.read_string()),
                _ => unexpected(chunk, &child, warnings),
            }
        }
        Ok(result)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, K_CHUNK_VERTEX_MATERIAL, true, |w| {
            write_string_chunk(w, K_CHUNK_VERTEX_MATERIAL_NAME, &self.name)?;
            write_struct_chunk(w, K_CHUNK_VERTEX_MATERIAL_INFO, &self.info)?;
            if let Some(args) = &self.vm_args_0 {
                write_string_chunk(w, K_CHUNK_VERTEX_MAPPER_ARGS0, args)?;
            }
            if let Some(args) = &self.vm_args_1 {
                write_string_chunk(w, K_CHUNK_VERTEX_MAPPER_ARGS1, args)?;
            }
            Ok(())
        })
    }
}

#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TextureInfo {
    pub attributes: u16,
    pub animation_type: u16,
    pub frame_count: u32,
    pub frame_rate: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Texture {
    /// Image file name; images themselves are not loaded.
    pub name: String,
    pub info: Option<TextureInfo>,
}

impl Texture {
    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut result = Self::default();
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_TEXTURE_NAME => result.name = child.read_string(),
                K_CHUNK_TEXTURE_INFO => result.info = Some(child.read_struct()?),
                _ => unexpected(chunk, &child, warnings),
            }
        }
        Ok(result)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, K_CHUNK_TEXTURE, true, |w| {
            write_string_chunk(w, K_CHUNK_TEXTURE_NAME, &self.name)?;
            if let Some(info) = &self.info {
                write_struct_chunk(w, K_CHUNK_TEXTURE_INFO, info)?;
            }
            Ok(())
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TextureStage {
    pub tx_ids: Vec<u32>,
    pub tx_coords: Vec<Vector2>,
    pub per_face_tx_coords: Vec<[u32; 3]>,
}

impl TextureStage {
    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut result = Self::default();
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_TEXTURE_IDS => result.tx_ids = child.read_list()?,
                K_CHUNK_STAGE_TEXCOORDS => result.tx_coords = child.read_list()?,
                K_CHUNK_PER_FACE_TEXCOORD_IDS => result.per_face_tx_coords = child.read_list()?,
                _ => unexpected(chunk, &child, warnings),
            }
        }
        Ok(result)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, K_CHUNK_TEXTURE_STAGE, true, |w| {
            if !self.tx_ids.is_empty() {
                write_list_chunk(w, K_CHUNK_TEXTURE_IDS, &self.tx_ids)?;
            }
            if !self.tx_coords.is_empty() {
                write_list_chunk(w, K_CHUNK_STAGE_TEXCOORDS, &self.tx_coords)?;
            }
            if !self.per_face_tx_coords.is_empty() {
                write_list_chunk(w, K_CHUNK_PER_FACE_TEXCOORD_IDS, &self.per_face_tx_coords)?;
            }
            Ok(())
        })
    }
}

/// Render pass: material, shader and texture assignment per vertex.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MaterialPass {
    pub vertex_material_ids: Vec<u32>,
    pub shader_ids: Vec<u32>,
    pub dcg: Vec<Rgba>,
    pub dig: Vec<Rgba>,
    pub scg: Vec<Rgba>,
    pub shader_material_ids: Vec<u32>,
    pub tx_stages: Vec<TextureStage>,
    /// Texture coordinates stored directly in the pass.
    pub tx_coords: Vec<Vector2>,
}

impl MaterialPass {
    pub fn read(chunk: &Chunk, warnings: &mut Warnings) -> Result<Self> {
        let mut result = Self::default();
        for child in chunk.children() {
            let child = child?;
            match child.kind() {
                K_CHUNK_VERTEX_MATERIAL_IDS => result.vertex_material_ids = child.read_list()?,
                K_CHUNK_SHADER_IDS => result.shader_ids = child.read_list()?,
                K_CHUNK_DCG => result.dcg = child.read_list()?,
                K_CHUNK_DIG => result.dig = child.read_list()?,
                K_CHUNK_SCG => result.scg = child.read_list()?,
                K_CHUNK_SHADER_MATERIAL_ID => result.shader_material_ids = child.read_list()?,
                K_CHUNK_TEXTURE_STAGE => result.tx_stages.push(TextureStage::read(&child, warnings)?),
                K_CHUNK_STAGE_TEXCOORDS => result.tx_coords = child.read_list()?,
                _ => unexpected(chunk, &child, warnings),
            }
        }
        Ok(result)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, K_CHUNK_MATERIAL_PASS, true, |w| {
            if !self.vertex_material_ids.is_empty() {
                write_list_chunk(w, K_CHUNK_VERTEX_MATERIAL_IDS, &self.vertex_material_ids)?;
            }
            if !self.shader_ids.is_empty() {
                write_list_chunk(w, K_CHUNK_SHADER_IDS, &self.shader_ids)?;
            }
            if !self.dcg.is_empty() {
                write_list_chunk(w, K_CHUNK_DCG, &self.dcg)?;
            }
            if !self.dig.is_empty() {
                write_list_chunk(w, K_CHUNK_DIG, &self.dig)?;
            }
            if !self.scg.is_empty() {
                write_list_chunk(w, K_CHUNK_SCG, &self.scg)?;
            }
            if !self.shader_material_ids.is_empty() {
                write_list_chunk(w, K_CHUNK_SHADER_MATERIAL_ID, &self.shader_material_ids)?;
            }
            for stage in &self.tx_stages {
                stage.write(w)?;
            }
            if !self.tx_coords.is_empty() {
                write_list_chunk(w, K_CHUNK_STAGE_TEXCOORDS, &self.tx_coords)?;
            }
            Ok(())
        })
    }
}
