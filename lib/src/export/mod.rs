//! Assembles W3D files from host scene data.

pub mod animation;
pub mod curve;

use anyhow::{bail, ensure, Context, Result};
use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    error::{Warning, Warnings},
    export::{
        animation::{retrieve_all_animations, retrieve_animation, Action, AnimatedObject},
        curve::SceneRange,
    },
    format::{
        collision_box::CollisionBox,
        file::{W3dChunk, W3dFile},
        hierarchy::Hierarchy,
        hlod::Hlod,
        mesh::Mesh,
    },
};

/// Which top-level structures an export contains.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ExportMode {
    /// First mesh only.
    M,
    /// Hierarchy only.
    H,
    /// Animation only.
    A,
    /// Hierarchy, meshes, HLOD and boxes.
    HM,
    /// `HM` plus animation.
    HAM,
}

impl ExportMode {
    #[inline]
    pub fn has_animation(self) -> bool { matches!(self, Self::A | Self::HAM) }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum AnimationCompression {
    /// Dense, one sample per frame.
    #[default]
    U,
    /// Sparse keyframes.
    TC,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub mode: ExportMode,
    #[serde(default)]
    pub compression: AnimationCompression,
    /// Skeleton ships separately; `HM` omits the hierarchy.
    #[serde(default)]
    pub use_existing_skeleton: bool,
    #[serde(default)]
    pub individual_files: bool,
    /// Export one animation per host action instead of the active one.
    #[serde(default)]
    pub all_actions: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            mode: ExportMode::HM,
            compression: AnimationCompression::U,
            use_existing_skeleton: false,
            individual_files: false,
            all_actions: false,
        }
    }
}

impl ExportSettings {
    pub fn new(mode: &str) -> Result<Self> {
        let mode = mode.parse::<ExportMode>().with_context(|| format!("Unsupported export mode '{mode}'"))?;
        Ok(Self { mode, ..Default::default() })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse export settings")
    }
}

/// Animated host objects of the scene.
#[derive(Debug, Default)]
pub struct AnimationSource {
    /// Name of the exported animation.
    pub name: String,
    /// The rig object followed by its armature data.
    pub rig: Vec<AnimatedObject>,
    pub meshes: Vec<AnimatedObject>,
    /// Every action, for exporting all of them.
    pub actions: Vec<Action>,
}

/// Scene contents in W3D form, ready to be selected by mode.
#[derive(Debug)]
pub struct ExportData {
    /// Container name, also the main file name in individual-files mode.
    pub name: String,
    pub hierarchy: Option<Hierarchy>,
    pub meshes: Vec<Mesh>,
    pub hlod: Option<Hlod>,
    pub boxes: Vec<CollisionBox>,
    pub animation: Option<AnimationSource>,
    pub scene: SceneRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExportOutput {
    Single(Vec<u8>),
    /// File name to contents, in export order.
    Individual(IndexMap<String, Vec<u8>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Exported {
    pub file: W3dFile,
    pub output: ExportOutput,
    pub warnings: Warnings,
}

fn require_hierarchy<'a>(data: &'a ExportData, mode: ExportMode) -> Result<&'a Hierarchy> {
    data.hierarchy.as_ref().with_context(|| format!("Export mode {mode} requires a hierarchy"))
}

fn export_animations(
    data: &ExportData,
    settings: &ExportSettings,
    warnings: &mut Warnings,
) -> Result<Vec<W3dChunk>> {
    let hierarchy = require_hierarchy(data, settings.mode)?;
    let Some(source) = &data.animation else {
        bail!("Export mode {} requires an animation", settings.mode);
    };
    let animations = if settings.all_actions {
        retrieve_all_animations(
            hierarchy,
            &source.actions,
            !source.rig.is_empty(),
            settings.compression,
            &data.scene,
            warnings,
        )?
    } else {
        vec![retrieve_animation(
            &source.name,
            hierarchy,
            &source.rig,
            &source.meshes,
            settings.compression,
            &data.scene,
            warnings,
        )?]
    };
    Ok(animations.into_iter().map(W3dChunk::from).collect())
}

/// Selects and encodes the structures `settings.mode` asks for.
pub fn export(data: &ExportData, settings: &ExportSettings) -> Result<Exported> {
    let mut warnings = Warnings::new();
    let mut chunks = vec![];
    match settings.mode {
        ExportMode::M => {
            let Some(mesh) = data.meshes.first() else {
                bail!("Export mode M requires a mesh");
            };
            if data.meshes.len() > 1 {
                warnings.push(Warning::MultipleMeshes {
                    count: data.meshes.len(),
                    exported: mesh.name().to_string(),
                });
            }
            chunks.push(W3dChunk::Mesh(mesh.clone()));
        }
        ExportMode::H => {
            chunks.push(W3dChunk::Hierarchy(require_hierarchy(data, settings.mode)?.clone()));
        }
        ExportMode::A => chunks.extend(export_animations(data, settings, &mut warnings)?),
        ExportMode::HM | ExportMode::HAM => {
            ensure!(!data.meshes.is_empty(), "Export mode {} requires at least one mesh", settings.mode);
            if settings.mode == ExportMode::HAM || !settings.use_existing_skeleton {
                chunks.push(W3dChunk::Hierarchy(require_hierarchy(data, settings.mode)?.clone()));
            }
            if settings.mode.has_animation() {
                chunks.extend(export_animations(data, settings, &mut warnings)?);
            }
            chunks.extend(data.meshes.iter().cloned().map(W3dChunk::Mesh));
            chunks.extend(data.hlod.iter().cloned().map(W3dChunk::Hlod));
            chunks.extend(data.boxes.iter().cloned().map(W3dChunk::CollisionBox));
        }
    }

    let mut file = W3dFile { chunks };
    file.sort_for_export();
    let output = if settings.individual_files {
        ExportOutput::Individual(file.split_individual(&data.name)?)
    } else {
        ExportOutput::Single(file.to_bytes()?)
    };
    log::info!("Exported {} chunks in mode {}", file.chunks.len(), settings.mode);
    Ok(Exported { file, output, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{K_CHUNK_ANIMATION, K_CHUNK_HIERARCHY, K_CHUNK_HLOD, K_CHUNK_MESH};

    fn scene() -> ExportData {
        ExportData {
            name: "tank".to_string(),
            hierarchy: Some(Hierarchy::new("tank_skl")),
            meshes: vec![Mesh::new("hull", "tank"), Mesh::new("turret", "tank")],
            hlod: Some(Hlod::new("tank", "tank_skl")),
            boxes: vec![],
            animation: Some(AnimationSource { name: "idle".to_string(), ..Default::default() }),
            scene: SceneRange { frame_start: 0, frame_end: 9, frame_rate: 30 },
        }
    }

    fn kinds(exported: &Exported) -> Vec<crate::format::ChunkType> {
        exported.file.chunks.iter().map(W3dChunk::kind).collect()
    }

    #[test]
    fn settings_from_json() {
        let settings = ExportSettings::from_json(r#"{"mode": "HAM", "compression": "TC"}"#).unwrap();
        assert_eq!(settings.mode, ExportMode::HAM);
        assert_eq!(settings.compression, AnimationCompression::TC);
        assert!(!settings.individual_files);
        assert!(ExportSettings::from_json(r#"{"mode": "NON_EXISTING"}"#).is_err());
        assert!(ExportSettings::new("NON_EXISTING").is_err());
        assert_eq!(ExportSettings::new("HM").unwrap().mode.to_string(), "HM");
    }

    #[test]
    fn mode_selects_chunks() {
        let data = scene();
        let exported = export(&data, &ExportSettings::new("M").unwrap()).unwrap();
        assert_eq!(kinds(&exported), [K_CHUNK_MESH]);
        assert!(matches!(exported.warnings.iter().next(), Some(Warning::MultipleMeshes { count: 2, .. })));

        let exported = export(&data, &ExportSettings::new("HM").unwrap()).unwrap();
        assert_eq!(kinds(&exported), [K_CHUNK_HIERARCHY, K_CHUNK_MESH, K_CHUNK_MESH, K_CHUNK_HLOD]);

        let settings = ExportSettings { use_existing_skeleton: true, ..ExportSettings::new("HM").unwrap() };
        let exported = export(&data, &settings).unwrap();
        assert_eq!(kinds(&exported), [K_CHUNK_MESH, K_CHUNK_MESH, K_CHUNK_HLOD]);

        let exported = export(&data, &ExportSettings::new("A").unwrap()).unwrap();
        assert_eq!(kinds(&exported), [K_CHUNK_ANIMATION]);
        let ExportOutput::Single(bytes) = &exported.output else { panic!("expected a single file") };
        assert_eq!(&W3dFile::read(bytes).unwrap().file, &exported.file);
    }

    #[test]
    fn missing_hierarchy_is_an_error() {
        let data = ExportData { hierarchy: None, ..scene() };
        assert!(export(&data, &ExportSettings::new("H").unwrap()).is_err());
        assert!(export(&data, &ExportSettings::new("HAM").unwrap()).is_err());
        assert!(export(&data, &ExportSettings::new("M").unwrap()).is_ok());
    }

    #[test]
    fn individual_files() {
        let settings = ExportSettings { individual_files: true, ..ExportSettings::new("HM").unwrap() };
        let exported = export(&scene(), &settings).unwrap();
        let ExportOutput::Individual(files) = exported.output else { panic!("expected individual files") };
        let names: Vec<_> = files.keys().map(String::as_str).collect();
        assert_eq!(names, ["tank_skl.w3d", "hull.w3d", "turret.w3d", "tank.w3d"]);
    }
}
