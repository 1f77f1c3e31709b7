use std::collections::BTreeSet;

use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;

use crate::{
    error::{Warning, Warnings},
    export::{
        curve::{Curve, CurveBinding, CurveTarget, Keyframe, SceneRange},
        AnimationCompression,
    },
    format::{
        animation::{
            AnimChannel, Animation, AnimationBitChannel, AnimationChannel, BitChannelType,
            ChannelType, ChannelValue,
        },
        compressed_animation::{
            CompressedAnimation, CompressedChannel, TimeCodedAnimationChannel, TimeCodedBitChannel,
            TimeCodedBitDatum, TimeCodedDatum,
        },
        file::W3dChunk,
        hierarchy::Hierarchy,
        Quaternion,
    },
};

/// Host action: a named set of curves.
#[derive(Debug, Default)]
pub struct Action {
    pub name: String,
    pub curves: Vec<CurveBinding>,
}

/// Host object with its active action, if any.
#[derive(Debug, Default)]
pub struct AnimatedObject {
    pub name: String,
    pub action: Option<Action>,
}

impl AnimatedObject {
    pub fn new(name: &str, action: Option<Action>) -> Self { Self { name: name.to_string(), action } }

    fn curves(&self) -> &[CurveBinding] {
        self.action.as_ref().map(|a| a.curves.as_slice()).unwrap_or_default()
    }
}

/// Channels collected for one aggregate. The variant selects the encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum Channels {
    Uncompressed(Vec<AnimChannel>),
    TimeCoded(Vec<CompressedChannel>),
}

impl Channels {
    pub fn new(compression: AnimationCompression) -> Self {
        match compression {
            AnimationCompression::U => Self::Uncompressed(vec![]),
            AnimationCompression::TC => Self::TimeCoded(vec![]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Uncompressed(c) => c.len(),
            Self::TimeCoded(c) => c.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// An exported aggregate in either encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportedAnimation {
    Uncompressed(Animation),
    Compressed(CompressedAnimation),
}

impl ExportedAnimation {
    pub fn name(&self) -> &str {
        match self {
            Self::Uncompressed(a) => a.name(),
            Self::Compressed(a) => a.name(),
        }
    }

    pub fn num_channels(&self) -> usize {
        match self {
            Self::Uncompressed(a) => a.channels.len(),
            Self::Compressed(a) => a.channels.len(),
        }
    }
}

impl From<ExportedAnimation> for W3dChunk {
    fn from(animation: ExportedAnimation) -> Self {
        match animation {
            ExportedAnimation::Uncompressed(a) => W3dChunk::Animation(a),
            ExportedAnimation::Compressed(a) => W3dChunk::CompressedAnimation(a),
        }
    }
}

type RotationCurves<'a> = [Option<&'a dyn Curve>; Quaternion::COMPONENTS];

fn frame_u16(frame: i32) -> Result<u16> {
    u16::try_from(frame).with_context(|| format!("Frame {frame} cannot be stored in an animation channel"))
}

fn time_code(frame: i32) -> Result<u32> {
    u32::try_from(frame).with_context(|| format!("Frame {frame} cannot be stored as a time code"))
}

/// Dense range for a set of curves. A single frame widens to the scene.
fn dense_range(curves: &[&dyn Curve], scene: &SceneRange) -> Result<(u16, u16)> {
    let (first, last) = curves
        .iter()
        .map(|c| c.native_range())
        .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
        .unwrap_or((scene.frame_start, scene.frame_end));
    let (first, last) = if first == last { (scene.frame_start, scene.frame_end) } else { (first, last) };
    ensure!(first <= last, "Frame range {first}..={last} is inverted");
    Ok((frame_u16(first)?, frame_u16(last)?))
}

fn rotation_components<'a>(rotation: &RotationCurves<'a>) -> Vec<(usize, &'a dyn Curve)> {
    rotation.iter().enumerate().filter_map(|(i, c)| c.map(|c| (i, c))).collect()
}

fn has_keys(curve: &dyn Curve) -> bool { !curve.ordered_keyframes().is_empty() }

fn sample_translation(
    channel_type: ChannelType,
    pivot: u16,
    curve: &dyn Curve,
    scene: &SceneRange,
) -> Result<AnimationChannel> {
    let (first_frame, last_frame) = dense_range(&[curve], scene)?;
    let data = (first_frame..=last_frame)
        .map(|frame| ChannelValue::Scalar(curve.evaluate(frame as i32)))
        .collect();
    Ok(AnimationChannel {
        first_frame,
        last_frame,
        vector_len: channel_type.vector_len(),
        channel_type,
        pivot,
        unknown: 0,
        data,
        pad_bytes: vec![],
    })
}

fn sample_rotation(pivot: u16, rotation: &RotationCurves, scene: &SceneRange) -> Result<AnimationChannel> {
    let components = rotation_components(rotation);
    let curves: Vec<_> = components.iter().map(|&(_, c)| c).collect();
    let (first_frame, last_frame) = dense_range(&curves, scene)?;
    let data = (first_frame..=last_frame)
        .map(|frame| {
            let mut q = Quaternion::IDENTITY;
            for &(index, curve) in &components {
                q.set_component(index, curve.evaluate(frame as i32));
            }
            q.normalize();
            ChannelValue::Quaternion(q)
        })
        .collect();
    Ok(AnimationChannel {
        first_frame,
        last_frame,
        vector_len: ChannelType::Q.vector_len(),
        channel_type: ChannelType::Q,
        pivot,
        unknown: 0,
        data,
        pad_bytes: vec![],
    })
}

fn sample_visibility(pivot: u16, curve: &dyn Curve, scene: &SceneRange) -> Result<AnimationBitChannel> {
    let (first_frame, last_frame) = dense_range(&[curve], scene)?;
    let data = (first_frame..=last_frame).map(|frame| curve.evaluate(frame as i32) != 0.0).collect();
    Ok(AnimationBitChannel {
        first_frame,
        last_frame,
        channel_type: BitChannelType::Vis,
        pivot,
        default_value: 1.0,
        data,
    })
}

fn key_translation(
    channel_type: ChannelType,
    pivot: u16,
    curve: &dyn Curve,
) -> Result<TimeCodedAnimationChannel> {
    let time_codes = curve
        .ordered_keyframes()
        .into_iter()
        .map(|key| {
            Ok(TimeCodedDatum {
                time_code: time_code(key.frame)?,
                non_interpolated: false,
                value: ChannelValue::Scalar(key.value),
            })
        })
        .collect::<Result<_>>()?;
    Ok(TimeCodedAnimationChannel {
        pivot,
        vector_len: channel_type.vector_len(),
        channel_type,
        time_codes,
    })
}

/// One slot per frame keyed on any component. Components without a key in
/// a slot keep their identity value; curves are never resampled here.
fn key_rotation(pivot: u16, rotation: &RotationCurves) -> Result<TimeCodedAnimationChannel> {
    let components: Vec<(usize, Vec<Keyframe>)> = rotation_components(rotation)
        .into_iter()
        .map(|(index, curve)| (index, curve.ordered_keyframes()))
        .collect();
    let frames: BTreeSet<i32> =
        components.iter().flat_map(|(_, keys)| keys.iter().map(|k| k.frame)).collect();
    let mut time_codes = Vec::with_capacity(frames.len());
    for frame in frames {
        let mut q = Quaternion::IDENTITY;
        for (index, keys) in &components {
            if let Ok(i) = keys.binary_search_by_key(&frame, |k| k.frame) {
                q.set_component(*index, keys[i].value);
            }
        }
        q.normalize();
        time_codes.push(TimeCodedDatum {
            time_code: time_code(frame)?,
            non_interpolated: false,
            value: ChannelValue::Quaternion(q),
        });
    }
    Ok(TimeCodedAnimationChannel {
        pivot,
        vector_len: ChannelType::Q.vector_len(),
        channel_type: ChannelType::Q,
        time_codes,
    })
}

fn key_visibility(pivot: u16, curve: &dyn Curve) -> Result<TimeCodedBitChannel> {
    let time_codes = curve
        .ordered_keyframes()
        .into_iter()
        .map(|key| Ok(TimeCodedBitDatum { time_code: time_code(key.frame)?, value: key.value != 0.0 }))
        .collect::<Result<_>>()?;
    Ok(TimeCodedBitChannel { pivot, channel_type: 0, default_value: 1, time_codes })
}

/// Converts curves into channels appended to `channels`, in curve order.
///
/// Positional and visibility curves produce a channel each. The four
/// components of a rotation are gathered per pivot and produce a single
/// channel at the position of the final (z) component curve. When `name` is
/// given every curve targets that pivot instead of the one in its path.
pub fn retrieve_channel_data(
    curves: &[CurveBinding],
    hierarchy: &Hierarchy,
    name: Option<&str>,
    scene: &SceneRange,
    channels: &mut Channels,
    warnings: &mut Warnings,
) -> Result<()> {
    let mut rotations: IndexMap<&str, RotationCurves> = IndexMap::new();
    for binding in curves {
        if let Some(CurveTarget::Rotation(component)) = binding.target() {
            let pivot_name = name.unwrap_or(binding.pivot_name());
            rotations.entry(pivot_name).or_default()[component] = Some(binding.curve.as_ref());
        }
    }

    for binding in curves {
        let Some(target) = binding.target() else {
            log::debug!("Skipping unsupported curve {:?}", binding);
            continue;
        };
        if !target.emits_channel() {
            continue;
        }
        let pivot_name = name.unwrap_or(binding.pivot_name());
        let rotation = rotations.get(pivot_name).copied().unwrap_or_default();
        let keyed = match target {
            CurveTarget::Rotation(_) => rotation.iter().flatten().any(|&c| has_keys(c)),
            _ => has_keys(binding.curve.as_ref()),
        };
        if !keyed {
            log::debug!("Skipping curve without keyframes {:?}", binding);
            continue;
        }

        let index = hierarchy.resolve_pivot_index(pivot_name, warnings);
        let pivot = u16::try_from(index)
            .with_context(|| format!("Pivot index {index} of '{pivot_name}' is out of range"))?;
        let curve = binding.curve.as_ref();
        match channels {
            Channels::Uncompressed(out) => out.push(match target {
                CurveTarget::Translation(t) => {
                    AnimChannel::Channel(sample_translation(t, pivot, curve, scene)?)
                }
                CurveTarget::Rotation(_) => AnimChannel::Channel(sample_rotation(pivot, &rotation, scene)?),
                CurveTarget::Visibility => AnimChannel::Bit(sample_visibility(pivot, curve, scene)?),
            }),
            Channels::TimeCoded(out) => out.push(match target {
                CurveTarget::Translation(t) => CompressedChannel::TimeCoded(key_translation(t, pivot, curve)?),
                CurveTarget::Rotation(_) => CompressedChannel::TimeCoded(key_rotation(pivot, &rotation)?),
                CurveTarget::Visibility => CompressedChannel::TimeCodedBit(key_visibility(pivot, curve)?),
            }),
        }
    }

    for (pivot_name, rotation) in &rotations {
        if rotation[Quaternion::COMPONENTS - 1].is_none() {
            warnings.push(Warning::IncompleteRotation { pivot: pivot_name.to_string() });
        }
    }
    Ok(())
}

/// Channels of an object's active action. Objects without one yield none.
pub fn retrieve_channels(
    object: &AnimatedObject,
    hierarchy: &Hierarchy,
    compression: AnimationCompression,
    name: Option<&str>,
    scene: &SceneRange,
    warnings: &mut Warnings,
) -> Result<Channels> {
    let mut channels = Channels::new(compression);
    retrieve_channel_data(object.curves(), hierarchy, name, scene, &mut channels, warnings)?;
    Ok(channels)
}

/// Wraps channels into an aggregate spanning the scene range.
pub fn create_anim_struct(
    animation_name: &str,
    hierarchy: &Hierarchy,
    channels: Channels,
    scene: &SceneRange,
) -> Result<ExportedAnimation> {
    let num_frames = u32::try_from(scene.num_frames())
        .with_context(|| format!("Scene range {}..={} is inverted", scene.frame_start, scene.frame_end))?;
    Ok(match channels {
        Channels::Uncompressed(channels) => {
            let mut animation =
                Animation::new(animation_name, hierarchy.name(), num_frames, scene.frame_rate);
            animation.channels = channels;
            ExportedAnimation::Uncompressed(animation)
        }
        Channels::TimeCoded(channels) => {
            let frame_rate = u16::try_from(scene.frame_rate)
                .with_context(|| format!("Frame rate {} is out of range", scene.frame_rate))?;
            let mut animation =
                CompressedAnimation::new(animation_name, hierarchy.name(), num_frames, frame_rate);
            animation.channels = channels;
            ExportedAnimation::Compressed(animation)
        }
    })
}

/// Whether any curve of the object would produce a channel.
fn is_animated(object: &AnimatedObject) -> bool {
    object.curves().iter().any(|b| b.target().is_some_and(CurveTarget::emits_channel))
}

/// Builds the scene animation from the rig objects. Animated meshes are
/// reported and their channels dropped.
pub fn retrieve_animation(
    animation_name: &str,
    hierarchy: &Hierarchy,
    rig: &[AnimatedObject],
    meshes: &[AnimatedObject],
    compression: AnimationCompression,
    scene: &SceneRange,
    warnings: &mut Warnings,
) -> Result<ExportedAnimation> {
    let mut channels = Channels::new(compression);
    for mesh in meshes.iter().filter(|m| is_animated(m)) {
        warnings.push(Warning::AnimatedMesh { name: mesh.name.clone() });
    }
    for object in rig {
        retrieve_channel_data(object.curves(), hierarchy, None, scene, &mut channels, warnings)?;
    }
    log::debug!("Retrieved {} channels for animation '{}'", channels.len(), animation_name);
    create_anim_struct(animation_name, hierarchy, channels, scene)
}

/// One aggregate per action. Without a rig the aggregates have no channels.
pub fn retrieve_all_animations(
    hierarchy: &Hierarchy,
    actions: &[Action],
    has_rig: bool,
    compression: AnimationCompression,
    scene: &SceneRange,
    warnings: &mut Warnings,
) -> Result<Vec<ExportedAnimation>> {
    let prefix = hierarchy.name().split('_').next().unwrap_or_default();
    let mut animations = Vec::with_capacity(actions.len());
    for action in actions {
        let mut channels = Channels::new(compression);
        if has_rig {
            retrieve_channel_data(&action.curves, hierarchy, None, scene, &mut channels, warnings)?;
        }
        let name = format!("{}_{}", prefix, action.name);
        animations.push(create_anim_struct(&name, hierarchy, channels, scene)?);
    }
    Ok(animations)
}
