use serde_derive::{Deserialize, Serialize};

use crate::format::{animation::ChannelType, hierarchy::ROOT_TRANSFORM};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: i32,
    pub value: f32,
}

/// A host animation curve for one scalar property.
pub trait Curve {
    fn evaluate(&self, frame: i32) -> f32;

    /// First and last keyframe.
    fn native_range(&self) -> (i32, i32);

    /// Keyframes in increasing frame order.
    fn ordered_keyframes(&self) -> Vec<Keyframe>;
}

/// Piecewise linear curve over its keyframes, constant outside of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampledCurve {
    keyframes: Vec<Keyframe>,
}

impl SampledCurve {
    /// Sorts by frame. A later key on the same frame replaces the earlier one.
    pub fn new(mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by_key(|k| k.frame);
        keyframes.dedup_by(|later, earlier| {
            if later.frame == earlier.frame {
                earlier.value = later.value;
                true
            } else {
                false
            }
        });
        Self { keyframes }
    }

    pub fn from_points(points: &[(i32, f32)]) -> Self {
        Self::new(points.iter().map(|&(frame, value)| Keyframe { frame, value }).collect())
    }

    pub fn constant(frame: i32, value: f32) -> Self { Self::from_points(&[(frame, value)]) }

    #[inline]
    pub fn is_empty(&self) -> bool { self.keyframes.is_empty() }
}

impl Curve for SampledCurve {
    fn evaluate(&self, frame: i32) -> f32 {
        let index = self.keyframes.partition_point(|k| k.frame <= frame);
        match (index.checked_sub(1).and_then(|i| self.keyframes.get(i)), self.keyframes.get(index)) {
            (Some(a), Some(b)) => {
                let span = i64::from(b.frame) - i64::from(a.frame);
                let t = (i64::from(frame) - i64::from(a.frame)) as f32 / span as f32;
                a.value + (b.value - a.value) * t
            }
            (Some(k), None) | (None, Some(k)) => k.value,
            (None, None) => 0.0,
        }
    }

    fn native_range(&self) -> (i32, i32) {
        match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => (first.frame, last.frame),
            _ => (0, 0),
        }
    }

    fn ordered_keyframes(&self) -> Vec<Keyframe> { self.keyframes.clone() }
}

/// A curve together with the property path it animates.
pub struct CurveBinding {
    /// Host property path, e.g. `pose.bones["bone_a"].location`.
    pub data_path: String,
    pub array_index: usize,
    pub curve: Box<dyn Curve>,
}

impl CurveBinding {
    pub fn new<C: Curve + 'static>(data_path: &str, array_index: usize, curve: C) -> Self {
        Self { data_path: data_path.to_string(), array_index, curve: Box::new(curve) }
    }

    /// Quoted name in the path, or the root transform.
    pub fn pivot_name(&self) -> &str {
        self.data_path.split('"').nth(1).unwrap_or(ROOT_TRANSFORM)
    }

    pub fn target(&self) -> Option<CurveTarget> { CurveTarget::classify(&self.data_path, self.array_index) }
}

impl std::fmt::Debug for CurveBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveBinding")
            .field("data_path", &self.data_path)
            .field("array_index", &self.array_index)
            .field("range", &self.curve.native_range())
            .finish()
    }
}

/// What a curve drives on its pivot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CurveTarget {
    Translation(ChannelType),
    /// Quaternion component in host order: 0 = w, 1 = x, 2 = y, 3 = z.
    Rotation(usize),
    Visibility,
}

impl CurveTarget {
    pub fn classify(data_path: &str, array_index: usize) -> Option<Self> {
        if data_path.contains("visibility") || data_path.contains("hide") {
            Some(Self::Visibility)
        } else if data_path.contains("rotation_quaternion") {
            (array_index < 4).then_some(Self::Rotation(array_index))
        } else {
            ChannelType::translation(array_index).map(Self::Translation)
        }
    }

    /// Whether a channel is emitted at this curve's position.
    #[inline]
    pub fn emits_channel(self) -> bool { !matches!(self, Self::Rotation(0..=2)) }
}

/// Scene playback range and rate.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SceneRange {
    pub frame_start: i32,
    pub frame_end: i32,
    pub frame_rate: u32,
}

impl SceneRange {
    #[inline]
    pub fn num_frames(&self) -> i64 { i64::from(self.frame_end) + 1 - i64::from(self.frame_start) }
}
