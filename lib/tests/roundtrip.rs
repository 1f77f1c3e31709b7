use approx::assert_relative_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use w3dlib::{
    export::{
        animation::{retrieve_channel_data, Channels},
        curve::{CurveBinding, SampledCurve, SceneRange},
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
        hierarchy::{Bone, Hierarchy},
        mesh::{Mesh, Triangle},
        Quaternion, Vector3,
    },
    W3dChunk, W3dFile,
};

fn random_name(rng: &mut StdRng, prefix: &str) -> String {
    format!("{prefix}{}", rng.random_range(0..100_000u32))
}

fn random_vector(rng: &mut StdRng) -> Vector3 {
    Vector3::new(rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0))
}

fn random_quaternion(rng: &mut StdRng) -> Quaternion {
    let mut q = Quaternion::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    );
    q.normalize();
    q
}

fn random_hierarchy(rng: &mut StdRng) -> Hierarchy {
    let count = rng.random_range(0..24);
    let mut bones: Vec<Bone> = Vec::with_capacity(count);
    for i in 0..count {
        let parent = (i > 0 && rng.random_bool(0.7)).then(|| bones[rng.random_range(0..i)].name.clone());
        bones.push(Bone {
            name: format!("b{i}_{}", rng.random_range(0..1000u32)),
            parent,
            translation: random_vector(rng),
            rotation: random_quaternion(rng),
        });
    }
    Hierarchy::from_bones(&random_name(rng, "skl_"), &bones).unwrap()
}

fn decode_single(file: &W3dFile) -> W3dChunk {
    let data = file.to_bytes().unwrap();
    let decoded = W3dFile::read(&data).unwrap();
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    assert_eq!(decoded.file.to_bytes().unwrap(), data);
    decoded.file.chunks.into_iter().next().unwrap()
}

#[test]
fn hierarchy_roundtrip() {
    let mut rng = StdRng::seed_from_u64(0x57_3d);
    for _ in 0..32 {
        let hierarchy = random_hierarchy(&mut rng);
        for (index, pivot) in hierarchy.pivots.iter().enumerate().skip(1) {
            assert!((pivot.parent_id as usize) < index);
        }
        let file = W3dFile { chunks: vec![W3dChunk::Hierarchy(hierarchy.clone())] };
        let W3dChunk::Hierarchy(decoded) = decode_single(&file) else { panic!("expected a hierarchy") };
        assert_eq!(decoded, hierarchy);
        for pivot in &decoded.pivots {
            assert_relative_eq!(pivot.rotation.length(), 1.0, epsilon = 1e-5);
        }
    }
}

#[test]
fn mesh_roundtrip() {
    let mut rng = StdRng::seed_from_u64(0x3e5);
    for _ in 0..16 {
        let mut mesh = Mesh::new(&random_name(&mut rng, "m"), &random_name(&mut rng, "c"));
        let vert_count = rng.random_range(0..64);
        let verts: Vec<_> = (0..vert_count).map(|_| random_vector(&mut rng)).collect();
        let normals = vec![Vector3::new(0.0, 0.0, 1.0); vert_count];
        mesh.set_vertices(verts, normals);
        if vert_count > 0 {
            let triangles = (0..rng.random_range(0..32))
                .map(|_| Triangle {
                    vert_ids: [(); 3].map(|_| rng.random_range(0..vert_count as u32)),
                    surface_type: 13,
                    normal: random_vector(&mut rng),
                    distance: rng.random_range(-1.0..1.0),
                })
                .collect();
            mesh.set_triangles(triangles);
        }
        assert_eq!(mesh.header.vert_count as usize, vert_count);

        let file = W3dFile { chunks: vec![W3dChunk::Mesh(mesh.clone())] };
        let W3dChunk::Mesh(decoded) = decode_single(&file) else { panic!("expected a mesh") };
        assert_eq!(decoded, mesh);
    }
}

#[test]
fn animation_roundtrip() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..16 {
        let hierarchy = random_hierarchy(&mut rng);
        let mut animation =
            Animation::new(&random_name(&mut rng, "anim_"), hierarchy.name(), rng.random_range(1..200), 30);
        for _ in 0..rng.random_range(0..12) {
            let first_frame = rng.random_range(0..100u16);
            let last_frame = first_frame + rng.random_range(0..60u16);
            let frames = (last_frame - first_frame + 1) as usize;
            let pivot = rng.random_range(0..hierarchy.pivots.len()) as u16;
            let channel = match rng.random_range(0..3) {
                0 => AnimChannel::Channel(AnimationChannel {
                    first_frame,
                    last_frame,
                    vector_len: 1,
                    channel_type: ChannelType::translation(rng.random_range(0..3)).unwrap(),
                    pivot,
                    unknown: 0,
                    data: (0..frames).map(|_| ChannelValue::Scalar(rng.random_range(-5.0..5.0))).collect(),
                    pad_bytes: vec![],
                }),
                1 => AnimChannel::Channel(AnimationChannel {
                    first_frame,
                    last_frame,
                    vector_len: 4,
                    channel_type: ChannelType::Q,
                    pivot,
                    unknown: 0,
                    data: (0..frames).map(|_| ChannelValue::Quaternion(random_quaternion(&mut rng))).collect(),
                    pad_bytes: vec![],
                }),
                _ => AnimChannel::Bit(AnimationBitChannel {
                    first_frame,
                    last_frame,
                    channel_type: BitChannelType::Vis,
                    pivot,
                    default_value: 1.0,
                    data: (0..frames).map(|_| rng.random_bool(0.5)).collect(),
                }),
            };
            animation.channels.push(channel);
        }

        let file = W3dFile { chunks: vec![W3dChunk::Animation(animation.clone())] };
        let W3dChunk::Animation(decoded) = decode_single(&file) else { panic!("expected an animation") };
        assert_eq!(decoded, animation);
        assert!(decoded.resolve_hierarchy(std::slice::from_ref(&hierarchy)).is_some());
        for channel in decoded.channels() {
            assert_eq!(channel.data.len(), (channel.last_frame - channel.first_frame + 1) as usize);
        }
    }
}

#[test]
fn compressed_animation_roundtrip() {
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..16 {
        let mut animation = CompressedAnimation::new(&random_name(&mut rng, "anim_"), "skl", 120, 30);
        for _ in 0..rng.random_range(0..10) {
            let mut frame = 0u32;
            let mut next_frame = |rng: &mut StdRng| {
                frame += rng.random_range(1..8);
                frame
            };
            let pivot = rng.random_range(0..20u16);
            let keys = rng.random_range(0..20);
            let channel = if rng.random_bool(0.3) {
                CompressedChannel::TimeCodedBit(TimeCodedBitChannel {
                    pivot,
                    channel_type: 0,
                    default_value: 1,
                    time_codes: (0..keys)
                        .map(|_| TimeCodedBitDatum { time_code: next_frame(&mut rng), value: rng.random_bool(0.5) })
                        .collect(),
                })
            } else if rng.random_bool(0.5) {
                CompressedChannel::TimeCoded(TimeCodedAnimationChannel {
                    pivot,
                    vector_len: 4,
                    channel_type: ChannelType::Q,
                    time_codes: (0..keys)
                        .map(|_| TimeCodedDatum {
                            time_code: next_frame(&mut rng),
                            non_interpolated: rng.random_bool(0.2),
                            value: ChannelValue::Quaternion(random_quaternion(&mut rng)),
                        })
                        .collect(),
                })
            } else {
                CompressedChannel::TimeCoded(TimeCodedAnimationChannel {
                    pivot,
                    vector_len: 1,
                    channel_type: ChannelType::translation(rng.random_range(0..3)).unwrap(),
                    time_codes: (0..keys)
                        .map(|_| TimeCodedDatum {
                            time_code: next_frame(&mut rng),
                            non_interpolated: false,
                            value: ChannelValue::Scalar(rng.random_range(-1.0..1.0)),
                        })
                        .collect(),
                })
            };
            animation.channels.push(channel);
        }

        let file = W3dFile { chunks: vec![W3dChunk::CompressedAnimation(animation.clone())] };
        let W3dChunk::CompressedAnimation(decoded) = decode_single(&file) else {
            panic!("expected a compressed animation")
        };
        assert_eq!(decoded, animation);
        for channel in decoded.time_coded_channels() {
            assert!(channel.time_codes.windows(2).all(|w| w[0].time_code < w[1].time_code));
        }
    }
}

/// Exported rotations stay unit length through encode and decode, whatever the curves.
#[test]
fn exported_rotations_are_normalized() {
    let mut rng = StdRng::seed_from_u64(99);
    let hierarchy = loop {
        let hierarchy = random_hierarchy(&mut rng);
        if hierarchy.pivots.len() > 1 {
            break hierarchy;
        }
    };
    let scene = SceneRange { frame_start: 0, frame_end: 48, frame_rate: 30 };
    for compression in [AnimationCompression::U, AnimationCompression::TC] {
        let mut curves = vec![];
        for pivot in hierarchy.pivots.iter().skip(1) {
            let path = format!("pose.bones[\"{}\"].rotation_quaternion", pivot.name);
            for component in 0..4 {
                let points: Vec<_> = (0..rng.random_range(1..6))
                    .map(|_| (rng.random_range(0..48), rng.random_range(-3.0..3.0)))
                    .collect();
                curves.push(CurveBinding::new(&path, component, SampledCurve::from_points(&points)));
            }
        }
        let mut channels = Channels::new(compression);
        let mut warnings = w3dlib::Warnings::new();
        retrieve_channel_data(&curves, &hierarchy, None, &scene, &mut channels, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(channels.len(), hierarchy.pivots.len() - 1);

        let chunk: W3dChunk = w3dlib::export::animation::create_anim_struct("spin", &hierarchy, channels, &scene)
            .unwrap()
            .into();
        let decoded = decode_single(&W3dFile { chunks: vec![chunk] });
        let rotations: Vec<Quaternion> = match &decoded {
            W3dChunk::Animation(a) => {
                a.channels().flat_map(|c| c.data.iter()).filter_map(|v| v.as_quaternion()).collect()
            }
            W3dChunk::CompressedAnimation(a) => a
                .time_coded_channels()
                .flat_map(|c| c.time_codes.iter())
                .filter_map(|d| d.value.as_quaternion())
                .collect(),
            _ => panic!("expected an animation"),
        };
        assert!(!rotations.is_empty());
        for q in rotations {
            assert_relative_eq!(q.length(), 1.0, epsilon = 1e-5);
        }
    }
}
