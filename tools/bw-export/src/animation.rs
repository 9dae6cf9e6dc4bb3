//! Animation sampler
//!
//! Evaluates a clip's bone curves over the configured frame range and produces
//! one keyframe track per skeleton node, in the skeleton's node order. Times
//! are absolute: `frame / frame_rate`.

use bw_common::{MARKER_NAME_LEN, TRACK_NAME_LEN};
use glam::{Quat, Vec3};
use hashbrown::HashMap;

use crate::coords::CoordinateTransformer;
use crate::error::{ExportError, ValidationError};
use crate::scene::{AnimationEntry, BoneCurve, PoseKey, Transform};
use crate::settings::ExportSettings;
use crate::skeleton::BuiltSkeleton;

/// Size of the clip name field in the `.animation` header
pub const CLIP_NAME_LEN: usize = 64;

/// Keyframe reduction tolerances (world units after scale, radians)
const POSITION_TOLERANCE: f32 = 1e-3;
const SCALE_TOLERANCE: f32 = 1e-3;
const ROTATION_TOLERANCE: f64 = 1e-3;

/// Bone transform at one sample time, in the engine's convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Seconds
    pub time: f32,
    pub position: [f32; 3],
    /// Quaternion [x, y, z, w]
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    pub bone: String,
    /// Parent track index
    pub parent: Option<usize>,
    pub keys: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampledClip {
    pub name: String,
    /// Subfolder under `animations/`: the target model, else the skeleton
    pub group: String,
    pub skeleton: String,
    pub frame_rate: f32,
    pub first_frame: i32,
    pub last_frame: i32,
    /// Number of distinct sample times before keyframe reduction
    pub frame_count: u32,
    pub duration: f32,
    pub looped: bool,
    pub tracks: Vec<AnimationTrack>,
    /// `(time, name)` pairs in time order
    pub markers: Vec<(f32, String)>,
}

impl SampledClip {
    pub fn key_count(&self) -> usize {
        self.tracks.iter().map(|t| t.keys.len()).sum()
    }
}

/// Check that a name fits a null-padded ASCII field of `limit` bytes.
pub(crate) fn check_identifier(entity: &str, name: &str, limit: usize) -> Result<(), ValidationError> {
    if name.is_ascii() && name.len() < limit {
        Ok(())
    } else {
        Err(ValidationError::IdentifierTooLong {
            entity: entity.to_string(),
            name: name.to_string(),
            limit,
        })
    }
}

/// Sample one clip against its skeleton.
pub fn sample_clip(
    entry: &AnimationEntry,
    skeleton: &BuiltSkeleton,
    transformer: &CoordinateTransformer,
    settings: &ExportSettings,
) -> Result<SampledClip, ExportError> {
    let entity = format!("animation '{}'", entry.name);
    if entry.name.is_empty() {
        return Err(ValidationError::EmptyField {
            entity: "animation".to_string(),
            field: "name",
        }
        .into());
    }
    check_identifier(&entity, &entry.name, CLIP_NAME_LEN)?;
    for node in &skeleton.nodes {
        check_identifier(&entity, &node.name, TRACK_NAME_LEN)?;
    }
    for marker in &entry.markers {
        check_identifier(&entity, &marker.name, MARKER_NAME_LEN)?;
    }

    // Bind curves to skeleton nodes
    let mut curves: HashMap<usize, Vec<PoseKey>> = HashMap::new();
    for curve in &entry.curves {
        let Some(node) = skeleton.bone_index(&curve.bone) else {
            return Err(ValidationError::UnboundTrack {
                clip: entry.name.clone(),
                bone: curve.bone.clone(),
                skeleton: skeleton.name.clone(),
            }
            .into());
        };
        // A curve without keys leaves its bone at the bind pose
        if curve.keys.is_empty() {
            continue;
        }
        if curves.insert(node, sorted_keys(curve)).is_some() {
            return Err(ValidationError::DuplicateName {
                kind: "animation track",
                name: curve.bone.clone(),
            }
            .into());
        }
    }

    let (start, end) = settings.frame_range;
    let frames = sample_frames(entry, settings);
    let (Some(&first), Some(&last)) = (frames.first(), frames.last()) else {
        return Err(ValidationError::EmptyClip {
            clip: entry.name.clone(),
            start,
            end,
        }
        .into());
    };

    let fps = settings.frame_rate;
    let tracks = skeleton
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let keys: Vec<Keyframe> = frames
                .iter()
                .map(|&frame| {
                    let local = curves
                        .get(&i)
                        .and_then(|keys| evaluate(keys, frame))
                        .map_or(node.bind, |pose| transformer.transform(&pose));
                    Keyframe {
                        time: frame / fps,
                        position: local.translation,
                        rotation: local.rotation,
                        scale: local.scale,
                    }
                })
                .collect();
            let keys = if settings.optimize_keyframes {
                reduce_keyframes(&keys)
            } else {
                keys
            };
            AnimationTrack {
                bone: node.name.clone(),
                parent: node.parent,
                keys,
            }
        })
        .collect();

    let mut markers: Vec<(f32, String)> = entry
        .markers
        .iter()
        .filter(|m| m.frame >= start as f32 && m.frame <= end as f32)
        .map(|m| (m.frame / fps, m.name.clone()))
        .collect();
    markers.sort_by(|a, b| a.0.total_cmp(&b.0));

    let clip = SampledClip {
        name: entry.name.clone(),
        group: entry.model.clone().unwrap_or_else(|| skeleton.name.clone()),
        skeleton: skeleton.name.clone(),
        frame_rate: fps,
        first_frame: first.floor() as i32,
        last_frame: last.ceil() as i32,
        frame_count: frames.len() as u32,
        duration: (last - first) / fps,
        looped: settings.loop_animation,
        tracks,
        markers,
    };

    tracing::debug!(
        "Sampled animation '{}': {} tracks, {} frames, {} keys",
        clip.name,
        clip.tracks.len(),
        clip.frame_count,
        clip.key_count()
    );

    Ok(clip)
}

fn sorted_keys(curve: &BoneCurve) -> Vec<PoseKey> {
    let mut keys = curve.keys.clone();
    keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
    keys
}

/// Frames to evaluate: every integer frame when baking, else the native key
/// frames of all curves. Both are clamped to the inclusive frame range.
///
/// Frames whose sample times round to the same `f32` collapse to the first,
/// so key times stay strictly increasing.
fn sample_frames(entry: &AnimationEntry, settings: &ExportSettings) -> Vec<f32> {
    let (start, end) = settings.frame_range;
    let mut frames: Vec<f32> = if settings.bake_animation {
        (start..=end).map(|f| f as f32).collect()
    } else {
        let mut frames: Vec<f32> = entry
            .curves
            .iter()
            .flat_map(|c| c.keys.iter().map(|k| k.frame))
            .filter(|f| *f >= start as f32 && *f <= end as f32)
            .collect();
        frames.sort_by(|a, b| a.total_cmp(b));
        frames
    };
    let fps = settings.frame_rate;
    frames.dedup_by(|later, earlier| *later / fps == *earlier / fps);
    frames
}

/// Evaluate a sorted curve at `frame`: linear translation and scale, slerped
/// rotation, held constant outside the keyed range. `None` for an empty curve.
fn evaluate(keys: &[PoseKey], frame: f32) -> Option<Transform> {
    let (first, last) = (keys.first()?, keys.last()?);
    if frame <= first.frame {
        return Some(first.transform);
    }
    if frame >= last.frame {
        return Some(last.transform);
    }

    // Find keyframes
    let i = keys.partition_point(|k| k.frame <= frame).saturating_sub(1);
    let (k0, k1) = (&keys[i], &keys[(i + 1).min(keys.len() - 1)]);
    let span = k1.frame - k0.frame;
    let factor = if span > 0.0 {
        ((frame - k0.frame) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (a, b) = (&k0.transform, &k1.transform);
    Some(Transform {
        translation: Vec3::from(a.translation)
            .lerp(Vec3::from(b.translation), factor)
            .to_array(),
        rotation: slerp(a.rotation, b.rotation, factor),
        scale: Vec3::from(a.scale).lerp(Vec3::from(b.scale), factor).to_array(),
    })
}

fn quat(q: [f32; 4]) -> Quat {
    let q = Quat::from_array(q);
    if q.length_squared() > 0.0 {
        q.normalize()
    } else {
        Quat::IDENTITY
    }
}

fn slerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    quat(a).slerp(quat(b), t).to_array()
}

/// Angle between two rotations in radians, ignoring quaternion sign
fn rotation_angle(a: [f32; 4], b: [f32; 4]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * y as f64).sum();
    2.0 * dot.abs().min(1.0).acos()
}

fn reproduces(from: &Keyframe, to: &Keyframe, sample: &Keyframe) -> bool {
    let span = to.time - from.time;
    let t = if span > 0.0 {
        (sample.time - from.time) / span
    } else {
        0.0
    };
    let position = Vec3::from(from.position).lerp(Vec3::from(to.position), t);
    let scale = Vec3::from(from.scale).lerp(Vec3::from(to.scale), t);
    let rotation = slerp(from.rotation, to.rotation, t);

    position.distance(Vec3::from(sample.position)) <= POSITION_TOLERANCE
        && scale.distance(Vec3::from(sample.scale)) <= SCALE_TOLERANCE
        && rotation_angle(rotation, sample.rotation) <= ROTATION_TOLERANCE
}

/// Drop interior keys that interpolation between the kept neighbours
/// reproduces within tolerance. First and last keys always survive.
fn reduce_keyframes(keys: &[Keyframe]) -> Vec<Keyframe> {
    if keys.len() <= 2 {
        return keys.to_vec();
    }

    let mut kept = vec![keys[0]];
    let mut anchor = 0;
    let mut candidate = 2;
    while candidate < keys.len() {
        let covered = (anchor + 1..candidate)
            .all(|i| reproduces(&keys[anchor], &keys[candidate], &keys[i]));
        if covered {
            candidate += 1;
        } else {
            anchor = candidate - 1;
            kept.push(keys[anchor]);
            candidate = anchor + 2;
        }
    }
    kept.push(keys[keys.len() - 1]);
    kept
}
