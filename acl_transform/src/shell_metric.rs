//! Rigid-shell error metric.
//!
//! Grounded on
//! `original_source/includes/acl/compression/impl/rigid_shell_utils.h`. The
//! reference source keeps a second, slightly different copy of this
//! propagation embedded in `compact_constant_streams.h`; only the additive-aware version here is kept, and
//! [`crate::compaction`] calls through to it rather than reimplementing it.

use glam::Vec3;

use crate::additive;
use crate::clip_context::ClipContext;
use crate::transform::Transform;

/// Per-bone shell state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidShellMetadata {
    pub local_shell_distance: f32,
    pub parent_shell_distance: f32,
    pub precision: f32,
}

/// The three axis-aligned shell test vertices at distance `d` from the
/// bone's origin.
fn shell_vertices(distance: f32) -> [Vec3; 3] {
    [
        Vec3::new(distance, 0.0, 0.0),
        Vec3::new(0.0, distance, 0.0),
        Vec3::new(0.0, 0.0, distance),
    ]
}

/// Maximum displacement between `a·p` and `b·p` over the shell at
/// `shell_distance`, i.e. this pair's contribution to object-space error
///. `has_scale` selects the with-scale (full QVV) or
/// no-scale (quat-vec3) multiply mode.
pub fn shell_error(a: Transform, b: Transform, shell_distance: f32, has_scale: bool) -> f32 {
    shell_vertices(shell_distance)
        .into_iter()
        .map(|vertex| {
            let pa = if has_scale {
                a.transform_point(vertex)
            } else {
                a.transform_point_no_scale(vertex)
            };
            let pb = if has_scale {
                b.transform_point(vertex)
            } else {
                b.transform_point_no_scale(vertex)
            };
            (pa - pb).length()
        })
        .fold(0.0f32, f32::max)
}

/// Whether an error-metric implementation wants a chance to precompute a
/// cached form (e.g. a 4x3 matrix) before the inner measurement loop
///. This metric needs no conversion;
/// the predicate exists so callers written against the trait-like contract
/// compile the same way regardless of which metric they use.
pub fn needs_conversion(_has_scale: bool) -> bool {
    false
}

/// Propagates shell distances leaf-to-root across `clip`, composing onto
/// `additive_base` when the clip is additive.
pub fn compute_clip_shell_distances(
    clip: &ClipContext,
    additive_base: Option<&ClipContext>,
) -> Vec<RigidShellMetadata> {
    let num_bones = clip.num_bones();
    if num_bones == 0 || clip.num_samples() == 0 {
        return Vec::new();
    }

    let raw_segment = &clip.segments[0];

    let mut shell: Vec<RigidShellMetadata> = clip
        .metadata
        .iter()
        .map(|m| RigidShellMetadata {
            local_shell_distance: m.shell_distance,
            parent_shell_distance: 0.0,
            precision: m.precision,
        })
        .collect();

    for &bone_index in clip.sorted_transforms_parent_first.iter().rev() {
        let raw_stream = &raw_segment.bone_streams[bone_index];
        let vertices = shell_vertices(shell[bone_index].local_shell_distance);

        let mut parent_shell_distance = 0.0f32;
        for sample_index in 0..raw_stream.num_samples() {
            let mut raw_transform = raw_stream.get_sample(sample_index);

            if let (true, Some(base)) = (clip.has_additive_base, additive_base) {
                let base_sample_index = additive::nearest_base_sample_index(clip, base, sample_index);
                let base_transform = base.segments[0].bone_streams[bone_index]
                    .get_sample(base_sample_index);
                let format = clip.additive_format.unwrap_or(acl_format::AdditiveFormat::Relative);
                raw_transform = additive::apply_additive_to_base(format, base_transform, raw_transform);
            }

            for vertex in vertices {
                let transformed = raw_transform.transform_point(vertex);
                parent_shell_distance = parent_shell_distance.max(transformed.length());
            }
        }

        shell[bone_index].parent_shell_distance = parent_shell_distance;

        let metadata = &clip.metadata[bone_index];
        if shell[bone_index].local_shell_distance != metadata.shell_distance {
            // A dominant child already overwrote our local shell; we are
            // non-dominant, so budget for the error we ourselves introduce.
            shell[bone_index].parent_shell_distance += metadata.precision;
        }

        if metadata.parent_index != crate::track::INVALID_PARENT_INDEX {
            let parent_index = metadata.parent_index as usize;
            if shell[bone_index].parent_shell_distance > shell[parent_index].local_shell_distance {
                shell[parent_index].local_shell_distance = shell[bone_index].parent_shell_distance;
                shell[parent_index].precision = shell[bone_index].precision;
            }
        }
    }

    shell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{RawTransformTrack, TrackArray, TrackDescription, INVALID_PARENT_INDEX};
    use glam::Quat;

    fn track(parent_index: u32, shell_distance: f32, precision: f32, samples: Vec<Transform>) -> RawTransformTrack {
        RawTransformTrack {
            description: TrackDescription {
                parent_index,
                precision,
                shell_distance,
                default_value: Transform::IDENTITY,
                output_index: 0,
            },
            samples,
        }
    }

    #[test]
    fn static_identity_clip_has_zero_parent_shell_distance() {
        let t = track(INVALID_PARENT_INDEX, 1.0, 0.01, vec![Transform::IDENTITY; 4]);
        let array = TrackArray::new(vec![t], 30.0, None).unwrap();
        let clip = ClipContext::from_track_array(&array, false);
        let shell = compute_clip_shell_distances(&clip, None);
        assert_eq!(shell[0].parent_shell_distance, 0.0);
    }

    #[test]
    fn dominant_child_overwrites_parent_shell() {
        let parent_samples = vec![Transform::IDENTITY; 4];
        let big_rotation = Transform::new(Quat::from_rotation_y(1.0), Vec3::ZERO, Vec3::ONE);
        let child_samples = vec![big_rotation; 4];

        let parent = track(INVALID_PARENT_INDEX, 0.1, 0.01, parent_samples);
        let child = track(0, 2.0, 0.01, child_samples);

        let array = TrackArray::new(vec![parent, child], 30.0, None).unwrap();
        let clip = ClipContext::from_track_array(&array, false);
        let shell = compute_clip_shell_distances(&clip, None);

        assert!(shell[0].local_shell_distance > 0.1);
    }
}
