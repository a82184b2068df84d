//! Looping optimizer.
//!
//! Grounded on `original_source/includes/acl/compression/impl/optimize_looping.h`:
//! when the first and last samples agree within precision everywhere, the
//! last sample is redundant and dropping it lets the decompressor alias
//! sample `num_samples` back to sample `0`.

use acl_format::SampleLoopingPolicy;

use crate::additive;
use crate::clip_context::ClipContext;
use crate::compaction::CompactionFormats;
use crate::shell_metric::{self, RigidShellMetadata};

/// Attempts to strip the clip's final sample. Returns the looping policy in
/// effect after the attempt: `Wrap` if the optimization applied,
/// unchanged otherwise. A refusal is not a failure.
pub fn optimize_looping(
    clip: &mut ClipContext,
    shell: &[RigidShellMetadata],
    formats: CompactionFormats,
    current_policy: SampleLoopingPolicy,
    additive_base: Option<&ClipContext>,
) -> SampleLoopingPolicy {
    let num_samples = clip.num_samples();
    let num_bones = clip.num_bones();

    if num_samples < 2 || num_bones == 0 || current_policy == SampleLoopingPolicy::Wrap {
        return current_policy;
    }
    if formats.rotation_format.is_raw() && formats.translation_format.is_raw() && formats.scale_format.is_raw() {
        return current_policy;
    }

    let last_index = num_samples - 1;

    let within_tolerance = (0..num_bones).all(|bone_index| {
        let stream = &clip.segments[0].bone_streams[bone_index];
        let mut first = stream.get_sample(0);
        let mut last = stream.get_sample(last_index);

        if let (true, Some(base)) = (clip.has_additive_base, additive_base) {
            let format = clip.additive_format.unwrap_or(acl_format::AdditiveFormat::Relative);
            let base_first_index = additive::nearest_base_sample_index(clip, base, 0);
            let base_last_index = additive::nearest_base_sample_index(clip, base, last_index);
            let base_stream = &base.segments[0].bone_streams[bone_index];
            first = additive::apply_additive_to_base(format, base_stream.get_sample(base_first_index), first);
            last = additive::apply_additive_to_base(format, base_stream.get_sample(base_last_index), last);
        }

        shell_metric::shell_error(first, last, shell[bone_index].local_shell_distance, true)
            <= shell[bone_index].precision
    });

    if !within_tolerance {
        return current_policy;
    }

    for bone_index in 0..num_bones {
        let stream = &mut clip.segments[0].bone_streams[bone_index];
        stream.rotations.pop();
        stream.translations.pop();
        stream.scales.pop();
    }

    SampleLoopingPolicy::Wrap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{RawTransformTrack, TrackArray, TrackDescription, INVALID_PARENT_INDEX};
    use crate::transform::Transform;
    use acl_format::{RotationFormat, VectorFormat};
    use glam::{Quat, Vec3};

    fn formats() -> CompactionFormats {
        CompactionFormats {
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
        }
    }

    #[test]
    fn closed_loop_drops_last_sample() {
        let mut samples: Vec<Transform> = (0..8)
            .map(|i| {
                let angle = (i as f32 / 8.0) * std::f32::consts::TAU;
                Transform::new(Quat::from_rotation_y(angle), Vec3::ZERO, Vec3::ONE)
            })
            .collect();
        samples[7] = samples[0];

        let track = RawTransformTrack {
            description: TrackDescription {
                parent_index: INVALID_PARENT_INDEX,
                precision: 0.01,
                shell_distance: 1.0,
                default_value: Transform::IDENTITY,
                output_index: 0,
            },
            samples,
        };
        let array = TrackArray::new(vec![track], 30.0, None).unwrap();
        let mut clip = ClipContext::from_track_array(&array, false);
        let shell = shell_metric::compute_clip_shell_distances(&clip, None);

        let num_samples_before = clip.num_samples();
        let policy = optimize_looping(&mut clip, &shell, formats(), SampleLoopingPolicy::Clamp, None);

        assert_eq!(policy, SampleLoopingPolicy::Wrap);
        assert_eq!(clip.num_samples(), num_samples_before - 1);
    }

    #[test]
    fn non_looping_clip_is_untouched() {
        let samples: Vec<Transform> = (0..8)
            .map(|i| Transform::new(Quat::from_rotation_y(i as f32), Vec3::ZERO, Vec3::ONE))
            .collect();

        let track = RawTransformTrack {
            description: TrackDescription {
                parent_index: INVALID_PARENT_INDEX,
                precision: 0.01,
                shell_distance: 1.0,
                default_value: Transform::IDENTITY,
                output_index: 0,
            },
            samples,
        };
        let array = TrackArray::new(vec![track], 30.0, None).unwrap();
        let mut clip = ClipContext::from_track_array(&array, false);
        let shell = shell_metric::compute_clip_shell_distances(&clip, None);

        let num_samples_before = clip.num_samples();
        let policy = optimize_looping(&mut clip, &shell, formats(), SampleLoopingPolicy::Clamp, None);

        assert_eq!(policy, SampleLoopingPolicy::Clamp);
        assert_eq!(clip.num_samples(), num_samples_before);
    }
}
