//! Per-segment, per-sub-track bit rate search.
//!
//! For every animated sub-track, tries each intermediate bit rate from
//! smallest to largest and keeps the first that keeps the *whole
//! reconstructed pose* (not just this sub-track) within precision at every
//! sample of the segment. Because sub-tracks are coupled through the
//! hierarchy, bones are swept in parent-first order and each sweep reuses
//! whatever the previous sweep converged on, repeating for a small fixed
//! number of passes -- the same fixed-point iteration
//! `original_source/includes/acl/compression/impl/compact_constant_streams.h`
//! describes for error-coupled passes.

use acl_format::bit_rate::{self, BIT_RATE_RAW};
use glam::{Quat, Vec3};

use crate::clip_context::TransformMetadata;
use crate::compaction::{Category, SubTrackCategories};
use crate::range::{rotation_xyz, ClipRanges};
use crate::segment_context::{RangeF32, SegmentContext};
use crate::shell_metric::{self, RigidShellMetadata};
use crate::transform::Transform;

const NUM_CONVERGENCE_PASSES: usize = 3;

fn quantize_dequantize(fraction: f32, num_bits: u8) -> f32 {
    if num_bits == 0 {
        return fraction;
    }
    let max_value = ((1u32 << num_bits) - 1) as f32;
    let clamped = fraction.clamp(0.0, 1.0);
    (clamped * max_value).round() / max_value
}

fn quantize_dequantize_vec3(value: Vec3, num_bits: u8) -> Vec3 {
    Vec3::new(
        quantize_dequantize(value.x, num_bits),
        quantize_dequantize(value.y, num_bits),
        quantize_dequantize(value.z, num_bits),
    )
}

fn decode_vector(
    raw: Vec3,
    category: Category,
    default_value: Vec3,
    clip_range: Option<RangeF32>,
    segment_range: Option<RangeF32>,
    bit_rate: u8,
) -> Vec3 {
    match category {
        Category::Default => default_value,
        Category::Constant => raw,
        Category::Animated => {
            if bit_rate == BIT_RATE_RAW {
                return raw;
            }
            let (clip_range, segment_range) = match (clip_range, segment_range) {
                (Some(c), Some(s)) => (c, s),
                _ => return raw,
            };
            let num_bits = bit_rate::num_bits_at_bit_rate(bit_rate).unwrap_or(32);
            let clip_normalized = clip_range.normalize(raw);
            let seg_normalized = segment_range.normalize(clip_normalized);
            let quantized = quantize_dequantize_vec3(seg_normalized, num_bits);
            let seg_denorm = segment_range.denormalize(quantized);
            clip_range.denormalize(seg_denorm)
        }
    }
}

fn decode_rotation(
    raw: Quat,
    category: Category,
    default_value: Quat,
    clip_range: Option<RangeF32>,
    segment_range: Option<RangeF32>,
    bit_rate: u8,
) -> Quat {
    match category {
        Category::Default => default_value,
        Category::Constant => raw,
        Category::Animated => {
            if bit_rate == BIT_RATE_RAW {
                return raw;
            }
            let (clip_range, segment_range) = match (clip_range, segment_range) {
                (Some(c), Some(s)) => (c, s),
                _ => return raw,
            };
            let num_bits = bit_rate::num_bits_at_bit_rate(bit_rate).unwrap_or(32);
            let raw_xyz = rotation_xyz(raw);
            let clip_normalized = clip_range.normalize(raw_xyz);
            let seg_normalized = segment_range.normalize(clip_normalized);
            let quantized = quantize_dequantize_vec3(seg_normalized, num_bits);
            let seg_denorm = segment_range.denormalize(quantized);
            let xyz = clip_range.denormalize(seg_denorm);
            let w_sq = 1.0 - xyz.length_squared();
            let w = w_sq.max(0.0).sqrt();
            Quat::from_xyzw(xyz.x, xyz.y, xyz.z, w)
        }
    }
}

/// Decodes every bone's local sample at `sample_index` using `bit_rates` as
/// the current working assignment, with `override_bone`/`override_kind` (if
/// given) replaced by `override_bit_rate` -- this is how the search probes a
/// candidate for one sub-track while holding everything else fixed.
#[allow(clippy::too_many_arguments)]
fn decode_pose(
    segment: &SegmentContext,
    metadata: &[TransformMetadata],
    categories: &[SubTrackCategories],
    clip_ranges: &ClipRanges,
    bit_rates: &crate::segment_context::SegmentBitRates,
    sample_index: usize,
    override_bone: Option<(usize, SubTrackKind, u8)>,
) -> Vec<Transform> {
    let num_bones = segment.num_bones();
    let mut local = Vec::with_capacity(num_bones);

    for bone_index in 0..num_bones {
        let cats = &categories[bone_index];
        let stream = &segment.bone_streams[bone_index];
        let default_value = metadata[bone_index].default_value;

        let pick_rate = |kind: SubTrackKind, base: u8| -> u8 {
            match override_bone {
                Some((b, k, rate)) if b == bone_index && k == kind => rate,
                _ => base,
            }
        };

        let rotation = decode_rotation(
            stream.rotations[sample_index],
            cats.rotation.unwrap_or(Category::Animated),
            default_value.rotation,
            clip_ranges.rotation[bone_index],
            segment.rotation_ranges[bone_index],
            pick_rate(SubTrackKind::Rotation, bit_rates.rotation[bone_index]),
        );
        let translation = decode_vector(
            stream.translations[sample_index],
            cats.translation.unwrap_or(Category::Animated),
            default_value.translation,
            clip_ranges.translation[bone_index],
            segment.translation_ranges[bone_index],
            pick_rate(SubTrackKind::Translation, bit_rates.translation[bone_index]),
        );
        let scale = decode_vector(
            stream.scales[sample_index],
            cats.scale.unwrap_or(Category::Animated),
            default_value.scale,
            clip_ranges.scale[bone_index],
            segment.scale_ranges[bone_index],
            pick_rate(SubTrackKind::Scale, bit_rates.scale[bone_index]),
        );

        local.push(Transform::new(rotation, translation, scale));
    }

    local
}

fn compose_object_space(
    local: &[Transform],
    metadata: &[TransformMetadata],
    sorted_parent_first: &[usize],
) -> Vec<Transform> {
    let mut object = local.to_vec();
    for &bone_index in sorted_parent_first {
        let parent_index = metadata[bone_index].parent_index;
        if parent_index != crate::track::INVALID_PARENT_INDEX {
            let parent_object = object[parent_index as usize];
            object[bone_index] = local[bone_index].compose(&parent_object);
        }
    }
    object
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubTrackKind {
    Rotation,
    Translation,
    Scale,
}

/// Runs the search over every animated sub-track of `segment`, writing the
/// chosen bit rates into `segment.bit_rates` and computing
/// `segment.animated_pose_bit_size`.
pub fn select_bit_rates(
    metadata: &[TransformMetadata],
    sorted_parent_first: &[usize],
    categories: &[SubTrackCategories],
    clip_ranges: &ClipRanges,
    shell: &[RigidShellMetadata],
    segment: &mut SegmentContext,
) {
    let num_bones = segment.num_bones();

    // Start every animated sub-track pessimistically at raw; the search
    // only ever shrinks it.
    for bone_index in 0..num_bones {
        if categories[bone_index].rotation == Some(Category::Animated) {
            segment.bit_rates.rotation[bone_index] = BIT_RATE_RAW;
        }
        if categories[bone_index].translation == Some(Category::Animated) {
            segment.bit_rates.translation[bone_index] = BIT_RATE_RAW;
        }
        if categories[bone_index].scale == Some(Category::Animated) {
            segment.bit_rates.scale[bone_index] = BIT_RATE_RAW;
        }
    }

    for _pass in 0..NUM_CONVERGENCE_PASSES {
        let mut changed = false;

        for &bone_index in sorted_parent_first {
            for kind in [SubTrackKind::Rotation, SubTrackKind::Translation, SubTrackKind::Scale] {
                let category = match kind {
                    SubTrackKind::Rotation => categories[bone_index].rotation,
                    SubTrackKind::Translation => categories[bone_index].translation,
                    SubTrackKind::Scale => categories[bone_index].scale,
                };
                if category != Some(Category::Animated) {
                    continue;
                }

                let current = match kind {
                    SubTrackKind::Rotation => segment.bit_rates.rotation[bone_index],
                    SubTrackKind::Translation => segment.bit_rates.translation[bone_index],
                    SubTrackKind::Scale => segment.bit_rates.scale[bone_index],
                };

                let mut chosen = BIT_RATE_RAW;
                for candidate in bit_rate::intermediate_bit_rates() {
                    if satisfies_precision(
                        metadata, sorted_parent_first, categories, clip_ranges, shell, segment, bone_index, kind,
                        candidate,
                    ) {
                        chosen = candidate;
                        break;
                    }
                }

                if chosen != current {
                    changed = true;
                }
                match kind {
                    SubTrackKind::Rotation => segment.bit_rates.rotation[bone_index] = chosen,
                    SubTrackKind::Translation => segment.bit_rates.translation[bone_index] = chosen,
                    SubTrackKind::Scale => segment.bit_rates.scale[bone_index] = chosen,
                }
            }
        }

        if !changed {
            break;
        }
    }

    segment.animated_pose_bit_size = (0..num_bones)
        .map(|bone_index| {
            let mut bits = 0u32;
            for (category, bit_rate) in [
                (categories[bone_index].rotation, segment.bit_rates.rotation[bone_index]),
                (categories[bone_index].translation, segment.bit_rates.translation[bone_index]),
                (categories[bone_index].scale, segment.bit_rates.scale[bone_index]),
            ] {
                if category == Some(Category::Animated) {
                    bits += bit_rate::num_bits_at_bit_rate(bit_rate).unwrap_or(32) as u32 * 3;
                }
            }
            bits
        })
        .sum();
}

#[allow(clippy::too_many_arguments)]
fn satisfies_precision(
    metadata: &[TransformMetadata],
    sorted_parent_first: &[usize],
    categories: &[SubTrackCategories],
    clip_ranges: &ClipRanges,
    shell: &[RigidShellMetadata],
    segment: &SegmentContext,
    bone_index: usize,
    kind: SubTrackKind,
    candidate_bit_rate: u8,
) -> bool {
    for sample_index in 0..segment.num_samples() {
        let candidate_local = decode_pose(
            segment,
            metadata,
            categories,
            clip_ranges,
            &segment.bit_rates,
            sample_index,
            Some((bone_index, kind, candidate_bit_rate)),
        );

        let raw_object = compose_object_space(
            &segment
                .bone_streams
                .iter()
                .map(|s| s.get_sample(sample_index))
                .collect::<Vec<_>>(),
            metadata,
            sorted_parent_first,
        );
        let candidate_object = compose_object_space(&candidate_local, metadata, sorted_parent_first);

        let error = shell_metric::shell_error(
            raw_object[bone_index],
            candidate_object[bone_index],
            shell[bone_index].local_shell_distance,
            true,
        );
        if error > shell[bone_index].precision {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip_context::ClipContext;
    use crate::compaction::{self, CompactionFormats};
    use crate::range;
    use crate::track::{RawTransformTrack, TrackArray, TrackDescription, INVALID_PARENT_INDEX};
    use acl_format::{RotationFormat, VectorFormat};

    #[test]
    fn linear_sweep_gets_a_small_bit_rate() {
        let samples: Vec<Transform> = (0..61)
            .map(|i| Transform::new(Quat::IDENTITY, Vec3::new(i as f32 / 60.0, 0.0, 0.0), Vec3::ONE))
            .collect();

        let track = RawTransformTrack {
            description: TrackDescription {
                parent_index: INVALID_PARENT_INDEX,
                precision: 1e-3,
                shell_distance: 1.0,
                default_value: Transform::IDENTITY,
                output_index: 0,
            },
            samples,
        };
        let array = TrackArray::new(vec![track], 30.0, None).unwrap();
        let clip = ClipContext::from_track_array(&array, false);
        let shell = shell_metric::compute_clip_shell_distances(&clip, None);

        let formats = CompactionFormats {
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
        };
        let categories = compaction::compact(&clip, &shell, formats);
        let clip_ranges = range::extract_clip_ranges(&clip, &categories);

        let mut segment = clip.segments[0].clone();
        range::extract_segment_ranges(&mut segment, &clip_ranges, &categories);

        select_bit_rates(
            &clip.metadata,
            &clip.sorted_transforms_parent_first,
            &categories,
            &clip_ranges,
            &shell,
            &mut segment,
        );

        assert!(segment.bit_rates.translation[0] <= 16);
        assert!(segment.bit_rates.translation[0] >= acl_format::bit_rate::BIT_RATE_CONSTANT + 1);
    }
}
