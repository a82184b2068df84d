//! Clip- and segment-level range extraction.
//!
//! Two passes stack on top of each other: the clip range pulls raw sample
//! values into `[0, 1]` using one min/extent pair for the whole clip, then
//! the segment range pulls the *clip-normalized* values into `[0, 1]` again
//! using a window-local min/extent, quantized to 8 bits. Bit-rate packing
//! only ever quantizes that fully-normalized, segment-local fraction.

use glam::{Quat, Vec3};

use crate::clip_context::ClipContext;
use crate::compaction::{Category, SubTrackCategories};
use crate::segment_context::{RangeF32, SegmentContext};

/// A quaternion's xyz components, with the whole quaternion negated first if
/// needed so `w >= 0`. `q` and `-q` represent the same rotation, so this
/// hemisphere choice is free, and it is what lets the decompressor
/// reconstruct `w = sqrt(max(0, 1 - x^2 - y^2 - z^2))` unambiguously.
pub fn rotation_xyz(q: Quat) -> Vec3 {
    let q = if q.w < 0.0 { -q } else { q };
    Vec3::new(q.x, q.y, q.z)
}

/// Clip-wide min/extent per bone per sub-track kind, `None` where the
/// sub-track isn't in the `Animated` category (constant/default sub-tracks
/// need no range: they are stored directly).
#[derive(Debug, Clone)]
pub struct ClipRanges {
    pub rotation: Vec<Option<RangeF32>>,
    pub translation: Vec<Option<RangeF32>>,
    pub scale: Vec<Option<RangeF32>>,
}

fn is_animated(categories: &SubTrackCategories, pick: impl Fn(&SubTrackCategories) -> Option<Category>) -> bool {
    pick(categories) == Some(Category::Animated)
}

/// Extracts the clip range for every animated sub-track by scanning every
/// segment's samples.
pub fn extract_clip_ranges(clip: &ClipContext, categories: &[SubTrackCategories]) -> ClipRanges {
    let num_bones = clip.num_bones();
    let mut rotation = vec![None; num_bones];
    let mut translation = vec![None; num_bones];
    let mut scale = vec![None; num_bones];

    for bone_index in 0..num_bones {
        let cats = &categories[bone_index];

        if is_animated(cats, |c| c.rotation) {
            let samples: Vec<Vec3> = clip
                .segments
                .iter()
                .flat_map(|s| s.bone_streams[bone_index].rotations.iter().map(|q| rotation_xyz(*q)))
                .collect();
            rotation[bone_index] = RangeF32::from_samples(samples.iter());
        }

        if is_animated(cats, |c| c.translation) {
            let samples: Vec<Vec3> = clip
                .segments
                .iter()
                .flat_map(|s| s.bone_streams[bone_index].translations.iter().copied())
                .collect();
            translation[bone_index] = RangeF32::from_samples(samples.iter());
        }

        if is_animated(cats, |c| c.scale) {
            let samples: Vec<Vec3> = clip
                .segments
                .iter()
                .flat_map(|s| s.bone_streams[bone_index].scales.iter().copied())
                .collect();
            scale[bone_index] = RangeF32::from_samples(samples.iter());
        }
    }

    ClipRanges {
        rotation,
        translation,
        scale,
    }
}

/// Extracts this segment's local range over clip-normalized values.
pub fn extract_segment_ranges(
    segment: &mut SegmentContext,
    clip_ranges: &ClipRanges,
    categories: &[SubTrackCategories],
) {
    let num_bones = segment.num_bones();

    for bone_index in 0..num_bones {
        let cats = &categories[bone_index];

        if is_animated(cats, |c| c.rotation) {
            if let Some(clip_range) = clip_ranges.rotation[bone_index] {
                let normalized: Vec<Vec3> = segment.bone_streams[bone_index]
                    .rotations
                    .iter()
                    .map(|q| clip_range.normalize(rotation_xyz(*q)))
                    .collect();
                segment.rotation_ranges[bone_index] = RangeF32::from_samples(normalized.iter());
            }
        }

        if is_animated(cats, |c| c.translation) {
            if let Some(clip_range) = clip_ranges.translation[bone_index] {
                let normalized: Vec<Vec3> = segment.bone_streams[bone_index]
                    .translations
                    .iter()
                    .map(|v| clip_range.normalize(*v))
                    .collect();
                segment.translation_ranges[bone_index] = RangeF32::from_samples(normalized.iter());
            }
        }

        if is_animated(cats, |c| c.scale) {
            if let Some(clip_range) = clip_ranges.scale[bone_index] {
                let normalized: Vec<Vec3> = segment.bone_streams[bone_index]
                    .scales
                    .iter()
                    .map(|v| clip_range.normalize(*v))
                    .collect();
                segment.scale_ranges[bone_index] = RangeF32::from_samples(normalized.iter());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_xyz_picks_positive_w_hemisphere() {
        let q = Quat::from_xyzw(0.0, 0.0, 0.0, -1.0);
        let xyz = rotation_xyz(q);
        // -Identity and Identity are the same rotation; xyz stays zero either way.
        assert_eq!(xyz, Vec3::ZERO);

        let q2 = Quat::from_xyzw(0.5, 0.0, 0.0, -0.8660254);
        let flipped = rotation_xyz(q2);
        assert!(flipped.x < 0.0);
    }
}
