//! Clip context: the mutable working copy of a clip during compression.
//!
//! Mirrors `original_source/includes/acl/compression/impl/clip_context.h`'s
//! `clip_context`/`transform_metadata`/`transform_streams` triad, but holds
//! owned `Vec`s instead of arena pointers -- this crate has no
//! caller-provided allocator interface.

use acl_format::AdditiveFormat;

use crate::segment_context::SegmentContext;
use crate::track::{RawTransformTrack, TrackArray, INVALID_PARENT_INDEX};
use crate::transform::Transform;

/// Per-bone metadata copied out of [`crate::track::TrackDescription`] plus
/// working state later passes mutate (constant/default flags are tracked
/// per sub-track, not here; this only carries what stays fixed for the
/// bone's lifetime in the context).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMetadata {
    pub parent_index: u32,
    pub precision: f32,
    pub shell_distance: f32,
    pub default_value: Transform,
    pub output_index: u32,
}

impl From<&RawTransformTrack> for TransformMetadata {
    fn from(track: &RawTransformTrack) -> Self {
        Self {
            parent_index: track.description.parent_index,
            precision: track.description.precision,
            shell_distance: track.description.shell_distance,
            default_value: track.description.default_value,
            output_index: track.description.output_index,
        }
    }
}

/// Owns the clip's metadata, one or more segments, and the traversal order
/// used by every error-measuring pass.
pub struct ClipContext {
    pub metadata: Vec<TransformMetadata>,
    pub segments: Vec<SegmentContext>,
    /// Transform indices ordered so a parent always precedes its children.
    pub sorted_transforms_parent_first: Vec<usize>,
    pub sample_rate: f32,
    pub has_additive_base: bool,
    pub additive_format: Option<AdditiveFormat>,
}

impl ClipContext {
    /// Builds a single-segment context spanning the whole clip, the starting
    /// point before segmentation runs.
    pub fn from_track_array(tracks: &TrackArray, has_additive_base: bool) -> Self {
        let metadata: Vec<TransformMetadata> =
            tracks.tracks().iter().map(TransformMetadata::from).collect();
        let sorted_transforms_parent_first = parent_first_order(&metadata);
        let segment = SegmentContext::from_track_array(tracks, 0);

        Self {
            metadata,
            segments: vec![segment],
            sorted_transforms_parent_first,
            sample_rate: tracks.sample_rate(),
            has_additive_base,
            additive_format: tracks.additive_format(),
        }
    }

    pub fn num_bones(&self) -> usize {
        self.metadata.len()
    }

    pub fn num_samples(&self) -> usize {
        self.segments.iter().map(|s| s.num_samples()).sum()
    }

    pub fn duration(&self) -> f32 {
        let num_samples = self.num_samples();
        if num_samples <= 1 {
            0.0
        } else {
            (num_samples - 1) as f32 / self.sample_rate
        }
    }

    /// A bitset per leaf bone identifying every ancestor in its chain
    ///, used to iterate a bone
    /// chain from leaf to root without re-walking parent pointers.
    pub fn leaf_chain_bitsets(&self) -> Vec<crate::bitset::BitSet> {
        let num_bones = self.num_bones();
        let is_leaf = {
            let mut has_child = vec![false; num_bones];
            for metadata in &self.metadata {
                if metadata.parent_index != INVALID_PARENT_INDEX {
                    has_child[metadata.parent_index as usize] = true;
                }
            }
            has_child.into_iter().map(|h| !h).collect::<Vec<_>>()
        };

        is_leaf
            .iter()
            .enumerate()
            .filter(|(_, leaf)| **leaf)
            .map(|(leaf_index, _)| {
                let mut bitset = crate::bitset::BitSet::with_len(num_bones);
                let mut current = leaf_index as u32;
                loop {
                    bitset.set(current as usize, true);
                    let parent = self.metadata[current as usize].parent_index;
                    if parent == INVALID_PARENT_INDEX {
                        break;
                    }
                    current = parent;
                }
                bitset
            })
            .collect()
    }
}

/// Orders transform indices so that every parent appears before its
/// children. Iterating this list in reverse visits leaves before roots,
/// which is what the shell metric and error-correction passes need.
pub fn parent_first_order(metadata: &[TransformMetadata]) -> Vec<usize> {
    let num_bones = metadata.len();
    let mut depth = vec![0u32; num_bones];

    for i in 0..num_bones {
        let mut current = i;
        let mut steps = 0u32;
        while metadata[current].parent_index != INVALID_PARENT_INDEX {
            current = metadata[current].parent_index as usize;
            steps += 1;
            if steps as usize > num_bones {
                // Cycle; validated away before a ClipContext is ever built,
                // but bail out rather than loop forever.
                break;
            }
        }
        depth[i] = steps;
    }

    let mut order: Vec<usize> = (0..num_bones).collect();
    order.sort_by_key(|&i| depth[i]);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(parent_index: u32) -> TransformMetadata {
        TransformMetadata {
            parent_index,
            precision: 0.01,
            shell_distance: 1.0,
            default_value: Transform::IDENTITY,
            output_index: 0,
        }
    }

    #[test]
    fn parent_first_order_respects_depth() {
        let metadata = vec![
            metadata(INVALID_PARENT_INDEX), // 0: root
            metadata(0),                     // 1: child of 0
            metadata(1),                     // 2: grandchild
        ];
        let order = parent_first_order(&metadata);
        let position = |i: usize| order.iter().position(|&x| x == i).unwrap();
        assert!(position(0) < position(1));
        assert!(position(1) < position(2));
    }
}
