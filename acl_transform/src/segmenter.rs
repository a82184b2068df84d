//! Segmenter.
//!
//! Splits a single-segment clip context into fixed-length windows. Runs
//! after constant/default compaction (so locality gains aren't wasted on
//! sub-tracks that get stripped anyway) and before segment-local range
//! extraction and bit-rate search.

use crate::clip_context::ClipContext;

/// Replaces `clip.segments` with a sequence of windows, each close to
/// `ideal_num_samples` and never longer than `max_num_samples`. The clip's
/// total sample count is preserved exactly.
pub fn split_into_segments(clip: &mut ClipContext, ideal_num_samples: usize, max_num_samples: usize) {
    assert!(ideal_num_samples >= 1);
    assert!(max_num_samples >= ideal_num_samples);

    let source = clip.segments[0].clone();
    let total = source.num_samples();
    if total == 0 {
        return;
    }

    let mut windows = Vec::new();
    let mut offset = 0usize;
    while offset < total {
        let remaining = total - offset;
        let len = remaining.min(ideal_num_samples).max(1).min(max_num_samples);
        windows.push((offset, len));
        offset += len;
    }

    clip.segments = windows
        .into_iter()
        .map(|(start, len)| source.slice(start, len))
        .collect();
}

/// The clip-relative index of each segment's first sample, used by the
/// decompressor to map a clip-level keyframe index to `(segment_index,
/// local_key_frame_index)`.
pub fn segment_start_indices(clip: &ClipContext) -> Vec<u32> {
    clip.segments
        .iter()
        .map(|s| s.clip_sample_offset as u32)
        .collect()
}
