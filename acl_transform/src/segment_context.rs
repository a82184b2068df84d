//! Segment context: a contiguous sample window with its own local working
//! state.

use glam::{Quat, Vec3};

use crate::track::TrackArray;
use crate::transform::Transform;

/// Per-bone, per-segment sample buffers -- a local copy of the window of
/// raw samples this segment covers, matching
/// `original_source`'s `transform_streams`.
#[derive(Debug, Clone, Default)]
pub struct BoneStreams {
    pub rotations: Vec<Quat>,
    pub translations: Vec<Vec3>,
    pub scales: Vec<Vec3>,
}

impl BoneStreams {
    pub fn get_sample(&self, sample_index: usize) -> Transform {
        Transform::new(
            self.rotations[sample_index],
            self.translations[sample_index],
            self.scales[sample_index],
        )
    }

    pub fn set_sample(&mut self, sample_index: usize, transform: Transform) {
        self.rotations[sample_index] = transform.rotation;
        self.translations[sample_index] = transform.translation;
        self.scales[sample_index] = transform.scale;
    }

    pub fn num_samples(&self) -> usize {
        self.rotations.len()
    }
}

/// Min/extent over a window of 3-component samples, used for both clip-wide
/// and segment-local range extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeF32 {
    pub min: Vec3,
    pub extent: Vec3,
}

impl RangeF32 {
    /// An extent of zero would make range remapping divide by zero; the
    /// writer/decompressor treat a near-zero extent as "every sample equal
    /// to min" and skip the division (mirrors `track_range.h`'s epsilon
    /// guard).
    pub const ZERO_EXTENT_EPSILON: f32 = 1.0e-6;

    pub fn from_samples<'a>(samples: impl Iterator<Item = &'a Vec3>) -> Option<Self> {
        let mut min = None;
        let mut max = None;
        for sample in samples {
            min = Some(match min {
                Some(m) => Vec3::min(m, *sample),
                None => *sample,
            });
            max = Some(match max {
                Some(m) => Vec3::max(m, *sample),
                None => *sample,
            });
        }
        match (min, max) {
            (Some(min), Some(max)) => Some(Self {
                min,
                extent: max - min,
            }),
            _ => None,
        }
    }

    pub fn normalize(&self, value: Vec3) -> Vec3 {
        let safe_extent = Vec3::select(
            self.extent.cmplt(Vec3::splat(Self::ZERO_EXTENT_EPSILON)),
            Vec3::ONE,
            self.extent,
        );
        (value - self.min) / safe_extent
    }

    pub fn denormalize(&self, normalized: Vec3) -> Vec3 {
        normalized * self.extent + self.min
    }
}

/// Per-bone, per-kind bit rate selected for this segment. Only
/// meaningful for sub-tracks still categorized as animated after compaction.
#[derive(Debug, Clone, Default)]
pub struct SegmentBitRates {
    pub rotation: Vec<u8>,
    pub translation: Vec<u8>,
    pub scale: Vec<u8>,
}

/// A contiguous window of samples, range-normalized and bit-rate-selected
/// independently of every other segment.
#[derive(Debug, Clone)]
pub struct SegmentContext {
    pub clip_sample_offset: usize,
    pub bone_streams: Vec<BoneStreams>,
    pub rotation_ranges: Vec<Option<RangeF32>>,
    pub translation_ranges: Vec<Option<RangeF32>>,
    pub scale_ranges: Vec<Option<RangeF32>>,
    pub bit_rates: SegmentBitRates,
    pub animated_pose_bit_size: u32,
}

impl SegmentContext {
    pub fn from_track_array(tracks: &TrackArray, clip_sample_offset: usize) -> Self {
        let bone_streams: Vec<BoneStreams> = tracks
            .tracks()
            .iter()
            .map(|track| {
                let mut stream = BoneStreams::default();
                for sample in &track.samples {
                    stream.rotations.push(sample.rotation);
                    stream.translations.push(sample.translation);
                    stream.scales.push(sample.scale);
                }
                stream
            })
            .collect();

        let num_bones = bone_streams.len();
        Self {
            clip_sample_offset,
            bone_streams,
            rotation_ranges: vec![None; num_bones],
            translation_ranges: vec![None; num_bones],
            scale_ranges: vec![None; num_bones],
            bit_rates: SegmentBitRates {
                rotation: vec![0; num_bones],
                translation: vec![0; num_bones],
                scale: vec![0; num_bones],
            },
            animated_pose_bit_size: 0,
        }
    }

    pub fn num_samples(&self) -> usize {
        self.bone_streams.first().map_or(0, BoneStreams::num_samples)
    }

    pub fn num_bones(&self) -> usize {
        self.bone_streams.len()
    }

    /// Carves out a sub-window `[start, start + len)` as its own segment,
    /// used by the segmenter. Ranges/bit rates are left
    /// unset; they are recomputed locally after segmentation.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let bone_streams = self
            .bone_streams
            .iter()
            .map(|stream| BoneStreams {
                rotations: stream.rotations[start..start + len].to_vec(),
                translations: stream.translations[start..start + len].to_vec(),
                scales: stream.scales[start..start + len].to_vec(),
            })
            .collect();

        let num_bones = self.num_bones();
        Self {
            clip_sample_offset: self.clip_sample_offset + start,
            bone_streams,
            rotation_ranges: vec![None; num_bones],
            translation_ranges: vec![None; num_bones],
            scale_ranges: vec![None; num_bones],
            bit_rates: SegmentBitRates {
                rotation: vec![0; num_bones],
                translation: vec![0; num_bones],
                scale: vec![0; num_bones],
            },
            animated_pose_bit_size: 0,
        }
    }
}
