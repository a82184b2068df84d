//! Borrowed, zero-copy view over a compressed blob.
//!
//! [`CompressedTracks::bind`] is the only allocation in the decompression
//! path: it walks the segment headers table once to build a small lookup
//! table, then hands back a struct that borrows the caller's byte slice for
//! everything else. `seek`/`decompress_*` never allocate.

use acl_format::header::{RawBufferHeader, SegmentHeader, TracksHeader, TransformTracksHeader, BLOB_ALIGNMENT};
use acl_format::{AlgorithmType, RotationFormat, SampleLoopingPolicy, TrackType, VectorFormat};

use crate::error::InitError;

/// Precomputed per-segment bookkeeping, built once in [`CompressedTracks::bind`]
/// from the stored [`SegmentHeader`] table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentInfo {
    pub clip_sample_offset: u32,
    pub num_samples: u32,
    pub animated_pose_bit_size: u32,
    pub format_offset: u32,
    pub range_offset: u32,
    pub animated_offset: u32,
}

/// An immutable, validated view over a compressed blob's bytes.
#[derive(Debug, Clone, Copy)]
pub struct CompressedTracks<'a> {
    bytes: &'a [u8],
    tracks_header: TracksHeader,
    transform_header: TransformTracksHeader,
}

impl<'a> CompressedTracks<'a> {
    /// Validates `bytes` as a blob and binds a view over it. `check_hash`
    /// controls whether the CRC32 recorded in [`RawBufferHeader`] is
    /// recomputed and compared -- skip it for a hot reload path that already
    /// trusts its source, keep it when loading from an untrusted or
    /// possibly-corrupt source.
    pub fn bind(bytes: &'a [u8], check_hash: bool) -> Result<Self, InitError> {
        if (bytes.as_ptr() as usize) % BLOB_ALIGNMENT != 0 {
            return Err(InitError::BadAlignment);
        }
        let min_size = RawBufferHeader::SIZE_IN_BYTES + TracksHeader::SIZE_IN_BYTES + TransformTracksHeader::SIZE_IN_BYTES;
        if bytes.len() < min_size {
            return Err(InitError::TooSmall);
        }

        let raw_header = RawBufferHeader::read_le(bytes).ok_or(InitError::TooSmall)?;
        let tracks_header_offset = RawBufferHeader::SIZE_IN_BYTES;
        let tracks_header =
            TracksHeader::read_le(&bytes[tracks_header_offset..]).ok_or(InitError::BadTag)?;

        if tracks_header.algorithm != AlgorithmType::UniformlySampled
            || tracks_header.track_type != TrackType::Qvvf
        {
            return Err(InitError::BadTag);
        }

        let transform_header_offset = tracks_header_offset + TracksHeader::SIZE_IN_BYTES;
        let transform_header = TransformTracksHeader::read_le(&bytes[transform_header_offset..])
            .ok_or(InitError::TooSmall)?;

        if check_hash {
            let hash = crc32fast::hash(&bytes[RawBufferHeader::SIZE_IN_BYTES..]);
            if hash != raw_header.hash {
                return Err(InitError::HashMismatch);
            }
        }

        Ok(Self { bytes, tracks_header, transform_header })
    }

    pub fn version(&self) -> u16 {
        self.tracks_header.version
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks_header.num_tracks as usize
    }

    pub fn num_samples(&self) -> usize {
        self.tracks_header.num_samples as usize
    }

    pub fn sample_rate(&self) -> f32 {
        self.tracks_header.sample_rate()
    }

    pub fn duration(&self) -> f32 {
        if self.num_samples() == 0 || self.sample_rate() <= 0.0 {
            0.0
        } else {
            (self.num_samples() - 1) as f32 / self.sample_rate()
        }
    }

    pub fn has_scale(&self) -> bool {
        self.tracks_header.flags.has_scale()
    }

    pub fn default_scale_is_one(&self) -> bool {
        self.tracks_header.flags.default_scale_is_one()
    }

    pub fn looping_policy(&self) -> SampleLoopingPolicy {
        self.tracks_header.flags.looping_policy()
    }

    pub fn rotation_format(&self) -> RotationFormat {
        self.tracks_header.rotation_format
    }

    pub fn translation_format(&self) -> VectorFormat {
        self.tracks_header.translation_format
    }

    pub fn scale_format(&self) -> VectorFormat {
        self.tracks_header.scale_format
    }

    /// Bits consumed per track in the default/constant bitsets: rotation,
    /// translation, and scale when present.
    pub(crate) fn bitset_stride(&self) -> usize {
        if self.has_scale() {
            3
        } else {
            2
        }
    }

    pub fn num_segments(&self) -> usize {
        self.transform_header.num_segments as usize
    }

    pub(crate) fn default_bitset_bytes(&self) -> &'a [u8] {
        let start = self.transform_header.default_tracks_bitset_offset as usize;
        let end = self.transform_header.constant_tracks_bitset_offset as usize;
        &self.bytes[start..end]
    }

    pub(crate) fn constant_bitset_bytes(&self) -> &'a [u8] {
        let start = self.transform_header.constant_tracks_bitset_offset as usize;
        let end = self.transform_header.constant_track_data_offset as usize;
        &self.bytes[start..end]
    }

    pub(crate) fn constant_data_bytes(&self) -> &'a [u8] {
        let start = self.transform_header.constant_track_data_offset as usize;
        let end = self.transform_header.clip_range_data_offset as usize;
        &self.bytes[start..end]
    }

    pub(crate) fn clip_range_bytes(&self) -> &'a [u8] {
        let start = self.transform_header.clip_range_data_offset as usize;
        let end = self.transform_header.segment_headers_offset as usize;
        &self.bytes[start..end]
    }

    pub(crate) fn num_animated_rotation(&self) -> usize {
        self.transform_header.num_animated_rotation_sub_tracks as usize
    }

    pub(crate) fn num_animated_translation(&self) -> usize {
        self.transform_header.num_animated_translation_sub_tracks as usize
    }

    pub(crate) fn num_animated_scale(&self) -> usize {
        self.transform_header.num_animated_scale_sub_tracks as usize
    }

    /// Reads every [`SegmentHeader`] and resolves each segment's absolute
    /// byte offsets and clip-relative sample range. Allocates one `Vec`; only
    /// called from [`Self::bind`].
    pub(crate) fn segment_infos(&self) -> Result<Vec<SegmentInfo>, InitError> {
        let mut infos = Vec::with_capacity(self.num_segments());
        let mut cursor = self.transform_header.segment_headers_offset as usize;
        let mut clip_sample_offset = 0u32;

        // Segment data starts right after the headers table and is
        // individually 4-byte aligned; recompute the same
        // alignment the writer applied rather than storing it twice.
        let mut data_cursor =
            cursor + self.num_segments() * SegmentHeader::SIZE_IN_BYTES;

        for _ in 0..self.num_segments() {
            let header = SegmentHeader::read_le(&self.bytes[cursor..]).ok_or(InitError::TooSmall)?;
            cursor += SegmentHeader::SIZE_IN_BYTES;

            data_cursor = acl_format::header::align_to(data_cursor, 4);
            let segment_start = data_cursor;

            infos.push(SegmentInfo {
                clip_sample_offset,
                num_samples: header.num_samples,
                animated_pose_bit_size: header.animated_pose_bit_size,
                format_offset: (segment_start as u32) + header.format_per_track_offset,
                range_offset: (segment_start as u32) + header.segment_range_offset,
                animated_offset: (segment_start as u32) + header.animated_data_offset,
            });

            clip_sample_offset += header.num_samples;

            // The next segment's data starts after this one's animated bits,
            // rounded up to a byte -- `animated_data_offset` plus the bits
            // consumed by every sample is exactly that length.
            let animated_bits = header.animated_pose_bit_size as usize * header.num_samples as usize;
            let animated_bytes = (animated_bits + 7) / 8;
            data_cursor = segment_start + header.animated_data_offset as usize + animated_bytes;
        }

        Ok(infos)
    }

    pub(crate) fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}
