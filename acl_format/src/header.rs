//! Fixed-size sections of the compressed blob.
//!
//! These are read with `binrw` the way `ssbh_lib`'s format structs are, but
//! written by hand: the blob has no self-referential pointer graph to patch
//! (every offset is a flat `u32` the writer already knows once the sections
//! ahead of it have been sized), so there is no need for an `SsbhWrite`-style
//! offset-patching trait here. A plain `write_le` method per header mirrors
//! how the reference C++ writer pokes bytes directly
//! (`compression/impl/write_stream_data.h`).

use std::io::{self, Write};

use binrw::BinRead;

use crate::enums::{AlgorithmType, RotationFormat, TracksHeaderFlags, TrackType, VectorFormat};

/// Magic tag stored at the start of the tracks header, the on-disk analogue
/// of SSBH's 4-byte file tags.
pub const TRACKS_MAGIC: [u8; 4] = *b"acl\0";

pub const BLOB_ALIGNMENT: usize = 16;

/// The outermost 16-byte header. Its own bytes are not covered by `hash`;
/// everything from the tracks header onward is.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBufferHeader {
    pub size: u32,
    pub hash: u32,
    pub padding: u64,
}

impl RawBufferHeader {
    pub const SIZE_IN_BYTES: usize = 16;

    pub fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.size.to_le_bytes())?;
        writer.write_all(&self.hash.to_le_bytes())?;
        writer.write_all(&self.padding.to_le_bytes())
    }

    /// Hand-rolled mirror of [`Self::write_le`]: the blob is just flat,
    /// little-endian fields, so there is as little reason to reach for
    /// `binrw::BinReaderExt`/`Cursor` here as there was to reach for an
    /// offset-patching writer trait above.
    pub fn read_le(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE_IN_BYTES {
            return None;
        }
        Some(Self {
            size: u32::from_le_bytes(bytes[0..4].try_into().ok()?),
            hash: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            padding: u64::from_le_bytes(bytes[8..16].try_into().ok()?),
        })
    }
}

/// Describes the clip as a whole: what kind of tracks it stores, how many,
/// at what rate, and in what on-disk format.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(magic = b"acl\0")]
pub struct TracksHeader {
    pub version: u16,
    pub algorithm: AlgorithmType,
    pub track_type: TrackType,
    pub num_tracks: u32,
    pub num_samples: u32,
    pub sample_rate: u32, // f32 bits, see `sample_rate()`/`set_sample_rate`
    pub flags: TracksHeaderFlags,
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
    pub padding: [u8; 1],
}

impl TracksHeader {
    pub const SIZE_IN_BYTES: usize = 4 + 2 + 1 + 1 + 4 + 4 + 4 + 1 + 1 + 1 + 1 + 1;

    pub fn sample_rate(&self) -> f32 {
        f32::from_bits(self.sample_rate)
    }

    pub fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&TRACKS_MAGIC)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&[self.algorithm as u8])?;
        writer.write_all(&[self.track_type as u8])?;
        writer.write_all(&self.num_tracks.to_le_bytes())?;
        writer.write_all(&self.num_samples.to_le_bytes())?;
        writer.write_all(&self.sample_rate.to_le_bytes())?;
        writer.write_all(&[self.flags.into_bytes()[0]])?;
        writer.write_all(&[
            self.rotation_format as u8,
            self.translation_format as u8,
            self.scale_format as u8,
        ])?;
        writer.write_all(&self.padding)
    }

    /// Parses a header starting at `bytes[0]`, checking the magic tag but not
    /// the version (a mismatched version is a caller-policy decision, not a
    /// structural parse failure).
    pub fn read_le(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE_IN_BYTES || bytes[0..4] != TRACKS_MAGIC {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes(bytes[4..6].try_into().ok()?),
            algorithm: AlgorithmType::from_u8(bytes[6])?,
            track_type: TrackType::from_u8(bytes[7])?,
            num_tracks: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
            num_samples: u32::from_le_bytes(bytes[12..16].try_into().ok()?),
            sample_rate: u32::from_le_bytes(bytes[16..20].try_into().ok()?),
            flags: TracksHeaderFlags::from_bytes([bytes[20]]),
            rotation_format: RotationFormat::from_u8(bytes[21])?,
            translation_format: VectorFormat::from_u8(bytes[22])?,
            scale_format: VectorFormat::from_u8(bytes[23])?,
            padding: [bytes[24]],
        })
    }
}

/// Follows `TracksHeader` for `track_type == Qvvf`. Holds offsets (relative
/// to the start of the blob) to every variable-length section.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformTracksHeader {
    pub default_tracks_bitset_offset: u32,
    pub constant_tracks_bitset_offset: u32,
    pub constant_track_data_offset: u32,
    pub clip_range_data_offset: u32,
    pub segment_headers_offset: u32,
    pub num_segments: u32,
    pub num_animated_rotation_sub_tracks: u32,
    pub num_animated_translation_sub_tracks: u32,
    pub num_animated_scale_sub_tracks: u32,
}

impl TransformTracksHeader {
    pub const SIZE_IN_BYTES: usize = 4 * 9;

    pub fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for field in [
            self.default_tracks_bitset_offset,
            self.constant_tracks_bitset_offset,
            self.constant_track_data_offset,
            self.clip_range_data_offset,
            self.segment_headers_offset,
            self.num_segments,
            self.num_animated_rotation_sub_tracks,
            self.num_animated_translation_sub_tracks,
            self.num_animated_scale_sub_tracks,
        ] {
            writer.write_all(&field.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_le(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE_IN_BYTES {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        Some(Self {
            default_tracks_bitset_offset: word(0),
            constant_tracks_bitset_offset: word(1),
            constant_track_data_offset: word(2),
            clip_range_data_offset: word(3),
            segment_headers_offset: word(4),
            num_segments: word(5),
            num_animated_rotation_sub_tracks: word(6),
            num_animated_translation_sub_tracks: word(7),
            num_animated_scale_sub_tracks: word(8),
        })
    }
}

/// One entry of the segment headers table.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub num_samples: u32,
    pub animated_pose_bit_size: u32,
    /// Relative to this segment's data start.
    pub format_per_track_offset: u32,
    /// Relative to this segment's data start.
    pub segment_range_offset: u32,
    /// Relative to this segment's data start.
    pub animated_data_offset: u32,
}

impl SegmentHeader {
    pub const SIZE_IN_BYTES: usize = 4 * 5;

    pub fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for field in [
            self.num_samples,
            self.animated_pose_bit_size,
            self.format_per_track_offset,
            self.segment_range_offset,
            self.animated_data_offset,
        ] {
            writer.write_all(&field.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_le(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE_IN_BYTES {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        Some(Self {
            num_samples: word(0),
            animated_pose_bit_size: word(1),
            format_per_track_offset: word(2),
            segment_range_offset: word(3),
            animated_data_offset: word(4),
        })
    }
}

/// Rounds `value` up to the next multiple of `align` (a power of two).
pub const fn align_to(value: usize, align: usize) -> usize {
    (value + (align - 1)) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(align_to(0, 16), 0);
        assert_eq!(align_to(1, 16), 16);
        assert_eq!(align_to(16, 16), 16);
        assert_eq!(align_to(17, 4), 20);
    }

    #[test]
    fn raw_buffer_header_round_trips() {
        let header = RawBufferHeader { size: 1234, hash: 0xdead_beef, padding: 0 };
        let mut bytes = Vec::new();
        header.write_le(&mut bytes).unwrap();
        assert_eq!(RawBufferHeader::read_le(&bytes), Some(header));
    }

    #[test]
    fn tracks_header_round_trips() {
        let header = TracksHeader {
            version: 1,
            algorithm: AlgorithmType::UniformlySampled,
            track_type: TrackType::Qvvf,
            num_tracks: 5,
            num_samples: 64,
            sample_rate: 30.0f32.to_bits(),
            flags: TracksHeaderFlags::new()
                .with_has_scale(true)
                .with_default_scale_is_one(true)
                .with_looping_policy(crate::enums::SampleLoopingPolicy::Wrap),
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
            padding: [0],
        };
        let mut bytes = Vec::new();
        header.write_le(&mut bytes).unwrap();
        assert_eq!(TracksHeader::read_le(&bytes), Some(header));
    }

    #[test]
    fn tracks_header_rejects_bad_magic() {
        let bytes = vec![0u8; TracksHeader::SIZE_IN_BYTES];
        assert_eq!(TracksHeader::read_le(&bytes), None);
    }

    #[test]
    fn transform_tracks_header_round_trips() {
        let header = TransformTracksHeader {
            default_tracks_bitset_offset: 4,
            constant_tracks_bitset_offset: 8,
            constant_track_data_offset: 12,
            clip_range_data_offset: 16,
            segment_headers_offset: 20,
            num_segments: 2,
            num_animated_rotation_sub_tracks: 3,
            num_animated_translation_sub_tracks: 4,
            num_animated_scale_sub_tracks: 5,
        };
        let mut bytes = Vec::new();
        header.write_le(&mut bytes).unwrap();
        assert_eq!(TransformTracksHeader::read_le(&bytes), Some(header));
    }

    #[test]
    fn segment_header_round_trips() {
        let header = SegmentHeader {
            num_samples: 16,
            animated_pose_bit_size: 256,
            format_per_track_offset: 0,
            segment_range_offset: 8,
            animated_data_offset: 40,
        };
        let mut bytes = Vec::new();
        header.write_le(&mut bytes).unwrap();
        assert_eq!(SegmentHeader::read_le(&bytes), Some(header));
    }
}
