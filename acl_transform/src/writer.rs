//! Compression entrypoint and blob writer.
//!
//! Emits sections in a fixed order: headers, bitsets, constant data, clip
//! ranges, segment headers, then per-segment format/range/animated blocks.
//! Uses a plain `write_le`-per-struct approach (see `acl_format::header`)
//! over a pointer-patching writer trait, since every offset here is already
//! known once the section ahead of it has been sized.

use acl_format::bit_rate::{self, BIT_RATE_RAW};
use acl_format::header::{align_to, RawBufferHeader, SegmentHeader, TracksHeader, TransformTracksHeader, BLOB_ALIGNMENT};
use acl_format::{AlgorithmType, RotationFormat, SampleLoopingPolicy, TrackType, TracksHeaderFlags, VectorFormat};
use glam::Vec3;

use crate::bitset::BitSet;
use crate::bitutils::BitWriter;
use crate::clip_context::ClipContext;
use crate::compaction::{self, Category, CompactionFormats, SubTrackCategories};
use crate::error::CompressionError;
use crate::looping;
use crate::range::{self, rotation_xyz, ClipRanges};
use crate::segment_context::{RangeF32, SegmentContext};
use crate::segmenter;
use crate::shell_metric::{self, RigidShellMetadata};
use crate::track::TrackArray;

/// Group size for the SoA packing of animated data and segment ranges
///.
const GROUP_SIZE: usize = 4;

/// Runtime knobs for a single `compress` call.
#[derive(Debug, Clone, Copy)]
pub struct CompressionSettings {
    pub ideal_num_samples: usize,
    pub max_num_samples: usize,
    /// Enables the error-correction pass after constant detection.
    pub enable_error_correction: bool,
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            ideal_num_samples: 16,
            max_num_samples: 32,
            enable_error_correction: false,
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
        }
    }
}

/// An immutable, self-describing compressed blob.
#[derive(Debug, Clone)]
pub struct CompressedClip {
    bytes: Vec<u8>,
}

impl CompressedClip {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Compresses `tracks` into a blob, composing onto `additive_base` for error
/// measurement when given. Aborts and produces no blob on
/// the first validation failure.
pub fn compress(
    tracks: &TrackArray,
    settings: &CompressionSettings,
    additive_base: Option<&TrackArray>,
) -> Result<CompressedClip, CompressionError> {
    let base_clip = additive_base.map(|base| ClipContext::from_track_array(base, false));
    let mut clip = ClipContext::from_track_array(tracks, additive_base.is_some());

    let shell = shell_metric::compute_clip_shell_distances(&clip, base_clip.as_ref());

    let formats = CompactionFormats {
        rotation_format: settings.rotation_format,
        translation_format: settings.translation_format,
        scale_format: settings.scale_format,
    };
    let categories = compaction::compact(&clip, &shell, formats);

    if settings.enable_error_correction {
        compaction::correct_errors(&mut clip, &categories);
    }

    let looping_policy = looping::optimize_looping(
        &mut clip,
        &shell,
        formats,
        SampleLoopingPolicy::Clamp,
        base_clip.as_ref(),
    );

    segmenter::split_into_segments(&mut clip, settings.ideal_num_samples, settings.max_num_samples);

    let clip_ranges = range::extract_clip_ranges(&clip, &categories);
    {
        let metadata = &clip.metadata;
        let sorted_parent_first = &clip.sorted_transforms_parent_first;
        for segment in clip.segments.iter_mut() {
            range::extract_segment_ranges(segment, &clip_ranges, &categories);
            crate::bit_rate_selector::select_bit_rates(
                metadata,
                sorted_parent_first,
                &categories,
                &clip_ranges,
                &shell,
                segment,
            );
        }
    }

    Ok(write_blob(tracks, &clip, &categories, &clip_ranges, formats, looping_policy))
}

/// Output-index-ordered list of bone indices that survive stripping.
fn output_order(clip: &ClipContext, tracks: &TrackArray) -> Vec<usize> {
    let mut order: Vec<(u32, usize)> = tracks
        .tracks()
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.description.is_stripped())
        .map(|(i, t)| (t.description.output_index, i))
        .collect();
    order.sort_by_key(|&(output_index, _)| output_index);
    let _ = clip;
    order.into_iter().map(|(_, bone_index)| bone_index).collect()
}

fn animated_indices(
    output_order: &[usize],
    categories: &[SubTrackCategories],
    pick: impl Fn(&SubTrackCategories) -> Option<Category>,
) -> Vec<usize> {
    output_order
        .iter()
        .copied()
        .filter(|&bone_index| pick(&categories[bone_index]) == Some(Category::Animated))
        .collect()
}

fn constant_indices(
    output_order: &[usize],
    categories: &[SubTrackCategories],
    pick: impl Fn(&SubTrackCategories) -> Option<Category>,
) -> Vec<usize> {
    output_order
        .iter()
        .copied()
        .filter(|&bone_index| pick(&categories[bone_index]) == Some(Category::Constant))
        .collect()
}

fn write_bitsets(output_order: &[usize], categories: &[SubTrackCategories]) -> (BitSet, BitSet) {
    let stride = 3;
    let num_tracks = output_order.len();
    let mut default_bits = BitSet::with_len(num_tracks * stride);
    let mut constant_bits = BitSet::with_len(num_tracks * stride);

    for (slot, &bone_index) in output_order.iter().enumerate() {
        let cats = &categories[bone_index];
        let base = slot * stride;
        default_bits.set(base, cats.rotation == Some(Category::Default));
        default_bits.set(base + 1, cats.translation == Some(Category::Default));
        default_bits.set(base + 2, cats.scale == Some(Category::Default));

        constant_bits.set(base, cats.rotation == Some(Category::Constant));
        constant_bits.set(base + 1, cats.translation == Some(Category::Constant));
        constant_bits.set(base + 2, cats.scale == Some(Category::Constant));
    }

    (default_bits, constant_bits)
}

/// Bitset words are MSB-first *as integers*, but the blob is
/// little-endian throughout; the two are independent, so each `u32` word is
/// still serialized little-endian.
fn push_bitset_bytes(out: &mut Vec<u8>, bitset: &BitSet) {
    for word in bitset.words() {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

/// Writes `values` (already in output order) as SoA groups of
/// [`GROUP_SIZE`]: all x components of a group, then all y, then all z.
fn write_soa_groups_f32(out: &mut Vec<u8>, values: &[glam::Vec3]) {
    for group in values.chunks(GROUP_SIZE) {
        for v in group {
            out.extend_from_slice(&v.x.to_le_bytes());
        }
        for v in group {
            out.extend_from_slice(&v.y.to_le_bytes());
        }
        for v in group {
            out.extend_from_slice(&v.z.to_le_bytes());
        }
    }
}

fn quantize_u8(fraction: f32) -> u8 {
    (fraction.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[allow(clippy::too_many_arguments)]
fn write_blob(
    tracks: &TrackArray,
    clip: &ClipContext,
    categories: &[SubTrackCategories],
    clip_ranges: &ClipRanges,
    formats: CompactionFormats,
    looping_policy: SampleLoopingPolicy,
) -> CompressedClip {
    let order = output_order(clip, tracks);
    let num_output_tracks = order.len();

    let rotation_animated = animated_indices(&order, categories, |c| c.rotation);
    let translation_animated = animated_indices(&order, categories, |c| c.translation);
    let scale_animated = animated_indices(&order, categories, |c| c.scale);

    let rotation_constant = constant_indices(&order, categories, |c| c.rotation);
    let translation_constant = constant_indices(&order, categories, |c| c.translation);
    let scale_constant = constant_indices(&order, categories, |c| c.scale);

    let (default_bits, constant_bits) = write_bitsets(&order, categories);

    // -- constant data (clip-level, one sample per constant sub-track) --
    let mut constant_data = Vec::new();
    let first_samples = |bone_index: usize| clip.segments[0].bone_streams[bone_index].get_sample(0);
    write_soa_groups_f32(
        &mut constant_data,
        &rotation_constant.iter().map(|&b| rotation_xyz(first_samples(b).rotation)).collect::<Vec<_>>(),
    );
    write_soa_groups_f32(
        &mut constant_data,
        &translation_constant.iter().map(|&b| first_samples(b).translation).collect::<Vec<_>>(),
    );
    write_soa_groups_f32(
        &mut constant_data,
        &scale_constant.iter().map(|&b| first_samples(b).scale).collect::<Vec<_>>(),
    );

    // -- clip range table --
    let mut clip_range_data = Vec::new();
    for &bone_index in &rotation_animated {
        let r = clip_ranges.rotation[bone_index].unwrap();
        push_range(&mut clip_range_data, r);
    }
    for &bone_index in &translation_animated {
        let r = clip_ranges.translation[bone_index].unwrap();
        push_range(&mut clip_range_data, r);
    }
    for &bone_index in &scale_animated {
        let r = clip_ranges.scale[bone_index].unwrap();
        push_range(&mut clip_range_data, r);
    }

    // -- per-segment sections --
    let mut segment_blocks: Vec<Vec<u8>> = Vec::with_capacity(clip.segments.len());
    let mut segment_headers: Vec<SegmentHeader> = Vec::with_capacity(clip.segments.len());

    for segment in &clip.segments {
        let block = write_segment(
            segment,
            clip_ranges,
            &order,
            categories,
            &rotation_animated,
            &translation_animated,
            &scale_animated,
        );
        segment_headers.push(SegmentHeader {
            num_samples: segment.num_samples() as u32,
            animated_pose_bit_size: segment.animated_pose_bit_size,
            format_per_track_offset: block.format_offset,
            segment_range_offset: block.range_offset,
            animated_data_offset: block.animated_offset,
        });
        segment_blocks.push(block.bytes);
    }

    // -- lay out absolute offsets and assemble the final buffer --
    let tracks_header_offset = RawBufferHeader::SIZE_IN_BYTES;
    let transform_header_offset = tracks_header_offset + TracksHeader::SIZE_IN_BYTES;
    let mut cursor = transform_header_offset + TransformTracksHeader::SIZE_IN_BYTES;

    let default_bitset_offset = cursor;
    cursor += default_bits.words().len() * 4;
    let constant_bitset_offset = cursor;
    cursor += constant_bits.words().len() * 4;
    let constant_data_offset = cursor;
    cursor += constant_data.len();
    let clip_range_offset = cursor;
    cursor += clip_range_data.len();
    let segment_headers_offset = cursor;
    cursor += segment_headers.len() * SegmentHeader::SIZE_IN_BYTES;

    let mut segment_data_offsets = Vec::with_capacity(segment_blocks.len());
    for block in &segment_blocks {
        cursor = align_to(cursor, 4);
        segment_data_offsets.push(cursor);
        cursor += block.len();
    }

    // 15 bytes of SIMD overread safety padding.
    let total_size = align_to(cursor + 15, BLOB_ALIGNMENT);

    let mut out = vec![0u8; total_size];

    let tracks_header = TracksHeader {
        version: 1,
        algorithm: AlgorithmType::UniformlySampled,
        track_type: TrackType::Qvvf,
        num_tracks: num_output_tracks as u32,
        num_samples: clip.num_samples() as u32,
        sample_rate: clip.sample_rate.to_bits(),
        flags: TracksHeaderFlags::new()
            .with_has_scale(true)
            .with_default_scale_is_one(true)
            .with_looping_policy(looping_policy),
        rotation_format: formats.rotation_format,
        translation_format: formats.translation_format,
        scale_format: formats.scale_format,
        padding: [0u8; 1],
    };
    tracks_header.write_le(&mut &mut out[tracks_header_offset..]).unwrap();

    let transform_header = TransformTracksHeader {
        default_tracks_bitset_offset: default_bitset_offset as u32,
        constant_tracks_bitset_offset: constant_bitset_offset as u32,
        constant_track_data_offset: constant_data_offset as u32,
        clip_range_data_offset: clip_range_offset as u32,
        segment_headers_offset: segment_headers_offset as u32,
        num_segments: clip.segments.len() as u32,
        num_animated_rotation_sub_tracks: rotation_animated.len() as u32,
        num_animated_translation_sub_tracks: translation_animated.len() as u32,
        num_animated_scale_sub_tracks: scale_animated.len() as u32,
    };
    transform_header.write_le(&mut &mut out[transform_header_offset..]).unwrap();

    write_at(&mut out, default_bitset_offset, &bitset_bytes(&default_bits));
    write_at(&mut out, constant_bitset_offset, &bitset_bytes(&constant_bits));
    write_at(&mut out, constant_data_offset, &constant_data);
    write_at(&mut out, clip_range_offset, &clip_range_data);

    let mut header_cursor = segment_headers_offset;
    for segment_header in &segment_headers {
        // Per-segment offsets stay relative to that segment's own data start
        //; the absolute `segment_data_offsets` table is only used
        // here to place each segment's bytes in the blob.
        segment_header.write_le(&mut &mut out[header_cursor..]).unwrap();
        header_cursor += SegmentHeader::SIZE_IN_BYTES;
    }

    for (block, &data_offset) in segment_blocks.iter().zip(&segment_data_offsets) {
        write_at(&mut out, data_offset, block);
    }

    let hash = crc32fast::hash(&out[RawBufferHeader::SIZE_IN_BYTES..]);
    let raw_header = RawBufferHeader {
        size: total_size as u32,
        hash,
        padding: 0,
    };
    raw_header.write_le(&mut &mut out[0..]).unwrap();

    CompressedClip { bytes: out }
}

fn write_at(out: &mut [u8], offset: usize, bytes: &[u8]) {
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn bitset_bytes(bitset: &BitSet) -> Vec<u8> {
    let mut out = Vec::with_capacity(bitset.words().len() * 4);
    push_bitset_bytes(&mut out, bitset);
    out
}

fn push_range(out: &mut Vec<u8>, range: RangeF32) {
    out.extend_from_slice(&range.min.x.to_le_bytes());
    out.extend_from_slice(&range.min.y.to_le_bytes());
    out.extend_from_slice(&range.min.z.to_le_bytes());
    out.extend_from_slice(&range.extent.x.to_le_bytes());
    out.extend_from_slice(&range.extent.y.to_le_bytes());
    out.extend_from_slice(&range.extent.z.to_le_bytes());
}

struct SegmentBlock {
    bytes: Vec<u8>,
    format_offset: u32,
    range_offset: u32,
    animated_offset: u32,
}

fn write_segment(
    segment: &SegmentContext,
    clip_ranges: &ClipRanges,
    order: &[usize],
    categories: &[SubTrackCategories],
    rotation_animated: &[usize],
    translation_animated: &[usize],
    scale_animated: &[usize],
) -> SegmentBlock {
    let _ = order;
    let _ = categories;

    // -- per-track format bytes, padded to a multiple of GROUP_SIZE --
    let mut format_bytes = Vec::new();
    for (animated, bit_rates) in [
        (rotation_animated, &segment.bit_rates.rotation),
        (translation_animated, &segment.bit_rates.translation),
        (scale_animated, &segment.bit_rates.scale),
    ] {
        let padded_len = align_to(animated.len(), GROUP_SIZE);
        for &bone_index in animated {
            format_bytes.push(bit_rates[bone_index]);
        }
        format_bytes.resize(format_bytes.len() + (padded_len - animated.len()), BIT_RATE_RAW);
    }
    let format_offset = 0u32;
    let range_offset = format_bytes.len() as u32;

    // -- segment range bytes (6 bytes per sub-track, SoA groups of 4) --
    let mut range_bytes = Vec::new();
    write_segment_range_group(&mut range_bytes, rotation_animated, &segment.rotation_ranges);
    write_segment_range_group(&mut range_bytes, translation_animated, &segment.translation_ranges);
    write_segment_range_group(&mut range_bytes, scale_animated, &segment.scale_ranges);
    let animated_offset = range_offset + range_bytes.len() as u32;

    // -- animated bit-packed data, keyframe-major --
    let mut writer = BitWriter::new();
    for sample_index in 0..segment.num_samples() {
        write_animated_group(&mut writer, segment, clip_ranges, rotation_animated, &segment.bit_rates.rotation, sample_index, Kind::Rotation);
        write_animated_group(&mut writer, segment, clip_ranges, translation_animated, &segment.bit_rates.translation, sample_index, Kind::Translation);
        write_animated_group(&mut writer, segment, clip_ranges, scale_animated, &segment.bit_rates.scale, sample_index, Kind::Scale);
    }
    writer.pad_to_byte();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&format_bytes);
    bytes.extend_from_slice(&range_bytes);
    bytes.extend_from_slice(&writer.into_bytes());

    SegmentBlock {
        bytes,
        format_offset,
        range_offset,
        animated_offset,
    }
}

fn write_segment_range_group(out: &mut Vec<u8>, animated: &[usize], ranges: &[Option<RangeF32>]) {
    for group in animated.chunks(GROUP_SIZE) {
        for &bone_index in group {
            let r = ranges[bone_index].unwrap();
            out.push(quantize_u8(r.min.x));
        }
        for &bone_index in group {
            let r = ranges[bone_index].unwrap();
            out.push(quantize_u8(r.min.y));
        }
        for &bone_index in group {
            let r = ranges[bone_index].unwrap();
            out.push(quantize_u8(r.min.z));
        }
        for &bone_index in group {
            let r = ranges[bone_index].unwrap();
            out.push(quantize_u8(r.extent.x));
        }
        for &bone_index in group {
            let r = ranges[bone_index].unwrap();
            out.push(quantize_u8(r.extent.y));
        }
        for &bone_index in group {
            let r = ranges[bone_index].unwrap();
            out.push(quantize_u8(r.extent.z));
        }
    }
}

/// Which sample stream a component plane is drawn from; also selects the
/// matching clip/segment range table.
#[derive(Debug, Clone, Copy)]
enum Kind {
    Rotation,
    Translation,
    Scale,
}

fn raw_component_vec3(segment: &SegmentContext, bone_index: usize, sample_index: usize, kind: Kind) -> Vec3 {
    let stream = &segment.bone_streams[bone_index];
    match kind {
        Kind::Rotation => rotation_xyz(stream.rotations[sample_index]),
        Kind::Translation => stream.translations[sample_index],
        Kind::Scale => stream.scales[sample_index],
    }
}

fn clip_range_for(clip_ranges: &ClipRanges, bone_index: usize, kind: Kind) -> Option<RangeF32> {
    match kind {
        Kind::Rotation => clip_ranges.rotation[bone_index],
        Kind::Translation => clip_ranges.translation[bone_index],
        Kind::Scale => clip_ranges.scale[bone_index],
    }
}

fn segment_range_for(segment: &SegmentContext, bone_index: usize, kind: Kind) -> Option<RangeF32> {
    match kind {
        Kind::Rotation => segment.rotation_ranges[bone_index],
        Kind::Translation => segment.translation_ranges[bone_index],
        Kind::Scale => segment.scale_ranges[bone_index],
    }
}

/// Writes one kind's animated samples for `sample_index`, one group of up to
/// [`GROUP_SIZE`] sub-tracks at a time: all x components of the group, then
/// all y, then all z. The reference pads every group to a byte boundary here
/// so its SIMD backend can issue an unaligned word load per group; this port
/// reads bits through [`crate::bitutils::BitReader`]'s arbitrary-bit-offset
/// API rather than raw word loads, so that padding buys nothing and is
/// dropped -- bits for consecutive samples/groups/kinds pack contiguously,
/// with a single byte pad applied once at the very end of the segment
///.
fn write_animated_group(
    writer: &mut BitWriter,
    segment: &SegmentContext,
    clip_ranges: &ClipRanges,
    animated: &[usize],
    bit_rates: &[u8],
    sample_index: usize,
    kind: Kind,
) {
    for group in animated.chunks(GROUP_SIZE) {
        write_component_plane(writer, segment, clip_ranges, group, bit_rates, sample_index, kind, 0);
        write_component_plane(writer, segment, clip_ranges, group, bit_rates, sample_index, kind, 1);
        write_component_plane(writer, segment, clip_ranges, group, bit_rates, sample_index, kind, 2);
    }
}

/// Writes one component (x, y or z) for every sub-track in `group`. Mirrors
/// `bit_rate_selector::decode_vector`/`decode_rotation` run in reverse: clip
/// range normalizes first, then segment range, and the doubly-normalized
/// fraction is what gets quantized.
#[allow(clippy::too_many_arguments)]
fn write_component_plane(
    writer: &mut BitWriter,
    segment: &SegmentContext,
    clip_ranges: &ClipRanges,
    group: &[usize],
    bit_rates: &[u8],
    sample_index: usize,
    kind: Kind,
    component: usize,
) {
    for &bone_index in group {
        let bit_rate = bit_rates[bone_index];
        let raw = raw_component_vec3(segment, bone_index, sample_index, kind);
        let raw_component = [raw.x, raw.y, raw.z][component];

        if bit_rate == BIT_RATE_RAW {
            writer.write_f32(raw_component);
            continue;
        }

        let clip_range = clip_range_for(clip_ranges, bone_index, kind);
        let segment_range = segment_range_for(segment, bone_index, kind);
        let (clip_range, segment_range) = match (clip_range, segment_range) {
            (Some(c), Some(s)) => (c, s),
            // No range was ever extracted for this sub-track (a single-sample
            // segment, say); fall back to storing the raw float so decode
            // always has a well-defined value to read.
            _ => {
                writer.write_f32(raw_component);
                continue;
            }
        };

        let num_bits = bit_rate::num_bits_at_bit_rate(bit_rate).unwrap_or(32);
        let clip_normalized = clip_range.normalize(raw);
        let seg_normalized = segment_range.normalize(clip_normalized);
        let component_value = [seg_normalized.x, seg_normalized.y, seg_normalized.z][component];
        let max_value = ((1u32 << num_bits) - 1) as f32;
        let quantized = (component_value.clamp(0.0, 1.0) * max_value).round() as u32;
        writer.write(quantized, num_bits as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompression::{DecompressionContext, DefaultDecompressionSettings, PoseBuffer, RoundingPolicy};
    use crate::track::{RawTransformTrack, TrackDescription, INVALID_OUTPUT_INDEX, INVALID_PARENT_INDEX};
    use crate::transform::Transform;
    use approx::assert_relative_eq;
    use glam::{Quat, Vec3};

    fn bone(
        parent_index: u32,
        output_index: u32,
        precision: f32,
        shell_distance: f32,
        samples: Vec<Transform>,
    ) -> RawTransformTrack {
        RawTransformTrack {
            description: TrackDescription {
                parent_index,
                precision,
                shell_distance,
                default_value: Transform::IDENTITY,
                output_index,
            },
            samples,
        }
    }

    fn decode_all(clip: &CompressedClip, num_tracks: usize, t: f32) -> PoseBuffer {
        let mut ctx = DecompressionContext::<DefaultDecompressionSettings>::new();
        ctx.initialize(clip.as_bytes(), true).unwrap();
        ctx.seek(t, RoundingPolicy::None).unwrap();
        let mut pose = PoseBuffer::new(num_tracks);
        ctx.decompress_tracks(&mut pose);
        pose
    }

    /// S1: a single identity bone compresses down to headers-only, with
    /// every sub-track in the default bitset.
    #[test]
    fn s1_identity_clip_is_all_default() {
        let samples = vec![Transform::IDENTITY; 10];
        let tracks = TrackArray::new(vec![bone(INVALID_PARENT_INDEX, 0, 0.01, 1.0, samples)], 30.0, None).unwrap();

        let clip = compress(&tracks, &CompressionSettings::default(), None).unwrap();
        let pose = decode_all(&clip, 1, 0.0);

        assert_eq!(pose.rotations[0], Quat::IDENTITY);
        assert_eq!(pose.translations[0], Vec3::ZERO);
        assert_eq!(pose.scales[0], Vec3::ONE);

        // Headers-only: no animated or constant data beyond the fixed
        // per-blob tables.
        assert!(clip.as_bytes().len() < 256);
    }

    /// S2: a constant (non-default) rotation round-trips at every time.
    #[test]
    fn s2_constant_non_default_rotation() {
        let q = Quat::from_xyzw(0.707, 0.0, 0.0, 0.707).normalize();
        let samples: Vec<Transform> = (0..10).map(|_| Transform::new(q, Vec3::ZERO, Vec3::ONE)).collect();
        let tracks = TrackArray::new(vec![bone(INVALID_PARENT_INDEX, 0, 0.01, 1.0, samples)], 30.0, None).unwrap();

        let clip = compress(&tracks, &CompressionSettings::default(), None).unwrap();

        for i in 0..10 {
            let pose = decode_all(&clip, 1, i as f32 / 30.0);
            assert_relative_eq!(pose.rotations[0].x, q.x, epsilon = 1e-3);
            assert_relative_eq!(pose.rotations[0].y, q.y, epsilon = 1e-3);
            assert_relative_eq!(pose.rotations[0].z, q.z, epsilon = 1e-3);
            assert_relative_eq!(pose.rotations[0].w, q.w, epsilon = 1e-3);
        }
    }

    /// S3: a linear translation sweep decodes within the requested
    /// precision at a fractional sample time.
    #[test]
    fn s3_linear_sweep_precision_bound() {
        let samples: Vec<Transform> = (0..61)
            .map(|i| Transform::new(Quat::IDENTITY, Vec3::new(i as f32 / 60.0, 0.0, 0.0), Vec3::ONE))
            .collect();
        let tracks = TrackArray::new(vec![bone(INVALID_PARENT_INDEX, 0, 1e-4, 1.0, samples)], 30.0, None).unwrap();

        let clip = compress(&tracks, &CompressionSettings::default(), None).unwrap();
        // Sample 30 at 30 Hz lands at t = 1.0, i.e. x = 30/60 = 0.5.
        let pose = decode_all(&clip, 1, 1.0);
        assert_relative_eq!(pose.translations[0].x, 0.5, epsilon = 1e-3);
    }

    /// S4: a closed rotation loop has its last sample dropped and `seek` at
    /// the full duration aliases `seek(0)`.
    #[test]
    fn s4_loop_wrap_drops_last_sample() {
        let num_samples = 12;
        let samples: Vec<Transform> = (0..num_samples)
            .map(|i| {
                let angle = (i as f32 / (num_samples - 1) as f32) * std::f32::consts::TAU;
                Transform::new(Quat::from_rotation_y(angle), Vec3::ZERO, Vec3::ONE)
            })
            .collect();
        let tracks =
            TrackArray::new(vec![bone(INVALID_PARENT_INDEX, 0, 1e-3, 1.0, samples)], 30.0, None).unwrap();

        let clip = compress(&tracks, &CompressionSettings::default(), None).unwrap();

        let mut ctx = DecompressionContext::<DefaultDecompressionSettings>::new();
        ctx.initialize(clip.as_bytes(), true).unwrap();

        // The looping optimizer drops the final (duplicate) sample, so the
        // wrap-policy duration the decompressor uses is one sample shorter
        // than the original clip's span.
        let duration = (num_samples - 1) as f32 / 30.0;
        ctx.seek(0.0, RoundingPolicy::None).unwrap();
        let mut pose0 = PoseBuffer::new(1);
        ctx.decompress_tracks(&mut pose0);

        ctx.seek(duration, RoundingPolicy::None).unwrap();
        let mut pose_end = PoseBuffer::new(1);
        ctx.decompress_tracks(&mut pose_end);

        assert_relative_eq!(pose0.rotations[0].x, pose_end.rotations[0].x, epsilon = 1e-3);
        assert_relative_eq!(pose0.rotations[0].y, pose_end.rotations[0].y, epsilon = 1e-3);
        assert_relative_eq!(pose0.rotations[0].z, pose_end.rotations[0].z, epsilon = 1e-3);
        assert_relative_eq!(pose0.rotations[0].w, pose_end.rotations[0].w, epsilon = 1e-3);
    }

    /// S6: stripped tracks are omitted from the blob and output indices are
    /// remapped so decoding output 0/1 returns the surviving raw tracks.
    #[test]
    fn s6_stripped_tracks_are_omitted() {
        let samples_a: Vec<Transform> = (0..5)
            .map(|i| Transform::new(Quat::IDENTITY, Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE))
            .collect();
        let samples_b: Vec<Transform> = vec![Transform::IDENTITY; 5];
        let samples_c: Vec<Transform> = (0..5)
            .map(|i| Transform::new(Quat::IDENTITY, Vec3::new(0.0, i as f32, 0.0), Vec3::ONE))
            .collect();

        let tracks = TrackArray::new(
            vec![
                bone(INVALID_PARENT_INDEX, 0, 1e-4, 1.0, samples_a.clone()),
                bone(INVALID_PARENT_INDEX, INVALID_OUTPUT_INDEX, 1e-4, 1.0, samples_b),
                bone(INVALID_PARENT_INDEX, 1, 1e-4, 1.0, samples_c.clone()),
            ],
            30.0,
            None,
        )
        .unwrap();
        assert_eq!(tracks.num_output_tracks(), 2);

        let clip = compress(&tracks, &CompressionSettings::default(), None).unwrap();
        let pose = decode_all(&clip, 2, 4.0 / 30.0);

        assert_relative_eq!(pose.translations[0].x, samples_a[4].translation.x, epsilon = 1e-3);
        assert_relative_eq!(pose.translations[1].y, samples_c[4].translation.y, epsilon = 1e-3);
    }

    /// Random-access decoding of a single track must agree with
    /// `decompress_tracks` for every track index.
    #[test]
    fn random_access_matches_bulk_decompress() {
        let samples_a: Vec<Transform> = (0..40)
            .map(|i| Transform::new(Quat::from_rotation_x(i as f32 * 0.05), Vec3::new(i as f32 * 0.1, 0.0, 0.0), Vec3::ONE))
            .collect();
        let samples_b: Vec<Transform> = (0..40)
            .map(|i| Transform::new(Quat::IDENTITY, Vec3::new(0.0, 0.0, i as f32 * 0.02), Vec3::splat(1.0 + i as f32 * 0.01)))
            .collect();

        let tracks = TrackArray::new(
            vec![
                bone(INVALID_PARENT_INDEX, 0, 1e-3, 1.0, samples_a),
                bone(0, 1, 1e-3, 1.0, samples_b),
            ],
            30.0,
            None,
        )
        .unwrap();

        let settings = CompressionSettings {
            ideal_num_samples: 8,
            max_num_samples: 16,
            ..CompressionSettings::default()
        };
        let clip = compress(&tracks, &settings, None).unwrap();

        let mut ctx = DecompressionContext::<DefaultDecompressionSettings>::new();
        ctx.initialize(clip.as_bytes(), true).unwrap();
        ctx.seek(0.73, RoundingPolicy::None).unwrap();

        let mut bulk = PoseBuffer::new(2);
        ctx.decompress_tracks(&mut bulk);

        for i in 0..2 {
            let mut single = PoseBuffer::new(2);
            ctx.decompress_track(i, &mut single);
            assert_relative_eq!(single.rotations[i].x, bulk.rotations[i].x, epsilon = 1e-4);
            assert_relative_eq!(single.rotations[i].y, bulk.rotations[i].y, epsilon = 1e-4);
            assert_relative_eq!(single.rotations[i].z, bulk.rotations[i].z, epsilon = 1e-4);
            assert_relative_eq!(single.rotations[i].w, bulk.rotations[i].w, epsilon = 1e-4);
            assert_relative_eq!(single.translations[i].x, bulk.translations[i].x, epsilon = 1e-4);
            assert_relative_eq!(single.translations[i].y, bulk.translations[i].y, epsilon = 1e-4);
            assert_relative_eq!(single.translations[i].z, bulk.translations[i].z, epsilon = 1e-4);
            assert_relative_eq!(single.scales[i].x, bulk.scales[i].x, epsilon = 1e-4);
        }
    }

    /// Idempotent seek: calling `seek` twice with the same time resolves to
    /// the same keyframes and alpha.
    #[test]
    fn idempotent_seek() {
        let samples: Vec<Transform> = (0..20)
            .map(|i| Transform::new(Quat::from_rotation_z(i as f32 * 0.1), Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE))
            .collect();
        let tracks = TrackArray::new(vec![bone(INVALID_PARENT_INDEX, 0, 1e-3, 1.0, samples)], 30.0, None).unwrap();
        let clip = compress(&tracks, &CompressionSettings::default(), None).unwrap();

        let mut ctx = DecompressionContext::<DefaultDecompressionSettings>::new();
        ctx.initialize(clip.as_bytes(), true).unwrap();

        ctx.seek(0.345, RoundingPolicy::None).unwrap();
        let mut first = PoseBuffer::new(1);
        ctx.decompress_tracks(&mut first);

        ctx.seek(0.345, RoundingPolicy::None).unwrap();
        let mut second = PoseBuffer::new(1);
        ctx.decompress_tracks(&mut second);

        assert_eq!(first.translations[0], second.translations[0]);
        assert_eq!(first.rotations[0], second.rotations[0]);
    }

    /// Hierarchy dominance: a child with a much larger shell than its
    /// parent widens the parent's effective shell distance, and the clip
    /// still satisfies every bone's precision after compression.
    #[test]
    fn s5_hierarchy_dominance_still_meets_precision() {
        let num_samples = 20;
        let parent_samples: Vec<Transform> = vec![Transform::IDENTITY; num_samples];
        let child_samples: Vec<Transform> = (0..num_samples)
            .map(|i| Transform::new(Quat::from_rotation_y(i as f32 * 0.2), Vec3::ZERO, Vec3::ONE))
            .collect();

        let tracks = TrackArray::new(
            vec![
                bone(INVALID_PARENT_INDEX, 0, 1e-3, 0.1, parent_samples.clone()),
                bone(0, 1, 1e-3, 2.0, child_samples.clone()),
            ],
            30.0,
            None,
        )
        .unwrap();

        let clip = compress(&tracks, &CompressionSettings::default(), None).unwrap();

        for i in 0..num_samples {
            let pose = decode_all(&clip, 2, i as f32 / 30.0);
            assert_relative_eq!(pose.rotations[0].w, parent_samples[i].rotation.w, epsilon = 1e-2);
            let dot = pose.rotations[1].dot(child_samples[i].rotation).abs();
            assert!(dot > 0.999, "child rotation drifted too far at sample {i}: dot={dot}");
        }
    }

    /// Compressing the same input twice with the same settings is
    /// bit-identical, including the recorded hash.
    #[test]
    fn hash_stability() {
        let samples: Vec<Transform> = (0..15)
            .map(|i| Transform::new(Quat::from_rotation_x(i as f32 * 0.1), Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE))
            .collect();
        let tracks = TrackArray::new(vec![bone(INVALID_PARENT_INDEX, 0, 1e-3, 1.0, samples)], 30.0, None).unwrap();

        let a = compress(&tracks, &CompressionSettings::default(), None).unwrap();
        let b = compress(&tracks, &CompressionSettings::default(), None).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    /// With every format set to raw, decompression reproduces samples
    /// bit-exactly at integer sample times.
    #[test]
    fn raw_format_round_trips_exactly() {
        let samples: Vec<Transform> = (0..8)
            .map(|i| {
                Transform::new(
                    Quat::from_rotation_x(i as f32 * 0.37).normalize(),
                    Vec3::new(i as f32 * 1.1, -i as f32 * 0.3, i as f32 * 2.0),
                    Vec3::splat(1.0 + i as f32 * 0.05),
                )
            })
            .collect();
        let tracks =
            TrackArray::new(vec![bone(INVALID_PARENT_INDEX, 0, 0.0, 1.0, samples.clone())], 30.0, None).unwrap();

        let settings = CompressionSettings {
            rotation_format: acl_format::RotationFormat::QuatFull,
            translation_format: acl_format::VectorFormat::Vector3Full,
            scale_format: acl_format::VectorFormat::Vector3Full,
            ..CompressionSettings::default()
        };
        let clip = compress(&tracks, &settings, None).unwrap();

        for (i, sample) in samples.iter().enumerate() {
            let pose = decode_all(&clip, 1, i as f32 / 30.0);
            assert_relative_eq!(pose.rotations[0].x, sample.rotation.x, epsilon = 1e-5);
            assert_relative_eq!(pose.rotations[0].y, sample.rotation.y, epsilon = 1e-5);
            assert_relative_eq!(pose.rotations[0].z, sample.rotation.z, epsilon = 1e-5);
            assert_relative_eq!(pose.rotations[0].w, sample.rotation.w, epsilon = 1e-5);
            assert_eq!(pose.translations[0], sample.translation);
            assert_eq!(pose.scales[0], sample.scale);
        }
    }
}
