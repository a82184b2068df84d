//! Decompressor state machine.
//!
//! Mirrors the reference `decompression_context`'s three states: a context
//! starts `Uninitialized`, [`DecompressionContext::initialize`] binds it to a
//! blob (`Bound`), and [`DecompressionContext::seek`] resolves a sample time
//! to a pair of keyframes (`Seeked`). `decompress_tracks`/`decompress_track`
//! only ever read the keyframes recorded by the most recent `seek`.

use std::marker::PhantomData;

use acl_format::bit_rate::BIT_RATE_RAW;
use acl_format::header::align_to;
use acl_format::SampleLoopingPolicy;
use glam::{Quat, Vec3};

use crate::bitset;
use crate::error::InitError;

use super::blob::{CompressedTracks, SegmentInfo};
use super::decode::{self, Kind};
use super::settings::{DecompressionSettings, RoundingPolicy};
use super::track_writer::TrackWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Bound,
    Seeked,
}

#[derive(Debug, Clone, Copy)]
struct ResolvedKeyframe {
    segment_index: usize,
    local_sample_index: usize,
}

/// Where a sub-track's kind-specific sections live within one segment, plus
/// the bit geometry needed to locate any sample's animated block. Built once per `(segment, kind)` pair a decode needs rather than
/// once per sub-track.
struct KindLayout<'a> {
    format: &'a [u8],
    range: &'a [u8],
    clip_range: &'a [u8],
    count: usize,
    base_bit: usize,
    bits_before: usize,
    pose_bit_size: usize,
}

/// A bound, seekable view over one compressed clip. Generic over
/// [`DecompressionSettings`] so format/version support checks happen once at
/// `initialize` time rather than per sample.
pub struct DecompressionContext<'a, S: DecompressionSettings = super::settings::DefaultDecompressionSettings> {
    state: State,
    tracks: Option<CompressedTracks<'a>>,
    segments: Vec<SegmentInfo>,
    key0: Option<ResolvedKeyframe>,
    key1: Option<ResolvedKeyframe>,
    alpha: f32,
    _settings: PhantomData<S>,
}

impl<'a, S: DecompressionSettings> Default for DecompressionContext<'a, S> {
    fn default() -> Self {
        Self {
            state: State::Uninitialized,
            tracks: None,
            segments: Vec::new(),
            key0: None,
            key1: None,
            alpha: 0.0,
            _settings: PhantomData,
        }
    }
}

impl<'a, S: DecompressionSettings> DecompressionContext<'a, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once a blob has been successfully bound, regardless of whether
    /// `seek` has run yet.
    pub fn is_valid(&self) -> bool {
        self.tracks.is_some()
    }

    /// `true` until the first successful `seek` -- decompressing before then
    /// would read stale or absent keyframes.
    pub fn is_dirty(&self) -> bool {
        self.state != State::Seeked
    }

    /// Validates and binds `bytes`, checking the format/version predicates
    /// `S` declares. Rebinding resets any prior `seek`.
    pub fn initialize(&mut self, bytes: &'a [u8], check_hash: bool) -> Result<(), InitError> {
        let tracks = CompressedTracks::bind(bytes, check_hash)?;

        if !S::version_supported().accepts(tracks.version()) {
            let expected = match S::version_supported() {
                super::settings::VersionSupported::Only(v) => v,
                super::settings::VersionSupported::Any => tracks.version(),
            };
            return Err(InitError::UnsupportedVersion { found: tracks.version(), expected });
        }
        if !S::is_track_type_supported(acl_format::TrackType::Qvvf)
            || !S::is_rotation_format_supported(tracks.rotation_format())
            || !S::is_translation_format_supported(tracks.translation_format())
            || !S::is_scale_format_supported(tracks.scale_format())
        {
            return Err(InitError::BadTag);
        }

        let segments = tracks.segment_infos()?;

        self.tracks = Some(tracks);
        self.segments = segments;
        self.state = State::Bound;
        self.key0 = None;
        self.key1 = None;
        self.alpha = 0.0;
        Ok(())
    }

    /// Resolves `sample_time` (seconds) to the two surrounding keyframes,
    /// porting `original_source`'s `find_linear_interpolation_samples`:
    /// the clamp policy never reads past the last stored sample, the wrap
    /// policy treats the clip as circular (the looping optimizer already
    /// dropped the sample that would have duplicated sample 0).
    pub fn seek(&mut self, sample_time: f32, rounding_policy: RoundingPolicy) -> Result<(), InitError> {
        let tracks = self.tracks.as_ref().ok_or(InitError::TooSmall)?;
        let num_samples = tracks.num_samples();
        let sample_rate = tracks.sample_rate();

        if num_samples == 0 || sample_rate <= 0.0 {
            self.key0 = None;
            self.key1 = None;
            self.alpha = 0.0;
            self.state = State::Seeked;
            return Ok(());
        }
        if num_samples == 1 {
            let key = self.resolve_keyframe(0);
            self.key0 = Some(key);
            self.key1 = Some(key);
            self.alpha = 0.0;
            self.state = State::Seeked;
            return Ok(());
        }

        let wrap = tracks.looping_policy() == SampleLoopingPolicy::Wrap;

        let (mut key0_index, mut key1_index, mut alpha) = if wrap {
            let duration = num_samples as f32 / sample_rate;
            let t = sample_time.rem_euclid(duration.max(f32::MIN_POSITIVE));
            let unit = t * sample_rate;
            let key0 = unit.floor() as usize % num_samples;
            let key1 = (key0 + 1) % num_samples;
            (key0, key1, unit.fract())
        } else {
            let duration = (num_samples - 1) as f32 / sample_rate;
            let t = if S::clamp_sample_time() { sample_time.clamp(0.0, duration) } else { sample_time };
            let unit = (t * sample_rate).clamp(0.0, (num_samples - 1) as f32);
            let key0 = (unit.floor() as usize).min(num_samples - 1);
            let key1 = (key0 + 1).min(num_samples - 1);
            let alpha = if key1 > key0 { unit.fract() } else { 0.0 };
            (key0, key1, alpha)
        };

        match rounding_policy {
            RoundingPolicy::None => {}
            RoundingPolicy::Floor => {
                key1_index = key0_index;
                alpha = 0.0;
            }
            RoundingPolicy::Ceil => {
                key0_index = key1_index;
                alpha = 0.0;
            }
            RoundingPolicy::Nearest => {
                if alpha >= 0.5 {
                    key0_index = key1_index;
                }
                alpha = 0.0;
            }
        }

        self.key0 = Some(self.resolve_keyframe(key0_index));
        self.key1 = Some(self.resolve_keyframe(key1_index));
        self.alpha = alpha;
        self.state = State::Seeked;
        Ok(())
    }

    fn resolve_keyframe(&self, clip_sample_index: usize) -> ResolvedKeyframe {
        let segment_index = self
            .segments
            .partition_point(|s| (s.clip_sample_offset as usize) <= clip_sample_index)
            .saturating_sub(1);
        let segment = &self.segments[segment_index];
        ResolvedKeyframe {
            segment_index,
            local_sample_index: clip_sample_index - segment.clip_sample_offset as usize,
        }
    }

    /// Decodes every output track's pose at the keyframes resolved by the
    /// most recent `seek`, writing through `writer` in output-track order.
    pub fn decompress_tracks(&self, writer: &mut impl TrackWriter) {
        let Some(tracks) = self.tracks.as_ref() else { return };
        if self.is_dirty() {
            return;
        }

        let stride = tracks.bitset_stride();
        let has_scale = tracks.has_scale();
        let default_bytes = tracks.default_bitset_bytes();
        let constant_bytes = tracks.constant_bitset_bytes();

        let mut tally = [0usize; 3]; // constant local index per kind (rotation, translation, scale)
        let mut anim_tally = [0usize; 3]; // animated local index per kind

        for slot in 0..tracks.num_tracks() {
            let base = slot * stride;

            if !writer.skip_rotations() {
                let value = self.decode_rotation_lane(
                    tracks, default_bytes, constant_bytes, base,
                    &mut tally[0], &mut anim_tally[0], writer.get_variable_default_rotation(slot),
                );
                writer.write_rotation(slot, value);
            } else {
                Self::advance_lane(default_bytes, constant_bytes, base, &mut tally[0], &mut anim_tally[0]);
            }

            if !writer.skip_translations() {
                let value = self.decode_lane(
                    tracks, default_bytes, constant_bytes, base + 1, 1, Kind::Translation,
                    &mut tally[1], &mut anim_tally[1], writer.get_variable_default_translation(slot),
                );
                writer.write_translation(slot, value);
            } else {
                Self::advance_lane(default_bytes, constant_bytes, base + 1, &mut tally[1], &mut anim_tally[1]);
            }

            if has_scale {
                if !writer.skip_scales() {
                    let fallback = if tracks.default_scale_is_one() { Vec3::ONE } else { Vec3::ZERO };
                    let default_override = writer.get_variable_default_scale(slot).or(Some(fallback));
                    let value = self.decode_lane(
                        tracks, default_bytes, constant_bytes, base + 2, 2, Kind::Scale,
                        &mut tally[2], &mut anim_tally[2], default_override,
                    );
                    writer.write_scale(slot, value);
                } else {
                    Self::advance_lane(default_bytes, constant_bytes, base + 2, &mut tally[2], &mut anim_tally[2]);
                }
            }
        }
    }

    /// Random-access decode of a single output track, independent of any
    /// other track. Locates this track's constant/animated
    /// local index by popcounting the bitsets up to `track_index`, the same
    /// cost `decompress_tracks` amortizes into a running tally.
    pub fn decompress_track(&self, track_index: usize, writer: &mut impl TrackWriter) {
        let Some(tracks) = self.tracks.as_ref() else { return };
        if self.is_dirty() || track_index >= tracks.num_tracks() {
            return;
        }

        let stride = tracks.bitset_stride();
        let has_scale = tracks.has_scale();
        let default_bytes = tracks.default_bitset_bytes();
        let constant_bytes = tracks.constant_bitset_bytes();
        let base = track_index * stride;

        if !writer.skip_rotations() {
            let mut const_idx = bitset::count_lane_ones_before_in_bytes(constant_bytes, stride, 0, track_index);
            let default_const_before = bitset::count_lane_ones_before_in_bytes(default_bytes, stride, 0, track_index);
            let mut anim_idx = track_index - const_idx - default_const_before;
            let value = self.decode_rotation_lane(
                tracks, default_bytes, constant_bytes, base,
                &mut const_idx, &mut anim_idx, writer.get_variable_default_rotation(track_index),
            );
            writer.write_rotation(track_index, value);
        }

        if !writer.skip_translations() {
            let mut const_idx = bitset::count_lane_ones_before_in_bytes(constant_bytes, stride, 1, track_index);
            let default_const_before = bitset::count_lane_ones_before_in_bytes(default_bytes, stride, 1, track_index);
            let mut anim_idx = track_index - const_idx - default_const_before;
            let value = self.decode_lane(
                tracks, default_bytes, constant_bytes, base + 1, 1, Kind::Translation,
                &mut const_idx, &mut anim_idx, writer.get_variable_default_translation(track_index),
            );
            writer.write_translation(track_index, value);
        }

        if has_scale && !writer.skip_scales() {
            let mut const_idx = bitset::count_lane_ones_before_in_bytes(constant_bytes, stride, 2, track_index);
            let default_const_before = bitset::count_lane_ones_before_in_bytes(default_bytes, stride, 2, track_index);
            let mut anim_idx = track_index - const_idx - default_const_before;
            let fallback = if tracks.default_scale_is_one() { Vec3::ONE } else { Vec3::ZERO };
            let default_override = writer.get_variable_default_scale(track_index).or(Some(fallback));
            let value = self.decode_lane(
                tracks, default_bytes, constant_bytes, base + 2, 2, Kind::Scale,
                &mut const_idx, &mut anim_idx, default_override,
            );
            writer.write_scale(track_index, value);
        }
    }

    /// Advances the running per-kind tallies for a slot a caller chose to
    /// skip, without reading any track data -- keeps later slots' tallies
    /// correct even when their own sub-track is never decoded.
    fn advance_lane(default_bytes: &[u8], constant_bytes: &[u8], bit_index: usize, const_idx: &mut usize, anim_idx: &mut usize) {
        if bitset::get_bit_in_bytes(default_bytes, bit_index) {
            return;
        }
        if bitset::get_bit_in_bytes(constant_bytes, bit_index) {
            *const_idx += 1;
        } else {
            *anim_idx += 1;
        }
    }

    /// Decodes one translation/scale sub-track: default (from
    /// `default_override`), constant (one stored sample, never
    /// interpolated), or animated (lerped between the keyframes resolved by
    /// `seek`). `const_idx`/`anim_idx` are advanced in place so a caller can
    /// thread them across successive slots or seed them once
    /// for random access.
    fn decode_lane(
        &self,
        tracks: &CompressedTracks<'a>,
        default_bytes: &[u8],
        constant_bytes: &[u8],
        bit_index: usize,
        lane: usize,
        kind: Kind,
        const_idx: &mut usize,
        anim_idx: &mut usize,
        default_override: Option<Vec3>,
    ) -> Vec3 {
        if bitset::get_bit_in_bytes(default_bytes, bit_index) {
            return default_override.unwrap_or(Vec3::ZERO);
        }

        if bitset::get_bit_in_bytes(constant_bytes, bit_index) {
            let local_index = *const_idx;
            *const_idx += 1;
            let region = self.constant_region(tracks, constant_bytes, lane);
            return decode::read_constant_vec3(region, region_count(region, 12), local_index);
        }

        let local_index = *anim_idx;
        *anim_idx += 1;

        let key0 = self.key0.expect("seek ran before decode");
        let key1 = self.key1.expect("seek ran before decode");

        let v0 = self.decode_animated_sample(tracks, kind, local_index, key0);
        if key0.segment_index == key1.segment_index && key0.local_sample_index == key1.local_sample_index {
            return v0;
        }
        let v1 = self.decode_animated_sample(tracks, kind, local_index, key1);
        v0.lerp(v1, self.alpha)
    }

    /// Decodes one rotation sub-track. Separate from [`Self::decode_lane`]
    /// because rotation needs a short-arc quaternion lerp rather than an
    /// independent per-component lerp of `(x, y, z)`.
    fn decode_rotation_lane(
        &self,
        tracks: &CompressedTracks<'a>,
        default_bytes: &[u8],
        constant_bytes: &[u8],
        bit_index: usize,
        const_idx: &mut usize,
        anim_idx: &mut usize,
        default_override: Option<Quat>,
    ) -> Quat {
        if bitset::get_bit_in_bytes(default_bytes, bit_index) {
            return default_override.unwrap_or(Quat::IDENTITY);
        }

        if bitset::get_bit_in_bytes(constant_bytes, bit_index) {
            let local_index = *const_idx;
            *const_idx += 1;
            let region = self.constant_region(tracks, constant_bytes, 0);
            let xyz = decode::read_constant_vec3(region, region_count(region, 12), local_index);
            return decode::quat_from_xyz(xyz);
        }

        let local_index = *anim_idx;
        *anim_idx += 1;

        let key0 = self.key0.expect("seek ran before decode");
        let key1 = self.key1.expect("seek ran before decode");

        let q0 = decode::quat_from_xyz(self.decode_animated_sample(tracks, Kind::Rotation, local_index, key0));
        if key0.segment_index == key1.segment_index && key0.local_sample_index == key1.local_sample_index {
            return q0;
        }
        let q1 = decode::quat_from_xyz(self.decode_animated_sample(tracks, Kind::Rotation, local_index, key1));
        decode::lerp_rotation(q0, q1, self.alpha, S::normalize_rotations())
    }

    /// Byte slice holding every constant entry for `lane` (rotation=0,
    /// translation=1, scale=2), laid out contiguously after the previous
    /// lanes' entries.
    fn constant_region(&self, tracks: &CompressedTracks<'a>, constant_bytes: &[u8], lane: usize) -> &'a [u8] {
        let stride = tracks.bitset_stride();
        let num_tracks = tracks.num_tracks();
        let rot_count = bitset::count_lane_ones_before_in_bytes(constant_bytes, stride, 0, num_tracks);
        let trans_count = bitset::count_lane_ones_before_in_bytes(constant_bytes, stride, 1, num_tracks);
        let scale_count = bitset::count_lane_ones_before_in_bytes(constant_bytes, stride, 2, num_tracks);

        let data = tracks.constant_data_bytes();
        let rot_bytes = rot_count * 12;
        let trans_bytes = trans_count * 12;
        let scale_bytes = scale_count * 12;

        match lane {
            0 => &data[0..rot_bytes],
            1 => &data[rot_bytes..rot_bytes + trans_bytes],
            _ => {
                let _ = scale_bytes;
                &data[rot_bytes + trans_bytes..]
            }
        }
    }

    fn decode_animated_sample(&self, tracks: &CompressedTracks<'a>, kind: Kind, local_index: usize, key: ResolvedKeyframe) -> Vec3 {
        let segment = &self.segments[key.segment_index];
        let layout = self.kind_layout(tracks, segment, kind);

        let format_byte = layout.format[local_index];
        let sample_bit_start = layout.base_bit + layout.bits_before + key.local_sample_index * layout.pose_bit_size;

        let x = decode::read_animated_component(tracks.bytes(), sample_bit_start, layout.format, local_index, 0);
        let y = decode::read_animated_component(tracks.bytes(), sample_bit_start, layout.format, local_index, 1);
        let z = decode::read_animated_component(tracks.bytes(), sample_bit_start, layout.format, local_index, 2);
        let fraction = Vec3::new(x, y, z);

        if format_byte == BIT_RATE_RAW {
            return fraction;
        }

        let segment_range = decode::read_segment_range(layout.range, layout.count, local_index);
        let clip_range = decode::read_clip_range(layout.clip_range, local_index);
        decode::denormalize(fraction, segment_range, clip_range)
    }

    fn kind_layout(&self, tracks: &CompressedTracks<'a>, segment: &SegmentInfo, kind: Kind) -> KindLayout<'a> {
        let rot_count = tracks.num_animated_rotation();
        let trans_count = tracks.num_animated_translation();
        let scale_count = tracks.num_animated_scale();
        let rot_padded = align_to(rot_count, decode::GROUP_SIZE);
        let trans_padded = align_to(trans_count, decode::GROUP_SIZE);

        let bytes = tracks.bytes();
        let format_base = segment.format_offset as usize;
        let range_base = segment.range_offset as usize;
        let clip_range = tracks.clip_range_bytes();

        let (format, range, clip_range, count, bits_before) = match kind {
            Kind::Rotation => (
                &bytes[format_base..format_base + rot_count],
                range_base_slice(bytes, range_base, 0, rot_count),
                &clip_range[0..rot_count * 24],
                rot_count,
                0usize,
            ),
            Kind::Translation => {
                let rot_format = &bytes[format_base..format_base + rot_count];
                (
                    &bytes[format_base + rot_padded..format_base + rot_padded + trans_count],
                    range_base_slice(bytes, range_base, rot_count * 6, trans_count),
                    &clip_range[rot_count * 24..rot_count * 24 + trans_count * 24],
                    trans_count,
                    decode::kind_total_bits(rot_format),
                )
            }
            Kind::Scale => {
                let rot_format = &bytes[format_base..format_base + rot_count];
                let trans_format = &bytes[format_base + rot_padded..format_base + rot_padded + trans_count];
                (
                    &bytes[format_base + rot_padded + trans_padded..format_base + rot_padded + trans_padded + scale_count],
                    range_base_slice(bytes, range_base, rot_count * 6 + trans_count * 6, scale_count),
                    &clip_range[rot_count * 24 + trans_count * 24..],
                    scale_count,
                    decode::kind_total_bits(rot_format) + decode::kind_total_bits(trans_format),
                )
            }
        };

        KindLayout {
            format,
            range,
            clip_range,
            count,
            base_bit: segment.animated_offset as usize * 8,
            bits_before,
            pose_bit_size: segment.animated_pose_bit_size as usize,
        }
    }
}

fn range_base_slice(bytes: &[u8], range_base: usize, offset: usize, count: usize) -> &[u8] {
    let start = range_base + offset;
    &bytes[start..start + count * 6]
}

fn region_count(region: &[u8], entry_size: usize) -> usize {
    region.len() / entry_size
}
