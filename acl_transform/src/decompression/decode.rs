//! Bit- and byte-level reconstruction shared by the sequential track-cache
//! decode and the single-track random-access path.
//!
//! Every helper here is a pure function over borrowed byte slices: nothing
//! allocates on the hot path.

use acl_format::bit_rate::{self, BIT_RATE_RAW};
use glam::{Quat, Vec3};

use crate::bitutils::BitReader;
use crate::segment_context::RangeF32;

/// Which of a track's three sub-tracks a plane belongs to; also selects its
/// matching range table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Rotation,
    Translation,
    Scale,
}

pub(crate) const GROUP_SIZE: usize = 4;

/// Reads one animated sub-track's raw (un-range-reduced) `[x, y, z]` for one
/// sample, given the absolute bit offset of this kind's block for this
/// sample within the blob.
///
/// `format_bytes` is the full per-kind format-byte slice for this segment
/// (real entries only, no group padding); `local_index` is this sub-track's
/// 0-based position among the kind's animated entries, same order the
/// writer used (`writer::animated_indices`, output-index order).
pub(crate) fn read_animated_component(
    bytes: &[u8],
    kind_bit_start: usize,
    format_bytes: &[u8],
    local_index: usize,
    component: usize,
) -> f32 {
    let bit_rate = format_bytes[local_index];
    let num_bits = bit_rate::num_bits_at_bit_rate(bit_rate).unwrap_or(32);

    let group_start = (local_index / GROUP_SIZE) * GROUP_SIZE;
    let pos = local_index - group_start;
    let group_len = format_bytes.len().min(group_start + GROUP_SIZE) - group_start;
    let group_widths: Vec<u32> = (0..group_len)
        .map(|j| bit_rate::num_bits_at_bit_rate(format_bytes[group_start + j]).unwrap_or(32) as u32)
        .collect();

    let mut group_bit_offset = 0u32;
    let mut g = 0usize;
    while g < group_start {
        let len = format_bytes.len().min(g + GROUP_SIZE) - g;
        let w: u32 = (0..len)
            .map(|j| bit_rate::num_bits_at_bit_rate(format_bytes[g + j]).unwrap_or(32) as u32)
            .sum();
        group_bit_offset += 3 * w;
        g += GROUP_SIZE;
    }

    let prefix: u32 = group_widths[..pos].iter().sum();
    let plane_width: u32 = group_widths.iter().sum();
    let plane_offset = match component {
        0 => prefix,
        1 => plane_width + prefix,
        _ => 2 * plane_width + prefix,
    };

    let bit_offset = kind_bit_start + group_bit_offset as usize + plane_offset as usize;

    if bit_rate == BIT_RATE_RAW {
        let mut reader = BitReader::with_bit_offset(bytes, bit_offset);
        return reader.read_f32().expect("raw component within segment bounds");
    }
    if num_bits == 0 {
        // `BIT_RATE_RAW` aside, a zero-bit entry stores nothing -- its value
        // is exactly the segment range's minimum for this component.
        return 0.0;
    }

    let mut reader = BitReader::with_bit_offset(bytes, bit_offset);
    let quantized = reader.read_u32(num_bits as usize).expect("component within segment bounds");
    let max_value = ((1u32 << num_bits) - 1) as f32;
    quantized as f32 / max_value
}

/// Total bits one kind's animated block occupies per sample, i.e. the offset
/// at which the *next* kind's block begins within a pose.
pub(crate) fn kind_total_bits(format_bytes: &[u8]) -> usize {
    3 * format_bytes
        .iter()
        .map(|&rate| bit_rate::num_bits_at_bit_rate(rate).unwrap_or(32) as usize)
        .sum::<usize>()
}

/// Denormalizes a fraction decoded by [`read_animated_component`] back
/// through the segment-local then clip-wide range.
/// Not applied when the sub-track was raw (the value is already in object
/// units).
pub(crate) fn denormalize(fraction: Vec3, segment_range: RangeF32, clip_range: RangeF32) -> Vec3 {
    clip_range.denormalize(segment_range.denormalize(fraction))
}

/// Reconstructs `w` from `(x, y, z)` under the positive-hemisphere
/// convention `rotation_xyz` used when compressing.
pub(crate) fn quat_from_xyz(xyz: Vec3) -> Quat {
    let w_sq = 1.0 - xyz.length_squared();
    let w = w_sq.max(0.0).sqrt();
    Quat::from_xyzw(xyz.x, xyz.y, xyz.z, w)
}

/// Short-arc quaternion lerp, matching [`crate::transform::Transform::lerp`]:
/// flips `b` into `a`'s hemisphere before blending so the interpolation never
/// takes the long way around.
pub(crate) fn lerp_rotation(a: Quat, b: Quat, alpha: f32, normalize: bool) -> Quat {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    let q = a.lerp(b, alpha);
    if normalize {
        q.normalize()
    } else {
        q
    }
}

/// Reads one constant sub-track's `[x, y, z]` (12 bytes/entry, SoA-by-4, no
/// padding on a partial final group -- mirrors `writer::write_soa_groups_f32`).
pub(crate) fn read_constant_vec3(bytes: &[u8], count: usize, local_index: usize) -> Vec3 {
    let group_start = (local_index / GROUP_SIZE) * GROUP_SIZE;
    let pos = local_index - group_start;
    let group_len = count.min(group_start + GROUP_SIZE) - group_start;
    let group_byte_start = (group_start / GROUP_SIZE) * (GROUP_SIZE * 4 * 3);

    let read_f32 = |offset: usize| -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    };

    let x = read_f32(group_byte_start + pos * 4);
    let y = read_f32(group_byte_start + group_len * 4 + pos * 4);
    let z = read_f32(group_byte_start + 2 * group_len * 4 + pos * 4);
    Vec3::new(x, y, z)
}

/// Reads one animated sub-track's segment-local range (6 bytes/entry,
/// quantized to `u8`, SoA-by-4 -- mirrors `writer::write_segment_range_group`).
pub(crate) fn read_segment_range(bytes: &[u8], count: usize, local_index: usize) -> RangeF32 {
    let group_start = (local_index / GROUP_SIZE) * GROUP_SIZE;
    let pos = local_index - group_start;
    let group_len = count.min(group_start + GROUP_SIZE) - group_start;
    let group_byte_start = (group_start / GROUP_SIZE) * (GROUP_SIZE * 6);

    let unquantize = |byte: u8| byte as f32 / 255.0;
    let at = |plane: usize| -> f32 { unquantize(bytes[group_byte_start + plane * group_len + pos]) };

    RangeF32 {
        min: Vec3::new(at(0), at(1), at(2)),
        extent: Vec3::new(at(3), at(4), at(5)),
    }
}

/// Reads one animated sub-track's clip-wide range (24 bytes/entry, plain
/// sequential `f32` pairs, no SoA grouping -- mirrors `writer::push_range`).
pub(crate) fn read_clip_range(bytes: &[u8], local_index: usize) -> RangeF32 {
    let base = local_index * 24;
    let read_f32 = |offset: usize| -> f32 {
        f32::from_le_bytes(bytes[base + offset..base + offset + 4].try_into().unwrap())
    };
    RangeF32 {
        min: Vec3::new(read_f32(0), read_f32(4), read_f32(8)),
        extent: Vec3::new(read_f32(12), read_f32(16), read_f32(20)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitutils::BitWriter;

    #[test]
    fn animated_component_round_trips_through_bit_rates() {
        // Two sub-tracks in one group: widths 5 and 8 bits.
        let format_bytes = [bit_rate::intermediate_bit_rates().nth(3).unwrap(), bit_rate::intermediate_bit_rates().nth(6).unwrap()];
        let w0 = bit_rate::num_bits_at_bit_rate(format_bytes[0]).unwrap();
        let w1 = bit_rate::num_bits_at_bit_rate(format_bytes[1]).unwrap();

        let mut writer = BitWriter::new();
        // x0, x1, y0, y1, z0, z1
        writer.write(3, w0 as usize);
        writer.write(5, w1 as usize);
        writer.write(7, w0 as usize);
        writer.write(11, w1 as usize);
        writer.write(13, w0 as usize);
        writer.write(17, w1 as usize);
        let bytes = writer.into_bytes();

        let max0 = ((1u32 << w0) - 1) as f32;
        let max1 = ((1u32 << w1) - 1) as f32;

        assert_eq!(read_animated_component(&bytes, 0, &format_bytes, 0, 0), 3.0 / max0);
        assert_eq!(read_animated_component(&bytes, 0, &format_bytes, 1, 0), 5.0 / max1);
        assert_eq!(read_animated_component(&bytes, 0, &format_bytes, 0, 1), 7.0 / max0);
        assert_eq!(read_animated_component(&bytes, 0, &format_bytes, 1, 1), 11.0 / max1);
        assert_eq!(read_animated_component(&bytes, 0, &format_bytes, 0, 2), 13.0 / max0);
        assert_eq!(read_animated_component(&bytes, 0, &format_bytes, 1, 2), 17.0 / max1);
    }

    #[test]
    fn quat_from_xyz_reconstructs_identity() {
        let q = quat_from_xyz(Vec3::ZERO);
        assert_eq!(q, Quat::IDENTITY);
    }

    #[test]
    fn constant_vec3_round_trips_partial_group() {
        // 5 constant entries: one full group of 4, one partial group of 1.
        let values = [
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
            Vec3::new(10.0, 11.0, 12.0),
            Vec3::new(13.0, 14.0, 15.0),
        ];
        let mut bytes = Vec::new();
        for group in values.chunks(GROUP_SIZE) {
            for v in group {
                bytes.extend_from_slice(&v.x.to_le_bytes());
            }
            for v in group {
                bytes.extend_from_slice(&v.y.to_le_bytes());
            }
            for v in group {
                bytes.extend_from_slice(&v.z.to_le_bytes());
            }
        }

        for (i, expected) in values.iter().enumerate() {
            assert_eq!(read_constant_vec3(&bytes, values.len(), i), *expected);
        }
    }
}
