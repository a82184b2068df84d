//! Additive clip composition.
//!
//! Used only at *compression* time, to measure object-space error against a
//! base clip. The decompressor never composes: additive deltas are handed
//! back to the consumer untouched.

use acl_format::AdditiveFormat;

use crate::clip_context::ClipContext;
use crate::transform::Transform;

/// Composes a clip's local (additive delta) transform onto a base transform,
/// following the convention named by `format`. `Relative` performs no
/// composition: it marks a clip that simply isn't additive, carried through
/// so callers can share one code path for both additive and non-additive
/// clips.
pub fn apply_additive_to_base(format: AdditiveFormat, base: Transform, local: Transform) -> Transform {
    match format {
        AdditiveFormat::Relative => local,
        // local layered on top of the base: base supplies the outer frame.
        AdditiveFormat::Additive0 => local.compose(&base),
        // base layered on top of the local delta: the legacy ordering kept
        // around for clips authored against it.
        AdditiveFormat::Additive1 => base.compose(&local),
    }
}

/// Maps a raw clip sample index to the nearest sample of `base`'s timeline,
/// using the uniform-rate nearest-sample rule `rigid_shell_utils.h` uses for
/// error measurement (no interpolation against the base).
pub fn nearest_base_sample_index(clip: &ClipContext, base: &ClipContext, sample_index: usize) -> usize {
    let base_num_samples = base.num_samples();
    if base_num_samples <= 1 {
        return 0;
    }

    let raw_duration = clip.duration();
    let sample_time = (sample_index as f32 / clip.sample_rate).min(raw_duration.max(0.0));
    let normalized_sample_time = if raw_duration > 0.0 {
        sample_time / raw_duration
    } else {
        0.0
    };
    let additive_sample_time = normalized_sample_time * base.duration();
    let key = (additive_sample_time * base.sample_rate).round();
    (key.max(0.0) as usize).min(base_num_samples - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn relative_format_is_a_no_op() {
        let local = Transform::new(Quat::from_rotation_y(1.0), Vec3::new(1.0, 0.0, 0.0), Vec3::ONE);
        let base = Transform::new(Quat::from_rotation_x(0.5), Vec3::ZERO, Vec3::splat(2.0));
        let composed = apply_additive_to_base(AdditiveFormat::Relative, base, local);
        assert_eq!(composed, local);
    }
}
