//! Compile-time decompression knobs.
//!
//! The reference expresses these as a `static constexpr` predicate struct so
//! the compiler can dead-code-eliminate unsupported formats/versions per
//! monomorphization. `DecompressionContext` is generic over a
//! `DecompressionSettings` implementor the same way; everything here
//! defaults to "support everything" so a caller only needs to override what
//! it actually wants to narrow.

use acl_format::{RotationFormat, TrackType, VectorFormat};

/// How `seek` resolves a sample time that does not land exactly on a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingPolicy {
    /// Interpolates between the two surrounding keyframes.
    #[default]
    None,
    /// Snaps down to the nearest keyframe at or before the requested time.
    Floor,
    /// Snaps up to the nearest keyframe at or after the requested time.
    Ceil,
    /// Snaps to whichever surrounding keyframe is closer in time.
    Nearest,
}

/// Which blob format versions a [`DecompressionSettings`] implementor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupported {
    Any,
    Only(u16),
}

impl VersionSupported {
    pub fn accepts(self, version: u16) -> bool {
        match self {
            VersionSupported::Any => true,
            VersionSupported::Only(expected) => expected == version,
        }
    }
}

/// Compile-time predicate set a [`crate::decompression::DecompressionContext`]
/// is generic over. Every method has a permissive default; a consumer that
/// only ever plays back e.g. `QuatDropWVariable` clips can override
/// `is_rotation_format_supported` to narrow the set the compiler has to
/// handle, the Rust analogue of the reference's per-format dead-code
/// elimination.
pub trait DecompressionSettings {
    fn clamp_sample_time() -> bool {
        true
    }

    fn is_track_type_supported(track_type: TrackType) -> bool {
        let _ = track_type;
        true
    }

    fn is_rotation_format_supported(format: RotationFormat) -> bool {
        let _ = format;
        true
    }

    fn is_translation_format_supported(format: VectorFormat) -> bool {
        let _ = format;
        true
    }

    fn is_scale_format_supported(format: VectorFormat) -> bool {
        let _ = format;
        true
    }

    /// Whether a `lerp` between two keyframes re-normalizes the interpolated
    /// quaternion. Disabling this trades a small amount
    /// of drift for one fewer `sqrt` per bone per sample.
    fn normalize_rotations() -> bool {
        true
    }

    /// Scopes FP exceptions off for the call; see
    /// [`crate::fp::FpExceptionGuard`] for why this is a no-op on every target
    /// Rust currently supports.
    fn disable_fp_exceptions() -> bool {
        true
    }

    fn version_supported() -> VersionSupported {
        VersionSupported::Any
    }
}

/// Accepts every format and version; the settings type most call sites should
/// reach for unless they have a specific reason to narrow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecompressionSettings;

impl DecompressionSettings for DefaultDecompressionSettings {}
