//! Scoped floating-point exception guard.
//!
//! The reference decompressor wraps hot loops in a `scope_disable_fp_exceptions`
//! RAII guard that masks hardware FP traps for the duration of the call. Rust
//! floats never raise a hardware trap to begin with (there is no portable
//! `SIGFPE`-on-NaN equivalent this crate could disable), so the guard below is
//! a zero-cost stand-in kept purely for the shape of the API: a settings-gated
//! acquire/release scope a caller can still rely on if a future target adds
//! real trapping-FPU support.

/// Acquired for the duration of a decompression or compression call when
/// [`crate::decompression::DecompressionSettings::disable_fp_exceptions`]
/// (or the compression-time equivalent) asks for it. Does nothing on any
/// platform Rust currently targets; see the module doc for why.
pub struct FpExceptionGuard;

impl FpExceptionGuard {
    #[inline]
    pub fn scoped(enabled: bool) -> Option<Self> {
        enabled.then_some(Self)
    }
}
