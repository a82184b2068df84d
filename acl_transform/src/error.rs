//! Error types for the compression and runtime decompression boundaries
//!.

use thiserror::Error;

/// Errors surfaced while turning a [`crate::track::TrackArray`] into a
/// compressed blob. Compression aborts the whole request on the first error;
/// no partial blob is ever produced.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("track array has no tracks")]
    NoTracks,

    #[error("track array has no samples")]
    NoSamples,

    #[error("sample rate {0} is not finite or not positive")]
    InvalidSampleRate(f32),

    #[error("track {track_index} has parent index {parent_index}, but only {num_tracks} tracks exist")]
    InvalidParentIndex {
        track_index: usize,
        parent_index: usize,
        num_tracks: usize,
    },

    #[error("track {track_index} is its own ancestor, forming a cycle")]
    CyclicHierarchy { track_index: usize },

    #[error("output index {output_index} is used by both track {first_track} and track {second_track}")]
    DuplicateOutputIndex {
        output_index: usize,
        first_track: usize,
        second_track: usize,
    },

    #[error("output indices are not contiguous from zero: {0} is missing")]
    NonContiguousOutputIndices(usize),

    #[error("track {track_index} sample {sample_index} contains a non-finite value")]
    NonFiniteSample {
        track_index: usize,
        sample_index: usize,
    },

    #[error("looping optimization and constant sanitization require an error metric, but settings.error_metric is None")]
    MissingErrorMetric,

    #[error("additive format {0:?} is not supported for a non-transform track type")]
    UnsupportedAdditiveFormat(acl_format::AdditiveFormat),
}

/// Errors surfaced while binding a [`crate::decompression::DecompressionContext`]
/// to a blob.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    #[error("blob pointer is not 16-byte aligned")]
    BadAlignment,

    #[error("blob does not start with the expected magic tag")]
    BadTag,

    #[error("blob version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("blob hash does not match its recorded value")]
    HashMismatch,

    #[error("blob is too small to contain a valid header")]
    TooSmall,
}
