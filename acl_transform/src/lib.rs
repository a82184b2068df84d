//! # acl_transform
//!
//! Compression and runtime decompression for transform (QVV) animation
//! tracks, on top of the blob layout `acl_format` describes.
//!
//! ## Getting started
//! ```no_run
//! use acl_transform::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let tracks: TrackArray = unimplemented!();
//! let settings = CompressionSettings::default();
//! let clip = compress(&tracks, &settings, None)?;
//!
//! let mut context = DecompressionContext::<DefaultDecompressionSettings>::new();
//! context.initialize(clip.as_bytes(), true)?;
//! context.seek(0.0, RoundingPolicy::None)?;
//!
//! let mut pose = PoseBuffer::new(tracks.num_output_tracks());
//! context.decompress_tracks(&mut pose);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module layout
//! - [`track`]/[`transform`]: the raw input model.
//! - [`clip_context`]/[`segment_context`]/[`segmenter`]: the clip working
//!   copy the compressor operates on and splits into segments.
//! - [`shell_metric`]/[`compaction`]/[`range`]/[`bit_rate_selector`]: the
//!   error-measurement and quantization pipeline.
//! - [`looping`]/[`additive`]: the looping and additive-base optimizations
//!.
//! - [`writer`]: assembles the final blob.
//! - [`decompression`]: binds a blob and answers `seek`/`decompress_*` calls
//!.
//! - [`bitset`]/[`bitutils`]: shared bit-level primitives.
//! - [`fp`]: the scoped FP-exception-guard stand-in.
//! - [`error`]: the compression/decompression error types.

pub mod additive;
pub mod bit_rate_selector;
pub mod bitset;
pub mod bitutils;
pub mod clip_context;
pub mod compaction;
pub mod decompression;
pub mod error;
pub mod fp;
pub mod looping;
pub mod range;
pub mod segment_context;
pub mod segmenter;
pub mod shell_metric;
pub mod track;
pub mod transform;
pub mod writer;

/// Common imports for compressing and decompressing a clip.
pub mod prelude {
    pub use crate::decompression::{
        CompressedTracks, DecompressionContext, DecompressionSettings, DefaultDecompressionSettings,
        PoseBuffer, RoundingPolicy, TrackWriter, VersionSupported,
    };
    pub use crate::error::{CompressionError, InitError};
    pub use crate::track::{RawTransformTrack, TrackArray, TrackDescription};
    pub use crate::transform::Transform;
    pub use crate::writer::{compress, CompressedClip, CompressionSettings};
}
