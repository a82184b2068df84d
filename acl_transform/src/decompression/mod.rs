//! Runtime decompression of a compressed transform-track blob.
//!
//! Grounded on `original_source/includes/acl/decompression/decompress.h`: a
//! [`DecompressionContext`] binds to a blob once, then answers repeated
//! `seek`/`decompress_tracks`/`decompress_track` calls without reallocating.

mod blob;
mod context;
mod decode;
mod settings;
mod track_writer;

pub use blob::CompressedTracks;
pub use context::DecompressionContext;
pub use settings::{DecompressionSettings, DefaultDecompressionSettings, RoundingPolicy, VersionSupported};
pub use track_writer::{PoseBuffer, TrackWriter};
