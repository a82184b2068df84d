//! # acl_format
//!
//! Binary layout primitives for the compressed animation transform track
//! blob: fixed-size headers, the bit-rate table, and the enums/flags that
//! tag a blob's on-disk formats.
//!
//! This crate knows nothing about compression or decompression algorithms --
//! that lives in `acl_transform`, the same way `ssbh_lib` only describes a
//! file's byte layout while `ssbh_data` implements the conversions on top of
//! it.

pub mod bit_rate;
pub mod enums;
pub mod header;
pub mod vectors;

pub use enums::{
    AdditiveFormat, AlgorithmType, RotationFormat, SampleLoopingPolicy, TracksHeaderFlags,
    TrackType, VectorFormat,
};
pub use header::{RawBufferHeader, SegmentHeader, TracksHeader, TransformTracksHeader};
pub use vectors::{Vector3, Vector4};
