use binrw::BinRead;
use modular_bitfield::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The compression algorithm used to lay out a compressed blob.
///
/// Only one algorithm exists today; the tag is kept so that a future format
/// revision can coexist with blobs already in the wild.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[br(repr = u8)]
pub enum AlgorithmType {
    #[default]
    UniformlySampled = 0,
}

/// What kind of sub-tracks a blob stores per track.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[br(repr = u8)]
pub enum TrackType {
    #[default]
    Qvvf = 0,
}

/// On-disk representation of a rotation sub-track.
///
/// `QuatFull` stores all four components at 32 bits each and bypasses range
/// reduction entirely; it exists as a reference point for `raw` compression
///.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[br(repr = u8)]
pub enum RotationFormat {
    QuatFull = 0,
    QuatDropWFull = 1,
    #[default]
    QuatDropWVariable = 2,
}

impl AlgorithmType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AlgorithmType::UniformlySampled),
            _ => None,
        }
    }
}

impl TrackType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TrackType::Qvvf),
            _ => None,
        }
    }
}

impl RotationFormat {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RotationFormat::QuatFull),
            1 => Some(RotationFormat::QuatDropWFull),
            2 => Some(RotationFormat::QuatDropWVariable),
            _ => None,
        }
    }

    pub const fn is_variable(self) -> bool {
        matches!(self, RotationFormat::QuatDropWVariable)
    }

    pub const fn is_raw(self) -> bool {
        matches!(self, RotationFormat::QuatFull)
    }

    /// Number of stored float components before any bit packing (w is dropped
    /// for the two `DropW` formats and reconstructed on decode).
    pub const fn num_stored_components(self) -> usize {
        match self {
            RotationFormat::QuatFull => 4,
            RotationFormat::QuatDropWFull | RotationFormat::QuatDropWVariable => 3,
        }
    }
}

/// On-disk representation of a translation or scale sub-track.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[br(repr = u8)]
pub enum VectorFormat {
    Vector3Full = 0,
    #[default]
    Vector3Variable = 1,
}

impl VectorFormat {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(VectorFormat::Vector3Full),
            1 => Some(VectorFormat::Vector3Variable),
            _ => None,
        }
    }

    pub const fn is_variable(self) -> bool {
        matches!(self, VectorFormat::Vector3Variable)
    }

    pub const fn is_raw(self) -> bool {
        matches!(self, VectorFormat::Vector3Full)
    }
}

/// How a clip's samples should be composed with a base clip at playback.
///
/// The decompressor never performs this composition itself;
/// the tag is carried purely as metadata for the consumer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[br(repr = u8)]
pub enum AdditiveFormat {
    #[default]
    Relative = 0,
    Additive0 = 1,
    Additive1 = 2,
}

/// Whether the final sample of a clip aliases the first at sample time
/// `num_samples`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier, Default)]
#[bits = 1]
pub enum SampleLoopingPolicy {
    #[default]
    Clamp = 0,
    Wrap = 1,
}

/// Flags packed into the tracks header.
#[bitfield(bits = 8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TracksHeaderFlags {
    pub has_scale: bool,
    /// When unset, a stripped scale sub-track defaults to `1.0` (identity
    /// scale); when set, it defaults to `0.0`, matching additive formats that
    /// expect a zeroed scale delta.
    pub default_scale_is_one: bool,
    pub looping_policy: SampleLoopingPolicy,
    #[skip]
    __: B5,
}

impl SampleLoopingPolicy {
    pub const fn from_bit(value: bool) -> Self {
        if value {
            SampleLoopingPolicy::Wrap
        } else {
            SampleLoopingPolicy::Clamp
        }
    }
}

acl_format_bitfield_binrw_impl!(TracksHeaderFlags, 1);

/// `modular_bitfield` structs are plain `Specifier`s, not `BinRead`; derive the
/// glue by hand the same way `ssbh_write_modular_bitfield_impl!` does for
/// `ssbh_lib`'s `CompressionFlags`.
#[macro_export]
macro_rules! acl_format_bitfield_binrw_impl {
    ($ty:ty, $num_bytes:expr) => {
        impl binrw::BinRead for $ty {
            type Args = ();

            fn read_options<R: binrw::io::Read + binrw::io::Seek>(
                reader: &mut R,
                _options: &binrw::ReadOptions,
                _args: Self::Args,
            ) -> binrw::BinResult<Self> {
                let mut bytes = [0u8; $num_bytes];
                reader.read_exact(&mut bytes)?;
                Ok(<$ty>::from_bytes(bytes))
            }
        }

        impl binrw::BinWrite for $ty {
            type Args = ();

            fn write_options<W: binrw::io::Write + binrw::io::Seek>(
                &self,
                writer: &mut W,
                _options: &binrw::WriteOptions,
                _args: Self::Args,
            ) -> binrw::BinResult<()> {
                writer.write_all(&self.into_bytes())?;
                Ok(())
            }
        }
    };
}

pub use acl_format_bitfield_binrw_impl;
