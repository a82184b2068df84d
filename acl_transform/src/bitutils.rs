//! Arbitrary-bit-width sample packing, used for the animated data stream.
//!
//! `BitReader`/`BitWriter` are built on `bitvec`'s `load_le`/`store_le`,
//! extended with float helpers and a `bit_position` accessor the
//! decompressor needs to compute keyframe byte/bit offsets.

use bitvec::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitReadError {
    #[error("not enough bits remaining in the buffer")]
    NotEnoughBits,
}

pub struct BitReader<'a> {
    bits: &'a BitSlice<u8, Lsb0>,
    index: usize,
}

impl<'a> BitReader<'a> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self {
            bits: BitSlice::from_slice(bytes),
            index: 0,
        }
    }

    pub fn with_bit_offset(bytes: &'a [u8], bit_offset: usize) -> Self {
        Self {
            bits: BitSlice::from_slice(bytes),
            index: bit_offset,
        }
    }

    pub fn bit_position(&self) -> usize {
        self.index
    }

    pub fn seek_bits(&mut self, bit_offset: usize) {
        self.index = bit_offset;
    }

    pub fn skip(&mut self, bit_count: usize) {
        self.index += bit_count;
    }

    pub fn read_u8(&mut self, bit_count: usize) -> Result<u8, BitReadError> {
        self.load(bit_count)
    }

    pub fn read_u32(&mut self, bit_count: usize) -> Result<u32, BitReadError> {
        self.load(bit_count)
    }

    pub fn read_bit(&mut self) -> Result<bool, BitReadError> {
        let value = self
            .bits
            .get(self.index)
            .as_deref()
            .copied()
            .ok_or(BitReadError::NotEnoughBits)?;
        self.index += 1;
        Ok(value)
    }

    /// Reads a raw little-endian `f32`, used for the `raw` bit rate which
    /// bypasses range reduction entirely.
    pub fn read_f32(&mut self) -> Result<f32, BitReadError> {
        let bits: u32 = self.load(32)?;
        Ok(f32::from_bits(bits))
    }

    fn load<T: bitvec::field::BitField>(&mut self, bit_count: usize) -> Result<T, BitReadError> {
        let value = self
            .bits
            .get(self.index..self.index + bit_count)
            .ok_or(BitReadError::NotEnoughBits)?
            .load_le();
        self.index += bit_count;
        Ok(value)
    }
}

pub struct BitWriter {
    bits: BitVec<u8, Lsb0>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self { bits: BitVec::new() }
    }

    pub fn bit_position(&self) -> usize {
        self.bits.len()
    }

    pub fn write(&mut self, value: u32, bit_count: usize) {
        let start = self.bits.len();
        self.bits.resize(start + bit_count, false);
        self.bits[start..start + bit_count].store_le(value);
    }

    pub fn write_bit(&mut self, value: bool) {
        self.bits.push(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write(value.to_bits(), 32);
    }

    /// Pads with zero bits up to the next byte boundary, matching the
    /// writer's requirement that each segment's animated data ends on a byte
    /// boundary.
    pub fn pad_to_byte(&mut self) {
        let remainder = self.bits.len() % 8;
        if remainder != 0 {
            self.bits.resize(self.bits.len() + (8 - remainder), false);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bits.into_vec()
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_bits() {
        let mut reader = BitReader::from_slice(&[0b1011]);
        assert!(reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
    }

    #[test]
    fn read_past_end() {
        let mut reader = BitReader::from_slice(&[0u8]);
        reader.read_u32(8).unwrap();
        assert_eq!(reader.read_bit(), Err(BitReadError::NotEnoughBits));
    }

    #[test]
    fn round_trip_u32() {
        let mut writer = BitWriter::new();
        writer.write(0b1_1001, 5);
        writer.write(123, 8);
        let bytes = writer.into_bytes();

        let mut reader = BitReader::from_slice(&bytes);
        assert_eq!(reader.read_u32(5).unwrap(), 0b1_1001);
        assert_eq!(reader.read_u32(8).unwrap(), 123);
    }

    #[test]
    fn round_trip_f32() {
        let mut writer = BitWriter::new();
        writer.write_f32(1.5);
        let bytes = writer.into_bytes();

        let mut reader = BitReader::from_slice(&bytes);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
    }

    #[test]
    fn pad_to_byte_rounds_up() {
        let mut writer = BitWriter::new();
        writer.write(1, 3);
        writer.pad_to_byte();
        assert_eq!(writer.bit_position(), 8);
    }
}
