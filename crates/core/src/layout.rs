//! Bounds-checked reads over an untrusted segment snapshot.
//!
//! Producers publish packed little-endian structs. Nothing here trusts the
//! offsets a header declares: every read goes through [`SegmentCursor`],
//! which refuses any step past the end of the snapshot, and text fields are
//! copied out into owned [`FixedText`] buffers rather than borrowed.

use std::fmt;

use encoding_rs::Encoding;

use crate::error::DecodeError;
use crate::text;

/// A fixed-size record laid out back to back with no padding.
pub trait FixedRecord: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode one record. The cursor holds at least [`Self::SIZE`] bytes.
    fn read(cursor: &mut SegmentCursor<'_>) -> Result<Self, DecodeError>;
}

/// Read a `T` at `offset`, failing if `offset + T::SIZE` exceeds `bytes`.
pub fn read_fixed<T: FixedRecord>(bytes: &[u8], offset: u64) -> Result<T, DecodeError> {
    let mut cursor = SegmentCursor::at(bytes, offset)?;
    if cursor.remaining() < T::SIZE {
        return Err(DecodeError::OutOfBounds {
            offset,
            size: T::SIZE,
            len: bytes.len(),
        });
    }
    T::read(&mut cursor)
}

/// Forward-only reader over a byte slice with an explicit position.
#[derive(Debug, Clone)]
pub struct SegmentCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SegmentCursor<'a> {
    /// Position a cursor at `offset`. An offset past the end is rejected.
    pub fn at(bytes: &'a [u8], offset: u64) -> Result<Self, DecodeError> {
        let pos = usize::try_from(offset)
            .ok()
            .filter(|&pos| pos <= bytes.len())
            .ok_or(DecodeError::OutOfBounds {
                offset,
                size: 0,
                len: bytes.len(),
            })?;
        Ok(Self { bytes, pos })
    }

    /// Current absolute position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the position and the end of the slice.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Copy the next `N` bytes out and advance.
    pub fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self
            .pos
            .checked_add(N)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::OutOfBounds {
                offset: self.pos as u64,
                size: N,
                len: self.bytes.len(),
            })?;

        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    pub fn read_text<const N: usize>(&mut self) -> Result<FixedText<N>, DecodeError> {
        self.take::<N>().map(FixedText)
    }
}

/// Owned copy of a fixed-capacity text field that may lack a terminator.
#[derive(Clone, PartialEq, Eq)]
pub struct FixedText<const N: usize>([u8; N]);

impl<const N: usize> FixedText<N> {
    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Copy `bytes` into a zero-padded buffer, truncating past `N`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; N];
        let len = bytes.len().min(N);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Decode with the default legacy fallback (Windows-1252).
    pub fn to_text(&self) -> String {
        text::decode_fixed_text(&self.0)
    }

    /// Decode, falling back to `legacy` when the bytes are not UTF-8.
    pub fn to_text_with(&self, legacy: &'static Encoding) -> String {
        text::decode_fixed_text_with(&self.0, legacy)
    }
}

impl<const N: usize> fmt::Debug for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedText<{N}>({:?})", self.to_text())
    }
}
