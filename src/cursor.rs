//! Bounds-checked reading over a borrowed byte view.

use crate::error::{ParseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endian = Endian::Little;
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endian = Endian::Big;
}

/// A read position over `data`. Every read checks the remaining length
/// first and fails with [`ParseError::OutOfBounds`] instead of panicking.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'data> {
    data: &'data [u8],
    pos: usize,
    endian: Endian,
}

macro_rules! read_int {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self) -> Result<$type> {
            let bytes = self.array::<{ std::mem::size_of::<$type>() }>()?;
            Ok(match self.endian {
                Endian::Little => <$type>::from_le_bytes(bytes),
                Endian::Big => <$type>::from_be_bytes(bytes),
            })
        }
    };
}

impl<'data> Cursor<'data> {
    pub fn new(data: &'data [u8]) -> Self {
        Self::with_endian(data, Endian::NATIVE)
    }

    pub fn with_endian(data: &'data [u8], endian: Endian) -> Self {
        Cursor {
            data,
            pos: 0,
            endian,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Moves to an absolute position. Seeking to exactly the end is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(ParseError::OutOfBounds {
                offset: pos,
                size: 0,
                len: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.bytes(count).map(|_| ())
    }

    pub fn bytes(&mut self, count: usize) -> Result<&'data [u8]> {
        let out_of_bounds = || ParseError::OutOfBounds {
            offset: self.pos,
            size: count,
            len: self.data.len(),
        };
        let end = self.pos.checked_add(count).ok_or_else(out_of_bounds)?;
        let bytes = self.data.get(self.pos..end).ok_or_else(out_of_bounds)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    read_int!(u32, u32);
    read_int!(i32, i32);
    read_int!(u64, u64);
}
