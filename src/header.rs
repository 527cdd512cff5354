//! Fixed-layout records at the start of a container or an image.

use crate::constants::{
    FAT_CIGAM, FAT_CIGAM_64, FAT_MAGIC, FAT_MAGIC_64, MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64,
};
use crate::cursor::{Cursor, Endian};
use crate::error::Result;

/// `mach_header` / `mach_header_64`, read in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub cpu_type: i32,
    pub cpu_subtype: i32,
    pub file_type: u32,
    pub command_count: u32,
    pub commands_byte_size: u32,
    pub flags: u32,
    /// Only present in 64-bit headers.
    pub reserved: Option<u32>,
}

impl ImageHeader {
    pub const SIZE_32: usize = 28;
    pub const SIZE_64: usize = 32;

    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let magic = cursor.u32()?;
        let cpu_type = cursor.i32()?;
        let cpu_subtype = cursor.i32()?;
        let file_type = cursor.u32()?;
        let command_count = cursor.u32()?;
        let commands_byte_size = cursor.u32()?;
        let flags = cursor.u32()?;
        let reserved = if is_32bit_magic(magic) {
            None
        } else {
            Some(cursor.u32()?)
        };
        Ok(ImageHeader {
            magic,
            cpu_type,
            cpu_subtype,
            file_type,
            command_count,
            commands_byte_size,
            flags,
            reserved,
        })
    }

    /// Offset of the first load command within the image. The command region
    /// follows a 32-byte lead-in for both header variants; a 32-bit header
    /// leaves its last four bytes unread.
    pub fn commands_offset(&self) -> usize {
        Self::SIZE_64
    }

    pub fn is_64(&self) -> bool {
        matches!(self.magic, MH_MAGIC_64 | MH_CIGAM_64)
    }
}

fn is_32bit_magic(magic: u32) -> bool {
    matches!(magic, MH_MAGIC | MH_CIGAM)
}

/// `fat_header`. The byte order is whichever order the magic matched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FatHeader {
    pub is_64: bool,
    pub endian: Endian,
    pub arch_count: u32,
}

impl FatHeader {
    pub const SIZE: usize = 8;

    /// Returns `None` when `data` does not start with a fat magic.
    pub fn probe(data: &[u8]) -> Option<Self> {
        let magic: [u8; 4] = data.get(..4)?.try_into().ok()?;
        let (is_64, endian) = match u32::from_be_bytes(magic) {
            FAT_MAGIC => (false, Endian::Big),
            FAT_CIGAM => (false, Endian::Little),
            FAT_MAGIC_64 => (true, Endian::Big),
            FAT_CIGAM_64 => (true, Endian::Little),
            _ => return None,
        };
        Some(FatHeader {
            is_64,
            endian,
            arch_count: 0,
        })
    }

    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        let Some(mut header) = Self::probe(data) else {
            return Ok(None);
        };
        let mut cursor = Cursor::with_endian(data, header.endian);
        cursor.skip(4)?;
        header.arch_count = cursor.u32()?;
        Ok(Some(header))
    }

    pub fn arch_size(&self) -> usize {
        if self.is_64 {
            ArchSlice::SIZE_64
        } else {
            ArchSlice::SIZE_32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchSlice {
    pub cpu_type: i32,
    pub cpu_subtype: i32,
    pub offset: u64,
    pub size: u64,
    pub align: u32,
}

impl ArchSlice {
    pub const SIZE_32: usize = 20;
    pub const SIZE_64: usize = 32;

    pub(crate) fn parse(cursor: &mut Cursor<'_>, is_64: bool) -> Result<Self> {
        let cpu_type = cursor.i32()?;
        let cpu_subtype = cursor.i32()?;
        let (offset, size) = if is_64 {
            (cursor.u64()?, cursor.u64()?)
        } else {
            (u64::from(cursor.u32()?), u64::from(cursor.u32()?))
        };
        let align = cursor.u32()?;
        if is_64 {
            // reserved
            cursor.skip(4)?;
        }
        Ok(ArchSlice {
            cpu_type,
            cpu_subtype,
            offset,
            size,
            align,
        })
    }
}
