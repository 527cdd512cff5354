//! Decoding a single-architecture image.

use log::debug;

use crate::commands::LoadCommand;
use crate::constants::{CpuSubType, CpuType, FileType, CPU_SUBTYPE_FEATURE_MASK};
use crate::error::{ParseError, Result};
use crate::header::{ArchSlice, ImageHeader};
use crate::walk::decode_commands;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImage {
    /// The fat descriptor this image came from, if any.
    pub arch: Option<ArchSlice>,
    pub header: ImageHeader,
    pub cpu_type: CpuType,
    pub cpu_subtype: CpuSubType,
    pub file_type: FileType,
    pub commands: Vec<LoadCommand>,
}

impl ParsedImage {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = ImageHeader::parse(data)?;
        let cpu_type = CpuType::lookup(header.cpu_type).or_else_raw(ParseError::UnknownCpuType)?;
        let cpu_subtype =
            CpuSubType::lookup(header.cpu_subtype).or_else_raw(ParseError::UnknownCpuSubType)?;
        let file_type = FileType::lookup(header.file_type).or_else_raw(ParseError::UnknownFileType)?;
        debug!(
            "{} {} image with {} load commands ({} bytes)",
            cpu_type.arch_name(),
            file_type,
            header.command_count,
            header.commands_byte_size
        );

        let commands = decode_commands(
            data,
            header.commands_offset(),
            header.command_count,
            header.commands_byte_size,
        )?;

        Ok(ParsedImage {
            arch: None,
            header,
            cpu_type,
            cpu_subtype,
            file_type,
            commands,
        })
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    /// Whether the subtype carried the capability bit.
    pub fn has_subtype_feature_bit(&self) -> bool {
        self.header.cpu_subtype & CPU_SUBTYPE_FEATURE_MASK != 0
    }
}
