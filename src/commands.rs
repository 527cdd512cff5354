//! Typed load command payloads and the decoders that produce them.
//!
//! Every decoder receives exactly the bytes of one command, envelope
//! included, so a payload that does not fit in the declared `cmdsize`
//! fails with [`ParseError::OutOfBounds`] and string offsets can never
//! reach into a neighbouring command.

use uuid::Uuid;

use crate::constants::{LoadCommandType, Lookup};
use crate::cursor::Cursor;
use crate::error::{ParseError, Result};

/// Size of the `cmd`/`cmdsize` pair every command starts with.
pub const ENVELOPE_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCommand {
    pub cmd: u32,
    /// Declared size in bytes, envelope included.
    pub cmdsize: u32,
    pub offset: usize,
    pub payload: CommandPayload,
}

impl LoadCommand {
    pub fn kind(&self) -> Lookup<LoadCommandType, u32> {
        LoadCommandType::lookup(self.cmd)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPayload {
    Segment(SegmentCommand),
    Segment64(Segment64Command),
    Uuid(Uuid),
    /// `LC_LOAD_DYLIB` and the other commands naming a library or search path.
    Dylib(PathCommand),
    /// `LC_LOAD_DYLINKER`, `LC_ID_DYLINKER` and `LC_DYLD_ENVIRONMENT`.
    Dylinker(PathCommand),
    DyldInfo(DyldInfoCommand),
    EntryPoint(EntryPointCommand),
    LinkeditData(LinkeditDataCommand),
    VersionMin(VersionMinCommand),
    BuildVersion(BuildVersionCommand),
    SourceVersion(u64),
    EncryptionInfo(EncryptionInfoCommand),
    /// Any command kind without a decoder, including unknown type tags.
    Unrecognized(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCommand {
    pub name: String,
    pub vmaddr: u32,
    pub vmsize: u32,
    pub fileoff: u32,
    pub filesize: u32,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment64Command {
    pub name: String,
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCommand {
    /// Offset of the string from the start of the command.
    pub path_offset: u32,
    pub path: String,
}

/// An `{offset, size}` pair into `__LINKEDIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableRange {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DyldInfoCommand {
    pub rebase: TableRange,
    pub bind: TableRange,
    pub weak_bind: TableRange,
    pub lazy_bind: TableRange,
    pub export: TableRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPointCommand {
    pub entryoff: u64,
    pub stacksize: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkeditDataCommand {
    pub dataoff: u32,
    pub datasize: u32,
}

/// Versions are packed as `xxxx.yy.zz` nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionMinCommand {
    pub version: u32,
    pub sdk: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildVersionCommand {
    pub platform: u32,
    pub minos: u32,
    pub sdk: u32,
    pub ntools: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionInfoCommand {
    pub cryptoff: u32,
    pub cryptsize: u32,
    pub cryptid: u32,
}

type Decoder = fn(&[u8]) -> Result<CommandPayload>;

const DECODERS: &[(LoadCommandType, Decoder)] = &[
    (LoadCommandType::Segment, decode_segment),
    (LoadCommandType::Segment64, decode_segment64),
    (LoadCommandType::Uuid, decode_uuid),
    (LoadCommandType::LoadDylib, decode_dylib),
    (LoadCommandType::LoadWeakDylib, decode_dylib),
    (LoadCommandType::IdDylib, decode_dylib),
    (LoadCommandType::ReexportDylib, decode_dylib),
    (LoadCommandType::LazyLoadDylib, decode_dylib),
    (LoadCommandType::LoadUpwardDylib, decode_dylib),
    (LoadCommandType::Rpath, decode_dylib),
    (LoadCommandType::LoadDylinker, decode_dylinker),
    (LoadCommandType::IdDylinker, decode_dylinker),
    (LoadCommandType::DyldEnvironment, decode_dylinker),
    (LoadCommandType::DyldInfo, decode_dyld_info),
    (LoadCommandType::DyldInfoOnly, decode_dyld_info),
    (LoadCommandType::Main, decode_entry_point),
    (LoadCommandType::CodeSignature, decode_linkedit_data),
    (LoadCommandType::SegmentSplitInfo, decode_linkedit_data),
    (LoadCommandType::FunctionStarts, decode_linkedit_data),
    (LoadCommandType::DataInCode, decode_linkedit_data),
    (LoadCommandType::DylibCodeSignDrs, decode_linkedit_data),
    (LoadCommandType::LinkerOptimizationHint, decode_linkedit_data),
    (LoadCommandType::DyldExportsTrie, decode_linkedit_data),
    (LoadCommandType::DyldChainedFixups, decode_linkedit_data),
    (LoadCommandType::AtomInfo, decode_linkedit_data),
    (LoadCommandType::VersionMinMacosx, decode_version_min),
    (LoadCommandType::VersionMinIphoneos, decode_version_min),
    (LoadCommandType::VersionMinTvos, decode_version_min),
    (LoadCommandType::VersionMinWatchos, decode_version_min),
    (LoadCommandType::BuildVersion, decode_build_version),
    (LoadCommandType::SourceVersion, decode_source_version),
    (LoadCommandType::EncryptionInfo, decode_encryption_info),
    (LoadCommandType::EncryptionInfo64, decode_encryption_info),
];

fn decoder_for(cmd: u32) -> Option<Decoder> {
    let kind = LoadCommandType::lookup(cmd).known()?;
    DECODERS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|&(_, decoder)| decoder)
}

/// Decodes the payload of one command. `bytes` must be exactly the
/// command's declared extent.
pub(crate) fn decode_payload(cmd: u32, bytes: &[u8]) -> Result<CommandPayload> {
    match decoder_for(cmd) {
        Some(decoder) => decoder(bytes),
        None => Ok(CommandPayload::Unrecognized(cmd)),
    }
}

fn body(bytes: &[u8]) -> Result<Cursor<'_>> {
    let mut cursor = Cursor::new(bytes);
    cursor.skip(ENVELOPE_SIZE)?;
    Ok(cursor)
}

fn read_name(cursor: &mut Cursor<'_>) -> Result<String> {
    let offset = cursor.position();
    let raw = cursor.bytes(16)?;
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    std::str::from_utf8(&raw[..len])
        .map(str::to_owned)
        .map_err(|_| ParseError::MalformedSegmentName { offset })
}

/// Reads the NUL-terminated string at `offset` from the command start,
/// without looking past the end of the command.
fn read_command_string(bytes: &[u8], offset: u32) -> Result<String> {
    let malformed = || ParseError::MalformedString {
        offset: offset as usize,
    };
    let tail = bytes.get(offset as usize..).ok_or_else(malformed)?;
    let len = tail.iter().position(|&b| b == 0).ok_or_else(malformed)?;
    std::str::from_utf8(&tail[..len])
        .map(str::to_owned)
        .map_err(|_| malformed())
}

fn decode_segment(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::Segment(SegmentCommand {
        name: read_name(&mut cursor)?,
        vmaddr: cursor.u32()?,
        vmsize: cursor.u32()?,
        fileoff: cursor.u32()?,
        filesize: cursor.u32()?,
        maxprot: cursor.u32()?,
        initprot: cursor.u32()?,
        nsects: cursor.u32()?,
        flags: cursor.u32()?,
    }))
}

fn decode_segment64(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::Segment64(Segment64Command {
        name: read_name(&mut cursor)?,
        vmaddr: cursor.u64()?,
        vmsize: cursor.u64()?,
        fileoff: cursor.u64()?,
        filesize: cursor.u64()?,
        maxprot: cursor.u32()?,
        initprot: cursor.u32()?,
        nsects: cursor.u32()?,
        flags: cursor.u32()?,
    }))
}

fn decode_uuid(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::Uuid(Uuid::from_bytes(cursor.array()?)))
}

fn decode_path(bytes: &[u8]) -> Result<PathCommand> {
    let mut cursor = body(bytes)?;
    let path_offset = cursor.u32()?;
    let path = read_command_string(bytes, path_offset)?;
    Ok(PathCommand { path_offset, path })
}

fn decode_dylib(bytes: &[u8]) -> Result<CommandPayload> {
    decode_path(bytes).map(CommandPayload::Dylib)
}

fn decode_dylinker(bytes: &[u8]) -> Result<CommandPayload> {
    decode_path(bytes).map(CommandPayload::Dylinker)
}

fn decode_dyld_info(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    let mut range = || -> Result<TableRange> {
        Ok(TableRange {
            offset: cursor.u32()?,
            size: cursor.u32()?,
        })
    };
    Ok(CommandPayload::DyldInfo(DyldInfoCommand {
        rebase: range()?,
        bind: range()?,
        weak_bind: range()?,
        lazy_bind: range()?,
        export: range()?,
    }))
}

fn decode_entry_point(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::EntryPoint(EntryPointCommand {
        entryoff: cursor.u64()?,
        stacksize: cursor.u64()?,
    }))
}

fn decode_linkedit_data(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::LinkeditData(LinkeditDataCommand {
        dataoff: cursor.u32()?,
        datasize: cursor.u32()?,
    }))
}

fn decode_version_min(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::VersionMin(VersionMinCommand {
        version: cursor.u32()?,
        sdk: cursor.u32()?,
    }))
}

fn decode_build_version(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    // The tool entries that follow are not decoded.
    Ok(CommandPayload::BuildVersion(BuildVersionCommand {
        platform: cursor.u32()?,
        minos: cursor.u32()?,
        sdk: cursor.u32()?,
        ntools: cursor.u32()?,
    }))
}

fn decode_source_version(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::SourceVersion(cursor.u64()?))
}

fn decode_encryption_info(bytes: &[u8]) -> Result<CommandPayload> {
    let mut cursor = body(bytes)?;
    Ok(CommandPayload::EncryptionInfo(EncryptionInfoCommand {
        cryptoff: cursor.u32()?,
        cryptsize: cursor.u32()?,
        cryptid: cursor.u32()?,
    }))
}
