//! Error type returned by every decoding entry point.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while decoding a Mach-O buffer.
///
/// Offsets are relative to the view being read when the error was raised:
/// the whole buffer for container-level failures, the slice for header and
/// walk failures, and the command itself for payload failures.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unable to open {}: {source}", path.display())]
    UnableToOpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read or a slice range reaches past the end of the available bytes.
    #[error("read of {size} bytes at offset {offset:#x} exceeds {len:#x} available bytes")]
    OutOfBounds {
        offset: usize,
        size: usize,
        len: usize,
    },

    #[error("unknown cpu type {0:#x}")]
    UnknownCpuType(i32),

    /// Carries the raw subtype as read, before the feature bit is cleared.
    #[error("unknown cpu subtype {0:#x}")]
    UnknownCpuSubType(i32),

    #[error("unknown file type {0:#x}")]
    UnknownFileType(u32),

    /// A load command declares a size smaller than its own 8-byte envelope,
    /// or one that runs past the end of the command region.
    #[error("load command at offset {offset:#x} declares invalid size {size}")]
    MalformedCommandSize { offset: usize, size: u32 },

    /// The declared command sizes do not add up to `sizeofcmds`.
    #[error("load commands end at offset {actual:#x}, header declares end at {expected:#x}")]
    CommandRegionSizeMismatch { expected: usize, actual: usize },

    #[error("segment name at offset {offset:#x} is not valid UTF-8")]
    MalformedSegmentName { offset: usize },

    /// A string offset points outside its command, or the string has no terminator.
    #[error("string at offset {offset:#x} is not a terminated UTF-8 string inside its command")]
    MalformedString { offset: usize },
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;
