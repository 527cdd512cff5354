//! Read-only decoding of Mach-O images and universal containers.
//!
//! [`parse`] takes a borrowed buffer and returns owned values describing
//! each architecture slice: its header, validated cpu and file types, and
//! the typed load commands in file order. Nothing returned borrows from the
//! input.
//!
//! ```no_run
//! let data = std::fs::read("/bin/ls").unwrap();
//! for image in &macho_inspector::parse(&data).unwrap() {
//!     println!("{}", image.cpu_type);
//!     for command in &image.commands {
//!         for (label, value) in command.display_fields() {
//!             println!("  {label}: {value}");
//!         }
//!     }
//! }
//! ```
//!
//! Thin images are read in host byte order.

pub mod commands;
pub mod constants;
mod cursor;
pub mod error;
mod fat;
pub mod header;
mod image;
pub mod render;
mod walk;

pub use commands::{CommandPayload, LoadCommand};
pub use constants::{CpuSubType, CpuType, FileType, LoadCommandType, Lookup};
pub use error::{ParseError, Result};
pub use fat::{
    parse, parse_file, parse_file_permissive, parse_permissive, ParsedImageSet, SliceOutcome,
};
pub use header::{ArchSlice, ImageHeader};
pub use image::ParsedImage;
pub use render::DisplayList;
