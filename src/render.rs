//! Label/value listings for display.
//!
//! Every listing is an ordered `Vec<(String, String)>`. Command listings
//! always start with `Command` and `Size`; numeric offsets, sizes and
//! addresses are written as uppercase hex with a `0x` prefix.

use std::fmt::UpperHex;

use crate::commands::{CommandPayload, LoadCommand};
use crate::constants::{flag_names, Lookup, Platform};
use crate::image::ParsedImage;

pub type DisplayList = Vec<(String, String)>;

fn hex(value: impl UpperHex) -> String {
    format!("0x{:X}", value)
}

fn push(list: &mut DisplayList, label: &str, value: String) {
    list.push((label.to_string(), value));
}

/// `xxxx.yy.zz` packed version.
fn version(packed: u32) -> String {
    format!(
        "{}.{}.{}",
        packed >> 16,
        (packed >> 8) & 0xff,
        packed & 0xff
    )
}

/// `a.b.c.d.e` packed as 24/10/10/10/10 bits.
fn source_version(packed: u64) -> String {
    let mask = 0x3ff;
    format!(
        "{}.{}.{}.{}.{}",
        packed >> 40,
        (packed >> 30) & mask,
        (packed >> 20) & mask,
        (packed >> 10) & mask,
        packed & mask
    )
}

impl LoadCommand {
    pub fn display_fields(&self) -> DisplayList {
        let mut list = DisplayList::new();
        push(&mut list, "Command", self.kind().to_string());
        push(&mut list, "Size", self.cmdsize.to_string());

        match &self.payload {
            CommandPayload::Segment(seg) => {
                push(&mut list, "Segment Name", seg.name.clone());
                push(&mut list, "File Offset", hex(seg.fileoff));
                push(&mut list, "File Size", hex(seg.filesize));
                push(&mut list, "VM Address", hex(seg.vmaddr));
                push(&mut list, "VM Size", hex(seg.vmsize));
                push(&mut list, "Max Protection", hex(seg.maxprot));
                push(&mut list, "Initial Protection", hex(seg.initprot));
                push(&mut list, "Sections", seg.nsects.to_string());
                push(&mut list, "Flags", hex(seg.flags));
            }
            CommandPayload::Segment64(seg) => {
                push(&mut list, "Segment Name", seg.name.clone());
                push(&mut list, "File Offset", hex(seg.fileoff));
                push(&mut list, "File Size", hex(seg.filesize));
                push(&mut list, "VM Address", hex(seg.vmaddr));
                push(&mut list, "VM Size", hex(seg.vmsize));
                push(&mut list, "Max Protection", hex(seg.maxprot));
                push(&mut list, "Initial Protection", hex(seg.initprot));
                push(&mut list, "Sections", seg.nsects.to_string());
                push(&mut list, "Flags", hex(seg.flags));
            }
            CommandPayload::DyldInfo(info) => {
                push(&mut list, "Rebase Offset", hex(info.rebase.offset));
                push(&mut list, "Rebase Size", hex(info.rebase.size));
                push(&mut list, "Bind Offset", hex(info.bind.offset));
                push(&mut list, "Bind Size", hex(info.bind.size));
                push(&mut list, "Lazy Bind Offset", hex(info.lazy_bind.offset));
                push(&mut list, "Lazy Bind Size", hex(info.lazy_bind.size));
                push(&mut list, "Weak Bind Offset", hex(info.weak_bind.offset));
                push(&mut list, "Weak Bind Size", hex(info.weak_bind.size));
                push(&mut list, "Export Offset", hex(info.export.offset));
                push(&mut list, "Export Size", hex(info.export.size));
            }
            CommandPayload::Uuid(uuid) => {
                push(&mut list, "UUID", format!("{:X}", uuid.hyphenated()));
            }
            CommandPayload::Dylib(path) | CommandPayload::Dylinker(path) => {
                push(&mut list, "Path", path.path.clone());
            }
            CommandPayload::EntryPoint(entry) => {
                push(&mut list, "Entry Offset", hex(entry.entryoff));
                push(&mut list, "Stack Size", hex(entry.stacksize));
            }
            CommandPayload::LinkeditData(data) => {
                push(&mut list, "Data Offset", hex(data.dataoff));
                push(&mut list, "Data Size", hex(data.datasize));
            }
            CommandPayload::VersionMin(min) => {
                push(&mut list, "Version", version(min.version));
                push(&mut list, "SDK", version(min.sdk));
            }
            CommandPayload::BuildVersion(build) => {
                let platform = match Platform::lookup(build.platform) {
                    Lookup::Known(platform) => platform.to_string(),
                    Lookup::Unknown(raw) => hex(raw),
                };
                push(&mut list, "Platform", platform);
                push(&mut list, "Minimum OS", version(build.minos));
                push(&mut list, "SDK", version(build.sdk));
                push(&mut list, "Tools", build.ntools.to_string());
            }
            CommandPayload::SourceVersion(packed) => {
                push(&mut list, "Version", source_version(*packed));
            }
            CommandPayload::EncryptionInfo(info) => {
                push(&mut list, "Crypt Offset", hex(info.cryptoff));
                push(&mut list, "Crypt Size", hex(info.cryptsize));
                push(&mut list, "Crypt ID", info.cryptid.to_string());
            }
            CommandPayload::Unrecognized(_) => {}
        }
        list
    }
}

impl ParsedImage {
    pub fn header_fields(&self) -> DisplayList {
        let mut list = DisplayList::new();
        push(&mut list, "CPU", self.cpu_type.to_string());
        push(&mut list, "CPU Subtype", self.cpu_subtype.to_string());
        push(&mut list, "File Type", self.file_type.to_string());
        push(&mut list, "Commands", self.header.command_count.to_string());
        push(&mut list, "Commands Size", hex(self.header.commands_byte_size));
        push(&mut list, "Flags", hex(self.header.flags));
        push(&mut list, "Flag Names", flag_names(self.header.flags).join("|"));
        list
    }
}
