use std::io::Write;

use macho_inspector::constants::{CPU_SUBTYPE_FEATURE_MASK, FAT_MAGIC, MH_MAGIC, MH_MAGIC_64};
use macho_inspector::{
    parse, parse_file, parse_permissive, CommandPayload, CpuSubType, CpuType, FileType,
    LoadCommandType, ParseError,
};

const CPU_X86_64: i32 = 0x0100_0007;
const CPU_ARM64: i32 = 0x0100_000c;
const MH_EXECUTE: u32 = 2;

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn command(cmd: u32, body: &[u8]) -> Vec<u8> {
    let mut out = words(&[cmd, (8 + body.len()) as u32]);
    out.extend_from_slice(body);
    out
}

fn segment64(name: &str, vmaddr: u64, vmsize: u64, fileoff: u64, filesize: u64) -> Vec<u8> {
    let mut body = [0u8; 16].to_vec();
    body[..name.len()].copy_from_slice(name.as_bytes());
    for value in [vmaddr, vmsize, fileoff, filesize] {
        body.extend_from_slice(&value.to_ne_bytes());
    }
    body.extend(words(&[7, 5, 0, 0]));
    command(LoadCommandType::Segment64.raw(), &body)
}

fn dylib(cmd: LoadCommandType, path: &str) -> Vec<u8> {
    let mut body = words(&[24, 2, 0x0001_0000, 0x0001_0000]);
    body.extend_from_slice(path.as_bytes());
    body.push(0);
    while (8 + body.len()) % 8 != 0 {
        body.push(0);
    }
    command(cmd.raw(), &body)
}

struct Image {
    magic: u32,
    cpu_type: i32,
    cpu_subtype: i32,
    file_type: u32,
    commands: Vec<Vec<u8>>,
}

impl Image {
    fn new(cpu_type: i32, cpu_subtype: i32) -> Self {
        Image {
            magic: MH_MAGIC_64,
            cpu_type,
            cpu_subtype,
            file_type: MH_EXECUTE,
            commands: Vec::new(),
        }
    }

    fn with(mut self, command: Vec<u8>) -> Self {
        self.commands.push(command);
        self
    }

    fn build(&self) -> Vec<u8> {
        let size: usize = self.commands.iter().map(Vec::len).sum();
        let mut out = words(&[self.magic]);
        out.extend_from_slice(&self.cpu_type.to_ne_bytes());
        out.extend_from_slice(&self.cpu_subtype.to_ne_bytes());
        out.extend(words(&[
            self.file_type,
            self.commands.len() as u32,
            size as u32,
            0x0020_0085,
        ]));
        // reserved field, or padding up to the 32-byte lead-in
        out.extend(words(&[0]));
        for command in &self.commands {
            out.extend_from_slice(command);
        }
        out
    }
}

/// A big-endian universal header followed by each image at a 0x1000 boundary.
fn fat(images: &[(&Image, i32, i32)]) -> Vec<u8> {
    let mut header = FAT_MAGIC.to_be_bytes().to_vec();
    header.extend_from_slice(&(images.len() as u32).to_be_bytes());
    let mut body = Vec::new();
    let mut offset = 0x1000_usize;
    for (image, cpu_type, cpu_subtype) in images {
        let bytes = image.build();
        for field in [
            *cpu_type as u32,
            *cpu_subtype as u32,
            offset as u32,
            bytes.len() as u32,
            12,
        ] {
            header.extend_from_slice(&field.to_be_bytes());
        }
        body.push((offset, bytes));
        offset += 0x1000;
    }
    let mut out = header;
    for (offset, bytes) in body {
        out.resize(offset, 0);
        out.extend(bytes);
    }
    out
}

fn sample_image() -> Image {
    Image::new(CPU_ARM64, 0)
        .with(segment64("__PAGEZERO", 0, 0x1_0000_0000, 0, 0))
        .with(segment64("__TEXT", 0x1_0000_0000, 0x4000, 0, 0x4000))
        .with(command(LoadCommandType::Uuid.raw(), &[0x5a; 16]))
        .with(dylib(LoadCommandType::LoadDylib, "/usr/lib/libSystem.B.dylib"))
        .with(command(LoadCommandType::Main.raw(), &{
            let mut body = 0x3f40_u64.to_ne_bytes().to_vec();
            body.extend_from_slice(&0_u64.to_ne_bytes());
            body
        }))
}

#[test]
fn thin_image_commands_in_order() {
    let data = sample_image().build();
    let set = parse(&data).unwrap();
    assert!(!set.is_fat);
    assert_eq!(set.len(), 1);

    let image = &set.images[0];
    assert_eq!(image.cpu_type, CpuType::Arm64);
    assert_eq!(image.cpu_subtype, CpuSubType::Arm64All);
    assert_eq!(image.file_type, FileType::Execute);
    assert_eq!(image.flags(), 0x0020_0085);
    assert!(image.arch.is_none());

    let kinds: Vec<_> = image.commands.iter().map(|c| c.kind().known()).collect();
    assert_eq!(
        kinds,
        vec![
            Some(LoadCommandType::Segment64),
            Some(LoadCommandType::Segment64),
            Some(LoadCommandType::Uuid),
            Some(LoadCommandType::LoadDylib),
            Some(LoadCommandType::Main),
        ]
    );
    let total: u32 = image.commands.iter().map(|c| c.cmdsize).sum();
    assert_eq!(total, image.header.commands_byte_size);
    assert_eq!(image.commands[0].offset, 32);
}

#[test]
fn segment64_fields_decode_exactly() {
    let data = sample_image().build();
    let set = parse(&data).unwrap();
    match &set.images[0].commands[1].payload {
        CommandPayload::Segment64(segment) => {
            assert_eq!(segment.name, "__TEXT");
            assert_eq!(segment.vmaddr, 0x1_0000_0000);
            assert_eq!(segment.vmsize, 0x4000);
            assert_eq!(segment.fileoff, 0);
            assert_eq!(segment.filesize, 0x4000);
            assert_eq!(segment.maxprot, 7);
            assert_eq!(segment.initprot, 5);
        }
        other => panic!("expected a segment, got {:?}", other),
    }
}

#[test]
fn command_sizes_must_fill_region() {
    let image = Image::new(CPU_X86_64, 3)
        .with(command(0x7000_0001, &[0; 8]))
        .with(command(0x7000_0002, &[0xff; 16]));
    let good = image.build();
    assert_eq!(parse(&good).unwrap().images[0].commands.len(), 2);

    // Shrink the last command: the walk ends before the declared region end.
    let mut short = good.clone();
    let last_size_at = 32 + 16 + 4;
    short[last_size_at..last_size_at + 4].copy_from_slice(&16_u32.to_ne_bytes());
    assert!(matches!(
        parse(&short),
        Err(ParseError::CommandRegionSizeMismatch {
            expected: 72,
            actual: 64
        })
    ));

    // Grow the first command: the next envelope lands inside the second
    // command and claims more than the region has left.
    let mut long = good.clone();
    long[36..40].copy_from_slice(&24_u32.to_ne_bytes());
    assert!(matches!(
        parse(&long),
        Err(ParseError::MalformedCommandSize {
            offset: 56,
            size: 0xffff_ffff
        })
    ));
}

#[test]
fn command_larger_than_region() {
    let mut data = Image::new(CPU_X86_64, 3)
        .with(command(LoadCommandType::Uuid.raw(), &[0x22; 16]))
        .build();
    data[36..40].copy_from_slice(&32_u32.to_ne_bytes());
    data.extend([0; 8]);
    assert!(matches!(
        parse(&data),
        Err(ParseError::MalformedCommandSize {
            offset: 32,
            size: 32
        })
    ));
}

#[test]
fn thirty_two_bit_region_starts_at_fixed_lead_in() {
    let mut image = Image::new(7, 3).with(command(LoadCommandType::Uuid.raw(), &[0x33; 16]));
    image.magic = MH_MAGIC;
    let data = image.build();
    assert_eq!(data.len(), 32 + 24);
    let set = parse(&data).unwrap();
    let commands = &set.images[0].commands;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].offset, 32);
    assert!(matches!(commands[0].payload, CommandPayload::Uuid(_)));
}

#[test]
fn command_smaller_than_envelope() {
    let mut data = Image::new(CPU_X86_64, 3)
        .with(command(LoadCommandType::Uuid.raw(), &[0; 16]))
        .build();
    data[36..40].copy_from_slice(&4_u32.to_ne_bytes());
    assert!(matches!(
        parse(&data),
        Err(ParseError::MalformedCommandSize { offset: 32, size: 4 })
    ));
}

#[test]
fn unknown_command_does_not_abort_walk() {
    let data = Image::new(CPU_X86_64, 3)
        .with(command(0xffff_fff0, &[1, 2, 3, 4, 5, 6, 7, 8]))
        .with(dylib(LoadCommandType::Rpath, "@executable_path/../Frameworks"))
        .build();
    let set = parse(&data).unwrap();
    let commands = &set.images[0].commands;
    assert_eq!(commands[0].payload, CommandPayload::Unrecognized(0xffff_fff0));
    assert_eq!(commands[0].display_fields()[0].1, "???");
    match &commands[1].payload {
        CommandPayload::Dylib(rpath) => assert_eq!(rpath.path, "@executable_path/../Frameworks"),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn unknown_header_values_abort_the_slice() {
    let data = Image::new(0x1234, 0).build();
    assert!(matches!(parse(&data), Err(ParseError::UnknownCpuType(0x1234))));

    let mut image = Image::new(CPU_X86_64, 3);
    image.file_type = 0x99;
    assert!(matches!(
        parse(&image.build()),
        Err(ParseError::UnknownFileType(0x99))
    ));
}

#[test]
fn subtype_feature_bit_is_ignored() {
    for raw in -64..64 {
        assert_eq!(
            CpuSubType::lookup(raw).known(),
            CpuSubType::lookup(raw & !CPU_SUBTYPE_FEATURE_MASK).known()
        );
        assert_eq!(
            CpuSubType::lookup(raw | CPU_SUBTYPE_FEATURE_MASK).known(),
            CpuSubType::lookup(raw).known()
        );
    }
    let data = Image::new(CPU_X86_64, 3 | CPU_SUBTYPE_FEATURE_MASK).build();
    let set = parse(&data).unwrap();
    assert_eq!(set.images[0].cpu_subtype, CpuSubType::X86All);
    assert_eq!(set.images[0].header.cpu_subtype, 3 | CPU_SUBTYPE_FEATURE_MASK);
}

#[test]
fn dylib_string_offset_past_command() {
    let mut body = words(&[0x100, 0, 0, 0]);
    body.extend_from_slice(b"libfoo\0\0");
    let data = Image::new(CPU_X86_64, 3)
        .with(command(LoadCommandType::LoadWeakDylib.raw(), &body))
        .with(command(LoadCommandType::Uuid.raw(), &[0; 16]))
        .build();
    assert!(matches!(
        parse(&data),
        Err(ParseError::MalformedString { offset: 0x100 })
    ));
}

#[test]
fn fat_container_with_two_slices() {
    let intel = Image::new(CPU_X86_64, 3)
        .with(segment64("__TEXT", 0x1_0000_0000, 0x2000, 0, 0x2000));
    let arm = sample_image();
    let data = fat(&[(&intel, CPU_X86_64, 3), (&arm, CPU_ARM64, 0)]);

    let set = parse(&data).unwrap();
    assert!(set.is_fat);
    assert_eq!(set.len(), 2);

    let first = &set.images[0];
    assert_eq!(first.cpu_type, CpuType::X86_64);
    assert_eq!(first.commands.len(), 1);
    let arch = first.arch.unwrap();
    assert_eq!(arch.offset, 0x1000);
    assert_eq!(arch.size, intel.build().len() as u64);
    assert_eq!(arch.align, 12);

    let second = &set.images[1];
    assert_eq!(second.cpu_type, CpuType::Arm64);
    assert_eq!(second.arch.unwrap().offset, 0x2000);
    assert_eq!(second, &{
        let mut thin = parse(&arm.build()).unwrap().images.remove(0);
        thin.arch = second.arch;
        thin
    });
}

#[test]
fn fat_header_in_host_order() {
    let image = sample_image().build();
    let mut data = words(&[FAT_MAGIC, 1]);
    data.extend(words(&[CPU_ARM64 as u32, 0, 0x40, image.len() as u32, 6]));
    data.resize(0x40, 0);
    data.extend_from_slice(&image);

    let set = parse(&data).unwrap();
    assert!(set.is_fat);
    assert_eq!(set.images[0].commands.len(), 5);
}

#[test]
fn fat_slice_out_of_bounds() {
    let image = sample_image();
    let mut data = fat(&[(&image, CPU_ARM64, 0)]);
    data.truncate(data.len() - 1);
    assert!(matches!(parse(&data), Err(ParseError::OutOfBounds { .. })));
}

#[test]
fn permissive_keeps_good_slices() {
    let good = sample_image();
    let bad = Image::new(0x4242, 0);
    let data = fat(&[(&bad, 0x4242, 0), (&good, CPU_ARM64, 0)]);

    assert!(matches!(parse(&data), Err(ParseError::UnknownCpuType(0x4242))));

    let outcomes = parse_permissive(&data).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(
        outcomes[0].result,
        Err(ParseError::UnknownCpuType(0x4242))
    ));
    assert_eq!(outcomes[0].arch.unwrap().cpu_type, 0x4242);
    let image = outcomes[1].result.as_ref().unwrap();
    assert_eq!(image.commands.len(), 5);
}

#[test]
fn thirty_two_bit_image() {
    let mut body = b"__TEXT\0\0\0\0\0\0\0\0\0\0".to_vec();
    body.extend(words(&[0x1000, 0x2000, 0, 0x2000, 7, 5, 0, 0]));
    let mut image = Image::new(7, 3).with(command(LoadCommandType::Segment.raw(), &body));
    image.magic = MH_MAGIC;
    let set = parse(&image.build()).unwrap();
    let commands = &set.images[0].commands;
    assert_eq!(set.images[0].header.reserved, None);
    assert_eq!(commands[0].offset, 32);
    match &commands[0].payload {
        CommandPayload::Segment(segment) => {
            assert_eq!(segment.name, "__TEXT");
            assert_eq!(segment.vmaddr, 0x1000);
            assert_eq!(segment.filesize, 0x2000);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn rendered_listings() {
    let set = parse(&sample_image().build()).unwrap();
    let image = &set.images[0];

    for command in &image.commands {
        let list = command.display_fields();
        assert_eq!(list[0].0, "Command");
        assert_eq!(list[1], ("Size".to_string(), command.cmdsize.to_string()));
    }

    let text = image.commands[1].display_fields();
    assert!(text.contains(&("VM Address".to_string(), "0x100000000".to_string())));
    let uuid = image.commands[2].display_fields();
    assert_eq!(uuid[2].1, "5A5A5A5A-5A5A-5A5A-5A5A-5A5A5A5A5A5A");
    let path = image.commands[3].display_fields();
    assert_eq!(path[2], ("Path".to_string(), "/usr/lib/libSystem.B.dylib".to_string()));

    let header = image.header_fields();
    assert_eq!(header[0], ("CPU".to_string(), "CPU_TYPE_ARM64".to_string()));
    assert_eq!(
        header.last().unwrap().1,
        "MH_NOUNDEFS|MH_DYLDLINK|MH_TWOLEVEL|MH_PIE"
    );
}

#[test]
fn parse_file_reads_and_releases_buffer() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&sample_image().build()).unwrap();
    file.flush().unwrap();

    let set = parse_file(file.path()).unwrap();
    assert_eq!(set.images[0].commands.len(), 5);

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        parse_file(&missing),
        Err(ParseError::UnableToOpenFile { .. })
    ));
}
