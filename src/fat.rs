//! Universal ("fat") container handling and the top-level entry points.

use std::path::Path;

use log::{debug, warn};

use crate::cursor::Cursor;
use crate::error::{ParseError, Result};
use crate::header::{ArchSlice, FatHeader};
use crate::image::ParsedImage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImageSet {
    pub is_fat: bool,
    pub images: Vec<ParsedImage>,
}

impl ParsedImageSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsedImage> {
        self.images.iter()
    }
}

impl<'a> IntoIterator for &'a ParsedImageSet {
    type Item = &'a ParsedImage;
    type IntoIter = std::slice::Iter<'a, ParsedImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

#[derive(Debug)]
pub struct SliceOutcome {
    /// `None` for a thin buffer.
    pub arch: Option<ArchSlice>,
    pub result: Result<ParsedImage>,
}

fn read_arches(data: &[u8]) -> Result<Option<Vec<ArchSlice>>> {
    let Some(header) = FatHeader::parse(data)? else {
        return Ok(None);
    };
    debug!(
        "fat container ({}), {} architectures",
        if header.is_64 { "64-bit" } else { "32-bit" },
        header.arch_count
    );

    let mut cursor = Cursor::with_endian(data, header.endian);
    cursor.seek(FatHeader::SIZE)?;
    let room = (cursor.len() - FatHeader::SIZE) / header.arch_size();
    let mut arches = Vec::with_capacity((header.arch_count as usize).min(room));
    for _ in 0..header.arch_count {
        arches.push(ArchSlice::parse(&mut cursor, header.is_64)?);
    }
    Ok(Some(arches))
}

fn slice_bytes<'data>(data: &'data [u8], arch: &ArchSlice) -> Result<&'data [u8]> {
    let out_of_bounds = || ParseError::OutOfBounds {
        offset: usize::try_from(arch.offset).unwrap_or(usize::MAX),
        size: usize::try_from(arch.size).unwrap_or(usize::MAX),
        len: data.len(),
    };
    let start = usize::try_from(arch.offset).map_err(|_| out_of_bounds())?;
    let size = usize::try_from(arch.size).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(size).ok_or_else(out_of_bounds)?;
    data.get(start..end).ok_or_else(out_of_bounds)
}

fn parse_slice(data: &[u8], arch: ArchSlice) -> Result<ParsedImage> {
    let mut image = ParsedImage::parse(slice_bytes(data, &arch)?)?;
    image.arch = Some(arch);
    Ok(image)
}

/// Decodes every image in `data`, failing on the first slice that does not
/// decode.
pub fn parse(data: &[u8]) -> Result<ParsedImageSet> {
    match read_arches(data)? {
        None => Ok(ParsedImageSet {
            is_fat: false,
            images: vec![ParsedImage::parse(data)?],
        }),
        Some(arches) => {
            let images = arches
                .into_iter()
                .map(|arch| parse_slice(data, arch))
                .collect::<Result<Vec<_>>>()?;
            Ok(ParsedImageSet {
                is_fat: true,
                images,
            })
        }
    }
}

/// Decodes every image in `data`, reporting each slice's result separately.
///
/// Only a malformed container header fails the whole call; a slice that
/// does not decode is reported next to the ones that do.
pub fn parse_permissive(data: &[u8]) -> Result<Vec<SliceOutcome>> {
    let outcomes = match read_arches(data)? {
        None => vec![SliceOutcome {
            arch: None,
            result: ParsedImage::parse(data),
        }],
        Some(arches) => arches
            .into_iter()
            .map(|arch| SliceOutcome {
                arch: Some(arch),
                result: parse_slice(data, arch),
            })
            .collect(),
    };
    for (index, outcome) in outcomes.iter().enumerate() {
        if let Err(err) = &outcome.result {
            warn!("slice {} failed to decode: {}", index, err);
        }
    }
    Ok(outcomes)
}

/// Reads `path` into memory and decodes it with [`parse`]. Nothing from the
/// file is retained beyond the returned values.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedImageSet> {
    let data = read_file(path.as_ref())?;
    parse(&data)
}

pub fn parse_file_permissive(path: impl AsRef<Path>) -> Result<Vec<SliceOutcome>> {
    let data = read_file(path.as_ref())?;
    parse_permissive(&data)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ParseError::UnableToOpenFile {
        path: path.to_path_buf(),
        source,
    })
}
