//! Walking the load command region of one image.

use log::trace;

use crate::commands::{decode_payload, LoadCommand, ENVELOPE_SIZE};
use crate::cursor::Cursor;
use crate::error::{ParseError, Result};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RawCommand<'data> {
    pub cmd: u32,
    pub cmdsize: u32,
    pub offset: usize,
    /// Exactly `cmdsize` bytes, envelope included.
    pub bytes: &'data [u8],
}

/// Yields the envelope of each command in `[start, end)`, stopping after the
/// declared count or at the first error.
#[derive(Debug)]
pub(crate) struct LoadCommandWalker<'data> {
    image: &'data [u8],
    cursor: usize,
    end: usize,
    remaining: u32,
}

impl<'data> LoadCommandWalker<'data> {
    pub fn new(image: &'data [u8], start: usize, count: u32, size: u32) -> Result<Self> {
        let size = size as usize;
        let out_of_bounds = || ParseError::OutOfBounds {
            offset: start,
            size,
            len: image.len(),
        };
        let end = start.checked_add(size).ok_or_else(out_of_bounds)?;
        if end > image.len() {
            return Err(out_of_bounds());
        }
        Ok(LoadCommandWalker {
            image,
            cursor: start,
            end,
            remaining: count,
        })
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn end(&self) -> usize {
        self.end
    }

    fn malformed(&self, size: u32) -> ParseError {
        ParseError::MalformedCommandSize {
            offset: self.cursor,
            size,
        }
    }

    fn next_command(&mut self) -> Result<RawCommand<'data>> {
        let region = &self.image[..self.end];
        let room = self.end - self.cursor;
        if room < ENVELOPE_SIZE {
            // Report the declared size if the envelope is in the image at all.
            let mut envelope = Cursor::new(self.image);
            let size = envelope
                .seek(self.cursor + 4)
                .and_then(|()| envelope.u32())
                .unwrap_or(room as u32);
            return Err(self.malformed(size));
        }
        let mut envelope = Cursor::new(region);
        envelope.seek(self.cursor)?;
        let cmd = envelope.u32()?;
        let cmdsize = envelope.u32()?;
        if (cmdsize as usize) < ENVELOPE_SIZE || cmdsize as usize > room {
            return Err(self.malformed(cmdsize));
        }
        let offset = self.cursor;
        let bytes = &region[offset..offset + cmdsize as usize];
        self.cursor += cmdsize as usize;
        Ok(RawCommand {
            cmd,
            cmdsize,
            offset,
            bytes,
        })
    }
}

impl<'data> Iterator for LoadCommandWalker<'data> {
    type Item = Result<RawCommand<'data>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let result = self.next_command();
        self.remaining = if result.is_ok() { self.remaining - 1 } else { 0 };
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Every command takes at least one envelope.
        let fit = (self.end - self.cursor) / ENVELOPE_SIZE;
        (0, Some((self.remaining as usize).min(fit + 1)))
    }
}

/// Decodes `count` commands from the region starting at `start` and checks
/// that they exactly fill its declared `size`.
pub(crate) fn decode_commands(
    image: &[u8],
    start: usize,
    count: u32,
    size: u32,
) -> Result<Vec<LoadCommand>> {
    let mut walker = LoadCommandWalker::new(image, start, count, size)?;
    let mut commands = Vec::with_capacity(walker.size_hint().1.unwrap_or(0));
    for raw in walker.by_ref() {
        let raw = raw?;
        trace!(
            "load command {:#x} at {:#x}, {} bytes",
            raw.cmd,
            raw.offset,
            raw.cmdsize
        );
        commands.push(LoadCommand {
            cmd: raw.cmd,
            cmdsize: raw.cmdsize,
            offset: raw.offset,
            payload: decode_payload(raw.cmd, raw.bytes)?,
        });
    }
    if walker.position() != walker.end() {
        return Err(ParseError::CommandRegionSizeMismatch {
            expected: walker.end(),
            actual: walker.position(),
        });
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandPayload;

    fn envelope(cmd: u32, cmdsize: u32, fill: usize) -> Vec<u8> {
        let mut out = cmd.to_ne_bytes().to_vec();
        out.extend_from_slice(&cmdsize.to_ne_bytes());
        out.resize(out.len() + fill, 0xaa);
        out
    }

    fn region(sizes: &[u32]) -> Vec<u8> {
        // A 4-byte lead-in stands in for the image header.
        let mut image = vec![0u8; 4];
        for &size in sizes {
            image.extend(envelope(0x7fff_0000, size, size as usize - ENVELOPE_SIZE));
        }
        image
    }

    #[test]
    fn walks_in_file_order() {
        let image = region(&[8, 16, 24]);
        let walker = LoadCommandWalker::new(&image, 4, 3, 48).unwrap();
        let offsets: Vec<usize> = walker.map(|raw| raw.unwrap().offset).collect();
        assert_eq!(offsets, vec![4, 12, 28]);
    }

    #[test]
    fn unknown_commands_are_kept() {
        let image = region(&[8, 16]);
        let commands = decode_commands(&image, 4, 2, 24).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].cmdsize, 16);
        assert_eq!(commands[1].payload, CommandPayload::Unrecognized(0x7fff_0000));
    }

    #[test]
    fn size_below_envelope() {
        let mut image = vec![0u8; 4];
        image.extend(envelope(0x1b, 4, 4));
        assert!(matches!(
            decode_commands(&image, 4, 1, 8),
            Err(ParseError::MalformedCommandSize { offset: 4, size: 4 })
        ));
    }

    #[test]
    fn zero_size_does_not_loop() {
        let mut image = vec![0u8; 4];
        image.extend(envelope(0x1b, 0, 8));
        assert!(matches!(
            decode_commands(&image, 4, u32::MAX, 16),
            Err(ParseError::MalformedCommandSize { size: 0, .. })
        ));
    }

    #[test]
    fn short_sum_is_a_mismatch() {
        let image = region(&[8, 16]);
        assert!(matches!(
            decode_commands(&image, 4, 2, 32),
            Err(ParseError::OutOfBounds { .. })
        ));
        let mut padded = image.clone();
        padded.extend([0u8; 8]);
        assert!(matches!(
            decode_commands(&padded, 4, 2, 32),
            Err(ParseError::CommandRegionSizeMismatch {
                expected: 36,
                actual: 28
            })
        ));
    }

    #[test]
    fn command_overrunning_region() {
        let image = region(&[8, 16]);
        assert!(matches!(
            decode_commands(&image, 4, 2, 20),
            Err(ParseError::MalformedCommandSize {
                offset: 12,
                size: 16
            })
        ));
    }

    #[test]
    fn envelope_past_region_end() {
        // Two bytes of region left, but the image still holds the envelope.
        let image = region(&[8, 16]);
        assert!(matches!(
            decode_commands(&image, 4, 2, 10),
            Err(ParseError::MalformedCommandSize {
                offset: 12,
                size: 16
            })
        ));
        // Nothing left in the image either.
        let image = region(&[8]);
        assert!(matches!(
            decode_commands(&image, 4, 2, 8),
            Err(ParseError::MalformedCommandSize { offset: 12, size: 0 })
        ));
    }

    #[test]
    fn huge_count_is_bounded_by_region() {
        let image = region(&[8, 8]);
        let result = decode_commands(&image, 4, u32::MAX, 16);
        assert!(matches!(
            result,
            Err(ParseError::MalformedCommandSize { offset: 20, .. })
        ));
    }

    #[test]
    fn region_outside_image() {
        let image = region(&[8]);
        assert!(matches!(
            LoadCommandWalker::new(&image, 4, 1, u32::MAX),
            Err(ParseError::OutOfBounds { .. })
        ));
    }
}
