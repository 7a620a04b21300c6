// Persisted array format: header parsing and serialization.
//
// Layout (little-endian):
// - bytes 0..16: name, NUL-padded
// - bytes 16..20: start_from (entry offset, max qinputs over all flakes)
// - bytes 20..24: qflakes (real flakes, root excluded)
// - bytes 24..32: len (cell count)
// - then `len` u32 cells

use bytemuck::{Pod, Zeroable};

use crate::FormatError;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Bytes reserved for the array name.
pub const NAME_LEN: usize = 16;

/// Array header as stored on disk.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct OfsmHeader {
    pub name: [u8; NAME_LEN],
    pub start_from: u32,
    pub qflakes: u32,
    pub len: u64,
}

const _: () = assert!(size_of::<OfsmHeader>() == HEADER_SIZE);

impl OfsmHeader {
    /// Build a header; `name` is truncated to [`NAME_LEN`] bytes.
    pub fn new(name: &str, start_from: u32, qflakes: u32, len: u64) -> Self {
        let mut header = Self {
            name: [0; NAME_LEN],
            start_from,
            qflakes,
            len,
        };
        header.set_name(name);
        header
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_LEN];
        let bytes = name.as_bytes();
        let mut n = bytes.len().min(NAME_LEN);
        // Do not split a UTF-8 sequence.
        while !name.is_char_boundary(n) {
            n -= 1;
        }
        self.name[..n].copy_from_slice(&bytes[..n]);
    }

    /// The name up to the first NUL. Invalid UTF-8 yields an empty name.
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    fn into_le(self) -> Self {
        Self {
            name: self.name,
            start_from: self.start_from.to_le(),
            qflakes: self.qflakes.to_le(),
            len: self.len.to_le(),
        }
    }

    fn into_native(self) -> Self {
        Self {
            name: self.name,
            start_from: u32::from_le(self.start_from),
            qflakes: u32::from_le(self.qflakes),
            len: u64::from_le(self.len),
        }
    }
}

/// Parse and validate the header at the start of `data`.
pub fn parse_header(data: &[u8]) -> Result<OfsmHeader, FormatError> {
    if data.len() < HEADER_SIZE {
        return Err(FormatError::TooShort {
            expected: HEADER_SIZE,
            actual: data.len(),
        });
    }
    let header = bytemuck::pod_read_unaligned::<OfsmHeader>(&data[..HEADER_SIZE]).into_native();
    if header.qflakes > 0 && (header.start_from == 0 || header.start_from as u64 >= header.len) {
        return Err(FormatError::InvalidStartOffset {
            start_from: header.start_from,
            len: header.len,
        });
    }
    Ok(header)
}

/// Serialize a header and its cells.
pub fn write(header: &OfsmHeader, cells: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + cells.len() * 4);
    out.extend_from_slice(bytemuck::bytes_of(&header.into_le()));
    for &cell in cells {
        out.extend_from_slice(&cell.to_le_bytes());
    }
    out
}

/// Parse a header and its cells. The body must hold exactly `len` cells.
pub fn read(data: &[u8]) -> Result<(OfsmHeader, Vec<u32>), FormatError> {
    let header = parse_header(data)?;
    let body = &data[HEADER_SIZE..];
    let expected = usize::try_from(header.len)
        .ok()
        .and_then(|n| n.checked_mul(4))
        .filter(|&n| n == body.len())
        .ok_or(FormatError::LengthMismatch {
            declared: header.len,
            actual: body.len(),
        })?;

    // Copy into an aligned Vec; the source slice may not be 4-byte aligned.
    let mut cells = vec![0u32; expected / 4];
    bytemuck::cast_slice_mut::<u32, u8>(&mut cells).copy_from_slice(body);
    for cell in &mut cells {
        *cell = u32::from_le(*cell);
    }
    Ok((header, cells))
}
