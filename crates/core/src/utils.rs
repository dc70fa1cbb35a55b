//! Byte-level helpers shared by the RPT and AFP parsers.
//!
//! All integer fields in an RPT file are little-endian. Reads past the end
//! of the slice yield 0; callers that care check the slice length first.

use byteorder::{ByteOrder, LittleEndian};

/// Read a little-endian u16 at `offset`, or 0 if out of bounds.
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    match data.get(offset..offset + 2) {
        Some(bytes) => LittleEndian::read_u16(bytes),
        None => 0,
    }
}

/// Read a little-endian u32 at `offset`, or 0 if out of bounds.
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    match data.get(offset..offset + 4) {
        Some(bytes) => LittleEndian::read_u32(bytes),
        None => 0,
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the first occurrence of `needle` at or after `start`.
pub fn find_from(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if start >= haystack.len() {
        return None;
    }
    find(&haystack[start..], needle).map(|pos| pos + start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_le_in_bounds() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_u16_le(&data, 0), 0x0201);
        assert_eq!(read_u32_le(&data, 0), 0x0403_0201);
    }

    #[test]
    fn test_read_le_out_of_bounds_is_zero() {
        let data = [0xff, 0xff];
        assert_eq!(read_u16_le(&data, 1), 0);
        assert_eq!(read_u32_le(&data, 0), 0);
        assert_eq!(read_u32_le(&data, 100), 0);
    }

    #[test]
    fn test_find() {
        let data = b"xxPAGETBLHDRyy";
        assert_eq!(find(data, b"PAGETBLHDR"), Some(2));
        assert_eq!(find(data, b"SECTIONHDR"), None);
        assert_eq!(find_from(data, b"y", 0), Some(12));
        assert_eq!(find_from(data, b"y", 13), Some(13));
        assert_eq!(find_from(data, b"x", 2), None);
    }
}
