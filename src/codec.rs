//! Field codecs for the lewei_cam wire protocol.
//!
//! All multi-byte integers are little-endian, matching the device's native
//! byte order.

use crate::error::{CamError, Result};

// ---------------------------------------------------------------------------
// Read helpers
// ---------------------------------------------------------------------------

/// Read a little-endian unsigned 16-bit integer.
pub fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    check_len(data, offset, 2, "UINT16")?;
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

/// Read a little-endian unsigned 32-bit integer.
pub fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    check_len(data, offset, 4, "UINT32")?;
    Ok(u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

/// Read a little-endian unsigned 64-bit integer.
pub fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    check_len(data, offset, 8, "UINT64")?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    Ok(u64::from_le_bytes(buf))
}

// ---------------------------------------------------------------------------
// Write helpers
// ---------------------------------------------------------------------------

/// Write a little-endian unsigned 16-bit integer.
pub fn write_u16(buf: &mut Vec<u8>, val: u16) {
    buf.extend_from_slice(&val.to_le_bytes());
}

/// Write a little-endian unsigned 32-bit integer.
pub fn write_u32(buf: &mut Vec<u8>, val: u32) {
    buf.extend_from_slice(&val.to_le_bytes());
}

/// Write a little-endian unsigned 64-bit integer.
pub fn write_u64(buf: &mut Vec<u8>, val: u64) {
    buf.extend_from_slice(&val.to_le_bytes());
}

/// Write a UTF-8 string into a fixed-width, NUL-padded slot.
///
/// Fails if the encoded string is longer than `width` bytes. A string that
/// exactly fills the slot is written without a terminator (matching slots
/// like `Config.wifi_name` whose documented bound is the slot width
/// itself); `read_cstr` still decodes it correctly by taking the whole slot
/// when no NUL is found.
pub fn write_cstr(buf: &mut Vec<u8>, s: &str, width: usize) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > width {
        return Err(CamError::invalid_argument("string too long for slot"));
    }
    let start = buf.len();
    buf.resize(start + width, 0);
    buf[start..start + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Decode a NUL-terminated C-string from a fixed-width byte slot.
///
/// Bytes at or after the first NUL are never included. Invalid UTF-8 is
/// replaced with the Unicode replacement character.
pub fn read_cstr(slot: &[u8]) -> String {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

fn check_len(data: &[u8], offset: usize, need: usize, name: &'static str) -> Result<()> {
    if data.len() < offset + need {
        Err(CamError::framing(format!(
            "{name} needs {} bytes at offset {offset}, got {}",
            need,
            data.len()
        )))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_round_trip() {
        for val in [0u16, 1, 0xFFFF, 0x8000] {
            let mut buf = Vec::new();
            write_u16(&mut buf, val);
            assert_eq!(read_u16(&buf, 0).unwrap(), val);
        }
    }

    #[test]
    fn u32_round_trip() {
        for val in [0u32, 1, u32::MAX, 0x1234_5678] {
            let mut buf = Vec::new();
            write_u32(&mut buf, val);
            assert_eq!(read_u32(&buf, 0).unwrap(), val);
        }
    }

    #[test]
    fn u64_round_trip() {
        for val in [0u64, 1, u64::MAX, 1_700_000_000] {
            let mut buf = Vec::new();
            write_u64(&mut buf, val);
            assert_eq!(read_u64(&buf, 0).unwrap(), val);
        }
    }

    #[test]
    fn cstr_decode_stops_at_nul() {
        let slot = b"drone\0\0\0garbage";
        assert_eq!(read_cstr(slot), "drone");
    }

    #[test]
    fn cstr_decode_no_nul_uses_whole_slot() {
        let slot = b"abcd";
        assert_eq!(read_cstr(slot), "abcd");
    }

    #[test]
    fn cstr_round_trip() {
        let mut buf = Vec::new();
        write_cstr(&mut buf, "hello", 10).unwrap();
        assert_eq!(buf.len(), 10);
        assert_eq!(read_cstr(&buf), "hello");
    }

    #[test]
    fn cstr_too_long_rejected() {
        let mut buf = Vec::new();
        assert!(write_cstr(&mut buf, "toolongforthisslot", 8).is_err());
    }

    #[test]
    fn cstr_exact_width_fit_has_no_terminator_but_still_decodes() {
        let mut buf = Vec::new();
        write_cstr(&mut buf, "12345678", 8).unwrap();
        assert_eq!(buf.len(), 8);
        assert!(!buf.contains(&0));
        assert_eq!(read_cstr(&buf), "12345678");
    }

    #[test]
    fn read_past_end_fails() {
        let data = [0u8; 2];
        assert!(read_u32(&data, 0).is_err());
    }
}
