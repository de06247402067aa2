//! Shared types, error enums, and small codec helpers for asterix-decode.

use serde::Serialize;
use thiserror::Error;

use crate::cat21::Cat21;
use crate::cat48::Cat48;

/// All errors produced by asterix-decode.
#[derive(Debug, Error)]
pub enum AsterixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, AsterixError>;

/// Failure while decoding a single data item.
///
/// Either condition desynchronizes the octet cursor for the rest of the
/// record, so the dispatch core stops at the first one and keeps whatever
/// was decoded before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field needs {needed} octets but only {remaining} remain")]
    InsufficientData { needed: usize, remaining: usize },
    #[error("FRN {0} present in FSPEC but not registered in the UAP")]
    UnknownField(u8),
}

// ---------------------------------------------------------------------------
// Decoded message union
// ---------------------------------------------------------------------------

/// A decoded ASTERIX record from one of the supported categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DecodedMessage {
    Cat21(Cat21),
    Cat48(Cat48),
}

impl DecodedMessage {
    pub fn category(&self) -> u8 {
        match self {
            DecodedMessage::Cat21(m) => m.category,
            DecodedMessage::Cat48(m) => m.category,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared codec helpers
// ---------------------------------------------------------------------------

/// Format seconds since midnight as `HH:MM:SS.sss`.
pub fn format_day_time(seconds: f64) -> String {
    let h = (seconds / 3600.0) as u32 % 24;
    let m = ((seconds % 3600.0) / 60.0) as u32;
    let s = seconds % 60.0;
    format!("{h:02}:{m:02}:{s:06.3}")
}

/// Decode one 6-bit IA-5 character code (aircraft identification fields).
///
/// 1-26 map to A-Z, 32 to space, 48-57 to 0-9; everything else is
/// undefined and dropped by callers.
pub fn ia5_char(code: u8) -> Option<char> {
    match code {
        1..=26 => Some((b'A' + code - 1) as char),
        32 => Some(' '),
        48..=57 => Some(code as char),
        _ => None,
    }
}

/// Decode eight 6-bit IA-5 codes packed into 48 bits, right-trimmed.
pub fn ia5_string(bits: u64) -> String {
    let mut chars = String::with_capacity(8);
    for i in 0..8 {
        let code = ((bits >> (42 - i * 6)) & 0x3F) as u8;
        if let Some(c) = ia5_char(code) {
            chars.push(c);
        }
    }
    chars.trim().to_string()
}

/// Format a 24-bit aircraft address as a 6-hex-digit string.
pub fn address_to_hex(addr: u32) -> String {
    format!("{:06X}", addr & 0xFF_FFFF)
}

/// Four octal digits from the low 12 bits of a Mode-3/A item.
pub fn mode3a_digits(raw: u16) -> String {
    let code = raw & 0x0FFF;
    let a = (code >> 9) & 0b111;
    let b = (code >> 6) & 0b111;
    let c = (code >> 3) & 0b111;
    let d = code & 0b111;
    format!("{a}{b}{c}{d}")
}

/// Load a big-endian u16 from the first two bytes of a slice.
pub(crate) fn be_u16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

/// Load a big-endian u24 from the first three bytes of a slice.
pub(crate) fn be_u24(data: &[u8]) -> u32 {
    ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | data[2] as u32
}

/// Load a big-endian i32 from the first four bytes of a slice.
pub(crate) fn be_i32(data: &[u8]) -> i32 {
    i32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

/// Sign-extend the low `bits` bits of `raw` as two's complement.
pub(crate) fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_day_time() {
        assert_eq!(format_day_time(0.0), "00:00:00.000");
        assert_eq!(format_day_time(3661.5), "01:01:01.500");
        // Wraps past midnight
        assert_eq!(format_day_time(24.0 * 3600.0 + 1.0), "00:00:01.000");
    }

    #[test]
    fn test_ia5_char() {
        assert_eq!(ia5_char(1), Some('A'));
        assert_eq!(ia5_char(26), Some('Z'));
        assert_eq!(ia5_char(32), Some(' '));
        assert_eq!(ia5_char(48), Some('0'));
        assert_eq!(ia5_char(57), Some('9'));
        assert_eq!(ia5_char(0), None);
        assert_eq!(ia5_char(63), None);
    }

    #[test]
    fn test_ia5_string_hallo_un() {
        let codes: [u64; 8] = [8, 1, 12, 12, 15, 32, 21, 14];
        let mut bits = 0u64;
        for (i, c) in codes.iter().enumerate() {
            bits |= c << (42 - i * 6);
        }
        assert_eq!(ia5_string(bits), "HALLO UN");
    }

    #[test]
    fn test_address_to_hex() {
        assert_eq!(address_to_hex(0x4840D6), "4840D6");
        assert_eq!(address_to_hex(0x00000F), "00000F");
    }

    #[test]
    fn test_mode3a_digits() {
        assert_eq!(mode3a_digits(0b000_001_010_011), "0123");
        assert_eq!(mode3a_digits(0o7777), "7777");
        // Validity/garbled flags in the high nibble are ignored
        assert_eq!(mode3a_digits(0xF000 | 0o1234), "1234");
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x1FFF, 14), -1);
        assert_eq!(sign_extend(400, 14), 400);
        assert_eq!(sign_extend(0x2000, 14), -8192);
    }
}
