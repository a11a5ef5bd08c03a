//! Parse raw input lines into structured wire frames.
//!
//! Responsibilities:
//! - Split a `<timestamp> <hex>` line into its two tokens
//! - Parse the timestamp, retrying once with embedded NUL bytes stripped
//! - Parse the hex token as a 112-bit frame (left-zero-padding tolerated)
//! - Extract the aircraft address (bits 8..32) and type code (bits 32..37)
//!
//! No CRC or downlink-format filtering happens here: every 112-bit frame is
//! handed to the classifier as-is.

use crate::classify::MessageClass;
use crate::types::{hex_to_bits, icao_from_u32, icao_to_string, AdsbError, Icao, Result, FRAME_BITS};

/// Bit index (0-based, from the first transmitted bit) of the CPR format flag.
pub const CPR_FORMAT_BIT: u32 = 53;

// ---------------------------------------------------------------------------
// WireFrame
// ---------------------------------------------------------------------------

/// One decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    /// Unix timestamp from the input line
    pub timestamp: f64,
    /// Hex token exactly as read
    pub raw_hex: String,
    /// Frame contents in the low 112 bits
    pub bits: u128,
    /// 24-bit aircraft address
    pub icao: Icao,
    /// ADS-B type code (0-31)
    pub type_code: u8,
}

impl WireFrame {
    /// Build a frame from an already-parsed timestamp and a hex token.
    pub fn new(timestamp: f64, hex: &str) -> Result<Self> {
        let bits = hex_to_bits(hex)?;
        Ok(WireFrame {
            timestamp,
            raw_hex: hex.to_string(),
            bits,
            icao: icao_from_u32(extract(bits, 8, 32) as u32),
            type_code: extract(bits, 32, 37) as u8,
        })
    }

    /// Bit `i` of the frame, counted from the first transmitted bit.
    pub fn bit(&self, i: u32) -> bool {
        i < FRAME_BITS && (self.bits >> (FRAME_BITS - 1 - i)) & 1 == 1
    }

    /// The frame rendered as a left-zero-padded 112-char binary string.
    pub fn bit_string(&self) -> String {
        format!("{:0112b}", self.bits)
    }

    /// Aircraft address as 6 lowercase hex characters.
    pub fn address(&self) -> String {
        icao_to_string(&self.icao)
    }

    /// True if this position frame carries odd-parity CPR coordinates.
    pub fn cpr_odd(&self) -> bool {
        self.bit(CPR_FORMAT_BIT)
    }

    pub fn class(&self) -> MessageClass {
        MessageClass::from_type_code(self.type_code)
    }
}

/// Bits `[start, end)` of a 112-bit frame as an integer.
fn extract(bits: u128, start: u32, end: u32) -> u128 {
    let width = end - start;
    (bits >> (FRAME_BITS - end)) & ((1u128 << width) - 1)
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// A successfully parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub frame: WireFrame,
    /// True if the timestamp only parsed after stripping NUL bytes
    pub recovered: bool,
}

/// Parse a timestamp token. Returns the value and whether recovery was needed.
pub fn parse_timestamp(token: &str) -> Result<(f64, bool)> {
    if let Ok(ts) = token.parse::<f64>() {
        return Ok((ts, false));
    }
    let cleaned: String = token.chars().filter(|&c| c != '\0').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .map(|ts| (ts, true))
        .map_err(|_| AdsbError::InvalidTimestamp(token.to_string()))
}

/// Parse one `<timestamp> <hex>` line into a frame.
pub fn parse_line(line: &str) -> Result<ParsedLine> {
    let mut tokens = line.split_whitespace();
    let (ts_token, hex_token) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(ts), Some(hex), None) => (ts, hex),
        _ => return Err(AdsbError::MalformedLine(line.trim().to_string())),
    };

    let (timestamp, recovered) = parse_timestamp(ts_token)?;
    let frame = WireFrame::new(timestamp, hex_token)?;

    Ok(ParsedLine { frame, recovered })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identification_line() {
        let parsed = parse_line("1.5 8D4840D6202CC371C32CE0576098").unwrap();
        assert!(!parsed.recovered);
        let frame = parsed.frame;
        assert_eq!(frame.timestamp, 1.5);
        assert_eq!(frame.address(), "4840d6");
        assert_eq!(frame.type_code, 4);
        assert_eq!(frame.raw_hex, "8D4840D6202CC371C32CE0576098");
    }

    #[test]
    fn test_parse_position_parity() {
        let even = parse_line("1.0 8D40621D58C382D690C8AC2863A7").unwrap().frame;
        let odd = parse_line("2.0 8D40621D58C386435CC412692AD6").unwrap().frame;
        assert_eq!(even.type_code, 11);
        assert!(!even.cpr_odd());
        assert!(odd.cpr_odd());
        assert_eq!(even.icao, odd.icao);
    }

    #[test]
    fn test_bit_string_width_and_consistency() {
        let frame = WireFrame::new(0.0, "8D40621D58C386435CC412692AD6").unwrap();
        let s = frame.bit_string();
        assert_eq!(s.len(), 112);
        assert_eq!(&s[53..54], "1");
        assert_eq!(u32::from_str_radix(&s[8..32], 2).unwrap(), 0x40621D);
        assert_eq!(u8::from_str_radix(&s[32..37], 2).unwrap(), frame.type_code);
    }

    #[test]
    fn test_left_padded_hex() {
        // Leading zero nibbles dropped by the recorder still yield a 112-bit frame
        let frame = WireFrame::new(0.0, "0040621D58C382D690C8AC2863A7").unwrap();
        assert_eq!(frame.address(), "40621d");
        assert_eq!(frame.bit_string().len(), 112);
        let short = WireFrame::new(0.0, "40621D58C382D690C8AC2863A7").unwrap();
        assert_eq!(short.bits, frame.bits);
    }

    #[test]
    fn test_reparse_is_stable() {
        let hex = "8D485020994409940838175B284F";
        let a = WireFrame::new(1.0, hex).unwrap();
        let b = WireFrame::new(2.0, hex).unwrap();
        assert_eq!(a.icao, b.icao);
        assert_eq!(a.type_code, b.type_code);
        assert_eq!(a.type_code, 19);
    }

    #[test]
    fn test_timestamp_nul_recovery() {
        let parsed = parse_line("\0\0123.25 8D4840D6202CC371C32CE0576098").unwrap();
        assert!(parsed.recovered);
        assert_eq!(parsed.frame.timestamp, 123.25);
    }

    #[test]
    fn test_timestamp_unrecoverable() {
        let err = parse_line("12a.5 8D4840D6202CC371C32CE0576098").unwrap_err();
        assert!(matches!(err, AdsbError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            parse_line("8D4840D6202CC371C32CE0576098"),
            Err(AdsbError::MalformedLine(_))
        ));
        assert!(matches!(
            parse_line("1.0 8D4840D6 extra"),
            Err(AdsbError::MalformedLine(_))
        ));
    }

    #[test]
    fn test_bad_hex() {
        assert!(matches!(
            parse_line("1.0 not-hex"),
            Err(AdsbError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_bit_out_of_range() {
        let frame = WireFrame::new(0.0, "8D4840D6202CC371C32CE0576098").unwrap();
        assert!(frame.bit(0)); // DF17 starts with 1
        assert!(!frame.bit(200));
    }
}
