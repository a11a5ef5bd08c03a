//! Shared types, error enum, and decoded value types for adsb-core.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// All errors produced by adsb-core.
#[derive(Debug, Error)]
pub enum AdsbError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("frame wider than {max} bits: {hex}")]
    FrameTooWide { hex: String, max: u32 },
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("malformed line: expected `<timestamp> <hex>`, got {0:?}")]
    MalformedLine(String),
    #[error("cannot read source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl AdsbError {
    /// True for errors confined to a single input line.
    ///
    /// The batch driver counts and skips these; everything else aborts the run.
    pub fn is_line_error(&self) -> bool {
        matches!(
            self,
            AdsbError::InvalidHex(_)
                | AdsbError::FrameTooWide { .. }
                | AdsbError::InvalidTimestamp(_)
                | AdsbError::MalformedLine(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AdsbError>;

// ---------------------------------------------------------------------------
// ICAO address helpers
// ---------------------------------------------------------------------------

/// 3-byte ICAO aircraft address.
pub type Icao = [u8; 3];

/// Format ICAO address as 6-char lowercase hex string.
pub fn icao_to_string(icao: &Icao) -> String {
    format!("{:02x}{:02x}{:02x}", icao[0], icao[1], icao[2])
}

/// Build ICAO from a 24-bit integer.
pub fn icao_from_u32(val: u32) -> Icao {
    [
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
    ]
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Width of an extended squitter in bits.
pub const FRAME_BITS: u32 = 112;

/// Parse a hex token into the low 112 bits of a `u128`.
///
/// Shorter tokens are treated as left-zero-padded. Values that do not fit in
/// 112 bits are rejected.
pub fn hex_to_bits(hex: &str) -> Result<u128> {
    let hex = hex.trim();
    if hex.is_empty() || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(AdsbError::InvalidHex(hex.to_string()));
    }
    let digits = hex.trim_start_matches('0');
    if digits.len() > 32 {
        return Err(AdsbError::FrameTooWide {
            hex: hex.to_string(),
            max: FRAME_BITS,
        });
    }
    let bits = if digits.is_empty() {
        0
    } else {
        u128::from_str_radix(digits, 16).map_err(|_| AdsbError::InvalidHex(hex.to_string()))?
    };
    if bits >> FRAME_BITS != 0 {
        return Err(AdsbError::FrameTooWide {
            hex: hex.to_string(),
            max: FRAME_BITS,
        });
    }
    Ok(bits)
}

/// Extract the 56-bit ME (message, extended squitter) field.
pub fn me_field(bits: u128) -> u64 {
    ((bits >> 24) & ((1u128 << 56) - 1)) as u64
}

/// ADS-B type code: the top 5 bits of the ME field.
pub fn me_type_code(me: u64) -> u8 {
    ((me >> 51) & 0x1F) as u8
}

// ---------------------------------------------------------------------------
// ADS-B callsign character set
// ---------------------------------------------------------------------------

/// ADS-B character set for callsign encoding (6 bits per character).
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

// ---------------------------------------------------------------------------
// Decoded value types
// ---------------------------------------------------------------------------

/// Speed type for velocity messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedType {
    Ground,
    IAS,
    TAS,
}

impl SpeedType {
    pub fn is_ground(&self) -> bool {
        matches!(self, SpeedType::Ground)
    }
}

impl std::fmt::Display for SpeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedType::Ground => write!(f, "GS"),
            SpeedType::IAS => write!(f, "IAS"),
            SpeedType::TAS => write!(f, "TAS"),
        }
    }
}

/// TC 19: decoded airborne velocity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Velocity {
    pub speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,
    pub speed_type: SpeedType,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
