//! Field decoders for the ADS-B message types the table builder consumes.
//!
//! The `Decoder` trait is the seam between the stateful tracking code and the
//! bit-level decoding. Every method returns `Option`: a `None` means "no new
//! information in this message" and is never an error.
//!
//! `ModeS` is the built-in implementation:
//! - TC 1-4:  callsign
//! - TC 9-18: barometric altitude + CPR global position from an even/odd pair
//! - TC 19:   ground speed or airspeed, heading, vertical rate

use crate::cpr::{self, CprCoord};
use crate::types::*;

/// Decoding capability used by the tracker.
///
/// All inputs are raw hex messages as read from the input line.
pub trait Decoder {
    /// Callsign with space filler removed. May be empty.
    fn callsign(&self, msg: &str) -> Option<String>;

    /// Global airborne position from an even and an odd message.
    fn position(&self, even: &str, odd: &str, t_even: f64, t_odd: f64) -> Option<(f64, f64)>;

    /// Barometric altitude in feet.
    fn altitude(&self, msg: &str) -> Option<i32>;

    /// Airborne velocity.
    fn velocity(&self, msg: &str) -> Option<Velocity>;
}

/// Built-in Mode S / ADS-B decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeS;

impl Decoder for ModeS {
    fn callsign(&self, msg: &str) -> Option<String> {
        decode_callsign(me_of(msg)?)
    }

    fn position(&self, even: &str, odd: &str, t_even: f64, t_odd: f64) -> Option<(f64, f64)> {
        let even = cpr_coord(me_of(even)?, false)?;
        let odd = cpr_coord(me_of(odd)?, true)?;
        cpr::airborne_position(even, odd, t_even, t_odd)
    }

    fn altitude(&self, msg: &str) -> Option<i32> {
        let me = me_of(msg)?;
        if !(9..=18).contains(&me_type_code(me)) {
            return None;
        }
        decode_altitude(((me >> 36) & 0x0FFF) as u32)
    }

    fn velocity(&self, msg: &str) -> Option<Velocity> {
        let me = me_of(msg)?;
        if me_type_code(me) != 19 {
            return None;
        }
        decode_velocity(me)
    }
}

/// ME field of a hex message, or `None` if the hex does not parse.
fn me_of(msg: &str) -> Option<u64> {
    hex_to_bits(msg).ok().map(me_field)
}

// ---------------------------------------------------------------------------
// Identification
// ---------------------------------------------------------------------------

/// Decode TC 1-4: 8 six-bit characters with spaces stripped.
///
/// `#` marks an unassigned code and is kept as received.
pub fn decode_callsign(me: u64) -> Option<String> {
    if !(1..=4).contains(&me_type_code(me)) {
        return None;
    }

    let callsign = (0..8)
        .map(|i| CALLSIGN_CHARSET[((me >> (42 - i * 6)) & 0x3F) as usize] as char)
        .filter(|&c| c != ' ')
        .collect();
    Some(callsign)
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// CPR coordinates of an airborne position message with the expected parity.
fn cpr_coord(me: u64, odd: bool) -> Option<CprCoord> {
    if !(9..=18).contains(&me_type_code(me)) {
        return None;
    }
    if ((me >> 34) & 1 == 1) != odd {
        return None;
    }
    Some(CprCoord {
        lat: ((me >> 17) & 0x1FFFF) as u32,
        lon: (me & 0x1FFFF) as u32,
    })
}

/// Decode 12-bit altitude code from an airborne position message.
///
/// The Q-bit (bit 4) selects the encoding mode:
/// - Q=1: 25-ft resolution
/// - Q=0: 100-ft Gillham gray code
pub fn decode_altitude(alt_code: u32) -> Option<i32> {
    if alt_code == 0 {
        return None;
    }

    if (alt_code >> 4) & 1 == 1 {
        let n = ((alt_code >> 5) << 4) | (alt_code & 0x0F);
        Some(n as i32 * 25 - 1000)
    } else {
        decode_gillham_altitude(alt_code)
    }
}

/// Decode 100-ft Gillham gray code altitude from the 12-bit ES field.
///
/// The field omits the M bit, so it is re-inserted at bit 6 to get the
/// 13-bit AC layout `C1 A1 C2 A2 C4 A4 M B1 Q B2 D2 B4 D4`.
fn decode_gillham_altitude(alt_code: u32) -> Option<i32> {
    let ac = ((alt_code >> 6) << 7) | (alt_code & 0x3F);
    let bit = |i: u32| (ac >> i) & 1;

    let (c1, a1, c2, a2, c4, a4) = (bit(12), bit(11), bit(10), bit(9), bit(8), bit(7));
    let (b1, b2, d2, b4, d4) = (bit(5), bit(3), bit(2), bit(1), bit(0));

    // 500-ft steps: D2 D4 A1 A2 A4 B1 B2 B4
    let gray500 = [d2, d4, a1, a2, a4, b1, b2, b4]
        .iter()
        .fold(0u32, |acc, &b| (acc << 1) | b);
    // 100-ft steps: C1 C2 C4
    let gray100 = (c1 << 2) | (c2 << 1) | c4;

    let n500 = gray_to_binary(gray500) as i32;
    let mut n100 = match gray_to_binary(gray100) {
        0 | 5 | 6 => return None,
        7 => 5,
        n => n as i32,
    };
    // The 100-ft digit counts backwards in odd 500-ft bands
    if n500 % 2 == 1 {
        n100 = 6 - n100;
    }

    Some(n500 * 500 + n100 * 100 - 1300)
}

fn gray_to_binary(mut n: u32) -> u32 {
    n ^= n >> 8;
    n ^= n >> 4;
    n ^= n >> 2;
    n ^= n >> 1;
    n
}

// ---------------------------------------------------------------------------
// Velocity
// ---------------------------------------------------------------------------

/// Decode TC 19 subtypes 1-4.
pub fn decode_velocity(me: u64) -> Option<Velocity> {
    let subtype = ((me >> 48) & 0x07) as u8;
    let vertical_rate_fpm = decode_vertical_rate(me);

    match subtype {
        1 | 2 => {
            let ew_dir = (me >> 42) & 1; // 0=East, 1=West
            let ew_raw = ((me >> 32) & 0x3FF) as i32;
            let ns_dir = (me >> 31) & 1; // 0=North, 1=South
            let ns_raw = ((me >> 21) & 0x3FF) as i32;

            if ew_raw == 0 || ns_raw == 0 {
                return None;
            }

            let scale = if subtype == 2 { 4 } else { 1 };
            let vx = ((ew_raw - 1) * scale) as f64 * if ew_dir == 1 { -1.0 } else { 1.0 };
            let vy = ((ns_raw - 1) * scale) as f64 * if ns_dir == 1 { -1.0 } else { 1.0 };

            let speed = (vx * vx + vy * vy).sqrt();
            let heading = vx.atan2(vy).to_degrees().rem_euclid(360.0);

            Some(Velocity {
                speed_kts: Some(round2(speed)),
                heading_deg: Some(round2(heading)),
                vertical_rate_fpm,
                speed_type: SpeedType::Ground,
            })
        }
        3 | 4 => {
            let heading = if (me >> 42) & 1 == 1 {
                Some(round2(((me >> 32) & 0x3FF) as f64 * 360.0 / 1024.0))
            } else {
                None
            };

            let speed_raw = ((me >> 21) & 0x3FF) as i32;
            let scale = if subtype == 4 { 4 } else { 1 };
            let speed = (speed_raw > 0).then(|| ((speed_raw - 1) * scale) as f64);

            Some(Velocity {
                speed_kts: speed,
                heading_deg: heading,
                vertical_rate_fpm,
                speed_type: if (me >> 31) & 1 == 1 {
                    SpeedType::TAS
                } else {
                    SpeedType::IAS
                },
            })
        }
        _ => None,
    }
}

/// Vertical rate in ft/min; `None` when the field reports "no information".
fn decode_vertical_rate(me: u64) -> Option<i32> {
    let sign = (me >> 19) & 1; // 0=up, 1=down
    let raw = ((me >> 10) & 0x1FF) as i32;
    if raw == 0 {
        return None;
    }
    let rate = (raw - 1) * 64;
    Some(if sign == 1 { -rate } else { rate })
}

/// Round to 2 decimal places.
fn round2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
