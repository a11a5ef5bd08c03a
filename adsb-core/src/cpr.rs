//! Compact Position Reporting: global decode of an airborne even/odd pair.
//!
//! Each frame carries a 17-bit latitude and longitude fraction inside one cell
//! of its grid. The even grid has 60 latitude zones, the odd grid 59. With one
//! frame of each parity the zone index can be solved for directly, so no
//! reference position is needed.
//!
//! How close in time the two frames must be is decided in `fusion`.

use std::f64::consts::PI;

/// Latitude zones per hemisphere.
const NZ: f64 = 15.0;

/// Fraction denominator: 2^17.
const CPR_SCALE: f64 = 131_072.0;

/// Raw 17-bit CPR coordinates of one position frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CprCoord {
    pub lat: u32,
    pub lon: u32,
}

impl CprCoord {
    fn fractions(self) -> (f64, f64) {
        (self.lat as f64 / CPR_SCALE, self.lon as f64 / CPR_SCALE)
    }
}

/// Longitude zone count at `lat` degrees: 59 at the equator, 2 at exactly
/// 87 and 1 beyond.
pub fn nl(lat: f64) -> i32 {
    let lat = lat.abs();
    if lat == 0.0 {
        return 59;
    }
    if lat == 87.0 {
        return 2;
    }
    if lat > 87.0 {
        return 1;
    }
    let num = 1.0 - (PI / (2.0 * NZ)).cos();
    let den = (lat.to_radians()).cos().powi(2);
    let zones = (2.0 * PI / (1.0 - num / den).acos()).floor() as i32;
    zones.max(1)
}

/// Floored modulo, never negative for positive `y`.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// Latitude of one frame given the shared zone index `j`.
fn frame_latitude(j: f64, frac: f64, odd: bool) -> f64 {
    let zones = if odd { 4.0 * NZ - 1.0 } else { 4.0 * NZ };
    let lat = (360.0 / zones) * (modulo(j, zones) + frac);
    if lat >= 270.0 {
        lat - 360.0
    } else {
        lat
    }
}

/// Longitude in `(-180, 180]` using the latitude of the chosen frame.
fn frame_longitude(lat: f64, lon_even: f64, lon_odd: f64, odd: bool) -> f64 {
    let nl_lat = nl(lat);
    let zones = (if odd { nl_lat - 1 } else { nl_lat }).max(1) as f64;
    let m = (lon_even * (nl_lat - 1) as f64 - lon_odd * nl_lat as f64 + 0.5).floor();
    let frac = if odd { lon_odd } else { lon_even };
    wrap_longitude((360.0 / zones) * (modulo(m, zones) + frac))
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Resolve `(latitude, longitude)` in degrees, rounded to 5 decimals.
///
/// The odd frame supplies the final position unless the even frame is
/// strictly newer. `None` when the two latitudes straddle an NL boundary.
pub fn airborne_position(
    even: CprCoord,
    odd: CprCoord,
    t_even: f64,
    t_odd: f64,
) -> Option<(f64, f64)> {
    let (lat_even, lon_even) = even.fractions();
    let (lat_odd, lon_odd) = odd.fractions();

    let j = (59.0 * lat_even - 60.0 * lat_odd + 0.5).floor();
    let lat_e = frame_latitude(j, lat_even, false);
    let lat_o = frame_latitude(j, lat_odd, true);

    if nl(lat_e) != nl(lat_o) {
        return None;
    }

    let even_newer = t_even > t_odd;
    let lat = if even_newer { lat_e } else { lat_o };
    let lon = frame_longitude(lat, lon_even, lon_odd, !even_newer);

    Some((round5(lat), round5(lon)))
}

fn round5(val: f64) -> f64 {
    (val * 1e5).round() / 1e5
}
