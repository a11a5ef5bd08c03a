//! CPR fusion: pair even/odd position frames per aircraft into a fix.
//!
//! Each airborne position frame replaces the pending frame of its parity.
//! Once both parities are present and their timestamps are closer than the
//! pair window, the decoder resolves the position and the even frame supplies
//! the altitude. Pending frames are kept after a fix, so every later frame
//! re-pairs with the freshest opposite-parity frame and the window is checked
//! again on every attempt.

use tracing::trace;

use crate::decode::Decoder;
use crate::frame::WireFrame;
use crate::store::{CprPending, PendingFrame};

/// Default maximum gap between even and odd frames (seconds).
pub const DEFAULT_PAIR_WINDOW: f64 = 5.0;

/// Convert feet to kilometres.
pub fn feet_to_km(feet: f64) -> f64 {
    feet * 0.3048 / 1000.0
}

/// A resolved position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude of the even frame in kilometres
    pub altitude_km: Option<f64>,
}

/// Result of feeding one position frame to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fusion {
    /// Only one parity has been seen so far.
    Pending,
    /// Both parities present but too far apart in time.
    Stale { gap: f64 },
    /// Pair within the window, but the decoder could not resolve it.
    Unresolved,
    /// Position resolved.
    Resolved(Fix),
}

#[derive(Debug, Clone, Copy)]
pub struct FusionEngine {
    pair_window: f64,
}

impl Default for FusionEngine {
    fn default() -> Self {
        FusionEngine::new(DEFAULT_PAIR_WINDOW)
    }
}

impl FusionEngine {
    pub fn new(pair_window: f64) -> Self {
        FusionEngine { pair_window }
    }

    pub fn pair_window(&self) -> f64 {
        self.pair_window
    }

    /// Cache `frame` in its parity slot, then try to resolve the pair.
    pub fn update<D: Decoder + ?Sized>(
        &self,
        pending: &mut CprPending,
        frame: &WireFrame,
        decoder: &D,
    ) -> Fusion {
        pending.store(
            frame.cpr_odd(),
            PendingFrame {
                timestamp: frame.timestamp,
                raw_hex: frame.raw_hex.clone(),
            },
        );

        let (even, odd) = match pending.pair() {
            Some(pair) => pair,
            None => return Fusion::Pending,
        };

        let gap = (even.timestamp - odd.timestamp).abs();
        if gap >= self.pair_window || gap.is_nan() {
            trace!(gap, window = self.pair_window, "CPR pair too far apart");
            return Fusion::Stale { gap };
        }

        let (latitude, longitude) =
            match decoder.position(&even.raw_hex, &odd.raw_hex, even.timestamp, odd.timestamp) {
                Some(pos) => pos,
                None => return Fusion::Unresolved,
            };

        let altitude_km = decoder
            .altitude(&even.raw_hex)
            .map(|ft| feet_to_km(ft as f64));

        Fusion::Resolved(Fix {
            latitude,
            longitude,
            altitude_km,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
