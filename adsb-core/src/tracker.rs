//! Per-frame merge step: fold each frame into its aircraft's row and emit a
//! snapshot whenever a CPR position fix resolves.
//!
//! Pure logic, no I/O. Frames must be fed in arrival order; the CPR pair
//! window depends on it.
//!
//! Only position fixes produce output rows. Identification and velocity
//! frames update the stored row, and their fields show up in the next
//! position-resolved row for that aircraft.

use tracing::{debug, trace};

use crate::classify::MessageClass;
use crate::decode::{Decoder, ModeS};
use crate::frame::WireFrame;
use crate::fusion::{Fusion, FusionEngine};
use crate::store::{AircraftRow, OutputRow, StateStore};

/// Per-class frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub identification: u64,
    pub airborne_position: u64,
    pub airborne_velocity: u64,
    pub unhandled: u64,
}

impl ClassCounts {
    fn bump(&mut self, class: MessageClass) {
        match class {
            MessageClass::Identification => self.identification += 1,
            MessageClass::AirbornePosition => self.airborne_position += 1,
            MessageClass::AirborneVelocity => self.airborne_velocity += 1,
            MessageClass::Unhandled => self.unhandled += 1,
        }
    }
}

/// Track multiple aircraft from wire frames.
///
/// Owns the state store; there is no state outside this value.
pub struct Tracker<D = ModeS> {
    store: StateStore,
    fusion: FusionEngine,
    decoder: D,

    // Counters
    pub total_frames: u64,
    pub classes: ClassCounts,
    pub callsign_misses: u64,
    pub velocity_misses: u64,
    pub fusion_attempts: u64,
    pub stale_pairs: u64,
    pub unresolved_pairs: u64,
    pub rows_emitted: u64,
}

impl Tracker<ModeS> {
    /// Tracker using the built-in decoder.
    pub fn with_window(pair_window: f64) -> Self {
        Tracker::new(ModeS, FusionEngine::new(pair_window))
    }
}

impl Default for Tracker<ModeS> {
    fn default() -> Self {
        Tracker::new(ModeS, FusionEngine::default())
    }
}

impl<D: Decoder> Tracker<D> {
    pub fn new(decoder: D, fusion: FusionEngine) -> Self {
        Tracker {
            store: StateStore::new(),
            fusion,
            decoder,
            total_frames: 0,
            classes: ClassCounts::default(),
            callsign_misses: 0,
            velocity_misses: 0,
            fusion_attempts: 0,
            stale_pairs: 0,
            unresolved_pairs: 0,
            rows_emitted: 0,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn pair_window(&self) -> f64 {
        self.fusion.pair_window()
    }

    /// Process a single frame. Returns a row when a position fix resolved.
    pub fn update(&mut self, frame: &WireFrame) -> Option<OutputRow> {
        self.total_frames += 1;

        let class = frame.class();
        self.classes.bump(class);
        trace!(icao = %frame.address(), class = class.name(), ts = frame.timestamp, "frame");

        let icao = frame.icao;
        let mut row = self.store.get_or_init(icao);
        row.timestamp = Some(frame.timestamp);

        let mut resolved = false;

        match class {
            MessageClass::Identification => match self.decoder.callsign(&frame.raw_hex) {
                Some(cs) => row.callsign = Some(cs),
                None => self.callsign_misses += 1,
            },
            MessageClass::AirbornePosition => {
                resolved = self.apply_position(frame, &mut row);
            }
            MessageClass::AirborneVelocity => {
                if !self.apply_velocity(frame, &mut row) {
                    // Nothing decoded: leave this aircraft untouched
                    self.velocity_misses += 1;
                    return None;
                }
            }
            MessageClass::Unhandled => {
                trace!(
                    icao = %frame.address(),
                    tc = frame.type_code,
                    "unhandled type code"
                );
            }
        }

        let output = resolved.then(|| row.snapshot(frame.timestamp));
        self.store.put(icao, row);

        if output.is_some() {
            self.rows_emitted += 1;
        }
        output
    }

    /// Feed a position frame to the fusion engine. True if a fix resolved.
    fn apply_position(&mut self, frame: &WireFrame, row: &mut AircraftRow) -> bool {
        let pending = self.store.pending_mut(frame.icao);
        let outcome = self.fusion.update(pending, frame, &self.decoder);

        match outcome {
            Fusion::Pending => false,
            Fusion::Stale { gap } => {
                self.stale_pairs += 1;
                debug!(icao = %frame.address(), gap, "stale CPR pair skipped");
                false
            }
            Fusion::Unresolved => {
                self.fusion_attempts += 1;
                self.unresolved_pairs += 1;
                debug!(icao = %frame.address(), "CPR pair did not resolve");
                false
            }
            Fusion::Resolved(fix) => {
                self.fusion_attempts += 1;
                row.latitude = Some(fix.latitude);
                row.longitude = Some(fix.longitude);
                row.altitude = fix.altitude_km;
                true
            }
        }
    }

    /// Merge a velocity frame into `row`. False if the decoder had nothing.
    fn apply_velocity(&self, frame: &WireFrame, row: &mut AircraftRow) -> bool {
        let v = match self.decoder.velocity(&frame.raw_hex) {
            Some(v) => v,
            None => return false,
        };
        trace!(icao = %frame.address(), speed_type = %v.speed_type, "velocity");

        if let Some(speed) = v.speed_kts {
            if v.speed_type.is_ground() {
                row.ground_speed = Some(speed);
            } else {
                row.air_speed = Some(speed);
            }
        }
        if let Some(hdg) = v.heading_deg {
            row.heading = Some(hdg);
        }
        if let Some(vr) = v.vertical_rate_fpm {
            row.vertical_rate = Some(vr as f64);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Icao;

    const IDENT_KLM: &str = "8D4840D6202CC371C32CE0576098";
    const POS_EVEN: &str = "8D40621D58C382D690C8AC2863A7";
    const POS_ODD: &str = "8D40621D58C386435CC412692AD6";
    const VEL_GROUND: &str = "8D485020994409940838175B284F";
    const VEL_AIRSPEED: &str = "8DA05F219B06B6AF189400CBC33F";

    const ICAO_40621D: Icao = [0x40, 0x62, 0x1D];

    fn make_tracker() -> Tracker {
        Tracker::default()
    }

    fn parse(hex: &str, ts: f64) -> WireFrame {
        WireFrame::new(ts, hex).expect("valid frame")
    }

    /// Re-address a frame without touching the rest of it (no CRC checks here).
    fn readdress(hex: &str, icao: &str) -> String {
        format!("{}{}{}", &hex[..2], icao, &hex[8..])
    }

    #[test]
    fn test_aircraft_row_created() {
        let mut tracker = make_tracker();
        let out = tracker.update(&parse(IDENT_KLM, 1.0));
        assert!(out.is_none());

        let row = tracker.store().row(&[0x48, 0x40, 0xD6]).unwrap();
        assert_eq!(row.callsign.as_deref(), Some("KLM1023"));
        assert_eq!(row.timestamp, Some(1.0));
        assert!(!row.has_position());
    }

    #[test]
    fn test_position_pair_emits_one_row() {
        let mut tracker = make_tracker();

        assert!(tracker.update(&parse(POS_EVEN, 100.0)).is_none());
        let row = tracker
            .update(&parse(POS_ODD, 100.5))
            .expect("pair should resolve");

        assert_eq!(row.aircraft, "40621d");
        assert_eq!(row.timestamp, 100.5);
        assert!((row.latitude.unwrap() - 52.26578).abs() < 1e-4);
        assert!((row.longitude.unwrap() - 3.93891).abs() < 1e-4);
        assert!((row.altitude.unwrap() - 11.5824).abs() < 1e-9);
        assert_eq!(tracker.rows_emitted, 1);
        assert_eq!(tracker.fusion_attempts, 1);
    }

    #[test]
    fn test_stale_pair_emits_nothing() {
        let mut tracker = make_tracker();
        assert!(tracker.update(&parse(POS_EVEN, 100.0)).is_none());
        assert!(tracker.update(&parse(POS_ODD, 110.0)).is_none());
        assert_eq!(tracker.stale_pairs, 1);
        assert_eq!(tracker.rows_emitted, 0);
        assert!(!tracker.store().row(&ICAO_40621D).unwrap().has_position());
    }

    #[test]
    fn test_every_later_position_frame_repairs() {
        let mut tracker = make_tracker();
        tracker.update(&parse(POS_EVEN, 1.0));
        assert!(tracker.update(&parse(POS_ODD, 2.0)).is_some());
        assert!(tracker.update(&parse(POS_EVEN, 3.0)).is_some());
        assert!(tracker.update(&parse(POS_ODD, 4.0)).is_some());
        assert_eq!(tracker.rows_emitted, 3);
    }

    #[test]
    fn test_velocity_ground_then_position() {
        let mut tracker = make_tracker();
        let vel = readdress(VEL_GROUND, "40621D");

        assert!(tracker.update(&parse(&vel, 99.0)).is_none());
        tracker.update(&parse(POS_EVEN, 100.0));
        let row = tracker.update(&parse(POS_ODD, 100.5)).unwrap();

        assert!((row.ground_speed.unwrap() - 159.2).abs() < 0.5);
        assert!(row.air_speed.is_none());
        assert!((row.heading.unwrap() - 182.88).abs() < 0.1);
        assert_eq!(row.vertical_rate, Some(-832.0));
    }

    #[test]
    fn test_velocity_airspeed_then_position() {
        let mut tracker = make_tracker();
        let vel = readdress(VEL_AIRSPEED, "40621D");

        tracker.update(&parse(&vel, 99.0));
        tracker.update(&parse(POS_EVEN, 100.0));
        let row = tracker.update(&parse(POS_ODD, 100.5)).unwrap();

        assert_eq!(row.air_speed, Some(375.0));
        assert!(row.ground_speed.is_none());
    }

    #[test]
    fn test_identification_visible_in_next_fix() {
        let mut tracker = make_tracker();
        let ident = readdress(IDENT_KLM, "40621D");

        tracker.update(&parse(POS_EVEN, 100.0));
        assert!(tracker.update(&parse(&ident, 100.2)).is_none());
        let row = tracker.update(&parse(POS_ODD, 100.5)).unwrap();
        assert_eq!(row.callsign.as_deref(), Some("KLM1023"));
    }

    #[test]
    fn test_velocity_miss_leaves_state_untouched() {
        let mut tracker = make_tracker();
        tracker.update(&parse(POS_EVEN, 100.0));

        // TC 19, subtype 0: decoder has nothing to offer
        let bits = crate::types::hex_to_bits(&readdress(VEL_GROUND, "40621D")).unwrap();
        let blank = format!("{:028X}", bits & !(0x7u128 << 72));
        assert!(tracker.update(&parse(&blank, 200.0)).is_none());

        let row = tracker.store().row(&ICAO_40621D).unwrap();
        assert_eq!(row.timestamp, Some(100.0));
        assert_eq!(tracker.velocity_misses, 1);
    }

    #[test]
    fn test_velocity_miss_on_new_aircraft_creates_nothing() {
        let mut tracker = make_tracker();
        let bits = crate::types::hex_to_bits(VEL_GROUND).unwrap();
        let blank = format!("{:028X}", bits & !(0x7u128 << 72));
        tracker.update(&parse(&blank, 1.0));
        assert!(tracker.store().is_empty());
    }

    #[test]
    fn test_blank_callsign_overwrites_previous() {
        let mut tracker = make_tracker();
        tracker.update(&parse(IDENT_KLM, 1.0));
        // Same aircraft, identification with every character a space
        tracker.update(&parse("8D4840D620820820820820000000", 2.0));

        let row = tracker.store().row(&[0x48, 0x40, 0xD6]).unwrap();
        assert_eq!(row.callsign.as_deref(), Some(""));
        assert_eq!(row.timestamp, Some(2.0));
        assert_eq!(tracker.callsign_misses, 0);
    }

    #[test]
    fn test_unassigned_characters_kept_in_callsign() {
        let mut tracker = make_tracker();
        tracker.update(&parse("8D4840D620000000000000000000", 1.0));
        let row = tracker.store().row(&[0x48, 0x40, 0xD6]).unwrap();
        assert_eq!(row.callsign.as_deref(), Some("########"));
    }

    #[test]
    fn test_unhandled_type_code_updates_timestamp_only() {
        let mut tracker = make_tracker();
        tracker.update(&parse(IDENT_KLM, 1.0));

        // TC 28 (aircraft status) for the same address
        let status = "8D4840D6E1000000000000000000";
        assert!(tracker.update(&parse(status, 5.0)).is_none());

        let row = tracker.store().row(&[0x48, 0x40, 0xD6]).unwrap();
        assert_eq!(row.timestamp, Some(5.0));
        assert_eq!(row.callsign.as_deref(), Some("KLM1023"));
        assert_eq!(tracker.classes.unhandled, 1);
    }

    #[test]
    fn test_emitted_row_is_snapshot() {
        let mut tracker = make_tracker();
        tracker.update(&parse(POS_EVEN, 1.0));
        let row = tracker.update(&parse(POS_ODD, 2.0)).unwrap();

        let vel = readdress(VEL_GROUND, "40621D");
        tracker.update(&parse(&vel, 3.0));

        assert!(row.ground_speed.is_none());
        assert!(tracker
            .store()
            .row(&ICAO_40621D)
            .unwrap()
            .ground_speed
            .is_some());
    }

    #[test]
    fn test_aircraft_are_independent() {
        let mut tracker = make_tracker();
        let other_even = readdress(POS_EVEN, "ABCDEF");
        tracker.update(&parse(&other_even, 1.0));
        // Odd frame for a different aircraft must not pair with it
        assert!(tracker.update(&parse(POS_ODD, 1.5)).is_none());
        assert_eq!(tracker.store().len(), 2);
    }

    #[test]
    fn test_counters() {
        let mut tracker = make_tracker();
        tracker.update(&parse(IDENT_KLM, 1.0));
        tracker.update(&parse(POS_EVEN, 2.0));
        tracker.update(&parse(VEL_GROUND, 3.0));

        assert_eq!(tracker.total_frames, 3);
        assert_eq!(tracker.classes.identification, 1);
        assert_eq!(tracker.classes.airborne_position, 1);
        assert_eq!(tracker.classes.airborne_velocity, 1);
    }
}
