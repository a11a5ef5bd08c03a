//! Per-aircraft state: the running decoded row and the pending CPR frames.
//!
//! One `AircraftRow` and one `CprPending` per aircraft address, both keyed by
//! the same `Icao`. Entries live for the whole run.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{icao_to_string, Icao};

// ---------------------------------------------------------------------------
// Aircraft row
// ---------------------------------------------------------------------------

/// Running decoded state for one aircraft.
///
/// Every field except the address starts absent and only becomes present once
/// a message reporting it has been decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftRow {
    pub icao: Icao,
    pub timestamp: Option<f64>,
    pub callsign: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Barometric altitude in kilometres
    pub altitude: Option<f64>,
    /// Knots
    pub ground_speed: Option<f64>,
    /// Knots (IAS or TAS)
    pub air_speed: Option<f64>,
    /// Degrees
    pub heading: Option<f64>,
    /// Feet per minute
    pub vertical_rate: Option<f64>,
}

impl AircraftRow {
    pub fn new(icao: Icao) -> Self {
        AircraftRow {
            icao,
            timestamp: None,
            callsign: None,
            longitude: None,
            latitude: None,
            altitude: None,
            ground_speed: None,
            air_speed: None,
            heading: None,
            vertical_rate: None,
        }
    }

    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Snapshot this row for the output table at `timestamp`.
    pub fn snapshot(&self, timestamp: f64) -> OutputRow {
        OutputRow {
            timestamp,
            aircraft: icao_to_string(&self.icao),
            callsign: self.callsign.clone(),
            longitude: self.longitude,
            latitude: self.latitude,
            altitude: self.altitude,
            ground_speed: self.ground_speed,
            air_speed: self.air_speed,
            heading: self.heading,
            vertical_rate: self.vertical_rate,
        }
    }
}

/// Immutable copy of an `AircraftRow` taken when a position fix resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub timestamp: f64,
    pub aircraft: String,
    pub callsign: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub altitude: Option<f64>,
    pub ground_speed: Option<f64>,
    pub air_speed: Option<f64>,
    pub heading: Option<f64>,
    pub vertical_rate: Option<f64>,
}

// ---------------------------------------------------------------------------
// Pending CPR frames
// ---------------------------------------------------------------------------

/// A position frame waiting for its opposite-parity partner.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFrame {
    pub timestamp: f64,
    pub raw_hex: String,
}

/// Most recent even and odd position frame for one aircraft.
///
/// Each slot holds at most one frame; a new frame of the same parity replaces
/// the old one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CprPending {
    pub even: Option<PendingFrame>,
    pub odd: Option<PendingFrame>,
}

impl CprPending {
    pub fn store(&mut self, odd: bool, frame: PendingFrame) {
        if odd {
            self.odd = Some(frame);
        } else {
            self.even = Some(frame);
        }
    }

    /// `(even, odd)` when both slots are filled.
    pub fn pair(&self) -> Option<(&PendingFrame, &PendingFrame)> {
        match (&self.even, &self.odd) {
            (Some(even), Some(odd)) => Some((even, odd)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// State store
// ---------------------------------------------------------------------------

/// Address-keyed store of aircraft rows and pending CPR frames.
#[derive(Debug, Default)]
pub struct StateStore {
    rows: HashMap<Icao, AircraftRow>,
    pending: HashMap<Icao, CprPending>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the stored row, or a fresh all-absent row for a new address.
    pub fn get_or_init(&self, icao: Icao) -> AircraftRow {
        self.rows
            .get(&icao)
            .cloned()
            .unwrap_or_else(|| AircraftRow::new(icao))
    }

    /// Replace the stored row.
    pub fn put(&mut self, icao: Icao, row: AircraftRow) {
        self.rows.insert(icao, row);
    }

    pub fn row(&self, icao: &Icao) -> Option<&AircraftRow> {
        self.rows.get(icao)
    }

    pub fn pending(&self, icao: &Icao) -> Option<&CprPending> {
        self.pending.get(icao)
    }

    pub fn pending_mut(&mut self, icao: Icao) -> &mut CprPending {
        self.pending.entry(icao).or_default()
    }

    /// Number of distinct aircraft seen.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
