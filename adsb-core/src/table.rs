//! Column-oriented view of the emitted rows with the fixed output schema.
//!
//! Nullable columns keep `None` as a first-class value so a missing reading
//! never collides with a genuine zero.

use serde::Serialize;

use crate::store::OutputRow;

/// Column names in output order.
pub const COLUMNS: [&str; 10] = [
    "timestamp",
    "aircraft",
    "callsign",
    "longitude",
    "latitude",
    "altitude",
    "ground_speed",
    "air_speed",
    "heading",
    "vertical_rate",
];

/// Fixed width of the `aircraft` column.
pub const AIRCRAFT_WIDTH: usize = 6;

/// Maximum width of the `callsign` column.
pub const CALLSIGN_WIDTH: usize = 8;

/// Output table, one vector per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AircraftTable {
    pub timestamp: Vec<f64>,
    pub aircraft: Vec<String>,
    pub callsign: Vec<Option<String>>,
    pub longitude: Vec<Option<f64>>,
    pub latitude: Vec<Option<f64>>,
    pub altitude: Vec<Option<f64>>,
    pub ground_speed: Vec<Option<f64>>,
    pub air_speed: Vec<Option<f64>>,
    pub heading: Vec<Option<f64>>,
    pub vertical_rate: Vec<Option<f64>>,
}

impl AircraftTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a OutputRow>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.push(row);
        }
        table
    }

    /// Append one row, keeping insertion order.
    pub fn push(&mut self, row: &OutputRow) {
        self.timestamp.push(row.timestamp);
        self.aircraft
            .push(row.aircraft.chars().take(AIRCRAFT_WIDTH).collect());
        self.callsign.push(
            row.callsign
                .as_ref()
                .map(|cs| cs.chars().take(CALLSIGN_WIDTH).collect()),
        );
        self.longitude.push(row.longitude);
        self.latitude.push(row.latitude);
        self.altitude.push(row.altitude);
        self.ground_speed.push(row.ground_speed);
        self.air_speed.push(row.air_speed);
        self.heading.push(row.heading);
        self.vertical_rate.push(row.vertical_rate);
    }

    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }

    /// The nullable float columns, in output order, with their names.
    pub fn float_columns(&self) -> [(&'static str, &[Option<f64>]); 7] {
        [
            (COLUMNS[3], self.longitude.as_slice()),
            (COLUMNS[4], self.latitude.as_slice()),
            (COLUMNS[5], self.altitude.as_slice()),
            (COLUMNS[6], self.ground_speed.as_slice()),
            (COLUMNS[7], self.air_speed.as_slice()),
            (COLUMNS[8], self.heading.as_slice()),
            (COLUMNS[9], self.vertical_rate.as_slice()),
        ]
    }
}
