//! adsb-core: turn timestamped Mode S / ADS-B frames into a per-aircraft table.
//!
//! Frames are parsed, classified by type code, and merged into one running
//! row per aircraft. Even/odd CPR position frames are paired into global
//! fixes, and every resolved fix emits a snapshot of the aircraft's row.
//! No async, no output formats: the `adsb-table` binary handles those.

pub mod batch;
pub mod classify;
pub mod config;
pub mod cpr;
pub mod decode;
pub mod frame;
pub mod fusion;
pub mod store;
pub mod table;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use batch::{discover_sources, BatchDriver, BatchStats};
pub use classify::MessageClass;
pub use decode::{Decoder, ModeS};
pub use frame::{parse_line, WireFrame};
pub use fusion::{FusionEngine, DEFAULT_PAIR_WINDOW};
pub use store::{AircraftRow, OutputRow, StateStore};
pub use table::AircraftTable;
pub use tracker::Tracker;
pub use types::*;
