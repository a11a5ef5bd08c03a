//! Map ADS-B type codes onto the message classes this crate decodes.

use serde::Serialize;

/// Message class derived from the type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageClass {
    /// TC 0-4: aircraft identification (callsign)
    Identification,
    /// TC 9-18: airborne position with barometric altitude
    AirbornePosition,
    /// TC 19: airborne velocity
    AirborneVelocity,
    /// Everything else. Still updates the aircraft's timestamp.
    Unhandled,
}

impl MessageClass {
    pub fn from_type_code(tc: u8) -> Self {
        match tc {
            0..=4 => MessageClass::Identification,
            9..=18 => MessageClass::AirbornePosition,
            19 => MessageClass::AirborneVelocity,
            _ => MessageClass::Unhandled,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageClass::Identification => "identification",
            MessageClass::AirbornePosition => "airborne position",
            MessageClass::AirborneVelocity => "airborne velocity",
            MessageClass::Unhandled => "unhandled",
        }
    }
}
