//! Packet routing addresses.
//!
//! A route names one endpoint of a link packet: the chip it lives on
//! and the logical channel on that chip. On the wire a route is a
//! single byte, `chip << 4 | channel`.

use std::fmt;

use crate::error::StreamError;

// ── Chip ─────────────────────────────────────────────────────────

/// Processors on either end of the link.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chip {
    /// The camera processor running the capture pipeline.
    Host = 0x1,
    /// The wireless companion that relays to the remote client.
    Wifi = 0x2,
}

impl TryFrom<u8> for Chip {
    type Error = StreamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x1 => Ok(Chip::Host),
            0x2 => Ok(Chip::Wifi),
            _ => Err(StreamError::UnknownVariant {
                type_name: "Chip",
                value: value as u64,
            }),
        }
    }
}

// ── Channel ──────────────────────────────────────────────────────

/// Logical channels multiplexed over the link.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Credentials, connect requests and status codes.
    Control = 0x0,
    /// Image headers and payload fragments.
    Data = 0x1,
}

impl TryFrom<u8> for Channel {
    type Error = StreamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Channel::Control),
            0x1 => Ok(Channel::Data),
            _ => Err(StreamError::UnknownVariant {
                type_name: "Channel",
                value: value as u64,
            }),
        }
    }
}

// ── Route ────────────────────────────────────────────────────────

/// A `(chip, channel)` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    pub chip: Chip,
    pub channel: Channel,
}

impl Route {
    pub const HOST_CONTROL: Route = Route::new(Chip::Host, Channel::Control);
    pub const HOST_DATA: Route = Route::new(Chip::Host, Channel::Data);
    pub const WIFI_CONTROL: Route = Route::new(Chip::Wifi, Channel::Control);
    pub const WIFI_DATA: Route = Route::new(Chip::Wifi, Channel::Data);

    pub const fn new(chip: Chip, channel: Channel) -> Self {
        Self { chip, channel }
    }

    /// Pack into the single-byte wire form.
    pub const fn to_byte(self) -> u8 {
        (self.chip as u8) << 4 | self.channel as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, StreamError> {
        Ok(Self {
            chip: Chip::try_from(byte >> 4)?,
            channel: Channel::try_from(byte & 0x0F)?,
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.chip, self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_byte_layout() {
        assert_eq!(Route::HOST_CONTROL.to_byte(), 0x10);
        assert_eq!(Route::HOST_DATA.to_byte(), 0x11);
        assert_eq!(Route::WIFI_CONTROL.to_byte(), 0x20);
        assert_eq!(Route::WIFI_DATA.to_byte(), 0x21);
    }

    #[test]
    fn route_from_byte() {
        assert_eq!(Route::from_byte(0x21).unwrap(), Route::WIFI_DATA);
        assert_eq!(Route::from_byte(0x10).unwrap(), Route::HOST_CONTROL);
    }

    #[test]
    fn unknown_chip_or_channel_rejected() {
        assert!(Route::from_byte(0x30).is_err());
        assert!(Route::from_byte(0x17).is_err());
    }

    #[test]
    fn display_format() {
        assert_eq!(Route::WIFI_DATA.to_string(), "Wifi/Data");
    }
}
