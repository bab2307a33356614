//! Control-channel vocabulary.
//!
//! Commands flow host → wifi chip; status messages flow back. The
//! first payload byte of every control packet is the code.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::StreamError;
use crate::packet::PACKET_DATA_CAPACITY;

// ── CommandCode ──────────────────────────────────────────────────

/// Codes understood by the wifi chip.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// Set the network identifier (SSID).
    SetSsid = 0x10,
    /// Set the network secret.
    SetPassword = 0x11,
    /// Associate with the configured network.
    Connect = 0x20,
}

impl TryFrom<u8> for CommandCode {
    type Error = StreamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x10 => Ok(CommandCode::SetSsid),
            0x11 => Ok(CommandCode::SetPassword),
            0x20 => Ok(CommandCode::Connect),
            _ => Err(StreamError::UnknownVariant {
                type_name: "CommandCode",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── ControlCommand ───────────────────────────────────────────────

/// A command with its argument, ready to be put in one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    SetSsid(String),
    SetPassword(String),
    Connect,
}

impl ControlCommand {
    pub fn code(&self) -> CommandCode {
        match self {
            ControlCommand::SetSsid(_) => CommandCode::SetSsid,
            ControlCommand::SetPassword(_) => CommandCode::SetPassword,
            ControlCommand::Connect => CommandCode::Connect,
        }
    }

    /// Longest credential that still fits beside the code byte and
    /// the terminating NUL.
    pub const MAX_CREDENTIAL_LEN: usize = PACKET_DATA_CAPACITY - 2;

    /// Check that the argument can be sent as a NUL-terminated string
    /// in a single packet.
    pub fn validate(&self) -> Result<(), StreamError> {
        let text = match self {
            ControlCommand::SetSsid(s) | ControlCommand::SetPassword(s) => s,
            ControlCommand::Connect => return Ok(()),
        };
        if text.len() > Self::MAX_CREDENTIAL_LEN {
            return Err(StreamError::InvalidCredential(
                "credential does not fit in one packet",
            ));
        }
        if text.as_bytes().contains(&0) {
            return Err(StreamError::InvalidCredential(
                "credential contains a NUL byte",
            ));
        }
        Ok(())
    }

    /// Packet payload: `code | text | NUL` or just `code`.
    pub fn encode(&self) -> Result<Bytes, StreamError> {
        self.validate()?;
        let mut buf = BytesMut::with_capacity(PACKET_DATA_CAPACITY);
        buf.put_u8(self.code() as u8);
        match self {
            ControlCommand::SetSsid(s) | ControlCommand::SetPassword(s) => {
                buf.put_slice(s.as_bytes());
                buf.put_u8(0);
            }
            ControlCommand::Connect => {}
        }
        Ok(buf.freeze())
    }

    /// Parse a command payload. Used by the relay side.
    pub fn decode(data: &[u8]) -> Result<Self, StreamError> {
        let (&code, rest) = data
            .split_first()
            .ok_or(StreamError::ProtocolViolation("empty control packet"))?;
        match CommandCode::try_from(code)? {
            CommandCode::SetSsid => Ok(ControlCommand::SetSsid(nul_terminated(rest)?)),
            CommandCode::SetPassword => Ok(ControlCommand::SetPassword(nul_terminated(rest)?)),
            CommandCode::Connect => Ok(ControlCommand::Connect),
        }
    }
}

fn nul_terminated(bytes: &[u8]) -> Result<String, StreamError> {
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(StreamError::ProtocolViolation("credential is not NUL-terminated"))?;
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|_| StreamError::ProtocolViolation("credential is not utf-8"))
}

// ── StatusMessage ────────────────────────────────────────────────

pub const STATUS_LINK_ASSOCIATED: u8 = 0x21;
pub const STATUS_CLIENT_ATTACH: u8 = 0x23;

/// Asynchronous status reported by the wifi chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    /// The chip joined the network and got this address.
    LinkAssociated(Ipv4Addr),
    /// A remote client attached (`true`) or detached (`false`).
    ClientAttach(bool),
    /// A code this build does not know about.
    Unknown(u8),
}

impl StatusMessage {
    /// Parse a status payload.
    ///
    /// Returns `None` when the payload is too short for its code.
    /// Unrecognized codes parse as [`StatusMessage::Unknown`].
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&code, rest) = data.split_first()?;
        match code {
            STATUS_LINK_ASSOCIATED => {
                let octets: [u8; 4] = rest.get(..4)?.try_into().ok()?;
                Some(StatusMessage::LinkAssociated(Ipv4Addr::from(octets)))
            }
            STATUS_CLIENT_ATTACH => rest.first().map(|&v| StatusMessage::ClientAttach(v == 1)),
            other => Some(StatusMessage::Unknown(other)),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5);
        match self {
            StatusMessage::LinkAssociated(addr) => {
                buf.put_u8(STATUS_LINK_ASSOCIATED);
                buf.put_slice(&addr.octets());
            }
            StatusMessage::ClientAttach(attached) => {
                buf.put_u8(STATUS_CLIENT_ATTACH);
                buf.put_u8(*attached as u8);
            }
            StatusMessage::Unknown(code) => buf.put_u8(*code),
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssid_payload_layout() {
        let payload = ControlCommand::SetSsid("lab".into()).encode().unwrap();
        assert_eq!(&payload[..], &[0x10, b'l', b'a', b'b', 0]);
    }

    #[test]
    fn connect_payload_is_code_only() {
        let payload = ControlCommand::Connect.encode().unwrap();
        assert_eq!(&payload[..], &[0x20]);
    }

    #[test]
    fn longest_credential_fills_packet() {
        let s = "x".repeat(ControlCommand::MAX_CREDENTIAL_LEN);
        let payload = ControlCommand::SetPassword(s).encode().unwrap();
        assert_eq!(payload.len(), PACKET_DATA_CAPACITY);

        let s = "x".repeat(ControlCommand::MAX_CREDENTIAL_LEN + 1);
        assert!(ControlCommand::SetPassword(s).encode().is_err());
    }

    #[test]
    fn interior_nul_rejected() {
        assert!(ControlCommand::SetSsid("a\0b".into()).validate().is_err());
    }

    #[test]
    fn command_decode() {
        let payload = ControlCommand::SetPassword("hunter2".into()).encode().unwrap();
        assert_eq!(
            ControlCommand::decode(&payload).unwrap(),
            ControlCommand::SetPassword("hunter2".into())
        );
        assert_eq!(ControlCommand::decode(&[0x20]).unwrap(), ControlCommand::Connect);
        assert!(ControlCommand::decode(&[0x10, b'a']).is_err());
        assert!(ControlCommand::decode(&[0x99]).is_err());
        assert!(ControlCommand::decode(&[]).is_err());
    }

    #[test]
    fn status_link_associated() {
        let msg = StatusMessage::parse(&[0x21, 192, 168, 1, 42]).unwrap();
        assert_eq!(msg, StatusMessage::LinkAssociated(Ipv4Addr::new(192, 168, 1, 42)));
    }

    #[test]
    fn status_client_attach() {
        assert_eq!(StatusMessage::parse(&[0x23, 1]), Some(StatusMessage::ClientAttach(true)));
        assert_eq!(StatusMessage::parse(&[0x23, 0]), Some(StatusMessage::ClientAttach(false)));
    }

    #[test]
    fn short_status_is_none() {
        assert_eq!(StatusMessage::parse(&[]), None);
        assert_eq!(StatusMessage::parse(&[0x21, 10, 0]), None);
        assert_eq!(StatusMessage::parse(&[0x23]), None);
    }

    #[test]
    fn unknown_status_code() {
        assert_eq!(StatusMessage::parse(&[0x7E, 1, 2]), Some(StatusMessage::Unknown(0x7E)));
    }

    #[test]
    fn status_encode_parses_back() {
        let msg = StatusMessage::LinkAssociated(Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(StatusMessage::parse(&msg.encode()), Some(msg));
    }
}
