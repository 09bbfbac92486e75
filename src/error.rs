use thiserror::Error;

use crate::message::{PacketType, ParameterType};

/// Errors produced by the codec, the crypto and the handshake.
///
/// A packet rejected by [`Engine::handle_packet`](crate::Engine::handle_packet)
/// leaves every connection untouched; the error is only there for the caller
/// to log or count.
#[derive(Debug, Error)]
pub enum Error {
    /// Input ended before the structure was complete.
    #[error("Parse incomplete")]
    ParseIncomplete,

    /// nom rejected the input.
    #[error("Parse error: {0:?}")]
    ParseError(nom::error::ErrorKind),

    /// Fewer bytes than the fixed header, or a length field pointing past the buffer.
    #[error("Too short")]
    TooShort,

    #[error("Bad checksum: computed {computed:#06x}, packet has {received:#06x}")]
    BadChecksum { computed: u16, received: u16 },

    #[error("Unknown packet type {0}")]
    UnknownPacketType(u8),

    #[error("Unsupported HIP version {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown parameter type {0}")]
    UnknownParameter(u16),

    /// Parameter content did not match the layout of its type.
    #[error("Invalid {0:?} parameter")]
    InvalidParameter(ParameterType),

    /// A parameter mandatory for the packet kind is absent.
    #[error("{0:?} is missing mandatory {1:?}")]
    MissingParameter(PacketType, ParameterType),

    #[error("Unknown curve identifier {0}")]
    UnknownCurve(u16),

    /// Encoded packet would not fit the 8-bit length field.
    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),

    /// Packet is addressed to another host.
    #[error("Receiver HIT is not ours")]
    ReceiverMismatch,

    /// HIP_MAC_3 did not verify.
    #[error("HIP_MAC_3 mismatch")]
    BadMac,

    /// Puzzle solution did not verify against any retained secret.
    #[error("Puzzle solution rejected")]
    BadSolution,

    /// Peer offered Diffie-Hellman groups that do not match ours.
    #[error("DH group mismatch")]
    DhGroupMismatch,

    /// Handshake rejected for a reason other than tag, puzzle or group.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// API called in a state where it is not allowed.
    #[error("Usage error: {0}")]
    UsageError(String),

    /// The ECDH collaborator or the block cipher could not do its job.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// Coarse classes of [`Error`], following the handshake's failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Drop silently, no reply, no state change.
    Malformed,
    /// Drop and do not transition.
    Authentication,
    /// Reported synchronously to the caller.
    Usage,
    /// Abort the current handshake step, stay in the current state.
    CryptoUnavailable,
    /// Invalid configuration.
    Config,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ParseIncomplete
            | Error::ParseError(_)
            | Error::TooShort
            | Error::BadChecksum { .. }
            | Error::UnknownPacketType(_)
            | Error::UnsupportedVersion(_)
            | Error::UnknownParameter(_)
            | Error::InvalidParameter(_)
            | Error::MissingParameter(_, _)
            | Error::PacketTooLarge(_)
            | Error::ReceiverMismatch => ErrorCategory::Malformed,
            Error::BadMac
            | Error::BadSolution
            | Error::DhGroupMismatch
            | Error::SecurityError(_) => ErrorCategory::Authentication,
            Error::UsageError(_) | Error::UnknownCurve(_) => ErrorCategory::Usage,
            Error::CryptoError(_) => ErrorCategory::CryptoUnavailable,
            Error::ConfigError(_) => ErrorCategory::Config,
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::ParseError(e.code),
        }
    }
}
