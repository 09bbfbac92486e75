//! Cryptographic primitives used by the handshake.
//!
//! AES-CMAC and the CKDF key derivation are implemented here. Elliptic curve
//! key generation, Diffie-Hellman and secure randomness come from a pluggable
//! [`CryptoProvider`].

mod cmac;
pub use cmac::{Cmac, BLOCK_LEN};

pub mod ckdf;
pub use ckdf::{KeyLengths, KeySet};

pub mod provider;
pub use provider::{CryptoProvider, CryptoSafe, HostKeyPair, KeyAgreement, SecureRandom};

pub mod rust_crypto;

use crate::message::DhGroup;

/// Elliptic curves usable as a HIP-DEX host identity.
///
/// The discriminants are the curve identifiers carried in HOST_ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcdhCurve {
    NistP256,
    NistP384,
    NistP521,
    Secp160r1,
}

impl EcdhCurve {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(EcdhCurve::NistP256),
            2 => Some(EcdhCurve::NistP384),
            3 => Some(EcdhCurve::NistP521),
            4 => Some(EcdhCurve::Secp160r1),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            EcdhCurve::NistP256 => 1,
            EcdhCurve::NistP384 => 2,
            EcdhCurve::NistP521 => 3,
            EcdhCurve::Secp160r1 => 4,
        }
    }

    /// Length of an uncompressed SEC1 point on this curve.
    pub fn public_key_len(&self) -> usize {
        1 + 2 * self.field_len()
    }

    fn field_len(&self) -> usize {
        match self {
            EcdhCurve::NistP256 => 32,
            EcdhCurve::NistP384 => 48,
            EcdhCurve::NistP521 => 66,
            EcdhCurve::Secp160r1 => 20,
        }
    }

    /// The DH_GROUP_LIST entry for this curve.
    pub fn dh_group(&self) -> DhGroup {
        match self {
            EcdhCurve::NistP256 => DhGroup::NistP256,
            EcdhCurve::NistP384 => DhGroup::NistP384,
            EcdhCurve::NistP521 => DhGroup::NistP521,
            EcdhCurve::Secp160r1 => DhGroup::Secp160r1,
        }
    }
}
