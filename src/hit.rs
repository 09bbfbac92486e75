use std::fmt;

use crate::crypto::{CryptoProvider, EcdhCurve, HostKeyPair};
use crate::Error;

/// Prefix of a HIP-DEX HIT: ORCHID prefix 2001:10::/28 with the LTRUNC suite.
const HIT_PREFIX: [u8; 4] = [0x20, 0x01, 0x00, 0x15];

/// Host Identity Tag.
///
/// Ordering is unsigned big-endian, which is what the tie-break and the key
/// derivation compare by.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hit([u8; 16]);

impl Hit {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Hit(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| Error::TooShort)?;
        Ok(Hit(bytes))
    }

    /// Derive the HIT of an uncompressed SEC1 public key.
    ///
    /// The prefix is followed by the first 12 bytes of the key after the
    /// `0x04` tag.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, Error> {
        if public_key.len() < 13 || public_key[0] != 0x04 {
            return Err(Error::CryptoError(
                "Public key is not an uncompressed point".to_string(),
            ));
        }
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&HIT_PREFIX);
        bytes[4..].copy_from_slice(&public_key[1..13]);
        Ok(Hit(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Hit {
    /// IPv6 notation without zero compression.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pair) in self.0.chunks_exact(2).enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}{:02x}", pair[0], pair[1])?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hit({})", self)
    }
}

/// The local host identity: a static ECDH key pair and its HIT.
pub struct HostIdentity {
    hit: Hit,
    key: Box<dyn HostKeyPair>,
}

impl HostIdentity {
    /// Generate a fresh key pair on `curve` and derive its HIT.
    pub fn generate(provider: &CryptoProvider, curve: EcdhCurve) -> Result<Self, Error> {
        let kx = provider
            .key_agreement(curve)
            .ok_or(Error::UnknownCurve(curve.as_u16()))?;
        let key = kx.generate_key_pair().map_err(Error::CryptoError)?;
        Self::from_key_pair(key)
    }

    /// Use an existing key pair, deriving its HIT.
    pub fn from_key_pair(key: Box<dyn HostKeyPair>) -> Result<Self, Error> {
        let hit = Hit::from_public_key(key.public_key())?;
        Ok(HostIdentity { hit, key })
    }

    /// Pin an explicit HIT to a key pair.
    ///
    /// Peers must turn off [`Config::verify_host_identity`](crate::Config::verify_host_identity)
    /// to accept such an identity.
    pub fn with_hit(hit: Hit, key: Box<dyn HostKeyPair>) -> Self {
        HostIdentity { hit, key }
    }

    pub fn hit(&self) -> Hit {
        self.hit
    }

    pub fn curve(&self) -> EcdhCurve {
        self.key.curve()
    }

    pub fn public_key(&self) -> &[u8] {
        self.key.public_key()
    }

    pub fn key_pair(&self) -> &dyn HostKeyPair {
        self.key.as_ref()
    }
}

impl fmt::Debug for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostIdentity")
            .field("hit", &self.hit)
            .field("curve", &self.key.curve())
            .finish()
    }
}
