//! Provider traits for the elliptic curve and randomness collaborators.
//!
//! The handshake never touches curve arithmetic directly. A [`CryptoProvider`]
//! holds static references to factories ([`KeyAgreement`]) that create static
//! host key pairs ([`HostKeyPair`]), plus a [`SecureRandom`] used for puzzle
//! secrets. The default provider lives in [`rust_crypto`](super::rust_crypto).
//!
//! ```
//! use hipdex::crypto::{rust_crypto, EcdhCurve};
//!
//! let provider = rust_crypto::default_provider();
//! let kx = provider.key_agreement(EcdhCurve::NistP256).unwrap();
//!
//! let a = kx.generate_key_pair().unwrap();
//! let b = kx.generate_key_pair().unwrap();
//!
//! let mut s1 = Vec::new();
//! let mut s2 = Vec::new();
//! a.derive_shared_secret(b.public_key(), &mut s1).unwrap();
//! b.derive_shared_secret(a.public_key(), &mut s2).unwrap();
//! assert_eq!(s1, s2);
//! ```

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use super::EcdhCurve;
use crate::Error;

/// Marker trait for types that are safe to use in a cryptographic context.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

/// Blanket implementation: any type satisfying the bounds implements [`CryptoSafe`].
impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

/// A static ECDH key pair. In HIP-DEX this is the host identity itself.
pub trait HostKeyPair: CryptoSafe {
    fn curve(&self) -> EcdhCurve;

    /// Uncompressed SEC1 encoding of the public key.
    fn public_key(&self) -> &[u8];

    /// ECDH with the peer's public key, appending the x-coordinate to `out`.
    fn derive_shared_secret(&self, peer_public: &[u8], out: &mut Vec<u8>) -> Result<(), String>;
}

/// Key agreement support for one curve (factory for [`HostKeyPair`]).
pub trait KeyAgreement: CryptoSafe {
    fn curve(&self) -> EcdhCurve;

    /// Generate a fresh key pair.
    fn generate_key_pair(&self) -> Result<Box<dyn HostKeyPair>, String>;

    /// Load a key pair from its big-endian private scalar.
    fn load_key_pair(&self, private_key: &[u8]) -> Result<Box<dyn HostKeyPair>, String>;
}

/// Cryptographically secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// The set of cryptographic collaborators used by an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported curves for host identities.
    pub key_agreements: &'static [&'static dyn KeyAgreement],

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,
}

/// Static storage for the default crypto provider.
static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a process wide default provider.
    ///
    /// Used by [`Config::builder()`](crate::Config::builder) when no explicit
    /// provider is set. Can only be done once; a second call hands the
    /// provider back.
    pub fn install_default(provider: CryptoProvider) -> Result<(), CryptoProvider> {
        DEFAULT.set(provider)
    }

    /// Get the installed default provider, if any.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    /// Key agreement for `curve`, if this provider supports it.
    pub fn key_agreement(&self, curve: EcdhCurve) -> Option<&'static dyn KeyAgreement> {
        self.key_agreements
            .iter()
            .find(|k| k.curve() == curve)
            .copied()
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.key_agreements.is_empty() {
            return Err(Error::ConfigError(
                "Crypto provider supports no curves".to_string(),
            ));
        }
        let mut probe = [0u8; 16];
        self.secure_random
            .fill(&mut probe)
            .map_err(|e| Error::ConfigError(format!("Secure random unavailable: {}", e)))?;
        Ok(())
    }
}
