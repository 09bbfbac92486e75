//! RustCrypto backed provider.
//!
//! Host keys on NIST P-256 and P-384 via the `p256` and `p384` crates, and
//! `OsRng` from `rand` for secure randomness.

mod kx_group;
mod random;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Curves
///
/// - NIST P-256
/// - NIST P-384
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        key_agreements: kx_group::ALL_KEY_AGREEMENTS,
        secure_random: &random::SECURE_RANDOM,
    }
}
