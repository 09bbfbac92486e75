//! CMAC-based extract-then-expand key derivation.
//!
//! ```text
//! ck   = CMAC(I, secret || min(HIT_I, HIT_R) || max(HIT_I, HIT_R) || "CKDF-Extract")
//! T(i) = CMAC(ck, T(i-1) || "CKDF-Expand" || i)
//! ```
//!
//! The keying material is sliced as the greater HIT's encryption and integrity
//! keys, followed by the smaller HIT's. Both peers therefore derive the same
//! four keys regardless of which side computes them.

use zeroize::Zeroizing;

use super::cmac::{Cmac, BLOCK_LEN};
use crate::{Error, Hit};

const EXTRACT_LABEL: &[u8] = b"CKDF-Extract";
const EXPAND_LABEL: &[u8] = b"CKDF-Expand";

/// Lengths of the derived keys, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLengths {
    pub encryption: usize,
    pub integrity: usize,
}

impl Default for KeyLengths {
    fn default() -> Self {
        KeyLengths {
            encryption: 16,
            integrity: 16,
        }
    }
}

/// The four session keys of an association.
///
/// Keys are named by handshake role. `is_initiator` records which role the
/// local host had, so the `local_*`/`peer_*` accessors pick the right pair.
#[derive(PartialEq, Eq)]
pub struct KeySet {
    initiator_encryption: Zeroizing<Vec<u8>>,
    initiator_integrity: Zeroizing<Vec<u8>>,
    responder_encryption: Zeroizing<Vec<u8>>,
    responder_integrity: Zeroizing<Vec<u8>>,
    is_initiator: bool,
}

impl KeySet {
    pub fn initiator_encryption(&self) -> &[u8] {
        &self.initiator_encryption
    }

    pub fn initiator_integrity(&self) -> &[u8] {
        &self.initiator_integrity
    }

    pub fn responder_encryption(&self) -> &[u8] {
        &self.responder_encryption
    }

    pub fn responder_integrity(&self) -> &[u8] {
        &self.responder_integrity
    }

    pub fn is_initiator(&self) -> bool {
        self.is_initiator
    }

    /// Key used to protect what we send.
    pub fn local_encryption(&self) -> &[u8] {
        if self.is_initiator {
            self.initiator_encryption()
        } else {
            self.responder_encryption()
        }
    }

    pub fn local_integrity(&self) -> &[u8] {
        if self.is_initiator {
            self.initiator_integrity()
        } else {
            self.responder_integrity()
        }
    }

    pub fn peer_encryption(&self) -> &[u8] {
        if self.is_initiator {
            self.responder_encryption()
        } else {
            self.initiator_encryption()
        }
    }

    pub fn peer_integrity(&self) -> &[u8] {
        if self.is_initiator {
            self.responder_integrity()
        } else {
            self.initiator_integrity()
        }
    }

    /// Whether both sets hold the same four keys, whatever the local role.
    pub fn same_keys(&self, other: &KeySet) -> bool {
        self.initiator_encryption == other.initiator_encryption
            && self.initiator_integrity == other.initiator_integrity
            && self.responder_encryption == other.responder_encryption
            && self.responder_integrity == other.responder_integrity
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("is_initiator", &self.is_initiator)
            .field("encryption_len", &self.initiator_encryption.len())
            .field("integrity_len", &self.initiator_integrity.len())
            .finish_non_exhaustive()
    }
}

/// Derive the session keys for the association between `hit_i` (initiator)
/// and `hit_r` (responder).
///
/// `random_i` is the puzzle value I of the handshake and keys the extract step.
pub fn derive(
    shared_secret: &[u8],
    hit_i: &Hit,
    hit_r: &Hit,
    random_i: &[u8; 16],
    is_initiator: bool,
    lengths: KeyLengths,
) -> Result<KeySet, Error> {
    let (smaller, greater) = if hit_i < hit_r {
        (hit_i, hit_r)
    } else {
        (hit_r, hit_i)
    };

    let mut mac = Cmac::with_block_key(random_i);
    mac.update(shared_secret);
    mac.update(smaller.as_bytes());
    mac.update(greater.as_bytes());
    mac.update(EXTRACT_LABEL);
    let ck = Zeroizing::new(mac.finalize());

    let total = 2 * lengths.encryption + 2 * lengths.integrity;
    let keymat = expand(&ck[..], total)?;

    let (greater_enc, rest) = keymat.split_at(lengths.encryption);
    let (greater_int, rest) = rest.split_at(lengths.integrity);
    let (smaller_enc, smaller_int) = rest.split_at(lengths.encryption);

    let key = |k: &[u8]| Zeroizing::new(k.to_vec());

    // Equal HITs cannot happen between two hosts; they fall to the responder-first order.
    let keys = if hit_i > hit_r {
        KeySet {
            initiator_encryption: key(greater_enc),
            initiator_integrity: key(greater_int),
            responder_encryption: key(smaller_enc),
            responder_integrity: key(smaller_int),
            is_initiator,
        }
    } else {
        KeySet {
            initiator_encryption: key(smaller_enc),
            initiator_integrity: key(smaller_int),
            responder_encryption: key(greater_enc),
            responder_integrity: key(greater_int),
            is_initiator,
        }
    };

    Ok(keys)
}

/// Expand `ck` into `len` bytes of keying material.
pub fn expand(ck: &[u8], len: usize) -> Result<Zeroizing<Vec<u8>>, Error> {
    let blocks = len.div_ceil(BLOCK_LEN);
    if blocks > u8::MAX as usize {
        return Err(Error::CryptoError(format!(
            "CKDF cannot expand to {} bytes",
            len
        )));
    }

    let mut mac = Cmac::new(ck)?;
    let mut out = Zeroizing::new(Vec::with_capacity(blocks * BLOCK_LEN));
    let mut prev = Zeroizing::new([0u8; BLOCK_LEN]);

    for i in 1..=blocks {
        if i > 1 {
            mac.update(&prev[..]);
        }
        mac.update(EXPAND_LABEL);
        mac.update_u8(i as u8);
        *prev = mac.finalize();
        out.extend_from_slice(&prev[..]);
    }

    out.truncate(len);
    Ok(out)
}
