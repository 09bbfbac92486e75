//! Secure random number generation using the OS source.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::provider::SecureRandom;

#[derive(Debug)]
pub(super) struct OsSecureRandom;

impl SecureRandom for OsSecureRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), String> {
        OsRng.try_fill_bytes(buf).map_err(|e| e.to_string())
    }
}

pub(super) static SECURE_RANDOM: OsSecureRandom = OsSecureRandom;
