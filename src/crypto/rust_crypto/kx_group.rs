//! Static ECDH host keys using RustCrypto.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey as P256PublicKey, SecretKey as P256SecretKey};
use p384::{PublicKey as P384PublicKey, SecretKey as P384SecretKey};
use rand::rngs::OsRng;

use crate::crypto::provider::{HostKeyPair, KeyAgreement};
use crate::crypto::EcdhCurve;

/// ECDH host key pair.
enum StaticKeyPair {
    P256 {
        secret: P256SecretKey,
        public_key: Vec<u8>,
    },
    P384 {
        secret: P384SecretKey,
        public_key: Vec<u8>,
    },
}

impl std::fmt::Debug for StaticKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaticKeyPair::P256 { public_key, .. } => f
                .debug_struct("StaticKeyPair::P256")
                .field("public_key_len", &public_key.len())
                .finish_non_exhaustive(),
            StaticKeyPair::P384 { public_key, .. } => f
                .debug_struct("StaticKeyPair::P384")
                .field("public_key_len", &public_key.len())
                .finish_non_exhaustive(),
        }
    }
}

impl StaticKeyPair {
    fn p256(secret: P256SecretKey) -> Self {
        let public_key = secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        StaticKeyPair::P256 { secret, public_key }
    }

    fn p384(secret: P384SecretKey) -> Self {
        let public_key = secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        StaticKeyPair::P384 { secret, public_key }
    }
}

impl HostKeyPair for StaticKeyPair {
    fn curve(&self) -> EcdhCurve {
        match self {
            StaticKeyPair::P256 { .. } => EcdhCurve::NistP256,
            StaticKeyPair::P384 { .. } => EcdhCurve::NistP384,
        }
    }

    fn public_key(&self) -> &[u8] {
        match self {
            StaticKeyPair::P256 { public_key, .. } => public_key,
            StaticKeyPair::P384 { public_key, .. } => public_key,
        }
    }

    fn derive_shared_secret(&self, peer_public: &[u8], out: &mut Vec<u8>) -> Result<(), String> {
        match self {
            StaticKeyPair::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared_secret =
                    p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer_key.as_affine());
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
                Ok(())
            }
            StaticKeyPair::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared_secret =
                    p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer_key.as_affine());
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
                Ok(())
            }
        }
    }
}

/// NIST P-256 host keys.
#[derive(Debug)]
struct P256;

impl KeyAgreement for P256 {
    fn curve(&self) -> EcdhCurve {
        EcdhCurve::NistP256
    }

    fn generate_key_pair(&self) -> Result<Box<dyn HostKeyPair>, String> {
        let secret = P256SecretKey::random(&mut OsRng);
        Ok(Box::new(StaticKeyPair::p256(secret)))
    }

    fn load_key_pair(&self, private_key: &[u8]) -> Result<Box<dyn HostKeyPair>, String> {
        let secret = P256SecretKey::from_slice(private_key)
            .map_err(|_| "Invalid P-256 private key".to_string())?;
        Ok(Box::new(StaticKeyPair::p256(secret)))
    }
}

/// NIST P-384 host keys.
#[derive(Debug)]
struct P384;

impl KeyAgreement for P384 {
    fn curve(&self) -> EcdhCurve {
        EcdhCurve::NistP384
    }

    fn generate_key_pair(&self) -> Result<Box<dyn HostKeyPair>, String> {
        let secret = P384SecretKey::random(&mut OsRng);
        Ok(Box::new(StaticKeyPair::p384(secret)))
    }

    fn load_key_pair(&self, private_key: &[u8]) -> Result<Box<dyn HostKeyPair>, String> {
        let secret = P384SecretKey::from_slice(private_key)
            .map_err(|_| "Invalid P-384 private key".to_string())?;
        Ok(Box::new(StaticKeyPair::p384(secret)))
    }
}

static KX_P256: P256 = P256;
static KX_P384: P384 = P384;

/// All supported curves.
pub(super) static ALL_KEY_AGREEMENTS: &[&dyn KeyAgreement] = &[&KX_P256, &KX_P384];
