//! AES-CMAC (RFC 4493).

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use crate::Error;

/// Block and tag size in bytes.
pub const BLOCK_LEN: usize = 16;

// R_128 from NIST SP 800-38B.
const RB: u128 = 0x87;

enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(key: &[u8]) -> Result<Self, Error> {
        let invalid = |_| Error::CryptoError(format!("Invalid CMAC key length {}", key.len()));
        let cipher = match key.len() {
            16 => BlockCipher::Aes128(Aes128::new_from_slice(key).map_err(invalid)?),
            24 => BlockCipher::Aes192(Aes192::new_from_slice(key).map_err(invalid)?),
            32 => BlockCipher::Aes256(Aes256::new_from_slice(key).map_err(invalid)?),
            n => {
                return Err(Error::CryptoError(format!(
                    "Invalid CMAC key length {}",
                    n
                )))
            }
        };
        Ok(cipher)
    }

    fn encrypt(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            BlockCipher::Aes128(c) => c.encrypt_block(block),
            BlockCipher::Aes192(c) => c.encrypt_block(block),
            BlockCipher::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// Streaming CMAC over AES.
///
/// The key length picks the AES variant (16, 24 or 32 bytes). After
/// [`finalize`](Cmac::finalize) the instance is ready for a new message under
/// the same key; [`init`](Cmac::init) switches to another key.
pub struct Cmac {
    cipher: BlockCipher,
    k1: [u8; BLOCK_LEN],
    k2: [u8; BLOCK_LEN],
    state: [u8; BLOCK_LEN],
    buf: [u8; BLOCK_LEN],
    buf_len: usize,
}

impl Cmac {
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        let cipher = BlockCipher::new(key)?;
        Ok(Self::with_cipher(cipher))
    }

    /// CMAC keyed with a 16 byte value, which cannot fail.
    pub fn with_block_key(key: &[u8; BLOCK_LEN]) -> Self {
        let cipher = BlockCipher::Aes128(Aes128::new(GenericArray::from_slice(key)));
        Self::with_cipher(cipher)
    }

    fn with_cipher(cipher: BlockCipher) -> Self {
        let mut k0 = [0u8; BLOCK_LEN];
        cipher.encrypt(&mut k0);
        let k1 = dbl(&k0);
        let k2 = dbl(&k1);
        k0.zeroize();

        Cmac {
            cipher,
            k1,
            k2,
            state: [0; BLOCK_LEN],
            buf: [0; BLOCK_LEN],
            buf_len: 0,
        }
    }

    /// Re-key, discarding any buffered input.
    pub fn init(&mut self, key: &[u8]) -> Result<(), Error> {
        *self = Cmac::new(key)?;
        Ok(())
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            // The last block needs the subkey, so a full buffer is only
            // chained once more input shows it was not the last.
            if self.buf_len == BLOCK_LEN {
                self.chain_buffer();
            }
            let n = (BLOCK_LEN - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + n].copy_from_slice(&data[..n]);
            self.buf_len += n;
            data = &data[n..];
        }
    }

    pub fn update_u8(&mut self, v: u8) {
        self.update(&[v]);
    }

    pub fn update_u16(&mut self, v: u16) {
        self.update(&v.to_be_bytes());
    }

    pub fn update_u32(&mut self, v: u32) {
        self.update(&v.to_be_bytes());
    }

    /// Produce the full tag and reset for the next message.
    pub fn finalize(&mut self) -> [u8; BLOCK_LEN] {
        let mut last = [0u8; BLOCK_LEN];
        if self.buf_len == BLOCK_LEN {
            xor_into(&mut last, &self.buf);
            xor_into(&mut last, &self.k1);
        } else {
            last[..self.buf_len].copy_from_slice(&self.buf[..self.buf_len]);
            last[self.buf_len] = 0x80;
            xor_into(&mut last, &self.k2);
        }

        xor_into(&mut self.state, &last);
        self.cipher.encrypt(&mut self.state);
        let tag = self.state;

        last.zeroize();
        self.reset();
        tag
    }

    /// Produce a tag truncated to `out.len()` bytes.
    pub fn finalize_into(&mut self, out: &mut [u8]) -> Result<(), Error> {
        if out.len() > BLOCK_LEN {
            return Err(Error::CryptoError(format!(
                "CMAC output length {} exceeds {}",
                out.len(),
                BLOCK_LEN
            )));
        }
        let tag = self.finalize();
        out.copy_from_slice(&tag[..out.len()]);
        Ok(())
    }

    /// Discard buffered input, keeping the key.
    pub fn reset(&mut self) {
        self.state.zeroize();
        self.buf.zeroize();
        self.buf_len = 0;
    }

    fn chain_buffer(&mut self) {
        let buf = self.buf;
        xor_into(&mut self.state, &buf);
        self.cipher.encrypt(&mut self.state);
        self.buf_len = 0;
    }
}

impl Drop for Cmac {
    fn drop(&mut self) {
        self.k1.zeroize();
        self.k2.zeroize();
        self.reset();
    }
}

impl std::fmt::Debug for Cmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cmac")
            .field("buffered", &self.buf_len)
            .finish_non_exhaustive()
    }
}

/// Doubling in GF(2^128).
fn dbl(block: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
    let v = u128::from_be_bytes(*block);
    let mut r = v << 1;
    if v >> 127 == 1 {
        r ^= RB;
    }
    r.to_be_bytes()
}

fn xor_into(a: &mut [u8; BLOCK_LEN], b: &[u8; BLOCK_LEN]) {
    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x ^= y;
    }
}
