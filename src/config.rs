use std::time::Duration;

use crate::crypto::{rust_crypto, CryptoProvider, KeyLengths};
use crate::message::CipherId;
use crate::puzzle::MAX_COMPLEXITY;
use crate::Error;

/// HIP-DEX engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    puzzle_complexity: u8,
    max_puzzle_complexity: u8,
    secret_rotation_interval: Duration,
    retransmission_interval: Duration,
    r2_sent_hold: Duration,
    encryption_key_len: usize,
    integrity_key_len: usize,
    accept_unsolicited: bool,
    max_connections: usize,
    solve_batch: usize,
    hip_ciphers: Vec<CipherId>,
    verify_host_identity: bool,
    rng_seed: Option<u64>,
    crypto_provider: CryptoProvider,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            puzzle_complexity: 8,
            max_puzzle_complexity: 24,
            secret_rotation_interval: Duration::from_secs(120),
            retransmission_interval: Duration::from_secs(5),
            r2_sent_hold: Duration::from_secs(10),
            encryption_key_len: 16,
            integrity_key_len: 16,
            accept_unsolicited: true,
            max_connections: 1024,
            solve_batch: 4096,
            hip_ciphers: vec![CipherId::Aes128Cbc],
            verify_host_identity: true,
            rng_seed: None,
            crypto_provider: None,
        }
    }

    /// Puzzle complexity `k` we put in our R1s.
    #[inline(always)]
    pub fn puzzle_complexity(&self) -> u8 {
        self.puzzle_complexity
    }

    /// Largest `k` we are willing to solve as initiator.
    #[inline(always)]
    pub fn max_puzzle_complexity(&self) -> u8 {
        self.max_puzzle_complexity
    }

    /// How often the puzzle secret is rotated.
    #[inline(always)]
    pub fn secret_rotation_interval(&self) -> Duration {
        self.secret_rotation_interval
    }

    /// Period of the shared retransmission sweep.
    ///
    /// Every connection waiting for an answer resends its last packet once per
    /// period. There is no backoff.
    #[inline(always)]
    pub fn retransmission_interval(&self) -> Duration {
        self.retransmission_interval
    }

    /// How long a responder stays in R2_SENT answering retransmitted I2s
    /// before it considers the association established.
    #[inline(always)]
    pub fn r2_sent_hold(&self) -> Duration {
        self.r2_sent_hold
    }

    #[inline(always)]
    pub fn encryption_key_len(&self) -> usize {
        self.encryption_key_len
    }

    #[inline(always)]
    pub fn integrity_key_len(&self) -> usize {
        self.integrity_key_len
    }

    /// Both key lengths, as CKDF wants them.
    pub fn key_lengths(&self) -> KeyLengths {
        KeyLengths {
            encryption: self.encryption_key_len,
            integrity: self.integrity_key_len,
        }
    }

    /// Whether packets from unknown peers may create a connection.
    #[inline(always)]
    pub fn accept_unsolicited(&self) -> bool {
        self.accept_unsolicited
    }

    /// Max number of connections in the table.
    #[inline(always)]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Puzzle attempts per connection per [`Engine::handle_timeout`](crate::Engine::handle_timeout).
    #[inline(always)]
    pub fn solve_batch(&self) -> usize {
        self.solve_batch
    }

    /// Ciphers offered in HIP_CIPHER, in order of preference.
    #[inline(always)]
    pub fn hip_ciphers(&self) -> &[CipherId] {
        &self.hip_ciphers
    }

    /// Whether a received HOST_ID must match the sender HIT.
    #[inline(always)]
    pub fn verify_host_identity(&self) -> bool {
        self.verify_host_identity
    }

    /// Seed for the non-secret randomness.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Cryptographic provider.
    ///
    /// Provides key agreement for host identities and secure randomness.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }
}

/// Builder for HIP-DEX configuration.
pub struct ConfigBuilder {
    puzzle_complexity: u8,
    max_puzzle_complexity: u8,
    secret_rotation_interval: Duration,
    retransmission_interval: Duration,
    r2_sent_hold: Duration,
    encryption_key_len: usize,
    integrity_key_len: usize,
    accept_unsolicited: bool,
    max_connections: usize,
    solve_batch: usize,
    hip_ciphers: Vec<CipherId>,
    verify_host_identity: bool,
    rng_seed: Option<u64>,
    crypto_provider: Option<CryptoProvider>,
}

impl ConfigBuilder {
    /// Set the puzzle complexity `k` put in our R1s.
    ///
    /// The expected work for an initiator is `2^k` CMAC evaluations.
    /// Defaults to 8.
    pub fn puzzle_complexity(mut self, k: u8) -> Self {
        self.puzzle_complexity = k;
        self
    }

    /// Set the largest puzzle complexity we accept as initiator.
    ///
    /// An R1 asking for more is rejected. Defaults to 24.
    pub fn max_puzzle_complexity(mut self, k: u8) -> Self {
        self.max_puzzle_complexity = k;
        self
    }

    /// Set the puzzle secret rotation interval.
    ///
    /// Defaults to 120 seconds.
    pub fn secret_rotation_interval(mut self, interval: Duration) -> Self {
        self.secret_rotation_interval = interval;
        self
    }

    /// Set the retransmission period.
    ///
    /// Defaults to 5 seconds.
    pub fn retransmission_interval(mut self, interval: Duration) -> Self {
        self.retransmission_interval = interval;
        self
    }

    /// Set how long a responder holds R2_SENT.
    ///
    /// Defaults to 10 seconds.
    pub fn r2_sent_hold(mut self, hold: Duration) -> Self {
        self.r2_sent_hold = hold;
        self
    }

    /// Set the encryption key length in bytes.
    ///
    /// Defaults to 16.
    pub fn encryption_key_len(mut self, len: usize) -> Self {
        self.encryption_key_len = len;
        self
    }

    /// Set the integrity key length in bytes. Must be a valid AES key size.
    ///
    /// Defaults to 16.
    pub fn integrity_key_len(mut self, len: usize) -> Self {
        self.integrity_key_len = len;
        self
    }

    /// Set whether packets from unknown peers may create a connection.
    ///
    /// Defaults to true.
    pub fn accept_unsolicited(mut self, accept: bool) -> Self {
        self.accept_unsolicited = accept;
        self
    }

    /// Set the max number of connections.
    ///
    /// Defaults to 1024.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the puzzle attempts per connection per timeout.
    ///
    /// Defaults to 4096.
    pub fn solve_batch(mut self, batch: usize) -> Self {
        self.solve_batch = batch;
        self
    }

    /// Set the ciphers offered in HIP_CIPHER.
    ///
    /// Defaults to AES-128-CBC only.
    pub fn hip_ciphers(mut self, ciphers: &[CipherId]) -> Self {
        self.hip_ciphers = ciphers.to_vec();
        self
    }

    /// Set whether a received HOST_ID must match the sender HIT.
    ///
    /// Defaults to true.
    pub fn verify_host_identity(mut self, verify: bool) -> Self {
        self.verify_host_identity = verify;
        self
    }

    /// Seed the non-secret randomness, for reproducible tests.
    ///
    /// Defaults to unseeded.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, an installed default is used, and failing that the
    /// RustCrypto provider.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if an option is out of range or the
    /// provider is unusable.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. The RustCrypto provider
    pub fn build(self) -> Result<Config, Error> {
        if self.max_puzzle_complexity > MAX_COMPLEXITY {
            return Err(Error::ConfigError(format!(
                "max_puzzle_complexity {} exceeds {}",
                self.max_puzzle_complexity, MAX_COMPLEXITY
            )));
        }
        if self.puzzle_complexity > self.max_puzzle_complexity {
            return Err(Error::ConfigError(format!(
                "puzzle_complexity {} exceeds max_puzzle_complexity {}",
                self.puzzle_complexity, self.max_puzzle_complexity
            )));
        }
        for (name, len) in [
            ("encryption_key_len", self.encryption_key_len),
            ("integrity_key_len", self.integrity_key_len),
        ] {
            if !matches!(len, 16 | 24 | 32) {
                return Err(Error::ConfigError(format!(
                    "{} must be 16, 24 or 32, not {}",
                    name, len
                )));
            }
        }
        if self.solve_batch == 0 {
            return Err(Error::ConfigError("solve_batch must be > 0".to_string()));
        }

        let config = self.into_config();

        // Always validate the crypto provider
        config.crypto_provider.validate()?;

        Ok(config)
    }

    fn into_config(self) -> Config {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(rust_crypto::default_provider);

        Config {
            puzzle_complexity: self.puzzle_complexity,
            max_puzzle_complexity: self.max_puzzle_complexity,
            secret_rotation_interval: self.secret_rotation_interval,
            retransmission_interval: self.retransmission_interval,
            r2_sent_hold: self.r2_sent_hold,
            encryption_key_len: self.encryption_key_len,
            integrity_key_len: self.integrity_key_len,
            accept_unsolicited: self.accept_unsolicited,
            max_connections: self.max_connections,
            solve_batch: self.solve_batch,
            hip_ciphers: self.hip_ciphers,
            verify_host_identity: self.verify_host_identity,
            rng_seed: self.rng_seed,
            crypto_provider,
        }
    }
}

impl Default for Config {
    /// The builder defaults. The provider is validated when an engine is created.
    fn default() -> Self {
        Config::builder().into_config()
    }
}
