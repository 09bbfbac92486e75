//! Client puzzle: challenge issuing, solving and verification.
//!
//! The responder derives the challenge `I` from a rotating secret and the HIT
//! pair, so it keeps no per-initiator state before an I2 arrives:
//!
//! ```text
//! I     = CMAC(secret, HIT_I || HIT_R || context)
//! check = LTRUNC(CMAC(I, HIT_I || HIT_R || J), k) == 0
//! ```
//!
//! Finding `J` takes about `2^k` CMAC evaluations; checking it takes one per
//! retained secret.

use crate::crypto::{Cmac, SecureRandom, BLOCK_LEN};
use crate::window::SecretWindow;
use crate::{Error, Hit, SeededRng};

/// Largest usable complexity: the CMAC output size in bits.
pub const MAX_COMPLEXITY: u8 = 128;

/// Issues and verifies puzzles against a window of recent secrets.
#[derive(Debug)]
pub struct PuzzleEngine {
    complexity: u8,
    generation: u64,
    secrets: SecretWindow,
}

impl PuzzleEngine {
    /// Create an engine with complexity `k` and one fresh secret.
    pub fn new(k: u8, random: &dyn SecureRandom) -> Result<Self, Error> {
        if k > MAX_COMPLEXITY {
            return Err(Error::ConfigError(format!(
                "Puzzle complexity {} exceeds {}",
                k, MAX_COMPLEXITY
            )));
        }

        let mut secrets = SecretWindow::new();
        secrets.push(fresh_secret(random)?);

        Ok(PuzzleEngine {
            complexity: k,
            generation: 0,
            secrets,
        })
    }

    pub fn complexity(&self) -> u8 {
        self.complexity
    }

    /// How many times the secret has been rotated. Carried in R1_COUNTER.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push a fresh secret, evicting the oldest retained one.
    pub fn regenerate_secret(&mut self, random: &dyn SecureRandom) -> Result<(), Error> {
        self.secrets.push(fresh_secret(random)?);
        self.generation += 1;
        Ok(())
    }

    /// The challenge `I` for this HIT pair under the newest secret.
    pub fn issue_challenge(
        &self,
        hit_i: &Hit,
        hit_r: &Hit,
        context: &[u8],
    ) -> Result<[u8; BLOCK_LEN], Error> {
        let secret = self
            .secrets
            .newest()
            .ok_or_else(|| Error::UsageError("No puzzle secret".to_string()))?;
        Ok(challenge(secret, hit_i, hit_r, context))
    }

    /// Accept `j` if some retained secret reproduces `i` and `j` solves it at
    /// complexity `k`.
    pub fn verify(
        &self,
        i: &[u8; BLOCK_LEN],
        j: &[u8; BLOCK_LEN],
        hit_i: &Hit,
        hit_r: &Hit,
        k: u8,
        context: &[u8],
    ) -> bool {
        if k > MAX_COMPLEXITY {
            return false;
        }
        for secret in self.secrets.iter() {
            if &challenge(secret, hit_i, hit_r, context) == i {
                return check_solution(i, j, hit_i, hit_r, k);
            }
        }
        false
    }
}

fn fresh_secret(random: &dyn SecureRandom) -> Result<[u8; BLOCK_LEN], Error> {
    let mut secret = [0u8; BLOCK_LEN];
    random
        .fill(&mut secret)
        .map_err(|e| Error::CryptoError(format!("Secure random failed: {}", e)))?;
    Ok(secret)
}

fn challenge(secret: &[u8; BLOCK_LEN], hit_i: &Hit, hit_r: &Hit, context: &[u8]) -> [u8; BLOCK_LEN] {
    let mut mac = Cmac::with_block_key(secret);
    mac.update(hit_i.as_bytes());
    mac.update(hit_r.as_bytes());
    mac.update(context);
    mac.finalize()
}

fn puzzle_mac(mac: &mut Cmac, j: &[u8; BLOCK_LEN], hit_i: &Hit, hit_r: &Hit) -> [u8; BLOCK_LEN] {
    mac.update(hit_i.as_bytes());
    mac.update(hit_r.as_bytes());
    mac.update(j);
    mac.finalize()
}

/// Whether the leftmost `bits` bits of `bytes` are all zero.
fn leading_zero_bits(bytes: &[u8], bits: u8) -> bool {
    let full = bits as usize / 8;
    let rest = bits % 8;

    if bytes.len() < full + usize::from(rest > 0) {
        return false;
    }
    if bytes[..full].iter().any(|b| *b != 0) {
        return false;
    }
    rest == 0 || bytes[full] >> (8 - rest) == 0
}

/// The leftmost `bits` bits of `bytes`, with the unused low bits of the last
/// byte cleared.
pub fn left_truncate(bytes: &[u8], bits: usize) -> Vec<u8> {
    let len = bits.div_ceil(8).min(bytes.len());
    let mut out = bytes[..len].to_vec();
    let rest = bits % 8;
    if rest > 0 && len == bits.div_ceil(8) {
        if let Some(last) = out.last_mut() {
            *last &= 0xff << (8 - rest);
        }
    }
    out
}

/// Check `j` against challenge `i` without consulting any secret.
pub fn check_solution(i: &[u8; BLOCK_LEN], j: &[u8; BLOCK_LEN], hit_i: &Hit, hit_r: &Hit, k: u8) -> bool {
    let mut mac = Cmac::with_block_key(i);
    leading_zero_bits(&puzzle_mac(&mut mac, j, hit_i, hit_r), k)
}

/// Brute force a solution to `i`.
///
/// Runs until a solution is found; expect around `2^k` attempts.
pub fn solve(i: &[u8; BLOCK_LEN], hit_i: &Hit, hit_r: &Hit, k: u8) -> Result<[u8; BLOCK_LEN], Error> {
    let mut job = SolveJob::new(i, *hit_i, *hit_r, k)?;
    let mut rng = SeededRng::new(None);
    loop {
        if let Some(j) = job.step(1 << 16, &mut rng) {
            return Ok(j);
        }
    }
}

/// A puzzle being solved in bounded steps.
pub(crate) struct SolveJob {
    mac: Cmac,
    hit_i: Hit,
    hit_r: Hit,
    k: u8,
    attempts: u64,
}

impl SolveJob {
    pub fn new(i: &[u8; BLOCK_LEN], hit_i: Hit, hit_r: Hit, k: u8) -> Result<Self, Error> {
        if k > MAX_COMPLEXITY {
            return Err(Error::SecurityError(format!(
                "Puzzle complexity {} can never be solved",
                k
            )));
        }
        Ok(SolveJob {
            mac: Cmac::with_block_key(i),
            hit_i,
            hit_r,
            k,
            attempts: 0,
        })
    }

    /// Try up to `budget` random candidates.
    pub fn step(&mut self, budget: usize, rng: &mut SeededRng) -> Option<[u8; BLOCK_LEN]> {
        let mut j = [0u8; BLOCK_LEN];
        for _ in 0..budget {
            rng.fill(&mut j);
            self.attempts += 1;
            let out = puzzle_mac(&mut self.mac, &j, &self.hit_i, &self.hit_r);
            if leading_zero_bits(&out, self.k) {
                trace!("Puzzle solved after {} attempts", self.attempts);
                return Some(j);
            }
        }
        None
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl std::fmt::Debug for SolveJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolveJob")
            .field("k", &self.k)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    fn hit(last: u8) -> Hit {
        let mut b = [0u8; 16];
        b[15] = last;
        Hit::new(b)
    }

    fn engine(k: u8) -> PuzzleEngine {
        let provider = rust_crypto::default_provider();
        PuzzleEngine::new(k, provider.secure_random).unwrap()
    }

    #[test]
    fn truncation() {
        assert_eq!(left_truncate(&[0xff, 0xff], 0), Vec::<u8>::new());
        assert_eq!(left_truncate(&[0xff, 0xff], 3), vec![0xe0]);
        assert_eq!(left_truncate(&[0xff, 0xff], 8), vec![0xff]);
        assert_eq!(left_truncate(&[0xab, 0xff], 12), vec![0xab, 0xf0]);

        assert!(leading_zero_bits(&[0xff], 0));
        assert!(leading_zero_bits(&[0x00, 0x0f], 12));
        assert!(!leading_zero_bits(&[0x00, 0x1f], 12));
        assert!(leading_zero_bits(&[0; 16], 128));
        assert!(!leading_zero_bits(&[0; 2], 17));
    }

    #[test]
    fn solve_and_verify() {
        let _ = env_logger::try_init();
        let puzzles = engine(8);
        let (a, b) = (hit(1), hit(2));

        let i = puzzles.issue_challenge(&a, &b, &[]).unwrap();
        let j = solve(&i, &a, &b, 8).unwrap();

        assert!(check_solution(&i, &j, &a, &b, 8));
        assert!(puzzles.verify(&i, &j, &a, &b, 8, &[]));

        // bound to the HIT pair and the context
        assert!(!puzzles.verify(&i, &j, &b, &a, 8, &[]));
        assert!(!puzzles.verify(&i, &j, &a, &b, 8, b"addr"));

        // an I that no secret produced
        let mut forged = i;
        forged[0] ^= 1;
        assert!(!puzzles.verify(&forged, &j, &a, &b, 8, &[]));
    }

    #[test]
    fn altered_solution_fails() {
        let (a, b) = (hit(1), hit(2));

        let i = [0x5a; BLOCK_LEN];
        let mut job = SolveJob::new(&i, a, b, 16).unwrap();
        let mut rng = SeededRng::new(Some(7));
        let j = loop {
            if let Some(j) = job.step(4096, &mut rng) {
                break j;
            }
        };
        assert!(check_solution(&i, &j, &a, &b, 16));

        for bit in 0..8 {
            let mut altered = j;
            altered[BLOCK_LEN - 1] ^= 1 << bit;
            assert!(!check_solution(&i, &altered, &a, &b, 16), "bit {}", bit);
        }

        let puzzles = engine(16);
        let i = puzzles.issue_challenge(&a, &b, &[]).unwrap();
        let mut j = solve(&i, &a, &b, 16).unwrap();
        assert!(puzzles.verify(&i, &j, &a, &b, 16, &[]));
        j[0] ^= 0x80;
        assert!(!puzzles.verify(&i, &j, &a, &b, 16, &[]));
    }

    #[test]
    fn zero_complexity_accepts_anything() {
        let puzzles = engine(0);
        let i = puzzles.issue_challenge(&hit(1), &hit(2), &[]).unwrap();
        assert!(puzzles.verify(&i, &[7; 16], &hit(1), &hit(2), 0, &[]));
    }

    #[test]
    fn challenge_is_deterministic_per_secret() {
        let provider = rust_crypto::default_provider();
        let mut puzzles = engine(4);
        let i1 = puzzles.issue_challenge(&hit(1), &hit(2), &[]).unwrap();
        assert_eq!(i1, puzzles.issue_challenge(&hit(1), &hit(2), &[]).unwrap());
        assert_ne!(i1, puzzles.issue_challenge(&hit(1), &hit(3), &[]).unwrap());

        puzzles.regenerate_secret(provider.secure_random).unwrap();
        assert_ne!(i1, puzzles.issue_challenge(&hit(1), &hit(2), &[]).unwrap());
    }

    #[test]
    fn rotation_window() {
        let provider = rust_crypto::default_provider();
        let mut puzzles = engine(4);
        assert_eq!(puzzles.generation(), 0);
        let (a, b) = (hit(1), hit(2));

        let i = puzzles.issue_challenge(&a, &b, &[]).unwrap();
        let j = solve(&i, &a, &b, 4).unwrap();

        for generation in 1..=2 {
            puzzles.regenerate_secret(provider.secure_random).unwrap();
            assert_eq!(puzzles.generation(), generation);
            assert!(puzzles.verify(&i, &j, &a, &b, 4, &[]));
        }

        puzzles.regenerate_secret(provider.secure_random).unwrap();
        assert!(!puzzles.verify(&i, &j, &a, &b, 4, &[]));
    }

    #[test]
    fn complexity_limits() {
        let provider = rust_crypto::default_provider();
        assert!(PuzzleEngine::new(129, provider.secure_random).is_err());
        assert!(SolveJob::new(&[0; 16], hit(1), hit(2), 129).is_err());

        let puzzles = engine(4);
        let i = puzzles.issue_challenge(&hit(1), &hit(2), &[]).unwrap();
        assert!(!puzzles.verify(&i, &[0; 16], &hit(1), &hit(2), 200, &[]));
    }

    #[test]
    fn job_steps_are_bounded() {
        let mut job = SolveJob::new(&[1; 16], hit(1), hit(2), 128).unwrap();
        let mut rng = SeededRng::new(Some(1));
        assert!(job.step(10, &mut rng).is_none());
        assert_eq!(job.attempts(), 10);
    }

    #[test]
    fn seeded_jobs_are_repeatable() {
        let i = [9u8; 16];
        let solve_seeded = || {
            let mut job = SolveJob::new(&i, hit(1), hit(2), 6).unwrap();
            let mut rng = SeededRng::new(Some(42));
            loop {
                if let Some(j) = job.step(100, &mut rng) {
                    return j;
                }
            }
        };
        assert_eq!(solve_seeded(), solve_seeded());
    }
}
