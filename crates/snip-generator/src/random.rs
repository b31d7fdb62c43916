use crate::{Generator, ALPHABET, DEFAULT_CODE_LENGTH};
use jiff::Timestamp;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use snip_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::warn;

const MAX_CODE_LENGTH: usize = 32;

#[derive(Debug, Clone, Error)]
#[error("entropy source unavailable: {0}")]
pub struct EntropyError(pub String);

/// A source of uniformly random bytes.
pub trait EntropySource: Send + Sync + 'static {
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), EntropyError>;
}

/// The operating system's cryptographically secure random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError(e.to_string()))
    }
}

/// Generates a random code of `n` characters using the OS random source.
///
/// Returns an empty string for `n == 0`.
pub fn generate_code(n: usize) -> String {
    fill_code(&OsEntropy, n).0
}

/// Fills `n` alphabet characters, returning the code and whether the
/// time-seeded fallback had to be used.
fn fill_code<E: EntropySource>(entropy: &E, n: usize) -> (String, bool) {
    if n == 0 {
        return (String::new(), false);
    }

    let mut buf = vec![0u8; n];
    let degraded = match entropy.try_fill(&mut buf) {
        Ok(()) => false,
        Err(e) => {
            warn!(error = %e, "secure random source failed, falling back to time-seeded rng");
            let seed = Timestamp::now().as_nanosecond() as u64;
            StdRng::seed_from_u64(seed).fill_bytes(&mut buf);
            true
        }
    };

    let code = buf
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect();
    (code, degraded)
}

/// A short code generator drawing fixed-length codes uniformly from [`ALPHABET`].
///
/// Codes come from the OS random source; if it fails the generator degrades
/// to a time-seeded pseudo-random source instead of failing. Collisions are
/// possible and must be handled by the caller.
#[derive(Debug)]
pub struct RandomGenerator<E = OsEntropy> {
    length: usize,
    entropy: E,
    fallbacks: AtomicU64,
}

impl RandomGenerator<OsEntropy> {
    /// Creates a generator for codes of `length` characters (clamped to `1..=32`).
    pub fn new(length: usize) -> Self {
        Self::with_entropy(length, OsEntropy)
    }
}

impl Default for RandomGenerator<OsEntropy> {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl<E: EntropySource> RandomGenerator<E> {
    pub fn with_entropy(length: usize, entropy: E) -> Self {
        Self {
            length: length.clamp(1, MAX_CODE_LENGTH),
            entropy,
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of codes produced with the fallback source so far.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Generates a code of an arbitrary length with this generator's entropy source.
    pub fn generate_with(&self, n: usize) -> String {
        let (code, degraded) = fill_code(&self.entropy, n);
        if degraded {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        code
    }
}

impl<E: EntropySource> Generator for RandomGenerator<E> {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        ShortCode::new_unchecked(self.generate_with(self.length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn try_fill(&self, _buf: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError("device not configured".to_string()))
        }
    }

    /// Returns every byte value in turn so the mapping can be checked exhaustively.
    struct CountingEntropy;

    impl EntropySource for CountingEntropy {
        fn try_fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = i as u8;
            }
            Ok(())
        }
    }

    fn in_alphabet(code: &str) -> bool {
        code.bytes().all(|b| ALPHABET.contains(&b))
    }

    #[test]
    fn alphabet_has_64_distinct_symbols() {
        let distinct: HashSet<_> = ALPHABET.iter().collect();
        assert_eq!(distinct.len(), 64);
    }

    #[test]
    fn zero_length_is_empty() {
        assert_eq!(generate_code(0), "");
    }

    #[test]
    fn generates_requested_length() {
        for n in [1, 8, 16, 100] {
            let code = generate_code(n);
            assert_eq!(code.len(), n);
            assert!(in_alphabet(&code), "{code}");
        }
    }

    #[test]
    fn every_symbol_maps_from_exactly_four_byte_values() {
        let generator = RandomGenerator::with_entropy(1, CountingEntropy);
        let code = generator.generate_with(256);

        for symbol in ALPHABET.iter() {
            let hits = code.bytes().filter(|b| b == symbol).count();
            assert_eq!(hits, 4, "symbol {}", *symbol as char);
        }
    }

    #[test]
    fn default_generator_mints_eight_character_codes() {
        let generator = RandomGenerator::default();
        let code = generator.generate();
        assert_eq!(code.as_str().len(), DEFAULT_CODE_LENGTH);
        assert!(ShortCode::new(code.as_str()).is_ok());
    }

    #[test]
    fn codes_are_not_repeated_in_practice() {
        let generator = RandomGenerator::default();
        let codes: HashSet<_> = (0..1_000).map(|_| generator.generate()).collect();
        assert_eq!(codes.len(), 1_000);
    }

    #[test]
    fn broken_entropy_degrades_without_failing() {
        let generator = RandomGenerator::with_entropy(8, BrokenEntropy);

        let code = generator.generate();

        assert_eq!(code.as_str().len(), 8);
        assert!(in_alphabet(code.as_str()));
        assert_eq!(generator.fallbacks(), 1);
    }

    #[test]
    fn length_is_clamped() {
        assert_eq!(RandomGenerator::new(0).length(), 1);
        assert_eq!(RandomGenerator::new(64).length(), 32);
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RandomGenerator>();
    }
}
