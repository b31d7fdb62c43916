pub mod random;

pub use random::{generate_code, EntropyError, EntropySource, OsEntropy, RandomGenerator};

use snip_core::ShortCode;

/// The 64 symbols short codes are drawn from.
///
/// 256 is a multiple of 64, so mapping a uniformly random byte with `% 64`
/// picks every symbol with exactly the same probability.
pub const ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// Length of codes minted by the default generator.
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is not guaranteed; callers must be prepared to retry when
/// the store reports a collision.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Generates a type that can be converted into a short code.
    fn generate(&self) -> Self::Output;
}
