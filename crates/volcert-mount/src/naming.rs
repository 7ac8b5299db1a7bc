//! Unique probe file names.
//!
//! Probes write into mounts that may be shared by several bindings on the same
//! backend, and into backends that survive across certification runs. Every
//! probe therefore gets a fresh name: a fixed prefix plus a random run of
//! ASCII letters.
//!
//! The random source is owned by a [`NameGenerator`] that is created once per
//! run and handed to the probes explicitly. Nothing here is cryptographic; the
//! only goal is avoiding name collisions.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Prefix shared by every probe file.
pub const DEFAULT_PREFIX: &str = "certtest-";

/// Number of random letters appended to the prefix.
pub const DEFAULT_SUFFIX_LENGTH: usize = 10;

/// Letters the suffix is drawn from (case-sensitive, 52 symbols).
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Per-run source of probe file names.
#[derive(Debug)]
pub struct NameGenerator {
    rng: StdRng,
    seed: u64,
}

impl NameGenerator {
    /// Seed from the current wall-clock time.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        // Keep the low 64 bits; they carry all of the entropy we care about.
        #[allow(clippy::cast_possible_truncation)]
        Self::with_seed(nanos as u64)
    }

    /// Seed explicitly, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// The seed this generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw `len` letters uniformly from the 52-letter alphabet.
    pub fn random_letters(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(ALPHABET[self.rng.random_range(0..ALPHABET.len())]))
            .collect()
    }

    /// Produce `<prefix><suffix_len letters>`.
    pub fn file_name(&mut self, prefix: &str, suffix_len: usize) -> String {
        let mut name = String::with_capacity(prefix.len() + suffix_len);
        name.push_str(prefix);
        name.push_str(&self.random_letters(suffix_len));
        name
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::from_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_file_name_shape() {
        let mut names = NameGenerator::with_seed(7);
        let name = names.file_name(DEFAULT_PREFIX, DEFAULT_SUFFIX_LENGTH);
        assert!(name.starts_with("certtest-"));
        assert_eq!(name.len(), DEFAULT_PREFIX.len() + DEFAULT_SUFFIX_LENGTH);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = NameGenerator::with_seed(1234);
        let mut b = NameGenerator::with_seed(1234);
        for _ in 0..5 {
            assert_eq!(a.random_letters(10), b.random_letters(10));
        }
    }

    #[test]
    fn test_successive_names_differ() {
        let mut names = NameGenerator::with_seed(99);
        let first = names.file_name(DEFAULT_PREFIX, DEFAULT_SUFFIX_LENGTH);
        let second = names.file_name(DEFAULT_PREFIX, DEFAULT_SUFFIX_LENGTH);
        assert_ne!(first, second);
    }

    #[test]
    fn test_zero_length_suffix() {
        let mut names = NameGenerator::with_seed(0);
        assert_eq!(names.file_name("p-", 0), "p-");
    }

    #[test]
    fn test_seed_is_reported() {
        assert_eq!(NameGenerator::with_seed(42).seed(), 42);
    }

    proptest! {
        #[test]
        fn prop_suffix_is_ascii_letters(seed in any::<u64>(), len in 0usize..64) {
            let mut names = NameGenerator::with_seed(seed);
            let letters = names.random_letters(len);
            prop_assert_eq!(letters.len(), len);
            prop_assert!(letters.bytes().all(|b| b.is_ascii_alphabetic()));
        }
    }
}
