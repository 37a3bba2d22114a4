//! Random secret tokens used to sign webhook payloads.

use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng, rngs::StdRng};

pub const TOKEN_LENGTH: usize = 20;

const ALPHABET: &[u8] = b"123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates alphanumeric tokens from a seeded random number generator.
#[derive(Debug)]
pub struct TokenGenerator {
    rng: Mutex<StdRng>,
}

impl TokenGenerator {
    /// Seeds the generator from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Returns a generator producing the same tokens for the same seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn generate(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..TOKEN_LENGTH)
            .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
            .collect()
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}
