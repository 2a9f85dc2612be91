//! Username generation for new accounts
//!
//! A provider nickname is reduced to the username charset. When the result
//! is too short or already claimed (by a user or an organization slug), a
//! random `_xxxxxx` suffix is tried a bounded number of times before falling
//! back to a fully random `user_…` name.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::result::{Error, Result};
use crate::domain::user::{is_valid_username, sanitize_username, USERNAME_MAX_LEN};
use crate::ports::Repository;

/// Suffixed candidates tried before the random fallback
pub const DEFAULT_SUFFIX_ATTEMPTS: usize = 10;

const SUFFIX_LEN: usize = 6;
const FALLBACK_PREFIX: &str = "user";
const FALLBACK_LEN: usize = 16;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub struct UsernameGenerator {
    repository: Arc<dyn Repository>,
    rng: Mutex<StdRng>,
    suffix_attempts: usize,
}

impl UsernameGenerator {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self::with_rng(repository, StdRng::from_entropy())
    }

    /// Deterministic generator for tests
    pub fn with_seed(repository: Arc<dyn Repository>, seed: u64) -> Self {
        Self::with_rng(repository, StdRng::seed_from_u64(seed))
    }

    fn with_rng(repository: Arc<dyn Repository>, rng: StdRng) -> Self {
        Self {
            repository,
            rng: Mutex::new(rng),
            suffix_attempts: DEFAULT_SUFFIX_ATTEMPTS,
        }
    }

    pub fn with_suffix_attempts(mut self, attempts: usize) -> Self {
        self.suffix_attempts = attempts;
        self
    }

    /// Pick a free username derived from `nickname`.
    ///
    /// Availability is checked, not reserved: the caller must still claim the
    /// name when persisting and handle a conflict if someone got there first.
    pub fn generate(&self, nickname: Option<&str>) -> Result<String> {
        let base = sanitize_username(nickname.unwrap_or_default());
        if is_valid_username(&base) && self.is_available(&base)? {
            return Ok(base);
        }
        self.generate_suffixed(&base)
    }

    /// Like `generate`, but never returns the bare base name
    pub fn generate_suffixed(&self, base: &str) -> Result<String> {
        let base = sanitize_username(base);
        for _ in 0..self.suffix_attempts {
            let candidate = format!("{}_{}", suffix_base(&base), self.random_chars(SUFFIX_LEN)?);
            if self.is_available(&candidate)? {
                return Ok(candidate);
            }
        }
        let fallback = format!("{}_{}", FALLBACK_PREFIX, self.random_chars(FALLBACK_LEN)?);
        tracing::debug!(base = %base, "suffix attempts exhausted, using random username");
        Ok(fallback)
    }

    /// True when no user or organization holds `name` (case-insensitive)
    pub fn is_available(&self, name: &str) -> Result<bool> {
        Ok(self.repository.namespace_owner(name)?.is_none())
    }

    fn random_chars(&self, len: usize) -> Result<String> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;
        Ok((0..len)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect())
    }
}

/// Base name cut so that `base_xxxxxx` fits the length limit
fn suffix_base(base: &str) -> String {
    if base.is_empty() {
        return FALLBACK_PREFIX.to_string();
    }
    base.chars()
        .take(USERNAME_MAX_LEN - SUFFIX_LEN - 1)
        .collect()
}
