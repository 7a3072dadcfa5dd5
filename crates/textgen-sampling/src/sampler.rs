//! A decoding strategy bound to its random source.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::select::SamplingError;
use crate::strategy::DecodingStrategy;

/// Pairs a [`DecodingStrategy`] with the RNG it draws from.
///
/// One sampler belongs to one generation; it is not shared between loops.
#[derive(Debug, Clone)]
pub struct Sampler<R = ChaCha8Rng> {
    strategy: DecodingStrategy,
    rng: R,
}

impl<R: Rng> Sampler<R> {
    /// Use a caller-supplied RNG.
    pub fn new(strategy: DecodingStrategy, rng: R) -> Self {
        Self { strategy, rng }
    }

    /// Pick the next token index from `scores`.
    ///
    /// # Errors
    /// Returns [`SamplingError::EmptyScores`] for an empty slice.
    pub fn select(&mut self, scores: &[f64]) -> Result<usize, SamplingError> {
        let index = self.strategy.select(scores, &mut self.rng)?;
        trace!(strategy = %self.strategy, index, vocab = scores.len(), "selected token");
        Ok(index)
    }

    pub fn strategy(&self) -> DecodingStrategy {
        self.strategy
    }

    /// Give back the RNG, e.g. to continue a seeded stream elsewhere.
    pub fn into_rng(self) -> R {
        self.rng
    }
}

impl Sampler<ChaCha8Rng> {
    /// Deterministic sampler: the same seed, strategy and scores always
    /// produce the same selections.
    pub fn seeded(strategy: DecodingStrategy, seed: u64) -> Self {
        Self::new(strategy, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Sampler seeded from the thread-local entropy source.
    pub fn from_entropy(strategy: DecodingStrategy) -> Self {
        Self::new(strategy, ChaCha8Rng::from_rng(&mut rand::rng()))
    }

    /// `seeded` when a seed is given, `from_entropy` otherwise.
    pub fn with_seed(strategy: DecodingStrategy, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(strategy, seed),
            None => Self::from_entropy(strategy),
        }
    }
}
