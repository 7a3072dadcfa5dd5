//! Pure selection functions, one per strategy.
//!
//! Every function takes the raw score vector and returns an index into it.
//! Randomness is always supplied by the caller.

use std::num::NonZeroUsize;

use rand::Rng;
use textgen_logits::{argmax, first_cumulative_exceeding, multinomial_sample, softmax, sort_descending};
use thiserror::Error;

use crate::strategy::{DecodingStrategy, ProbabilityMass};

/// Errors raised while selecting a token.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingError {
    #[error("cannot select a token from an empty score vector")]
    EmptyScores,
}

/// A restricted candidate set: original vocabulary indexes with the
/// probabilities a strategy samples from, in descending order.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates {
    pub indexes: Vec<usize>,
    pub probs: Vec<f64>,
}

impl Candidates {
    fn from_ranked(ranked: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let (indexes, probs) = ranked.into_iter().unzip();
        Self { indexes, probs }
    }

    /// Number of retained candidates.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// `true` when nothing was retained (only for empty input).
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Total probability mass of the retained candidates.
    pub fn mass(&self) -> f64 {
        self.probs.iter().sum()
    }

    /// Draw one candidate with [`multinomial_sample`] and map it back to its
    /// vocabulary index.
    fn sample<R: Rng>(&self, rng: &mut R) -> Result<usize, SamplingError> {
        multinomial_sample(&self.probs, rng)
            .map(|i| self.indexes[i])
            .ok_or(SamplingError::EmptyScores)
    }
}

/// Index of the highest score, ties to the lowest index.
///
/// # Errors
/// Returns [`SamplingError::EmptyScores`] for an empty slice.
pub fn select_greedy(scores: &[f64]) -> Result<usize, SamplingError> {
    argmax(scores).ok_or(SamplingError::EmptyScores)
}

/// The `min(k, V)` highest scores, softmaxed among themselves only.
pub fn top_k_candidates(scores: &[f64], k: NonZeroUsize) -> Candidates {
    let mut ranked = sort_descending(scores);
    ranked.truncate(k.get());
    let (indexes, kept): (Vec<usize>, Vec<f64>) = ranked.into_iter().unzip();
    Candidates { indexes, probs: softmax(&kept) }
}

/// The nucleus: softmax over the full vector, sorted descending, kept until
/// the running sum exceeds `p` (the crossing element is included).
///
/// With `p == 1` the entire sorted distribution is retained.
pub fn top_p_candidates(scores: &[f64], p: ProbabilityMass) -> Candidates {
    let ranked = sort_descending(&softmax(scores));
    if p.get() >= 1.0 {
        return Candidates::from_ranked(ranked);
    }
    let cutoff = first_cumulative_exceeding(ranked.iter().map(|&(_, prob)| prob), p.get())
        .map_or(ranked.len(), |i| i + 1);
    Candidates::from_ranked(ranked.into_iter().take(cutoff))
}

/// Top-k sampling.
///
/// # Errors
/// Returns [`SamplingError::EmptyScores`] for an empty slice.
pub fn select_top_k<R: Rng>(
    scores: &[f64],
    k: NonZeroUsize,
    rng: &mut R,
) -> Result<usize, SamplingError> {
    top_k_candidates(scores, k).sample(rng)
}

/// Nucleus sampling; the draw range is the retained mass, not 1.
///
/// # Errors
/// Returns [`SamplingError::EmptyScores`] for an empty slice.
pub fn select_top_p<R: Rng>(
    scores: &[f64],
    p: ProbabilityMass,
    rng: &mut R,
) -> Result<usize, SamplingError> {
    top_p_candidates(scores, p).sample(rng)
}

/// Threshold walk: draw `r` in `[0, p)` and return the first entry of the
/// full descending distribution whose running sum exceeds `r`.
///
/// Falls back to the last (least likely) entry if rounding keeps the running
/// sum at or below `r`.
///
/// # Errors
/// Returns [`SamplingError::EmptyScores`] for an empty slice.
pub fn select_top_p_random<R: Rng>(
    scores: &[f64],
    p: ProbabilityMass,
    rng: &mut R,
) -> Result<usize, SamplingError> {
    let ranked = sort_descending(&softmax(scores));
    let last = ranked.last().ok_or(SamplingError::EmptyScores)?.0;
    let threshold = rng.random::<f64>() * p.get();
    Ok(first_cumulative_exceeding(ranked.iter().map(|&(_, prob)| prob), threshold)
        .map_or(last, |i| ranked[i].0))
}

impl DecodingStrategy {
    /// Choose an index from `scores` with this strategy.
    ///
    /// `Greedy` never touches `rng`.
    ///
    /// # Errors
    /// Returns [`SamplingError::EmptyScores`] for an empty slice.
    pub fn select<R: Rng>(&self, scores: &[f64], rng: &mut R) -> Result<usize, SamplingError> {
        match *self {
            Self::Greedy => select_greedy(scores),
            Self::TopK(k) => select_top_k(scores, k, rng),
            Self::TopP(p) => select_top_p(scores, p, rng),
            Self::TopPRandom(p) => select_top_p_random(scores, p, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SCORES: [f64; 5] = [1.0, 3.0, 2.0, 0.0, -1.0];

    fn k(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn p(v: f64) -> ProbabilityMass {
        ProbabilityMass::new(v).unwrap()
    }

    #[test]
    fn greedy_picks_highest_score() {
        assert_eq!(select_greedy(&SCORES), Ok(1));
    }

    #[test]
    fn greedy_empty_is_error() {
        assert_eq!(select_greedy(&[]), Err(SamplingError::EmptyScores));
    }

    #[test]
    fn top_k_two_keeps_indices_one_and_two() {
        let c = top_k_candidates(&SCORES, k(2));
        assert_eq!(c.indexes, vec![1, 2]);
        // softmax([3, 2]) only, not the full vector
        let expected = 1.0 / (1.0 + (-1.0f64).exp());
        assert!((c.probs[0] - expected).abs() < 1e-12);
        assert!((c.mass() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn top_k_larger_than_vocab_keeps_everything() {
        let c = top_k_candidates(&SCORES, k(50));
        assert_eq!(c.len(), SCORES.len());
    }

    #[test]
    fn top_k_samples_only_from_candidates() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            let idx = select_top_k(&SCORES, k(2), &mut rng).unwrap();
            assert!(idx == 1 || idx == 2, "unexpected index {idx}");
        }
    }

    #[test]
    fn top_p_half_keeps_only_the_peak() {
        // softmax([1,3,2,0,-1])[1] ≈ 0.636 > 0.5
        let c = top_p_candidates(&SCORES, p(0.5));
        assert_eq!(c.indexes, vec![1]);
    }

    #[test]
    fn top_p_crossing_element_is_included() {
        // probabilities ≈ [0.636, 0.234, 0.086, ...]; 0.636 < 0.8, 0.870 > 0.8
        let c = top_p_candidates(&SCORES, p(0.8));
        assert_eq!(c.indexes, vec![1, 2]);
    }

    #[test]
    fn top_p_one_keeps_full_distribution() {
        let c = top_p_candidates(&SCORES, p(1.0));
        assert_eq!(c.indexes, vec![1, 2, 0, 3, 4]);
        assert!((c.mass() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn top_p_tiny_keeps_single_token() {
        let c = top_p_candidates(&SCORES, p(1e-9));
        assert_eq!(c.indexes, vec![1]);
    }

    #[test]
    fn top_p_random_tiny_p_is_greedy() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(select_top_p_random(&SCORES, p(1e-9), &mut rng), Ok(1));
        }
    }

    /// Always yields the largest `f64` below 1 from `random::<f64>()`.
    struct MaxRng;

    impl rand::RngCore for MaxRng {
        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }

        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(u8::MAX);
        }
    }

    #[test]
    fn top_p_random_falls_back_to_last_sorted_entry() {
        // Seven equal scores give probabilities of fl(1/7), whose running sum
        // ends at 1 - 2^-52, below the draw of 1 - 2^-53. The masked entry
        // sorts last, so only the fallback can pick index 0.
        let mut scores = [0.0; 8];
        scores[0] = f64::NEG_INFINITY;
        assert_eq!(select_top_p_random(&scores, p(1.0), &mut MaxRng), Ok(0));
    }

    #[test]
    fn top_p_random_can_reach_beyond_the_nucleus() {
        // With p = 1 the walk spans the whole list, so low-probability tokens
        // outside a 0.5 nucleus must eventually be chosen.
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let seen_other = (0..2000)
            .map(|_| select_top_p_random(&SCORES, p(1.0), &mut rng).unwrap())
            .any(|i| i != 1);
        assert!(seen_other);
    }

    #[test]
    fn select_dispatches_on_variant() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(DecodingStrategy::Greedy.select(&SCORES, &mut rng), Ok(1));
        assert_eq!(DecodingStrategy::top_k(1).unwrap().select(&SCORES, &mut rng), Ok(1));
        assert_eq!(DecodingStrategy::top_p(0.5).unwrap().select(&SCORES, &mut rng), Ok(1));
    }

    #[test]
    fn empty_scores_error_for_every_variant() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for s in [
            DecodingStrategy::Greedy,
            DecodingStrategy::top_k(3).unwrap(),
            DecodingStrategy::top_p(0.9).unwrap(),
            DecodingStrategy::top_p_random(0.9).unwrap(),
        ] {
            assert_eq!(s.select(&[], &mut rng), Err(SamplingError::EmptyScores), "{s}");
        }
    }
}
