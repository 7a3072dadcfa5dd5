//! Numeric primitives shared by every decoding strategy.
//!
//! All routines work on plain `f64` slices so they stay portable; nothing here
//! depends on a tensor library or on platform vector intrinsics.
//!
//! ## Typical pipeline
//!
//! ```
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use textgen_logits::*;
//!
//! let scores = vec![1.0, 3.0, 2.0, 0.0, -1.0];
//! let probs = softmax(&scores);
//! let ranked = sort_descending(&probs);
//! assert_eq!(ranked[0].0, 1);
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let idx = multinomial_sample(&probs, &mut rng).unwrap();
//! assert!(idx < scores.len());
//! ```

use std::cmp::Ordering;

use rand::Rng;

/// Convert raw scores into a probability distribution.
///
/// Uses the "subtract max" form, so very large or very skewed inputs do not
/// overflow. For any finite input the result is non-negative and sums to 1.
/// An empty slice yields an empty vector.
///
/// # Examples
///
/// ```
/// use textgen_logits::softmax;
///
/// let probs = softmax(&[1.0, 2.0, 3.0]);
/// let sum: f64 = probs.iter().sum();
/// assert!((sum - 1.0).abs() < 1e-12);
/// assert!(probs[2] > probs[1] && probs[1] > probs[0]);
/// ```
///
/// All-equal scores give a uniform distribution:
///
/// ```
/// use textgen_logits::softmax;
///
/// let probs = softmax(&[4.0; 4]);
/// assert!(probs.iter().all(|&p| (p - 0.25).abs() < 1e-12));
/// ```
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let mut out = scores.to_vec();
    softmax_in_place(&mut out);
    out
}

/// In-place variant of [`softmax`].
///
/// `f64::NEG_INFINITY` entries map to probability `0.0`. If every entry is
/// `NEG_INFINITY` the slice becomes uniform so callers still receive a valid
/// distribution.
pub fn softmax_in_place(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let max = max_value(values);
    #[allow(clippy::float_cmp)]
    if max == f64::NEG_INFINITY {
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / values.len() as f64;
        values.fill(uniform);
        return;
    }
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    // sum >= 1.0 here: the max element contributes exp(0).
    let inv = 1.0 / sum;
    for v in values.iter_mut() {
        *v *= inv;
    }
}

/// Largest value in the slice, `NEG_INFINITY` for an empty slice.
pub fn max_value(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Index of the maximum value.
///
/// Ties resolve to the **lowest** index (first occurrence in iteration order).
/// Returns `None` on an empty slice.
///
/// # Examples
///
/// ```
/// use textgen_logits::argmax;
///
/// assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), Some(1));
/// assert_eq!(argmax(&[]), None);
/// ```
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Pair every value with its index and sort descending by value.
///
/// The sort is stable: equal values keep ascending index order, which keeps
/// strategies built on top of it deterministic.
pub fn sort_descending(values: &[f64]) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| f64_descending(a.1, b.1));
    indexed
}

/// Walk the running sum of `weights` and return the first position whose
/// cumulative value is strictly greater than `threshold`.
///
/// Returns `None` when the total never exceeds the threshold.
pub fn first_cumulative_exceeding<I>(weights: I, threshold: f64) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut cumulative = 0.0;
    for (i, w) in weights.into_iter().enumerate() {
        cumulative += w;
        if cumulative > threshold {
            return Some(i);
        }
    }
    None
}

/// Draw one index from a discrete weighted distribution.
///
/// The weights need not sum to one: a uniform value `u` is drawn from
/// `[0, sum(weights))` and the first index whose cumulative weight exceeds `u`
/// wins. When floating-point rounding leaves the cumulative sum just short of
/// `u`, the **last** index is returned instead of failing.
///
/// Returns `None` only for an empty slice.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use textgen_logits::multinomial_sample;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// // All mass on index 2.
/// assert_eq!(multinomial_sample(&[0.0, 0.0, 5.0], &mut rng), Some(2));
/// ```
pub fn multinomial_sample<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    let draw = rng.random::<f64>() * total;
    Some(
        first_cumulative_exceeding(weights.iter().copied(), draw)
            .unwrap_or(weights.len() - 1),
    )
}

// --- helpers ---------------------------------------------------------------

#[inline]
fn f64_descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

// ---------------------------------------------------------------------------
