//! Decoding strategies for autoregressive generation.
//!
//! A [`DecodingStrategy`] turns one score vector into one token index:
//!
//! | Strategy | Selection |
//! |---|---|
//! | `Greedy` | argmax, ties to the lowest index |
//! | `TopK(k)` | softmax over the `k` best scores, then a weighted draw |
//! | `TopP(p)` | weighted draw inside the smallest prefix whose mass exceeds `p` |
//! | `TopPRandom(p)` | threshold `r` in `[0, p)` walked over the full sorted list |
//!
//! ```
//! use textgen_sampling::{DecodingStrategy, Sampler};
//!
//! let strategy: DecodingStrategy = "top_k:2".parse().unwrap();
//! let mut sampler = Sampler::seeded(strategy, 7);
//! let idx = sampler.select(&[1.0, 3.0, 2.0, 0.0, -1.0]).unwrap();
//! assert!(idx == 1 || idx == 2);
//! ```

mod sampler;
mod select;
mod strategy;

pub use sampler::Sampler;
pub use select::{
    Candidates, SamplingError, select_greedy, select_top_k, select_top_p, select_top_p_random,
    top_k_candidates, top_p_candidates,
};
pub use strategy::{DecodingStrategy, ProbabilityMass, StrategyError};

/// Re-exported so callers can seed a [`Sampler`] without a direct dependency.
pub use rand_chacha::ChaCha8Rng;
