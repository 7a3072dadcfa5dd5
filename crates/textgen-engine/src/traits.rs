//! Contracts for the two external collaborators: the next-token scorer and
//! the tokenizer.

use std::sync::Arc;

use anyhow::Result;
use textgen_generation::ScoreMatrix;

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// A fixed-context next-token scorer.
///
/// Given `W` input ids and `W` position ids it returns a `W × V` matrix of
/// unnormalized scores; row `i` scores the token following position `i`.
///
/// Implementations that are `Send + Sync` can back a generator shared across
/// threads; nothing here requires it.
///
/// # Examples
///
/// ```
/// use anyhow::Result;
/// use textgen_engine::{ScoreMatrix, Scorer};
///
/// /// Always prefers token 1.
/// struct Biased;
///
/// impl Scorer for Biased {
///     fn vocab_size(&self) -> usize {
///         3
///     }
///
///     fn score(&self, input_ids: &[u32], _position_ids: &[u32]) -> Result<ScoreMatrix> {
///         let rows = vec![vec![0.0, 5.0, 0.0]; input_ids.len()];
///         Ok(ScoreMatrix::from_rows(rows)?)
///     }
/// }
///
/// let m = Biased.score(&[0, 0], &[0, 1]).unwrap();
/// assert_eq!(m.row(1), Some(&[0.0, 5.0, 0.0][..]));
/// ```
pub trait Scorer {
    /// Number of scores in every row (`V`).
    fn vocab_size(&self) -> usize;

    /// Score one window.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying model. The generation loop treats it as
    /// fatal for the current run.
    fn score(&self, input_ids: &[u32], position_ids: &[u32]) -> Result<ScoreMatrix>;
}

impl<S: Scorer + ?Sized> Scorer for &S {
    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&self, input_ids: &[u32], position_ids: &[u32]) -> Result<ScoreMatrix> {
        (**self).score(input_ids, position_ids)
    }
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&self, input_ids: &[u32], position_ids: &[u32]) -> Result<ScoreMatrix> {
        (**self).score(input_ids, position_ids)
    }
}

impl<S: Scorer + ?Sized> Scorer for Arc<S> {
    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&self, input_ids: &[u32], position_ids: &[u32]) -> Result<ScoreMatrix> {
        (**self).score(input_ids, position_ids)
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Text ↔ token id conversion.
pub trait Tokenizer {
    /// # Errors
    /// Input the tokenizer cannot represent.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// # Errors
    /// Ids outside the vocabulary, or bytes that do not form text.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Decode a single id for streaming.
    ///
    /// # Errors
    /// Same as [`decode`](Self::decode).
    fn decode_token(&self, id: u32) -> Result<String> {
        self.decode(&[id])
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        (**self).decode(ids)
    }

    fn decode_token(&self, id: u32) -> Result<String> {
        (**self).decode_token(id)
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        (**self).decode(ids)
    }

    fn decode_token(&self, id: u32) -> Result<String> {
        (**self).decode_token(id)
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Arc<T> {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        (**self).decode(ids)
    }

    fn decode_token(&self, id: u32) -> Result<String> {
        (**self).decode_token(id)
    }
}
