//! Fixed-length context windows.
//!
//! The scorer always receives exactly `W` ids. Short sequences are padded on
//! the right; long ones are truncated according to [`Truncation`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a window. All of them are configuration
/// problems and surface before the scorer is called.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("context window length must be > 0")]
    ZeroLength,

    #[error("context window length {0} does not fit in a u32 position id")]
    TooLarge(usize),

    #[error("cannot build a context window from an empty token sequence")]
    EmptySequence,

    #[error("unknown truncation policy: {0}")]
    UnknownTruncation(String),
}

/// What to keep when the sequence is longer than the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    /// Keep the first `W` tokens. Once the sequence outgrows the window the
    /// scorer keeps seeing the same prefix.
    #[default]
    KeepEarliest,
    /// Keep the last `W` tokens.
    KeepLatest,
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepEarliest => write!(f, "keep_earliest"),
            Self::KeepLatest => write!(f, "keep_latest"),
        }
    }
}

impl FromStr for Truncation {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_earliest" | "earliest" => Ok(Self::KeepEarliest),
            "keep_latest" | "latest" => Ok(Self::KeepLatest),
            other => Err(WindowError::UnknownTruncation(other.to_string())),
        }
    }
}

/// One step's scorer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    /// Exactly `W` token ids.
    pub input_ids: Vec<u32>,
    /// `0..W`, the same on every step.
    pub position_ids: Vec<u32>,
    /// Window position of the last real (non-pad) token: `min(len, W) - 1`.
    pub last_real_index: usize,
}

impl ContextWindow {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Builds [`ContextWindow`]s for a fixed `W`, pad id and truncation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindowManager {
    window_len: usize,
    pad_token_id: u32,
    truncation: Truncation,
    position_ids: Vec<u32>,
}

impl ContextWindowManager {
    /// # Errors
    /// [`WindowError::ZeroLength`] when `window_len == 0`, and
    /// [`WindowError::TooLarge`] when positions would overflow `u32`.
    pub fn new(window_len: usize, pad_token_id: u32) -> Result<Self, WindowError> {
        if window_len == 0 {
            return Err(WindowError::ZeroLength);
        }
        let end = u32::try_from(window_len).map_err(|_| WindowError::TooLarge(window_len))?;
        Ok(Self {
            window_len,
            pad_token_id,
            truncation: Truncation::default(),
            position_ids: (0..end).collect(),
        })
    }

    #[must_use]
    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    pub fn truncation(&self) -> Truncation {
        self.truncation
    }

    /// The position ids every window carries.
    pub fn position_ids(&self) -> &[u32] {
        &self.position_ids
    }

    /// Fit `tokens` into the window.
    ///
    /// # Errors
    /// [`WindowError::EmptySequence`] when `tokens` is empty.
    pub fn build(&self, tokens: &[u32]) -> Result<ContextWindow, WindowError> {
        if tokens.is_empty() {
            return Err(WindowError::EmptySequence);
        }
        let w = self.window_len;
        let kept = match self.truncation {
            Truncation::KeepEarliest => &tokens[..tokens.len().min(w)],
            Truncation::KeepLatest => &tokens[tokens.len().saturating_sub(w)..],
        };

        let mut input_ids = Vec::with_capacity(w);
        input_ids.extend_from_slice(kept);
        input_ids.resize(w, self.pad_token_id);

        Ok(ContextWindow {
            input_ids,
            position_ids: self.position_ids.clone(),
            last_real_index: kept.len() - 1,
        })
    }
}

/// Build a window of length `window_len` with pad id 0, keeping the earliest
/// tokens.
///
/// ```
/// use textgen_generation::build_window;
///
/// let w = build_window(&[7], 4).unwrap();
/// assert_eq!(w.input_ids, vec![7, 0, 0, 0]);
/// assert_eq!(w.position_ids, vec![0, 1, 2, 3]);
/// assert_eq!(w.last_real_index, 0);
/// ```
///
/// # Errors
/// See [`ContextWindowManager::new`] and [`ContextWindowManager::build`].
pub fn build_window(tokens: &[u32], window_len: usize) -> Result<ContextWindow, WindowError> {
    ContextWindowManager::new(window_len, 0)?.build(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequence_is_right_padded() {
        let w = build_window(&[7], 4).unwrap();
        assert_eq!(w.input_ids, vec![7, 0, 0, 0]);
        assert_eq!(w.position_ids, vec![0, 1, 2, 3]);
        assert_eq!(w.last_real_index, 0);
    }

    #[test]
    fn long_sequence_keeps_earliest_prefix() {
        let w = build_window(&[7, 8, 9, 10, 11], 4).unwrap();
        assert_eq!(w.input_ids, vec![7, 8, 9, 10]);
        assert_eq!(w.last_real_index, 3);
    }

    #[test]
    fn exact_fit_has_no_padding() {
        let w = build_window(&[1, 2, 3, 4], 4).unwrap();
        assert_eq!(w.input_ids, vec![1, 2, 3, 4]);
        assert_eq!(w.last_real_index, 3);
    }

    #[test]
    fn keep_latest_slides_the_tail() {
        let mgr = ContextWindowManager::new(4, 0).unwrap().with_truncation(Truncation::KeepLatest);
        let w = mgr.build(&[7, 8, 9, 10, 11]).unwrap();
        assert_eq!(w.input_ids, vec![8, 9, 10, 11]);
        assert_eq!(w.last_real_index, 3);
    }

    #[test]
    fn custom_pad_id_is_used() {
        let mgr = ContextWindowManager::new(3, 50_256).unwrap();
        assert_eq!(mgr.build(&[5]).unwrap().input_ids, vec![5, 50_256, 50_256]);
    }

    #[test]
    fn zero_length_window_is_rejected() {
        assert_eq!(build_window(&[1], 0), Err(WindowError::ZeroLength));
    }

    #[test]
    fn empty_sequence_is_rejected() {
        assert_eq!(build_window(&[], 4), Err(WindowError::EmptySequence));
    }

    #[test]
    fn truncation_parses_aliases() {
        assert_eq!("keep-latest".parse::<Truncation>(), Ok(Truncation::KeepLatest));
        assert_eq!("Earliest".parse::<Truncation>(), Ok(Truncation::KeepEarliest));
        assert!("middle".parse::<Truncation>().is_err());
    }

    proptest::proptest! {
        #[test]
        fn window_always_has_length_w(
            tokens in proptest::collection::vec(0u32..1000, 1..40),
            w in 1usize..32,
            latest in proptest::bool::ANY,
        ) {
            let policy = if latest { Truncation::KeepLatest } else { Truncation::KeepEarliest };
            let mgr = ContextWindowManager::new(w, 0).unwrap().with_truncation(policy);
            let win = mgr.build(&tokens).unwrap();
            proptest::prop_assert_eq!(win.input_ids.len(), w);
            proptest::prop_assert_eq!(win.position_ids.len(), w);
            proptest::prop_assert_eq!(win.last_real_index, tokens.len().min(w) - 1);
        }
    }
}
