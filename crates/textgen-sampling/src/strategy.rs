//! The closed set of decoding strategies and their validated parameters.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors raised while building a [`DecodingStrategy`].
///
/// These surface at construction time; a strategy value that exists is always
/// usable by the generation loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("top-k requires k > 0, got {k}")]
    InvalidTopK { k: i64 },

    #[error("top-p requires 0 < p <= 1, got {p}")]
    InvalidTopP { p: f64 },

    #[error("unknown decoding strategy: {0}")]
    UnknownStrategy(String),

    #[error("strategy `{name}` expects a parameter, e.g. `{name}:{example}`")]
    MissingParameter { name: &'static str, example: &'static str },

    #[error("cannot parse parameter `{value}` for strategy `{name}`")]
    InvalidParameter { name: &'static str, value: String },
}

const GREEDY: &str = "greedy";
const TOP_K: &str = "top_k";
const TOP_P: &str = "top_p";
const TOP_P_RANDOM: &str = "top_p_random";

/// A cumulative-probability threshold in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ProbabilityMass(f64);

impl ProbabilityMass {
    /// Validate `p`.
    ///
    /// # Errors
    /// Returns [`StrategyError::InvalidTopP`] when `p` is not finite or lies
    /// outside `(0, 1]`.
    pub fn new(p: f64) -> Result<Self, StrategyError> {
        if p.is_finite() && p > 0.0 && p <= 1.0 {
            Ok(Self(p))
        } else {
            Err(StrategyError::InvalidTopP { p })
        }
    }

    /// The wrapped threshold.
    pub fn get(self) -> f64 {
        self.0
    }
}

/// How the next token is chosen from a score vector.
///
/// Parameters are validated when the value is built (`top_k`, `top_p`, …, or
/// through `FromStr` / serde), never inside the generation loop.
///
/// `TopP` and `TopPRandom` are deliberately separate: `TopP` truncates the
/// sorted distribution to the nucleus and samples within it, while
/// `TopPRandom` draws a threshold in `[0, p)` and walks the untruncated list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StrategyRepr", into = "StrategyRepr")]
pub enum DecodingStrategy {
    /// Highest score wins; ties go to the lowest index.
    #[default]
    Greedy,
    /// Sample among the `k` highest scores.
    TopK(NonZeroUsize),
    /// Nucleus sampling over the smallest prefix whose mass exceeds `p`.
    TopP(ProbabilityMass),
    /// Threshold walk over the full sorted distribution with a draw in `[0, p)`.
    TopPRandom(ProbabilityMass),
}

impl DecodingStrategy {
    /// `TopP(0.8)`, the usual nucleus default.
    pub const NUCLEUS_0_8: Self = Self::TopP(ProbabilityMass(0.8));

    /// Top-k sampling.
    ///
    /// # Errors
    /// Returns [`StrategyError::InvalidTopK`] when `k == 0`.
    pub fn top_k(k: usize) -> Result<Self, StrategyError> {
        NonZeroUsize::new(k).map(Self::TopK).ok_or(StrategyError::InvalidTopK { k: 0 })
    }

    /// Nucleus (top-p) sampling.
    ///
    /// # Errors
    /// Returns [`StrategyError::InvalidTopP`] when `p` is outside `(0, 1]`.
    pub fn top_p(p: f64) -> Result<Self, StrategyError> {
        ProbabilityMass::new(p).map(Self::TopP)
    }

    /// Threshold-walk top-p variant.
    ///
    /// # Errors
    /// Returns [`StrategyError::InvalidTopP`] when `p` is outside `(0, 1]`.
    pub fn top_p_random(p: f64) -> Result<Self, StrategyError> {
        ProbabilityMass::new(p).map(Self::TopPRandom)
    }

    /// Short machine name, the prefix of the `Display` / `FromStr` form.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Greedy => GREEDY,
            Self::TopK(_) => TOP_K,
            Self::TopP(_) => TOP_P,
            Self::TopPRandom(_) => TOP_P_RANDOM,
        }
    }

    /// Whether this strategy consumes randomness.
    pub const fn is_stochastic(&self) -> bool {
        !matches!(self, Self::Greedy)
    }
}

impl fmt::Display for DecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Self::Greedy => Ok(()),
            Self::TopK(k) => write!(f, ":{k}"),
            Self::TopP(p) | Self::TopPRandom(p) => write!(f, ":{}", p.get()),
        }
    }
}

/// Parses the compact form `name[:param]`, e.g. `greedy`, `top_k:40`,
/// `top_p:0.8`, `top_p_random:0.8`. Dashes are accepted in place of
/// underscores.
impl FromStr for DecodingStrategy {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let (name, param) = match normalized.split_once(':') {
            Some((name, param)) => (name.trim().to_string(), Some(param.trim().to_string())),
            None => (normalized.clone(), None),
        };

        match name.as_str() {
            GREEDY => Ok(Self::Greedy),
            TOP_K => {
                let raw = param
                    .ok_or(StrategyError::MissingParameter { name: TOP_K, example: "40" })?;
                let k: i64 = raw
                    .parse()
                    .map_err(|_| StrategyError::InvalidParameter { name: TOP_K, value: raw })?;
                Self::try_from(StrategyRepr::TopK { k })
            }
            TOP_P | TOP_P_RANDOM => {
                let is_random = name == TOP_P_RANDOM;
                let label = if is_random { TOP_P_RANDOM } else { TOP_P };
                let raw = param.ok_or(StrategyError::MissingParameter { name: label, example: "0.8" })?;
                let p: f64 = raw
                    .parse()
                    .map_err(|_| StrategyError::InvalidParameter { name: label, value: raw })?;
                if is_random { Self::top_p_random(p) } else { Self::top_p(p) }
            }
            _ => Err(StrategyError::UnknownStrategy(s.trim().to_string())),
        }
    }
}

/// Wire form: a table tagged by `type`, e.g. `{ type = "top_k", k = 40 }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StrategyRepr {
    Greedy,
    TopK { k: i64 },
    TopP { p: f64 },
    TopPRandom { p: f64 },
}

impl TryFrom<StrategyRepr> for DecodingStrategy {
    type Error = StrategyError;

    fn try_from(repr: StrategyRepr) -> Result<Self, Self::Error> {
        match repr {
            StrategyRepr::Greedy => Ok(Self::Greedy),
            StrategyRepr::TopK { k } => usize::try_from(k)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(Self::TopK)
                .ok_or(StrategyError::InvalidTopK { k }),
            StrategyRepr::TopP { p } => Self::top_p(p),
            StrategyRepr::TopPRandom { p } => Self::top_p_random(p),
        }
    }
}

impl From<DecodingStrategy> for StrategyRepr {
    fn from(strategy: DecodingStrategy) -> Self {
        match strategy {
            DecodingStrategy::Greedy => Self::Greedy,
            DecodingStrategy::TopK(k) => Self::TopK { k: i64::try_from(k.get()).unwrap_or(i64::MAX) },
            DecodingStrategy::TopP(p) => Self::TopP { p: p.get() },
            DecodingStrategy::TopPRandom(p) => Self::TopPRandom { p: p.get() },
        }
    }
}
