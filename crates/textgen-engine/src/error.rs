//! Error taxonomy for a generation run.

use textgen_generation::{ConfigError, ShapeError, WindowError};
use textgen_sampling::{SamplingError, StrategyError};
use thiserror::Error;

/// What was produced before a run failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialGeneration {
    /// Prompt ids followed by every accepted token.
    pub tokens: Vec<u32>,
    /// Number of leading prompt ids in `tokens`.
    pub prompt_len: usize,
    /// Concatenated fragments of the accepted tokens only. Unlike
    /// [`GenerationOutput::text`](crate::GenerationOutput::text) it never
    /// includes the prompt.
    pub text: String,
}

impl PartialGeneration {
    /// The accepted tokens without the prompt.
    pub fn generated(&self) -> &[u32] {
        &self.tokens[self.prompt_len.min(self.tokens.len())..]
    }
}

/// Why a score row was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreDefect {
    #[error("row has {actual} scores, expected vocabulary size {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("score at index {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("row is empty")]
    Empty,

    #[error("selected index {index} does not fit a token id")]
    IndexOutOfRange { index: usize },
}

impl From<SamplingError> for ScoreDefect {
    fn from(err: SamplingError) -> Self {
        match err {
            SamplingError::EmptyScores => Self::Empty,
        }
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    // ── configuration: raised before the scorer is called ──
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid decoding strategy: {0}")]
    Strategy(#[from] StrategyError),

    #[error("invalid context window: {0}")]
    Window(#[from] WindowError),

    #[error("prompt encoded to zero tokens")]
    EmptyPrompt,

    #[error("scorer vocabulary size {0} is not usable (must be in 1..=2^32)")]
    Vocabulary(usize),

    // ── collaborator failures ──
    #[error("tokenizer failed to {stage}")]
    Tokenizer {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
        partial: Option<PartialGeneration>,
    },

    #[error("scorer failed at step {step}")]
    Scorer {
        step: usize,
        #[source]
        source: anyhow::Error,
        partial: PartialGeneration,
    },

    #[error("malformed scores at step {step}: {defect}")]
    MalformedScores { step: usize, defect: ScoreDefect, partial: PartialGeneration },

    #[error("score matrix shape mismatch at step {step}")]
    Shape {
        step: usize,
        #[source]
        source: ShapeError,
        partial: PartialGeneration,
    },

    // ── streaming worker ──
    #[error("failed to start the stream worker")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("stream worker panicked")]
    WorkerPanicked,
}

impl GenerationError {
    /// Output accepted before the failure, when the run got that far.
    pub fn partial(&self) -> Option<&PartialGeneration> {
        match self {
            Self::Scorer { partial, .. }
            | Self::MalformedScores { partial, .. }
            | Self::Shape { partial, .. } => Some(partial),
            Self::Tokenizer { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }

    /// `true` for errors detected before any scorer call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Strategy(_)
                | Self::Window(_)
                | Self::EmptyPrompt
                | Self::Vocabulary(_)
        )
    }

    /// Zero-based step the failure happened at, for mid-run failures.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Scorer { step, .. }
            | Self::MalformedScores { step, .. }
            | Self::Shape { step, .. } => Some(*step),
            _ => None,
        }
    }
}
