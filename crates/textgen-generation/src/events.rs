//! Per-token events and end-of-generation statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::StopReason;

/// One accepted token and its decoded fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEvent {
    pub id: u32,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub tokens_generated: usize,
    pub tokens_per_second: f64,
}

impl GenerationStats {
    /// Throughput over `elapsed`; zero when no time was measured.
    pub fn from_elapsed(tokens_generated: usize, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let tokens_per_second = if secs > 0.0 { tokens_generated as f64 / secs } else { 0.0 };
        Self { tokens_generated, tokens_per_second }
    }
}

/// What a streaming consumer receives.
///
/// A successful stream is zero or more `Token`s followed by exactly one
/// `Done`. A failed stream ends without `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Token(TokenEvent),
    Done { reason: StopReason, stats: GenerationStats },
}

impl StreamEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn as_token(&self) -> Option<&TokenEvent> {
        match self {
            Self::Token(t) => Some(t),
            Self::Done { .. } => None,
        }
    }
}
