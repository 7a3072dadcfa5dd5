//! Loop state machine and stop policies.
//!
//! ```text
//! Running ──callback false──▶ StoppedByCallback
//!    │    ──stop token──────▶ StoppedByStopToken
//!    │    ──budget spent────▶ StoppedByMaxTokens
//!    └────scorer failure────▶ Failed
//! ```
//!
//! Every state other than `Running` is terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a generation ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The token callback asked to stop.
    Callback,
    /// The selected token matched the configured stop token.
    StopToken(u32),
    /// `max_tokens` tokens were generated.
    MaxTokens,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback => write!(f, "callback"),
            Self::StopToken(id) => write!(f, "stop_token({id})"),
            Self::MaxTokens => write!(f, "max_tokens"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    #[default]
    Running,
    StoppedByCallback,
    StoppedByStopToken,
    StoppedByMaxTokens,
    Failed,
}

impl GenerationState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Move to the terminal state for `reason`.
    ///
    /// Returns `false` and leaves the state untouched if it was already
    /// terminal.
    pub fn finish(&mut self, reason: StopReason) -> bool {
        self.enter(match reason {
            StopReason::Callback => Self::StoppedByCallback,
            StopReason::StopToken(_) => Self::StoppedByStopToken,
            StopReason::MaxTokens => Self::StoppedByMaxTokens,
        })
    }

    /// Move to `Failed`. Same terminal rule as [`finish`](Self::finish).
    pub fn fail(&mut self) -> bool {
        self.enter(Self::Failed)
    }

    fn enter(&mut self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = next;
        true
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::StoppedByCallback => "stopped_by_callback",
            Self::StoppedByStopToken => "stopped_by_stop_token",
            Self::StoppedByMaxTokens => "stopped_by_max_tokens",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The token that ends a stop-token-policy generation.
///
/// In TOML: `stop_token = { id = 50256 }` or `stop_token = { text = "<|endoftext|>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopToken {
    /// Match on the selected id.
    Id(u32),
    /// Match on the decoded fragment of the selected id.
    Text(String),
}

impl StopToken {
    pub const END_OF_TEXT: &'static str = "<|endoftext|>";

    pub fn matches(&self, id: u32, fragment: &str) -> bool {
        match self {
            Self::Id(stop) => *stop == id,
            Self::Text(stop) => stop == fragment,
        }
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::Text(Self::END_OF_TEXT.to_string())
    }
}

impl fmt::Display for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Text(text) => write!(f, "text:{text:?}"),
        }
    }
}

impl From<u32> for StopToken {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for StopToken {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}
