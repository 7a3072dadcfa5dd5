//! Building blocks the generation loop is assembled from: fixed-length
//! context windows, scorer output matrices, the stop state machine, stream
//! events and the run configuration.
//!
//! Nothing in this crate talks to a scorer or tokenizer.

pub mod config;
pub mod events;
pub mod scores;
pub mod state;
pub mod window;

pub use config::{ConfigError, GenerationConfig};
pub use events::{GenerationStats, StreamEvent, TokenEvent};
pub use scores::{ScoreMatrix, ShapeError};
pub use state::{GenerationState, StopReason, StopToken};
pub use window::{ContextWindow, ContextWindowManager, Truncation, WindowError, build_window};
