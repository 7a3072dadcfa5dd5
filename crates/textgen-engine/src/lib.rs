//! Autoregressive text generation over a fixed-context scorer.
//!
//! A [`Generator`] owns a [`Scorer`], a [`Tokenizer`] and a validated
//! [`GenerationConfig`]. Each run builds a context window, scores it, picks a
//! token with the [`DecodingStrategy`], appends it and repeats until a stop
//! condition fires:
//!
//! | Entry point | Stops on |
//! |---|---|
//! | [`Generator::generate`] | callback returns `false`, or `max_tokens` |
//! | [`Generator::generate_until`] | selected token matches a [`StopToken`], or `max_tokens` |
//! | [`Generator::stream`] | configured stop token, or `max_tokens`; lazy iterator |
//! | [`spawn_stream`] | same as `stream`, on a worker thread |
//!
//! Scorer and tokenizer failures never panic: they end the run in
//! [`GenerationState::Failed`] and the returned [`GenerationError`] carries
//! everything produced so far.

mod error;
mod generation_loop;
mod generator;
pub mod mock;
mod stream;
mod traits;

pub use error::{GenerationError, PartialGeneration, ScoreDefect};
pub use generation_loop::{GenerationLoop, GenerationOutput, TokenStream};
pub use generator::Generator;
pub use stream::{DEFAULT_STREAM_BUFFER, StreamHandle, spawn_stream, spawn_stream_with_buffer};
pub use traits::{Scorer, Tokenizer};

pub use textgen_generation::{
    ConfigError, ContextWindow, ContextWindowManager, GenerationConfig, GenerationState,
    GenerationStats, ScoreMatrix, ShapeError, StopReason, StopToken, StreamEvent, TokenEvent,
    Truncation, WindowError,
};
pub use textgen_sampling::{DecodingStrategy, Sampler, StrategyError};
