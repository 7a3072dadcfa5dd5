//! One autoregressive run: window → score → select → append → decode.

use std::iter::FusedIterator;
use std::time::Instant;

use rand::Rng;
use textgen_generation::{
    GenerationState, GenerationStats, ShapeError, StopReason, StopToken, TokenEvent,
};
use textgen_sampling::{ChaCha8Rng, Sampler};
use tracing::{debug, info, warn};

use crate::error::{GenerationError, PartialGeneration, ScoreDefect};
use crate::generator::Generator;
use crate::traits::{Scorer, Tokenizer};

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    /// The full sequence, prompt included, decoded in one pass. A failed
    /// run's [`PartialGeneration::text`] holds only the generated fragments.
    pub text: String,
    pub tokens: Vec<u32>,
    pub prompt_len: usize,
    pub state: GenerationState,
    /// `None` only when the run was finished while still `Running`.
    pub stop_reason: Option<StopReason>,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    pub fn generated(&self) -> &[u32] {
        &self.tokens[self.prompt_len..]
    }
}

/// A single in-progress generation.
///
/// Produces at most `max_tokens` tokens, one per [`next_token`] call. The
/// loop owns its token sequence and RNG; the scorer and tokenizer are
/// borrowed from the [`Generator`].
///
/// Iterating yields the same events as [`next_token`]. After the first
/// `None` or `Err` the loop is terminal and yields nothing more.
///
/// [`next_token`]: GenerationLoop::next_token
pub struct GenerationLoop<'g, S, T, R = ChaCha8Rng> {
    generator: &'g Generator<S, T>,
    sampler: Sampler<R>,
    stop: Option<StopToken>,
    max_tokens: usize,
    tokens: Vec<u32>,
    prompt_len: usize,
    text: String,
    generated: usize,
    state: GenerationState,
    reason: Option<StopReason>,
    started: Instant,
}

/// The iterator returned by [`Generator::stream`].
pub type TokenStream<'g, S, T> = GenerationLoop<'g, S, T, ChaCha8Rng>;

impl<'g, S: Scorer, T: Tokenizer, R: Rng> GenerationLoop<'g, S, T, R> {
    pub(crate) fn new(
        generator: &'g Generator<S, T>,
        prompt_ids: Vec<u32>,
        sampler: Sampler<R>,
        stop: Option<StopToken>,
        max_tokens: usize,
    ) -> Self {
        let prompt_len = prompt_ids.len();
        Self {
            generator,
            sampler,
            stop,
            max_tokens,
            tokens: prompt_ids,
            prompt_len,
            text: String::new(),
            generated: 0,
            state: GenerationState::Running,
            reason: None,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.reason
    }

    /// Prompt ids followed by every accepted token.
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// Number of tokens accepted so far.
    pub fn generated_len(&self) -> usize {
        self.generated
    }

    /// Concatenated fragments of the accepted tokens.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Produce the next token, or `None` once the run is over.
    ///
    /// The max-tokens transition happens here, on the call after the last
    /// budgeted token, so a stop requested on that last token keeps its own
    /// reason.
    ///
    /// # Errors
    ///
    /// A scorer or tokenizer failure, or a malformed score matrix. The loop
    /// moves to [`GenerationState::Failed`] and the error carries the
    /// partial output.
    pub fn next_token(&mut self) -> Result<Option<TokenEvent>, GenerationError> {
        if self.state.is_terminal() {
            return Ok(None);
        }
        if self.generated >= self.max_tokens {
            self.finish_with(StopReason::MaxTokens);
            return Ok(None);
        }
        match self.step() {
            Ok(event) => Ok(Some(event)),
            Err(err) => {
                self.state.fail();
                warn!(step = self.generated, error = %err, "generation failed");
                Err(err)
            }
        }
    }

    /// End the run early. Returns `false` if it had already ended.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        self.finish_with(reason)
    }

    /// Drive the loop to the end, handing every token to `on_token`.
    /// Returning `false` from `on_token` stops the run after that token.
    ///
    /// # Errors
    /// See [`next_token`](Self::next_token) and [`finish`](Self::finish).
    pub fn run<F>(mut self, mut on_token: F) -> Result<GenerationOutput, GenerationError>
    where
        F: FnMut(&TokenEvent) -> bool,
    {
        while let Some(event) = self.next_token()? {
            if !on_token(&event) {
                self.stop(StopReason::Callback);
            }
        }
        self.finish()
    }

    /// Decode the whole sequence and collect statistics.
    ///
    /// # Errors
    /// [`GenerationError::Tokenizer`] if the final decode fails.
    pub fn finish(self) -> Result<GenerationOutput, GenerationError> {
        let text = self.generator.tokenizer().decode(&self.tokens).map_err(|source| {
            GenerationError::Tokenizer {
                stage: "decode the generated sequence",
                source,
                partial: Some(self.partial()),
            }
        })?;
        let stats = GenerationStats::from_elapsed(self.generated, self.started.elapsed());
        info!(
            state = %self.state,
            tokens = stats.tokens_generated,
            tokens_per_second = stats.tokens_per_second,
            "generation finished"
        );
        Ok(GenerationOutput {
            text,
            tokens: self.tokens,
            prompt_len: self.prompt_len,
            state: self.state,
            stop_reason: self.reason,
            stats,
        })
    }

    /// Snapshot of the output accepted so far.
    pub fn partial(&self) -> PartialGeneration {
        PartialGeneration {
            tokens: self.tokens.clone(),
            prompt_len: self.prompt_len,
            text: self.text.clone(),
        }
    }

    // --- internals ---------------------------------------------------------

    fn finish_with(&mut self, reason: StopReason) -> bool {
        let changed = self.state.finish(reason);
        if changed {
            self.reason = Some(reason);
            debug!(%reason, generated = self.generated, "generation stopped");
        }
        changed
    }

    fn step(&mut self) -> Result<TokenEvent, GenerationError> {
        let step = self.generated;
        let window = self.generator.windows().build(&self.tokens)?;

        let matrix = self
            .generator
            .scorer()
            .score(&window.input_ids, &window.position_ids)
            .map_err(|source| GenerationError::Scorer { step, source, partial: self.partial() })?;

        let shape_error =
            |source: ShapeError| GenerationError::Shape { step, source, partial: self.partial() };
        matrix.expect_rows(window.len()).map_err(shape_error)?;
        let row = matrix.row(window.last_real_index).ok_or_else(|| {
            shape_error(ShapeError::RowCount { expected: window.len(), actual: matrix.rows() })
        })?;

        let id = self.choose(row).map_err(|defect| GenerationError::MalformedScores {
            step,
            defect,
            partial: self.partial(),
        })?;

        self.tokens.push(id);
        self.generated += 1;

        let text = self.generator.tokenizer().decode_token(id).map_err(|source| {
            GenerationError::Tokenizer {
                stage: "decode a generated token",
                source,
                partial: Some(self.partial()),
            }
        })?;
        self.text.push_str(&text);
        debug!(step, token = id, last_real_index = window.last_real_index, "token accepted");

        if self.stop.as_ref().is_some_and(|stop| stop.matches(id, &text)) {
            self.finish_with(StopReason::StopToken(id));
        }

        Ok(TokenEvent { id, text })
    }

    fn choose(&mut self, row: &[f64]) -> Result<u32, ScoreDefect> {
        let expected = self.generator.vocab_size();
        if row.len() != expected {
            return Err(ScoreDefect::WrongLength { expected, actual: row.len() });
        }
        if let Some((index, &value)) = row.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ScoreDefect::NonFinite { index, value });
        }
        let index = self.sampler.select(row)?;
        u32::try_from(index).map_err(|_| ScoreDefect::IndexOutOfRange { index })
    }
}

impl<S: Scorer, T: Tokenizer, R: Rng> Iterator for GenerationLoop<'_, S, T, R> {
    type Item = Result<TokenEvent, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

impl<S: Scorer, T: Tokenizer, R: Rng> FusedIterator for GenerationLoop<'_, S, T, R> {}
