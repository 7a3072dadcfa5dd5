//! Entry points: callback policy, stop-token policy and lazy streaming.

use rand::Rng;
use textgen_generation::{ContextWindowManager, GenerationConfig, StopToken};
use textgen_sampling::{DecodingStrategy, Sampler};
use tracing::{debug, instrument};

use crate::error::GenerationError;
use crate::generation_loop::{GenerationLoop, GenerationOutput, TokenStream};
use crate::traits::{Scorer, Tokenizer};

/// Owns a scorer, a tokenizer and a validated [`GenerationConfig`].
///
/// Every entry point starts an independent [`GenerationLoop`]; nothing is
/// shared between runs except the borrowed collaborators. Wrap the generator
/// in an `Arc` to share it across threads when `S` and `T` are
/// `Send + Sync`.
///
/// # Examples
///
/// ```
/// use textgen_engine::mock::{ByteTokenizer, FixedScorer};
/// use textgen_engine::{DecodingStrategy, GenerationConfig, GenerationState, Generator};
///
/// // Byte vocabulary whose scores always peak at b'a'.
/// let mut row = vec![0.0; 256];
/// row[usize::from(b'a')] = 10.0;
/// let config = GenerationConfig { window_len: 8, ..Default::default() };
/// let generator = Generator::new(FixedScorer::new(row), ByteTokenizer::new(), config).unwrap();
///
/// let out = generator.generate("x", 3, DecodingStrategy::Greedy, |_| true).unwrap();
/// assert_eq!(out.text, "xaaa");
/// assert_eq!(out.state, GenerationState::StoppedByMaxTokens);
/// ```
pub struct Generator<S, T> {
    scorer: S,
    tokenizer: T,
    config: GenerationConfig,
    windows: ContextWindowManager,
    vocab: usize,
}

impl<S, T> Generator<S, T> {
    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn windows(&self) -> &ContextWindowManager {
        &self.windows
    }

    /// Vocabulary size reported by the scorer at construction.
    pub fn vocab_size(&self) -> usize {
        self.vocab
    }
}

impl<S: Scorer, T: Tokenizer> Generator<S, T> {
    /// Validate `config` against the scorer.
    ///
    /// # Errors
    ///
    /// A configuration error: invalid config values, a zero-length window, or
    /// a scorer vocabulary that is empty or does not fit `u32` ids.
    pub fn new(scorer: S, tokenizer: T, config: GenerationConfig) -> Result<Self, GenerationError> {
        config.validate()?;
        let windows = config.window_manager()?;
        let vocab = scorer.vocab_size();
        if vocab == 0 || u32::try_from(vocab - 1).is_err() {
            return Err(GenerationError::Vocabulary(vocab));
        }
        Ok(Self { scorer, tokenizer, config, windows, vocab })
    }

    /// [`Generator::new`] with [`GenerationConfig::default`].
    ///
    /// # Errors
    /// See [`Generator::new`].
    pub fn with_defaults(scorer: S, tokenizer: T) -> Result<Self, GenerationError> {
        Self::new(scorer, tokenizer, GenerationConfig::default())
    }

    /// Encode `prompt`, rejecting an empty encoding.
    ///
    /// # Errors
    /// [`GenerationError::Tokenizer`] or [`GenerationError::EmptyPrompt`].
    pub fn encode_prompt(&self, prompt: &str) -> Result<Vec<u32>, GenerationError> {
        let ids = self.tokenizer.encode(prompt).map_err(|source| GenerationError::Tokenizer {
            stage: "encode the prompt",
            source,
            partial: None,
        })?;
        if ids.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        debug!(prompt_tokens = ids.len(), "prompt encoded");
        Ok(ids)
    }

    /// Set up a run without producing any token.
    ///
    /// # Errors
    /// See [`encode_prompt`](Self::encode_prompt).
    pub fn start<R: Rng>(
        &self,
        prompt: &str,
        max_tokens: usize,
        sampler: Sampler<R>,
        stop: Option<StopToken>,
    ) -> Result<GenerationLoop<'_, S, T, R>, GenerationError> {
        let ids = self.encode_prompt(prompt)?;
        Ok(GenerationLoop::new(self, ids, sampler, stop, max_tokens))
    }

    // ── Callback policy ─────────────────────────────────────────

    /// Generate up to `max_tokens` tokens, passing each decoded fragment to
    /// `on_token`. Returning `false` stops the run after that token, which is
    /// still part of the output.
    ///
    /// The RNG is seeded from the configured seed, or from entropy.
    ///
    /// # Errors
    /// Configuration errors before the first scorer call; scorer, tokenizer
    /// or shape errors mid-run, carrying the partial output.
    #[instrument(skip_all, fields(max_tokens = max_tokens, strategy = %strategy))]
    pub fn generate<F>(
        &self,
        prompt: &str,
        max_tokens: usize,
        strategy: DecodingStrategy,
        mut on_token: F,
    ) -> Result<GenerationOutput, GenerationError>
    where
        F: FnMut(&str) -> bool,
    {
        let sampler = Sampler::with_seed(strategy, self.config.seed);
        self.start(prompt, max_tokens, sampler, None)?.run(|event| on_token(&event.text))
    }

    /// [`generate`](Self::generate) with a caller-supplied RNG.
    ///
    /// # Errors
    /// See [`generate`](Self::generate).
    #[instrument(skip_all, fields(max_tokens = max_tokens, strategy = %strategy))]
    pub fn generate_with_rng<R, F>(
        &self,
        prompt: &str,
        max_tokens: usize,
        strategy: DecodingStrategy,
        rng: R,
        mut on_token: F,
    ) -> Result<GenerationOutput, GenerationError>
    where
        R: Rng,
        F: FnMut(&str) -> bool,
    {
        let sampler = Sampler::new(strategy, rng);
        self.start(prompt, max_tokens, sampler, None)?.run(|event| on_token(&event.text))
    }

    // ── Stop-token policy ───────────────────────────────────────

    /// Generate until the selected token matches `stop` (the stop token is
    /// kept in the output) or `max_tokens` tokens were produced.
    ///
    /// # Errors
    /// See [`generate`](Self::generate).
    #[instrument(skip_all, fields(max_tokens = max_tokens, strategy = %strategy))]
    pub fn generate_until(
        &self,
        prompt: &str,
        stop: impl Into<StopToken>,
        strategy: DecodingStrategy,
        max_tokens: usize,
    ) -> Result<GenerationOutput, GenerationError> {
        let sampler = Sampler::with_seed(strategy, self.config.seed);
        self.start(prompt, max_tokens, sampler, Some(stop.into()))?.run(|_| true)
    }

    /// [`generate_until`](Self::generate_until) with a caller-supplied RNG.
    ///
    /// # Errors
    /// See [`generate`](Self::generate).
    #[instrument(skip_all, fields(max_tokens = max_tokens, strategy = %strategy))]
    pub fn generate_until_with_rng<R: Rng>(
        &self,
        prompt: &str,
        stop: impl Into<StopToken>,
        strategy: DecodingStrategy,
        max_tokens: usize,
        rng: R,
    ) -> Result<GenerationOutput, GenerationError> {
        let sampler = Sampler::new(strategy, rng);
        self.start(prompt, max_tokens, sampler, Some(stop.into()))?.run(|_| true)
    }

    /// Stop-token policy driven entirely by the configuration.
    ///
    /// # Errors
    /// See [`generate`](Self::generate).
    pub fn run(&self, prompt: &str) -> Result<GenerationOutput, GenerationError> {
        self.generate_until(
            prompt,
            self.config.stop_token.clone(),
            self.config.strategy,
            self.config.max_tokens,
        )
    }

    // ── Streaming ───────────────────────────────────────────────

    /// Lazily yield tokens using the configured strategy, seed and stop
    /// token. Each `next` call performs at most one scorer call; dropping the
    /// stream cancels the run.
    ///
    /// # Errors
    /// Configuration errors are reported here, before the first scorer call.
    pub fn stream(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> Result<TokenStream<'_, S, T>, GenerationError> {
        self.start(prompt, max_tokens, self.config.sampler(), Some(self.config.stop_token.clone()))
    }
}
