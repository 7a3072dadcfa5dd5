//! Mock scorers and tokenizer for testing.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow, bail};
use textgen_generation::ScoreMatrix;

use crate::traits::{Scorer, Tokenizer};

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Byte-level tokenizer: each UTF-8 byte is its own id (0–255). Extra ids
/// from 256 upwards can be registered as special tokens.
#[derive(Debug, Clone, Default)]
pub struct ByteTokenizer {
    specials: Vec<(u32, String)>,
}

impl ByteTokenizer {
    /// Id of `<|endoftext|>` after [`with_end_of_text`](Self::with_end_of_text).
    pub const END_OF_TEXT_ID: u32 = 256;

    pub fn new() -> Self {
        Self::default()
    }

    /// Register `<|endoftext|>` as id 256.
    #[must_use]
    pub fn with_end_of_text(self) -> Self {
        self.with_special(Self::END_OF_TEXT_ID, "<|endoftext|>")
    }

    #[must_use]
    pub fn with_special(mut self, id: u32, text: &str) -> Self {
        self.specials.push((id, text.to_string()));
        self
    }

    fn piece(&self, id: u32) -> Result<Vec<u8>> {
        if let Ok(byte) = u8::try_from(id) {
            return Ok(vec![byte]);
        }
        self.specials
            .iter()
            .find(|(special, _)| *special == id)
            .map(|(_, text)| text.as_bytes().to_vec())
            .ok_or_else(|| anyhow!("unknown token id {id}"))
    }
}

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.bytes().map(u32::from).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let mut bytes = Vec::with_capacity(ids.len());
        for &id in ids {
            bytes.extend(self.piece(id)?);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Call log shared by the scorers
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CallLog {
    calls: AtomicUsize,
    inputs: Mutex<Vec<Vec<u32>>>,
}

impl CallLog {
    fn record(&self, input_ids: &[u32]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner).push(input_ids.to_vec());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn inputs(&self) -> Vec<Vec<u32>> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

fn repeat_row(row: &[f64], rows: usize) -> Result<ScoreMatrix> {
    let data = row.iter().copied().cycle().take(row.len() * rows).collect();
    Ok(ScoreMatrix::new(data, rows, row.len())?)
}

// ---------------------------------------------------------------------------
// Scorers
// ---------------------------------------------------------------------------

/// Returns the same score row at every window position.
#[derive(Debug)]
pub struct FixedScorer {
    row: Vec<f64>,
    log: CallLog,
}

impl FixedScorer {
    pub fn new(row: Vec<f64>) -> Self {
        Self { row, log: CallLog::default() }
    }

    /// Number of `score` calls so far.
    pub fn calls(&self) -> usize {
        self.log.calls()
    }

    /// Every `input_ids` window received, in order.
    pub fn inputs(&self) -> Vec<Vec<u32>> {
        self.log.inputs()
    }
}

impl Scorer for FixedScorer {
    fn vocab_size(&self) -> usize {
        self.row.len()
    }

    fn score(&self, input_ids: &[u32], _position_ids: &[u32]) -> Result<ScoreMatrix> {
        self.log.record(input_ids);
        repeat_row(&self.row, input_ids.len())
    }
}

/// Row `i` peaks at `(input_ids[i] + 1) % V`, so greedy decoding counts
/// upwards from whatever token the scorer reads.
#[derive(Debug)]
pub struct SuccessorScorer {
    vocab: usize,
    log: CallLog,
}

impl SuccessorScorer {
    pub fn new(vocab: usize) -> Self {
        Self { vocab, log: CallLog::default() }
    }

    pub fn calls(&self) -> usize {
        self.log.calls()
    }

    pub fn inputs(&self) -> Vec<Vec<u32>> {
        self.log.inputs()
    }
}

impl Scorer for SuccessorScorer {
    fn vocab_size(&self) -> usize {
        self.vocab
    }

    fn score(&self, input_ids: &[u32], _position_ids: &[u32]) -> Result<ScoreMatrix> {
        self.log.record(input_ids);
        let mut data = vec![0.0; input_ids.len() * self.vocab];
        for (row, &id) in input_ids.iter().enumerate() {
            let next = (id as usize + 1) % self.vocab;
            data[row * self.vocab + next] = 10.0;
        }
        Ok(ScoreMatrix::new(data, input_ids.len(), self.vocab)?)
    }
}

/// One scripted response of a [`ScriptedScorer`].
#[derive(Debug, Clone)]
pub enum Step {
    /// This row at every window position.
    Row(Vec<f64>),
    /// Return this matrix as-is, whatever the window length.
    Matrix(ScoreMatrix),
    /// Fail with this message.
    Fail(String),
}

/// Plays back a fixed list of responses, then fails with "script exhausted".
#[derive(Debug)]
pub struct ScriptedScorer {
    vocab: usize,
    steps: Mutex<VecDeque<Step>>,
    log: CallLog,
}

impl ScriptedScorer {
    pub fn new(vocab: usize, steps: impl IntoIterator<Item = Step>) -> Self {
        Self { vocab, steps: Mutex::new(steps.into_iter().collect()), log: CallLog::default() }
    }

    /// Succeed with `row` for `ok_steps` calls, then fail.
    pub fn failing_after(row: &[f64], ok_steps: usize) -> Self {
        let steps = std::iter::repeat_n(Step::Row(row.to_vec()), ok_steps)
            .chain(std::iter::once(Step::Fail("scorer unavailable".into())));
        Self::new(row.len(), steps)
    }

    pub fn calls(&self) -> usize {
        self.log.calls()
    }

    pub fn inputs(&self) -> Vec<Vec<u32>> {
        self.log.inputs()
    }
}

impl Scorer for ScriptedScorer {
    fn vocab_size(&self) -> usize {
        self.vocab
    }

    fn score(&self, input_ids: &[u32], _position_ids: &[u32]) -> Result<ScoreMatrix> {
        self.log.record(input_ids);
        let step = self.steps.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match step {
            Some(Step::Row(row)) => repeat_row(&row, input_ids.len()),
            Some(Step::Matrix(matrix)) => Ok(matrix),
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            None => bail!("script exhausted"),
        }
    }
}
