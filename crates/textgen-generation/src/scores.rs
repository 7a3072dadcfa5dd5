//! Scorer output: a row-major `W × V` matrix of next-token scores.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("score matrix must have a non-empty vocabulary")]
    EmptyVocab,

    #[error("score buffer holds {actual} values, expected {rows} x {vocab} = {expected}")]
    BufferLength { rows: usize, vocab: usize, expected: usize, actual: usize },

    #[error("score row {row} has {actual} entries, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },

    #[error("score matrix has {actual} rows, expected {expected}")]
    RowCount { expected: usize, actual: usize },
}

/// Scores for every window position. Only one row is read per step.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    data: Vec<f64>,
    rows: usize,
    vocab: usize,
}

impl ScoreMatrix {
    /// Wrap a flat row-major buffer.
    ///
    /// # Errors
    /// [`ShapeError::EmptyVocab`] when `vocab == 0`, [`ShapeError::BufferLength`]
    /// when `data.len() != rows * vocab`.
    pub fn new(data: Vec<f64>, rows: usize, vocab: usize) -> Result<Self, ShapeError> {
        if vocab == 0 {
            return Err(ShapeError::EmptyVocab);
        }
        let expected = rows.saturating_mul(vocab);
        if data.len() != expected {
            return Err(ShapeError::BufferLength { rows, vocab, expected, actual: data.len() });
        }
        Ok(Self { data, rows, vocab })
    }

    /// Build from per-position rows, which must all share one length.
    ///
    /// # Errors
    /// [`ShapeError::RaggedRow`] on the first row whose length differs from
    /// row 0, [`ShapeError::EmptyVocab`] when rows are empty vectors.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ShapeError> {
        let vocab = rows.first().map_or(0, Vec::len);
        if vocab == 0 {
            return Err(ShapeError::EmptyVocab);
        }
        let count = rows.len();
        let mut data = Vec::with_capacity(count * vocab);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != vocab {
                return Err(ShapeError::RaggedRow { row, expected: vocab, actual: values.len() });
            }
            data.extend(values);
        }
        Ok(Self { data, rows: count, vocab })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab
    }

    /// Scores at window position `index`, or `None` past the last row.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.vocab;
        self.data.get(start..start + self.vocab)
    }

    /// Check the matrix covers exactly `window_len` positions.
    ///
    /// # Errors
    /// [`ShapeError::RowCount`] otherwise.
    pub fn expect_rows(&self, window_len: usize) -> Result<(), ShapeError> {
        if self.rows == window_len {
            Ok(())
        } else {
            Err(ShapeError::RowCount { expected: window_len, actual: self.rows })
        }
    }

    /// Consume the matrix and return the flat buffer.
    pub fn into_inner(self) -> Vec<f64> {
        self.data
    }
}
