//! Generation on a dedicated worker thread, relayed over a bounded channel.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use textgen_generation::{StreamEvent, TokenEvent};
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::generation_loop::GenerationOutput;
use crate::generator::Generator;
use crate::traits::{Scorer, Tokenizer};

/// Events buffered between the worker and the consumer before the worker
/// blocks.
pub const DEFAULT_STREAM_BUFFER: usize = 32;

type WorkerResult = Result<GenerationOutput, GenerationError>;

/// Consumer side of a spawned generation.
///
/// Iterating yields `Token` events followed by one `Done` when the run
/// succeeds. On failure the events simply end; [`join`](Self::join) returns
/// the error with its partial output.
pub struct StreamHandle {
    events: Receiver<StreamEvent>,
    worker: JoinHandle<WorkerResult>,
}

impl StreamHandle {
    /// Wait for the next event.
    pub fn recv(&self) -> Option<StreamEvent> {
        self.events.recv().ok()
    }

    /// Drain remaining events and wait for the worker.
    ///
    /// # Errors
    /// The run's own error, or [`GenerationError::WorkerPanicked`].
    pub fn join(self) -> WorkerResult {
        let Self { events, worker } = self;
        for _ in events.iter() {}
        worker.join().map_err(|_| GenerationError::WorkerPanicked)?
    }

    /// Stop consuming. The worker notices on its next send, ends the run
    /// with `StopReason::Callback` and its output is returned.
    ///
    /// # Errors
    /// See [`join`](Self::join).
    pub fn cancel(self) -> WorkerResult {
        let Self { events, worker } = self;
        drop(events);
        worker.join().map_err(|_| GenerationError::WorkerPanicked)?
    }
}

impl Iterator for StreamHandle {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        self.recv()
    }
}

/// Run [`Generator::stream`]'s policy (configured strategy, seed and stop
/// token) on a worker thread.
///
/// # Errors
/// [`GenerationError::WorkerSpawn`] if the thread cannot be started. Run
/// errors, including configuration errors, are reported by
/// [`StreamHandle::join`].
pub fn spawn_stream<S, T>(
    generator: Arc<Generator<S, T>>,
    prompt: impl Into<String>,
    max_tokens: usize,
) -> Result<StreamHandle, GenerationError>
where
    S: Scorer + Send + Sync + 'static,
    T: Tokenizer + Send + Sync + 'static,
{
    spawn_stream_with_buffer(generator, prompt, max_tokens, DEFAULT_STREAM_BUFFER)
}

/// [`spawn_stream`] with an explicit channel capacity.
///
/// # Errors
/// See [`spawn_stream`].
pub fn spawn_stream_with_buffer<S, T>(
    generator: Arc<Generator<S, T>>,
    prompt: impl Into<String>,
    max_tokens: usize,
    buffer: usize,
) -> Result<StreamHandle, GenerationError>
where
    S: Scorer + Send + Sync + 'static,
    T: Tokenizer + Send + Sync + 'static,
{
    let prompt = prompt.into();
    let (tx, events) = mpsc::sync_channel(buffer);
    let worker = thread::Builder::new()
        .name("textgen-stream".into())
        .spawn(move || run_worker(&generator, &prompt, max_tokens, &tx))
        .map_err(GenerationError::WorkerSpawn)?;
    Ok(StreamHandle { events, worker })
}

fn run_worker<S: Scorer, T: Tokenizer>(
    generator: &Generator<S, T>,
    prompt: &str,
    max_tokens: usize,
    tx: &SyncSender<StreamEvent>,
) -> WorkerResult {
    debug!(max_tokens, "stream worker started");
    let config = generator.config();
    let generation = generator.start(prompt, max_tokens, config.sampler(), Some(config.stop_token.clone()))?;

    let output = generation.run(|event: &TokenEvent| {
        let delivered = tx.send(StreamEvent::Token(event.clone())).is_ok();
        if !delivered {
            warn!("stream receiver dropped; stopping generation");
        }
        delivered
    })?;

    if let Some(reason) = output.stop_reason {
        if tx.send(StreamEvent::Done { reason, stats: output.stats.clone() }).is_err() {
            debug!(%reason, "stream receiver dropped before the final event");
        }
    }
    Ok(output)
}
