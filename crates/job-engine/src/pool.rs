use crate::audio::AudioError;
use bytes::Bytes;
use engine_client::{EngineError, EngineRequest, Transcriber};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use transcript_core::{AudioChunk, ChunkResult, Segment};
use uuid::Uuid;

/// Produces the audio bytes for one chunk (extraction + artifact
/// bookkeeping). Runs on the blocking pool.
pub type ChunkSource = Arc<dyn Fn(&AudioChunk) -> Result<Bytes, AudioError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PoolConfig {
	pub max_in_flight: usize,
	pub retry_budget: u32,
	pub base_delay: Duration,
	pub chunk_timeout: Duration,
	pub continue_on_error: bool,
}

#[derive(Debug, Clone)]
pub struct RequestTemplate {
	pub format: String,
	pub prompt: Option<String>,
	pub language: Option<String>,
}

/// Terminal per-chunk outcome, surfaced to the scheduler as it happens.
#[derive(Debug, Clone)]
pub enum ChunkOutcome {
	Success(ChunkResult),
	Failed {
		chunk_id: Uuid,
		sequence: usize,
		attempts: u32,
		error: EngineError,
	},
}

/// Result of driving one job's chunk list to quiescence.
#[derive(Debug)]
pub struct PoolRun {
	pub outcomes: Vec<ChunkOutcome>,
	/// Dispatch stopped early: terminal chunk failure without
	/// `continue_on_error`, cancellation, or the outcome sink refusing
	/// further results.
	pub aborted: bool,
}

/// Retry state lives ON the task, not in a recursion: the pool can always
/// see how many attempts a chunk has burned and when it becomes runnable
/// again.
#[derive(Debug)]
struct ChunkTask {
	chunk: AudioChunk,
	attempt: u32,
	ready_at: Instant,
}

/// Execute a job's chunks with at most `max_in_flight` running at once,
/// additionally gated by the process-wide `global_slots` semaphore.
///
/// Dispatch follows sequence order; completion order is whatever the
/// engine gives back. `on_outcome` fires synchronously for every terminal
/// chunk outcome BEFORE the next dispatch, so observers can never see the
/// pool run ahead of recorded progress; returning `false` from it stops
/// the run.
///
/// Cancellation is cooperative: the pool stops dispatching and returns
/// immediately, while in-flight engine calls are left to finish or time
/// out on their own. Their results land in a dropped channel and are
/// discarded, never merged.
pub async fn execute_chunks(
	job_id: Uuid,
	chunks: Vec<AudioChunk>,
	source: ChunkSource,
	template: RequestTemplate,
	engine: Arc<dyn Transcriber>,
	global_slots: Arc<Semaphore>,
	config: PoolConfig,
	cancel: CancellationToken,
	mut on_outcome: impl FnMut(&ChunkOutcome) -> bool,
) -> PoolRun {
	let now = Instant::now();
	let mut pending: VecDeque<ChunkTask> = chunks
		.into_iter()
		.map(|chunk| ChunkTask {
			chunk,
			attempt: 0,
			ready_at: now,
		})
		.collect();

	let capacity = pending.len().max(1);
	let (tx, mut rx) = mpsc::channel::<(ChunkTask, Result<ChunkResult, EngineError>)>(capacity);

	let mut in_flight = 0usize;
	let mut outcomes = Vec::new();

	loop {
		// Fill free slots with runnable tasks, earliest-ready first
		let now = Instant::now();
		while in_flight < config.max_in_flight {
			let Some(pos) = pending.iter().position(|t| t.ready_at <= now) else { break };
			let task = pending.remove(pos).expect("position came from this queue");

			spawn_chunk_attempt(task, Arc::clone(&source), template.clone(), Arc::clone(&engine), Arc::clone(&global_slots), config.chunk_timeout, tx.clone());
			in_flight += 1;
		}

		if in_flight == 0 && pending.is_empty() {
			break;
		}

		let next_ready = pending.iter().map(|t| t.ready_at).min();
		let retry_timer = async {
			match next_ready {
				Some(at) => tokio::time::sleep_until(at).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			() = cancel.cancelled() => {
				debug!(%job_id, in_flight, queued = pending.len(), "Chunk dispatch cancelled; in-flight calls left to drain");
				return PoolRun { outcomes, aborted: true };
			}

			() = retry_timer => {
				// a retry became runnable; loop back to dispatch
			}

			received = rx.recv() => {
				let Some((task, result)) = received else { break };
				in_flight -= 1;

				match result {
					Ok(chunk_result) => {
						let outcome = ChunkOutcome::Success(chunk_result);
						let keep_going = on_outcome(&outcome);
						outcomes.push(outcome);
						if !keep_going {
							return PoolRun { outcomes, aborted: true };
						}
					}
					Err(error) if error.is_retryable() && task.attempt < config.retry_budget => {
						let attempt = task.attempt + 1;
						let delay = config.base_delay * 2u32.saturating_pow(attempt - 1);
						debug!(
							%job_id,
							sequence = task.chunk.sequence,
							attempt,
							budget = config.retry_budget,
							delay_ms = delay.as_millis(),
							error = %error,
							"Re-enqueueing chunk after retryable failure"
						);
						pending.push_back(ChunkTask {
							chunk: task.chunk,
							attempt,
							ready_at: Instant::now() + delay,
						});
					}
					Err(error) => {
						warn!(%job_id, sequence = task.chunk.sequence, attempts = task.attempt + 1, %error, "Chunk failed for good");
						let outcome = ChunkOutcome::Failed {
							chunk_id: task.chunk.id,
							sequence: task.chunk.sequence,
							attempts: task.attempt + 1,
							error,
						};
						let keep_going = on_outcome(&outcome);
						outcomes.push(outcome);
						if !keep_going || !config.continue_on_error {
							return PoolRun { outcomes, aborted: true };
						}
					}
				}
			}
		}
	}

	PoolRun { outcomes, aborted: false }
}

fn spawn_chunk_attempt(
	task: ChunkTask,
	source: ChunkSource,
	template: RequestTemplate,
	engine: Arc<dyn Transcriber>,
	global_slots: Arc<Semaphore>,
	chunk_timeout: Duration,
	tx: mpsc::Sender<(ChunkTask, Result<ChunkResult, EngineError>)>,
) {
	tokio::spawn(async move {
		// Global ceiling; a closed semaphore means process shutdown
		let Ok(_permit) = global_slots.acquire_owned().await else { return };

		let started = Instant::now();
		let result = run_attempt(&task.chunk, &source, &template, engine.as_ref(), chunk_timeout).await;
		let result = result.map(|response| ChunkResult {
			chunk_id: task.chunk.id,
			sequence: task.chunk.sequence,
			text: response.text,
			segments: response.segments.into_iter().map(|s| Segment {
				start: s.start,
				end: s.end,
				text: s.text,
				confidence: s.confidence,
			}).collect(),
			processing: started.elapsed(),
		});

		// Receiver gone means the run was cancelled or aborted; the result
		// is discarded by design
		let _ = tx.send((task, result)).await;
	});
}

async fn run_attempt(
	chunk: &AudioChunk,
	source: &ChunkSource,
	template: &RequestTemplate,
	engine: &dyn Transcriber,
	chunk_timeout: Duration,
) -> Result<engine_client::EngineResponse, EngineError> {
	let audio = {
		let source = Arc::clone(source);
		let chunk = chunk.clone();
		tokio::task::spawn_blocking(move || source(&chunk))
			.await
			.map_err(|e| EngineError::Terminal(format!("chunk extraction task failed: {e}")))?
			.map_err(|e| EngineError::Terminal(format!("chunk extraction failed: {e}")))?
	};

	let request = EngineRequest {
		audio,
		format: template.format.clone(),
		prompt: template.prompt.clone(),
		language: template.language.clone(),
	};

	match tokio::time::timeout(chunk_timeout, engine.transcribe(request, chunk_timeout)).await {
		Ok(result) => result,
		Err(_) => Err(EngineError::Retryable(format!("chunk {} timed out after {}s", chunk.sequence, chunk_timeout.as_secs()))),
	}
}
