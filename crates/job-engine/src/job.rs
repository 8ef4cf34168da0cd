use crate::error::JobEngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_events::JobStatus;
use transcript_core::{AudioChunk, ChunkProfile, ChunkResult, Transcript};
use uuid::Uuid;

/// Caller-supplied knobs for one job (or every job in a batch).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
	pub profile: ChunkProfile,
	pub language: Option<String>,
	pub prompt: Option<String>,
	pub continue_on_error: bool,
}

/// REST-facing progress view of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
	pub job_id: Uuid,
	pub status: JobStatus,
	pub progress: u8,
	pub current_chunk: usize,
	pub total_chunks: usize,
	pub time_elapsed: f64,
	pub time_remaining: Option<f64>,
	pub error: Option<String>,
}

/// One file job. Mutated only through the state-machine methods below,
/// always from behind the registry's per-entry guard.
#[derive(Debug, Clone)]
pub struct JobRecord {
	pub id: Uuid,
	pub file_id: Uuid,
	pub batch_id: Option<Uuid>,
	pub chunks: Vec<AudioChunk>,
	pub options: JobOptions,
	pub status: JobStatus,
	pub chunks_completed: usize,
	pub chunks_succeeded: usize,
	pub chunks_failed: usize,
	pub results: Vec<ChunkResult>,
	pub transcript: Option<Transcript>,
	pub error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
	#[must_use]
	pub fn new(file_id: Uuid, batch_id: Option<Uuid>, chunks: Vec<AudioChunk>, options: JobOptions) -> Self {
		Self {
			id: Uuid::new_v4(),
			file_id,
			batch_id,
			chunks,
			options,
			status: JobStatus::Queued,
			chunks_completed: 0,
			chunks_succeeded: 0,
			chunks_failed: 0,
			results: Vec::new(),
			transcript: None,
			error: None,
			created_at: Utc::now(),
			started_at: None,
			finished_at: None,
		}
	}

	/// Enforce the lifecycle: `Queued -> Processing -> terminal`, plus
	/// cancellation from any non-terminal state. Anything else is a bug in
	/// the caller and is rejected loudly.
	pub fn transition(&mut self, to: JobStatus) -> Result<(), JobEngineError> {
		let legal = match (self.status, to) {
			(JobStatus::Queued, JobStatus::Processing) | (JobStatus::Queued | JobStatus::Processing, JobStatus::Cancelled) | (JobStatus::Processing, JobStatus::Completed | JobStatus::Failed) => true,
			_ => false,
		};
		if !legal {
			return Err(JobEngineError::InvalidTransition { from: self.status, to });
		}

		match to {
			JobStatus::Processing => self.started_at = Some(Utc::now()),
			JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => self.finished_at = Some(Utc::now()),
			JobStatus::Queued => {}
		}
		self.status = to;
		Ok(())
	}

	/// Record one chunk reaching a terminal per-chunk outcome. Returns
	/// false (and changes nothing) once the job itself is terminal, so
	/// late in-flight results from a cancelled job are discarded.
	pub fn record_chunk_outcome(&mut self, result: Option<ChunkResult>) -> bool {
		if self.status.is_terminal() {
			return false;
		}
		self.chunks_completed += 1;
		match result {
			Some(r) => {
				self.chunks_succeeded += 1;
				self.results.push(r);
			}
			None => self.chunks_failed += 1,
		}
		true
	}

	/// Percentage complete. Pinned to 100 only when the work can no longer
	/// move: a running job tops out at 99 even with every chunk done,
	/// because the merge hasn't happened yet.
	#[must_use]
	pub fn progress(&self) -> u8 {
		if self.status == JobStatus::Completed {
			return 100;
		}
		let total = self.chunks.len().max(1);
		#[allow(clippy::cast_possible_truncation)]
		let pct = (self.chunks_completed * 100 / total) as u8;
		if self.status.is_terminal() {
			pct.min(100)
		} else {
			pct.min(99)
		}
	}

	#[must_use]
	pub fn snapshot(&self) -> JobProgress {
		let time_elapsed = self.started_at.map_or(0.0, |started| {
			let end = self.finished_at.unwrap_or_else(Utc::now);
			(end - started).num_milliseconds().max(0) as f64 / 1000.0
		});

		let remaining_chunks = self.chunks.len().saturating_sub(self.chunks_completed);
		let time_remaining = if self.status.is_terminal() || self.chunks_completed == 0 {
			None
		} else {
			#[allow(clippy::cast_precision_loss)]
			Some(time_elapsed / self.chunks_completed as f64 * remaining_chunks as f64)
		};

		JobProgress {
			job_id: self.id,
			status: self.status,
			progress: self.progress(),
			current_chunk: self.chunks_completed,
			total_chunks: self.chunks.len(),
			time_elapsed,
			time_remaining,
			error: self.error.clone(),
		}
	}

	/// All chunks have reached a terminal per-chunk outcome.
	#[must_use]
	pub fn all_chunks_settled(&self) -> bool {
		self.chunks_completed >= self.chunks.len()
	}
}
