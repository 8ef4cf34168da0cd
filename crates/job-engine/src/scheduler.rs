use crate::batch::{BatchRecord, BatchSnapshot};
use crate::cleanup::CleanupService;
use crate::config::SchedulerConfig;
use crate::error::JobEngineError;
use crate::events::EventBus;
use crate::files::FileStore;
use crate::job::{JobOptions, JobProgress, JobRecord};
use crate::pool::{self, ChunkOutcome, ChunkSource, PoolConfig, RequestTemplate};
use crate::registry::JobRegistry;
use bytes::Bytes;
use dashmap::DashMap;
use engine_client::{Transcriber, MAX_PROMPT_CHARS};
use std::sync::Arc;
use stream_events::{JobStatus, ServerEvent};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use transcript_core::{merge_results, plan_chunks, AudioChunk, Transcript};
use uuid::Uuid;

/// Owner of the job lifecycle: admission, planning, dispatch, merge,
/// cancellation, and the progress feed. One instance per process.
pub struct JobScheduler {
	config: SchedulerConfig,
	registry: Arc<JobRegistry>,
	files: Arc<FileStore>,
	engine: Arc<dyn Transcriber>,
	events: EventBus,
	cleanup: Arc<CleanupService>,
	global_slots: Arc<Semaphore>,
	cancel_tokens: DashMap<Uuid, CancellationToken>,
	shutdown: CancellationToken,
}

impl JobScheduler {
	#[must_use]
	pub fn new(
		config: SchedulerConfig,
		registry: Arc<JobRegistry>,
		files: Arc<FileStore>,
		engine: Arc<dyn Transcriber>,
		events: EventBus,
		cleanup: Arc<CleanupService>,
		shutdown: CancellationToken,
	) -> Self {
		let global_slots = Arc::new(Semaphore::new(config.global_max_chunks));
		Self {
			config,
			registry,
			files,
			engine,
			events,
			cleanup,
			global_slots,
			cancel_tokens: DashMap::new(),
			shutdown,
		}
	}

	#[must_use]
	pub fn events(&self) -> &EventBus {
		&self.events
	}

	#[must_use]
	pub fn registry(&self) -> &Arc<JobRegistry> {
		&self.registry
	}

	#[must_use]
	pub fn files(&self) -> &Arc<FileStore> {
		&self.files
	}

	#[must_use]
	pub fn cleanup(&self) -> &Arc<CleanupService> {
		&self.cleanup
	}

	/// Admit one file job. Rejection here is synchronous and typed; an
	/// admitted job is owned by the state machine from this point on.
	pub fn submit_file(self: &Arc<Self>, file_id: Uuid, options: JobOptions) -> Result<Uuid, JobEngineError> {
		self.check_admission()?;
		Self::validate_options(&options)?;

		let job_id = self.create_job(file_id, None, options)?;
		self.spawn_job(job_id);
		Ok(job_id)
	}

	/// Admit a batch: all files validated up front, one job per file, all
	/// jobs sharing the global chunk ceiling.
	pub fn submit_batch(self: &Arc<Self>, file_ids: &[Uuid], options: JobOptions) -> Result<Uuid, JobEngineError> {
		self.check_admission()?;
		Self::validate_options(&options)?;

		if file_ids.is_empty() || file_ids.len() > self.config.max_batch_files {
			return Err(JobEngineError::Validation(format!("batch must contain 1..={} files, got {}", self.config.max_batch_files, file_ids.len())));
		}
		for &file_id in file_ids {
			if !self.files.contains(file_id) {
				return Err(JobEngineError::FileNotFound(file_id));
			}
		}

		let batch = BatchRecord::new(Vec::new(), options.continue_on_error);
		let batch_id = batch.id;

		let mut job_ids = Vec::with_capacity(file_ids.len());
		for &file_id in file_ids {
			job_ids.push(self.create_job(file_id, Some(batch_id), options.clone())?);
		}

		self.registry.insert_batch(BatchRecord { job_ids: job_ids.clone(), ..batch });
		info!(%batch_id, jobs = job_ids.len(), "Batch admitted");
		self.publish_batch_event(batch_id);

		for job_id in job_ids {
			self.spawn_job(job_id);
		}
		Ok(batch_id)
	}

	/// Cancel a job: state flips immediately, no further chunks are
	/// dispatched, and the acknowledgment never waits on in-flight engine
	/// calls.
	pub fn cancel(&self, job_id: Uuid) -> Result<JobProgress, JobEngineError> {
		self.registry.with_job_mut(job_id, |job| job.transition(JobStatus::Cancelled))??;

		if let Some((_, token)) = self.cancel_tokens.remove(&job_id) {
			token.cancel();
		}

		info!(%job_id, "Job cancelled");
		self.publish_job_event(job_id);
		if let Some(batch_id) = self.registry.batch_id_of(job_id) {
			self.publish_batch_event(batch_id);
		}
		self.cleanup.sweep_owner(job_id);
		self.registry.job_snapshot(job_id)
	}

	pub fn progress(&self, job_id: Uuid) -> Result<JobProgress, JobEngineError> {
		self.registry.job_snapshot(job_id)
	}

	pub fn batch_progress(&self, batch_id: Uuid) -> Result<BatchSnapshot, JobEngineError> {
		self.registry.batch_snapshot(batch_id)
	}

	pub fn transcript(&self, job_id: Uuid) -> Result<Transcript, JobEngineError> {
		self.registry.transcript(job_id)
	}

	fn check_admission(&self) -> Result<(), JobEngineError> {
		let free_bytes = self.cleanup.refresh_pressure();
		if self.cleanup.disk_pressure() {
			return Err(JobEngineError::DiskPressure {
				free_bytes,
				required: self.cleanup.min_free_bytes(),
			});
		}
		Ok(())
	}

	fn validate_options(options: &JobOptions) -> Result<(), JobEngineError> {
		if let Some(prompt) = &options.prompt {
			let chars = prompt.chars().count();
			if chars > MAX_PROMPT_CHARS {
				return Err(JobEngineError::Validation(format!("system prompt is {chars} chars, limit is {MAX_PROMPT_CHARS}")));
			}
		}
		Ok(())
	}

	fn create_job(&self, file_id: Uuid, batch_id: Option<Uuid>, options: JobOptions) -> Result<Uuid, JobEngineError> {
		let file = self.files.get(file_id).ok_or(JobEngineError::FileNotFound(file_id))?;
		let chunks = plan_chunks(file_id, file.duration_secs, options.profile, self.config.overlap_secs)?;

		let job = JobRecord::new(file_id, batch_id, chunks, options);
		let job_id = self.registry.insert_job(job);
		info!(%job_id, %file_id, duration_secs = file.duration_secs, "Job admitted");
		self.publish_job_event(job_id);
		Ok(job_id)
	}

	fn spawn_job(self: &Arc<Self>, job_id: Uuid) {
		let token = self.shutdown.child_token();
		self.cancel_tokens.insert(job_id, token.clone());

		let scheduler = Arc::clone(self);
		tokio::spawn(async move {
			scheduler.run_job(job_id, token).await;
		});
	}

	async fn run_job(self: Arc<Self>, job_id: Uuid, cancel: CancellationToken) {
		if let Err(e) = self.registry.with_job_mut(job_id, |job| job.transition(JobStatus::Processing)).and_then(|r| r) {
			// cancelled before the first dispatch; nothing to unwind
			warn!(%job_id, error = %e, "Job never started processing");
			return;
		}
		self.publish_job_event(job_id);
		let batch_id = self.registry.batch_id_of(job_id);
		if let Some(batch_id) = batch_id {
			self.publish_batch_event(batch_id);
		}

		let (file, chunks, options) = match self.job_inputs(job_id) {
			Ok(inputs) => inputs,
			Err(e) => {
				self.fail_job(job_id, batch_id, e.to_string());
				return;
			}
		};

		let source = match self.chunk_source(job_id, &file.path) {
			Ok(source) => source,
			Err(e) => {
				self.fail_job(job_id, batch_id, e.to_string());
				return;
			}
		};

		let template = RequestTemplate {
			format: "wav".to_string(),
			prompt: options.prompt.clone(),
			language: options.language.clone(),
		};
		let pool_config = PoolConfig {
			max_in_flight: self.config.max_concurrent_chunks,
			retry_budget: self.config.chunk_retry_budget,
			base_delay: self.config.retry_base_delay(),
			chunk_timeout: self.config.chunk_timeout(),
			continue_on_error: options.continue_on_error,
		};

		let mut first_failure: Option<String> = None;
		let run = pool::execute_chunks(
			job_id,
			chunks.clone(),
			source,
			template,
			Arc::clone(&self.engine),
			Arc::clone(&self.global_slots),
			pool_config,
			cancel.clone(),
			|outcome| {
				if let ChunkOutcome::Failed { sequence, error, .. } = outcome {
					if first_failure.is_none() {
						first_failure = Some(format!("chunk {sequence}: {error}"));
					}
				}
				let applied = self
					.registry
					.with_job_mut(job_id, |job| match outcome {
						ChunkOutcome::Success(result) => job.record_chunk_outcome(Some(result.clone())),
						ChunkOutcome::Failed { .. } => job.record_chunk_outcome(None),
					})
					.unwrap_or(false);
				if applied {
					self.publish_job_event(job_id);
					if let Some(batch_id) = batch_id {
						self.publish_batch_event(batch_id);
					}
				}
				applied
			},
		)
		.await;

		self.cancel_tokens.remove(&job_id);

		// Cancellation won the race: the cancel path already published the
		// terminal event and reclaimed artifacts
		if self.registry.job_status(job_id).map(JobStatus::is_terminal).unwrap_or(true) {
			return;
		}

		if run.aborted {
			self.fail_job(job_id, batch_id, first_failure.unwrap_or_else(|| "chunk processing aborted".to_string()));
			return;
		}

		self.finish_job(job_id, batch_id, file.id, file.duration_secs, &chunks, &options, first_failure);
	}

	/// All chunks settled; merge what succeeded or fail the job.
	#[allow(clippy::too_many_arguments)]
	fn finish_job(&self, job_id: Uuid, batch_id: Option<Uuid>, file_id: Uuid, duration_secs: f64, chunks: &[AudioChunk], options: &JobOptions, failure: Option<String>) {
		let Ok(results) = self.registry.with_job_mut(job_id, |job| job.results.clone()) else {
			return;
		};

		if results.is_empty() {
			self.fail_job(job_id, batch_id, failure.unwrap_or_else(|| "all chunks failed".to_string()));
			return;
		}

		// Only windows that produced a result participate in the merge
		let surviving: Vec<AudioChunk> = chunks.iter().filter(|c| results.iter().any(|r| r.chunk_id == c.id)).cloned().collect();

		match merge_results(file_id, duration_secs, &surviving, &results, options.language.clone()) {
			Ok(transcript) => {
				let outcome = self.registry.with_job_mut(job_id, |job| {
					if job.chunks_failed > 0 {
						job.error = Some(format!("{} of {} chunks failed", job.chunks_failed, job.chunks.len()));
					}
					job.transcript = Some(transcript);
					job.transition(JobStatus::Completed)
				});
				match outcome.and_then(|r| r) {
					Ok(()) => {
						info!(%job_id, "Job completed");
						self.publish_job_event(job_id);
						if let Some(batch_id) = batch_id {
							self.publish_batch_event(batch_id);
						}
						self.cleanup.sweep_owner(job_id);
					}
					Err(e) => warn!(%job_id, error = %e, "Completed job transition rejected"),
				}
			}
			Err(e) => {
				error!(%job_id, error = %e, "Transcript merge failed");
				self.fail_job(job_id, batch_id, format!("merge failed: {e}"));
			}
		}
	}

	fn fail_job(&self, job_id: Uuid, batch_id: Option<Uuid>, reason: String) {
		let transitioned = self.registry.with_job_mut(job_id, |job| {
			job.error = Some(reason.clone());
			job.transition(JobStatus::Failed)
		});
		match transitioned.and_then(|r| r) {
			Ok(()) => {
				warn!(%job_id, reason = %reason, "Job failed");
				self.publish_job_event(job_id);
				if let Some(batch_id) = batch_id {
					self.publish_batch_event(batch_id);
				}
				self.cleanup.sweep_owner(job_id);
			}
			Err(e) => warn!(%job_id, error = %e, "Failure transition rejected"),
		}
	}

	fn job_inputs(&self, job_id: Uuid) -> Result<(transcript_core::FileInfo, Vec<AudioChunk>, JobOptions), JobEngineError> {
		let (file_id, chunks, options) = self.registry.with_job_mut(job_id, |job| (job.file_id, job.chunks.clone(), job.options.clone()))?;
		let file = self.files.get(file_id).ok_or(JobEngineError::FileNotFound(file_id))?;
		Ok((file, chunks, options))
	}

	/// Extraction closure: cuts the window, parks a copy as a tracked
	/// artifact owned by this job, hands the bytes to the pool.
	fn chunk_source(&self, job_id: Uuid, source_path: &std::path::Path) -> Result<ChunkSource, JobEngineError> {
		let chunk_dir = self.config.temp_dir.join("chunks");
		std::fs::create_dir_all(&chunk_dir)?;

		let cleanup = Arc::clone(&self.cleanup);
		let source_path = source_path.to_path_buf();

		Ok(Arc::new(move |chunk| {
			let bytes = crate::audio::extract_window(&source_path, chunk.start_secs, chunk.end_secs)?;
			let artifact = chunk_dir.join(format!("{job_id}-{:04}.wav", chunk.sequence));
			std::fs::write(&artifact, &bytes)?;
			cleanup.tracker().register(artifact, Some(job_id));
			Ok(Bytes::from(bytes))
		}))
	}

	fn publish_job_event(&self, job_id: Uuid) {
		if let Ok(snapshot) = self.registry.job_snapshot(job_id) {
			self.events.publish(ServerEvent::JobProgress {
				job_id,
				progress: snapshot.progress,
				status: snapshot.status,
			});
		}
	}

	fn publish_batch_event(&self, batch_id: Uuid) {
		if let Ok(snapshot) = self.registry.batch_snapshot(batch_id) {
			self.events.publish(ServerEvent::BatchProgress {
				batch_id,
				completed_files: snapshot.completed_files,
				failed_files: snapshot.failed_files,
				overall_progress: snapshot.overall_progress,
				jobs: snapshot.jobs,
			});
		}
	}
}
