use crate::batch::{BatchRecord, BatchSnapshot};
use crate::error::JobEngineError;
use crate::job::{JobProgress, JobRecord};
use dashmap::DashMap;
use std::collections::HashSet;
use stream_events::{JobProgressView, JobStatus};
use transcript_core::Transcript;
use uuid::Uuid;

/// Concurrent job/batch table.
///
/// Each entry is guarded independently by the map shard it lives in; there
/// is deliberately no lock spanning jobs, so unrelated jobs never contend.
/// All mutation funnels through `with_job_mut` to keep the state machine
/// the only writer.
#[derive(Default)]
pub struct JobRegistry {
	jobs: DashMap<Uuid, JobRecord>,
	batches: DashMap<Uuid, BatchRecord>,
}

impl JobRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_job(&self, job: JobRecord) -> Uuid {
		let id = job.id;
		self.jobs.insert(id, job);
		id
	}

	pub fn insert_batch(&self, batch: BatchRecord) -> Uuid {
		let id = batch.id;
		self.batches.insert(id, batch);
		id
	}

	/// Run `f` against the job under its entry guard. Nothing may touch
	/// another registry entry from inside `f`; deriving cross-job views
	/// happens outside the guard.
	pub fn with_job_mut<T>(&self, id: Uuid, f: impl FnOnce(&mut JobRecord) -> T) -> Result<T, JobEngineError> {
		let mut entry = self.jobs.get_mut(&id).ok_or(JobEngineError::JobNotFound(id))?;
		Ok(f(&mut entry))
	}

	pub fn job_snapshot(&self, id: Uuid) -> Result<JobProgress, JobEngineError> {
		let entry = self.jobs.get(&id).ok_or(JobEngineError::JobNotFound(id))?;
		Ok(entry.snapshot())
	}

	pub fn job_status(&self, id: Uuid) -> Result<JobStatus, JobEngineError> {
		let entry = self.jobs.get(&id).ok_or(JobEngineError::JobNotFound(id))?;
		Ok(entry.status)
	}

	pub fn batch_id_of(&self, job_id: Uuid) -> Option<Uuid> {
		self.jobs.get(&job_id).and_then(|entry| entry.batch_id)
	}

	pub fn transcript(&self, id: Uuid) -> Result<Transcript, JobEngineError> {
		let entry = self.jobs.get(&id).ok_or(JobEngineError::JobNotFound(id))?;
		entry.transcript.clone().ok_or(JobEngineError::TranscriptNotReady(id))
	}

	/// Derived batch view; never cached, never stale.
	pub fn batch_snapshot(&self, id: Uuid) -> Result<BatchSnapshot, JobEngineError> {
		let batch = self.batches.get(&id).ok_or(JobEngineError::BatchNotFound(id))?;
		let jobs: Vec<JobProgressView> = batch
			.job_ids
			.iter()
			.filter_map(|job_id| {
				self.jobs.get(job_id).map(|job| JobProgressView {
					job_id: *job_id,
					status: job.status,
					progress: job.progress(),
				})
			})
			.collect();
		Ok(BatchSnapshot::derive(id, jobs))
	}

	pub fn contains_batch(&self, id: Uuid) -> bool {
		self.batches.contains_key(&id)
	}

	/// Files referenced by at least one job that can still run. The
	/// cleanup sweeper treats these as untouchable.
	#[must_use]
	pub fn active_file_ids(&self) -> HashSet<Uuid> {
		self
			.jobs
			.iter()
			.filter(|entry| !entry.status.is_terminal())
			.map(|entry| entry.file_id)
			.collect()
	}

	/// Ids of jobs that can still run, for shutdown bookkeeping.
	#[must_use]
	pub fn active_job_ids(&self) -> Vec<Uuid> {
		self
			.jobs
			.iter()
			.filter(|entry| !entry.status.is_terminal())
			.map(|entry| entry.id)
			.collect()
	}

	#[must_use]
	pub fn job_count(&self) -> usize {
		self.jobs.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::JobOptions;
	use transcript_core::{plan_chunks, ChunkProfile};

	fn insert_job(registry: &JobRegistry, batch_id: Option<Uuid>) -> Uuid {
		let file_id = Uuid::new_v4();
		let chunks = plan_chunks(file_id, 700.0, ChunkProfile::Extended, 10.0).unwrap();
		registry.insert_job(JobRecord::new(file_id, batch_id, chunks, JobOptions::default()))
	}

	#[test]
	fn unknown_ids_surface_typed_errors() {
		let registry = JobRegistry::new();
		let id = Uuid::new_v4();
		assert!(matches!(registry.job_snapshot(id), Err(JobEngineError::JobNotFound(_))));
		assert!(matches!(registry.batch_snapshot(id), Err(JobEngineError::BatchNotFound(_))));
	}

	#[test]
	fn with_job_mut_routes_through_the_state_machine() {
		let registry = JobRegistry::new();
		let id = insert_job(&registry, None);

		registry.with_job_mut(id, |job| job.transition(JobStatus::Processing)).unwrap().unwrap();
		assert_eq!(registry.job_status(id).unwrap(), JobStatus::Processing);
	}

	#[test]
	fn active_file_ids_exclude_terminal_jobs() {
		let registry = JobRegistry::new();
		let running = insert_job(&registry, None);
		let done = insert_job(&registry, None);

		registry
			.with_job_mut(done, |job| {
				job.transition(JobStatus::Processing)?;
				job.transition(JobStatus::Completed)
			})
			.unwrap()
			.unwrap();

		let active = registry.active_file_ids();
		let running_file = registry.with_job_mut(running, |job| job.file_id).unwrap();
		let done_file = registry.with_job_mut(done, |job| job.file_id).unwrap();
		assert!(active.contains(&running_file));
		assert!(!active.contains(&done_file));
	}

	#[test]
	fn batch_snapshot_is_derived_from_live_jobs() {
		let registry = JobRegistry::new();
		let batch = BatchRecord::new(Vec::new(), true);
		let batch_id = batch.id;

		let a = insert_job(&registry, Some(batch_id));
		let b = insert_job(&registry, Some(batch_id));
		registry.insert_batch(BatchRecord {
			job_ids: vec![a, b],
			..batch
		});

		let before = registry.batch_snapshot(batch_id).unwrap();
		assert_eq!(before.completed_files, 0);

		registry
			.with_job_mut(a, |job| {
				job.transition(JobStatus::Processing)?;
				job.transition(JobStatus::Completed)
			})
			.unwrap()
			.unwrap();

		let after = registry.batch_snapshot(batch_id).unwrap();
		assert_eq!(after.completed_files, 1);
		assert_eq!(after.jobs.len(), 2);
	}
}
