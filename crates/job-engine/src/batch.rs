use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_events::JobProgressView;
use uuid::Uuid;

/// A batch is bookkeeping only: it owns an ordered job list and a failure
/// policy. Everything a client sees about a batch is derived from its
/// constituent jobs at read time, so there is no aggregate state to drift.
#[derive(Debug, Clone)]
pub struct BatchRecord {
	pub id: Uuid,
	pub job_ids: Vec<Uuid>,
	pub continue_on_error: bool,
	pub created_at: DateTime<Utc>,
}

impl BatchRecord {
	#[must_use]
	pub fn new(job_ids: Vec<Uuid>, continue_on_error: bool) -> Self {
		Self {
			id: Uuid::new_v4(),
			job_ids,
			continue_on_error,
			created_at: Utc::now(),
		}
	}
}

/// Derived batch aggregates, computed fresh on every query/broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
	pub batch_id: Uuid,
	pub completed_files: usize,
	pub failed_files: usize,
	pub overall_progress: u8,
	pub jobs: Vec<JobProgressView>,
}

impl BatchSnapshot {
	/// Aggregate from per-job views. Cancelled jobs count as failed files
	/// for reporting purposes; a batch with any terminal mix is still a
	/// batch that ran to completion.
	#[must_use]
	pub fn derive(batch_id: Uuid, jobs: Vec<JobProgressView>) -> Self {
		use stream_events::JobStatus;

		let completed_files = jobs.iter().filter(|j| j.status == JobStatus::Completed).count();
		let failed_files = jobs.iter().filter(|j| matches!(j.status, JobStatus::Failed | JobStatus::Cancelled)).count();

		let overall_progress = if jobs.is_empty() {
			0
		} else {
			let sum: usize = jobs.iter().map(|j| usize::from(j.progress)).sum();
			#[allow(clippy::cast_possible_truncation)]
			let avg = (sum / jobs.len()) as u8;
			// a batch shows 100 only when every member is terminal
			if jobs.iter().all(|j| j.status.is_terminal()) {
				100
			} else {
				avg.min(99)
			}
		};

		Self {
			batch_id,
			completed_files,
			failed_files,
			overall_progress,
			jobs,
		}
	}
}
