use crate::audio::AudioError;
use stream_events::JobStatus;
use thiserror::Error;
use transcript_core::{MergeError, PlanError};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JobEngineError {
	#[error("job {0} not found")]
	JobNotFound(Uuid),

	#[error("batch {0} not found")]
	BatchNotFound(Uuid),

	#[error("file {0} not found")]
	FileNotFound(Uuid),

	#[error("job {0} has no transcript yet")]
	TranscriptNotReady(Uuid),

	#[error("illegal job transition {from:?} -> {to:?}")]
	InvalidTransition { from: JobStatus, to: JobStatus },

	#[error("free disk space too low ({free_bytes} bytes available, {required} required); admission suspended")]
	DiskPressure { free_bytes: u64, required: u64 },

	#[error("validation failed: {0}")]
	Validation(String),

	#[error("chunk planning failed: {0}")]
	Plan(#[from] PlanError),

	#[error("transcript merge failed: {0}")]
	Merge(#[from] MergeError),

	#[error("audio error: {0}")]
	Audio(#[from] AudioError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl JobEngineError {
	/// Disk-pressure rejections are the one engine error a submitter can
	/// recover from by waiting; everything else needs a different request.
	#[must_use]
	pub const fn is_admission_rejection(&self) -> bool {
		matches!(self, Self::DiskPressure { .. })
	}
}
