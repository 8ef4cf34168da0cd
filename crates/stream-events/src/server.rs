use crate::status::{JobStatus, SessionStatus};
use serde::{Deserialize, Serialize};
use transcript_core::Segment;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
	pub sample_rate: u32,
	pub channels: u16,
}

/// Per-job line item inside a `batch:progress` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressView {
	pub job_id: Uuid,
	pub status: JobStatus,
	pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMetadata {
	pub frames_accepted: u64,
	pub frames_rejected: u64,
	pub status: SessionStatus,
}

/// Server-originated frames on the persistent connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
	#[serde(rename = "stream:started")]
	#[serde(rename_all = "camelCase")]
	StreamStarted { session_id: Uuid, config: SessionConfig },

	#[serde(rename = "transcription:partial")]
	#[serde(rename_all = "camelCase")]
	TranscriptionPartial {
		session_id: Uuid,
		text: String,
		confidence: f32,
		sequence_number: u64,
	},

	#[serde(rename = "transcription:final")]
	#[serde(rename_all = "camelCase")]
	TranscriptionFinal {
		session_id: Uuid,
		text: String,
		segments: Vec<Segment>,
		duration: f64,
		metadata: FinalMetadata,
	},

	#[serde(rename = "job:progress")]
	#[serde(rename_all = "camelCase")]
	JobProgress { job_id: Uuid, progress: u8, status: JobStatus },

	#[serde(rename = "batch:progress")]
	#[serde(rename_all = "camelCase")]
	BatchProgress {
		batch_id: Uuid,
		completed_files: usize,
		failed_files: usize,
		overall_progress: u8,
		jobs: Vec<JobProgressView>,
	},

	#[serde(rename = "stream:error")]
	#[serde(rename_all = "camelCase")]
	StreamError { session_id: Uuid, message: String },
}

impl ServerEvent {
	/// The entity this event is about, used as the subscription key when
	/// fanning out to connections.
	#[must_use]
	pub const fn topic(&self) -> Uuid {
		match self {
			Self::StreamStarted { session_id, .. }
			| Self::TranscriptionPartial { session_id, .. }
			| Self::TranscriptionFinal { session_id, .. }
			| Self::StreamError { session_id, .. } => *session_id,
			Self::JobProgress { job_id, .. } => *job_id,
			Self::BatchProgress { batch_id, .. } => *batch_id,
		}
	}

	/// Whether this is the last event its topic will ever emit.
	#[must_use]
	pub fn is_terminal(&self) -> bool {
		match self {
			Self::JobProgress { status, .. } => status.is_terminal(),
			Self::TranscriptionFinal { .. } => true,
			Self::BatchProgress { overall_progress, jobs, .. } => *overall_progress == 100 && jobs.iter().all(|j| j.status.is_terminal()),
			_ => false,
		}
	}
}
