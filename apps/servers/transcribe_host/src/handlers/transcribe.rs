use crate::error::ApiError;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use job_engine::JobOptions;
use serde::{Deserialize, Serialize};
use stream_events::JobStatus;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeFileRequest {
	pub file_id: Uuid,
	#[serde(default)]
	pub config: JobOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeFileResponse {
	pub job_id: Uuid,
	pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeBatchRequest {
	pub file_ids: Vec<Uuid>,
	#[serde(default)]
	pub config: JobOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeBatchResponse {
	pub batch_id: Uuid,
	pub status: JobStatus,
}

pub async fn transcribe_file(State(state): State<AppState>, Json(request): Json<TranscribeFileRequest>) -> Result<(StatusCode, Json<TranscribeFileResponse>), ApiError> {
	let job_id = state.jobs.scheduler.submit_file(request.file_id, request.config)?;
	state.core.metrics.jobs_submitted.inc();

	Ok((
		StatusCode::ACCEPTED,
		Json(TranscribeFileResponse {
			job_id,
			status: JobStatus::Queued,
		}),
	))
}

pub async fn transcribe_batch(State(state): State<AppState>, Json(request): Json<TranscribeBatchRequest>) -> Result<(StatusCode, Json<TranscribeBatchResponse>), ApiError> {
	let batch_id = state.jobs.scheduler.submit_batch(&request.file_ids, request.config)?;
	state.core.metrics.jobs_submitted.inc_by(request.file_ids.len() as u64);

	Ok((
		StatusCode::ACCEPTED,
		Json(TranscribeBatchResponse {
			batch_id,
			status: JobStatus::Queued,
		}),
	))
}
