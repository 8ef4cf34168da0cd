use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use job_engine::{BatchSnapshot, JobProgress};
use serde::{Deserialize, Serialize};
use stream_events::JobStatus;
use transcript_core::OutputFormat;
use uuid::Uuid;

pub async fn job_progress(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<JobProgress>, ApiError> {
	Ok(Json(state.jobs.scheduler.progress(id)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
	pub job_id: Uuid,
	pub status: JobStatus,
}

pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CancelResponse>, ApiError> {
	let progress = state.jobs.scheduler.cancel(id)?;
	Ok(Json(CancelResponse {
		job_id: id,
		status: progress.status,
	}))
}

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
	pub format: Option<String>,
}

/// `GET /job/:id/transcript?format=json|txt|srt|vtt`
pub async fn job_transcript(State(state): State<AppState>, Path(id): Path<Uuid>, Query(query): Query<TranscriptQuery>) -> Result<Response, ApiError> {
	let format: OutputFormat = match query.format.as_deref() {
		Some(raw) => raw.parse()?,
		None => OutputFormat::default(),
	};

	let transcript = state.jobs.scheduler.transcript(id)?;
	let body = format.render(&transcript)?;

	Ok(([(CONTENT_TYPE, format.content_type())], body).into_response())
}

pub async fn batch_progress(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<BatchSnapshot>, ApiError> {
	Ok(Json(state.jobs.scheduler.batch_progress(id)?))
}
