use crate::error::ApiError;
use crate::AppState;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use axum::Json;
use bytes::Bytes;
use transcript_core::FileInfo;

/// `POST /files` — raw WAV body, `Content-Type: audio/wav`.
pub async fn upload_audio(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<(StatusCode, Json<FileInfo>), ApiError> {
	let mime = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("audio/wav");

	let info = state.jobs.scheduler.files().register(&body, mime).await?;
	Ok((StatusCode::CREATED, Json(info)))
}
