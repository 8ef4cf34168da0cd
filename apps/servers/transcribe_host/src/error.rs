use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use job_engine::JobEngineError;
use transcript_core::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error("request path not found")]
	NotFound,

	#[error("validation failed: {0}")]
	Validation(String),

	#[error(transparent)]
	Engine(#[from] JobEngineError),

	#[error(transparent)]
	Render(#[from] RenderError),

	#[error("request timeout")]
	RequestTimeout,

	#[error("service temporarily overloaded")]
	ServiceOverloaded,

	#[error("unexpected tower service error: {0}")]
	TowerError(#[from] tower::BoxError),

	#[error("an internal server error occurred")]
	Anyhow(#[from] anyhow::Error),
}

impl ApiError {
	fn status_code(&self) -> StatusCode {
		match self {
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
			Self::Engine(e) => match e {
				JobEngineError::JobNotFound(_) | JobEngineError::BatchNotFound(_) | JobEngineError::FileNotFound(_) => StatusCode::NOT_FOUND,
				JobEngineError::Validation(_) | JobEngineError::Plan(_) | JobEngineError::Audio(_) => StatusCode::UNPROCESSABLE_ENTITY,
				// explicit resource-exhaustion rejection, distinct from overload
				JobEngineError::DiskPressure { .. } => StatusCode::INSUFFICIENT_STORAGE,
				JobEngineError::TranscriptNotReady(_) | JobEngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
				JobEngineError::Merge(_) | JobEngineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
			},
			Self::Render(RenderError::UnknownFormat(_)) => StatusCode::BAD_REQUEST,
			Self::Render(RenderError::Serialization(_)) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
			Self::ServiceOverloaded => StatusCode::SERVICE_UNAVAILABLE,
			Self::TowerError(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		#[derive(serde::Serialize)]
		struct ErrorBody {
			error: String,
		}

		let status = self.status_code();
		if status.is_server_error() {
			tracing::error!(error = %self, "Request failed");
		}

		(status, Json(ErrorBody { error: self.to_string() })).into_response()
	}
}
