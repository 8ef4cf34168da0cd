use crate::error::EngineError;
use crate::types::{EngineRequest, EngineResponse};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Seam between the orchestration layer and the transcription engine.
///
/// Implementations make exactly one bounded attempt per call; retry policy
/// lives with the caller.
#[async_trait]
pub trait Transcriber: Send + Sync {
	async fn transcribe(&self, request: EngineRequest, timeout: Duration) -> Result<EngineResponse, EngineError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload<'a> {
	audio: String,
	format: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	prompt: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	language: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WireError {
	message: String,
}

/// HTTP adapter for a remote transcription engine.
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
	http: reqwest::Client,
	endpoint: String,
}

impl HttpEngineClient {
	/// `base_url` is the engine root, e.g. `http://localhost:9000`.
	pub fn new(base_url: &str) -> Result<Self, EngineError> {
		let http = reqwest::Client::builder()
			.build()
			.map_err(|e| EngineError::InvalidRequest(format!("failed to construct http client: {e}")))?;

		Ok(Self {
			http,
			endpoint: format!("{}/v1/transcribe", base_url.trim_end_matches('/')),
		})
	}

	fn classify_status(status: StatusCode, message: String) -> EngineError {
		if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
			EngineError::Retryable(format!("engine returned {status}: {message}"))
		} else {
			EngineError::Terminal(format!("engine returned {status}: {message}"))
		}
	}

	fn classify_transport(err: &reqwest::Error) -> EngineError {
		if err.is_timeout() || err.is_connect() {
			EngineError::Retryable(format!("engine unreachable: {err}"))
		} else {
			EngineError::Terminal(format!("engine request failed: {err}"))
		}
	}
}

#[async_trait]
impl Transcriber for HttpEngineClient {
	async fn transcribe(&self, request: EngineRequest, timeout: Duration) -> Result<EngineResponse, EngineError> {
		request.validate()?;

		let payload = WirePayload {
			audio: base64::engine::general_purpose::STANDARD.encode(&request.audio),
			format: &request.format,
			prompt: request.prompt.as_deref(),
			language: request.language.as_deref(),
		};

		debug!(endpoint = %self.endpoint, audio_bytes = request.audio.len(), timeout_ms = timeout.as_millis(), "Dispatching chunk to engine");

		let response = self
			.http
			.post(&self.endpoint)
			.timeout(timeout)
			.json(&payload)
			.send()
			.await
			.map_err(|e| Self::classify_transport(&e))?;

		let status = response.status();
		if !status.is_success() {
			let message = response.json::<WireError>().await.map_or_else(|_| "no error body".to_string(), |e| e.message);
			warn!(%status, message = %message, "Engine call failed");
			return Err(Self::classify_status(status, message));
		}

		response
			.json::<EngineResponse>()
			.await
			.map_err(|e| EngineError::Terminal(format!("engine response did not match contract: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::Bytes;

	#[test]
	fn server_errors_and_backpressure_are_retryable() {
		for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS] {
			let err = HttpEngineClient::classify_status(status, "boom".to_string());
			assert!(err.is_retryable(), "{status} should be retryable");
		}
	}

	#[test]
	fn client_errors_are_terminal() {
		for status in [StatusCode::BAD_REQUEST, StatusCode::UNPROCESSABLE_ENTITY, StatusCode::UNSUPPORTED_MEDIA_TYPE] {
			let err = HttpEngineClient::classify_status(status, "rejected".to_string());
			assert!(!err.is_retryable(), "{status} should be terminal");
		}
	}

	#[tokio::test]
	async fn oversized_prompt_fails_before_any_io() {
		// Port 9 (discard) is never listening; a validation failure must
		// surface as InvalidRequest, not a connection error
		let client = HttpEngineClient::new("http://127.0.0.1:9").unwrap();
		let request = EngineRequest {
			audio: Bytes::from_static(b"RIFF"),
			format: "wav".to_string(),
			prompt: Some("y".repeat(crate::types::MAX_PROMPT_CHARS + 1)),
			language: None,
		};

		let err = client.transcribe(request, Duration::from_millis(50)).await.unwrap_err();
		assert!(matches!(err, EngineError::InvalidRequest(_)));
	}

	#[test]
	fn endpoint_trailing_slash_is_normalized() {
		let client = HttpEngineClient::new("http://engine:9000/").unwrap();
		assert_eq!(client.endpoint, "http://engine:9000/v1/transcribe");
	}
}
