use crate::error::EngineError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Hard ceiling on the optional system prompt. Longer input is a
/// validation error, never a silent truncation.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// One chunk's worth of audio plus decoding hints for the engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
	pub audio: Bytes,
	pub format: String,
	pub prompt: Option<String>,
	pub language: Option<String>,
}

impl EngineRequest {
	/// Local validation, run before any connection attempt.
	pub fn validate(&self) -> Result<(), EngineError> {
		if self.audio.is_empty() {
			return Err(EngineError::InvalidRequest("empty audio payload".to_string()));
		}
		if let Some(prompt) = &self.prompt {
			let chars = prompt.chars().count();
			if chars > MAX_PROMPT_CHARS {
				return Err(EngineError::InvalidRequest(format!("system prompt is {chars} chars, limit is {MAX_PROMPT_CHARS}")));
			}
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSegment {
	pub start: f64,
	pub end: f64,
	pub text: String,
	pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponseMetadata {
	pub processing_time_ms: u64,
}

/// The engine's structured result for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
	pub text: String,
	pub segments: Vec<EngineSegment>,
	pub language: Option<String>,
	pub metadata: EngineResponseMetadata,
}
