use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FrameDecodeError {
	#[error("audio payload is not valid base64: {0}")]
	Base64(#[from] base64::DecodeError),
}

/// Client-originated frames on the persistent connection.
///
/// The `type` tag carries the wire names verbatim; everything else is
/// camelCase payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
	#[serde(rename = "stream:start")]
	#[serde(rename_all = "camelCase")]
	StreamStart {
		session_id: Uuid,
		sample_rate: u32,
		channels: u16,
		format: String,
	},

	#[serde(rename = "audio:chunk")]
	#[serde(rename_all = "camelCase")]
	AudioChunk {
		session_id: Uuid,
		/// base64-encoded PCM frame
		data: String,
		sequence_number: u64,
	},

	#[serde(rename = "stream:stop")]
	#[serde(rename_all = "camelCase")]
	StreamStop { session_id: Uuid },

	#[serde(rename = "job:subscribe")]
	#[serde(rename_all = "camelCase")]
	JobSubscribe { job_id: Uuid },

	#[serde(rename = "job:unsubscribe")]
	#[serde(rename_all = "camelCase")]
	JobUnsubscribe { job_id: Uuid },
}

/// Decode an `audio:chunk` payload into raw PCM bytes.
pub fn decode_audio_payload(data: &str) -> Result<Vec<u8>, FrameDecodeError> {
	Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
}
