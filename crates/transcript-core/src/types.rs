use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Registered source audio file. Immutable once created; only the cleanup
/// sweeper may remove the backing file, and only after every job that
/// references it has reached a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
	pub id: Uuid,
	pub size_bytes: u64,
	pub duration_secs: f64,
	pub mime_type: String,
	#[serde(skip)]
	pub path: PathBuf,
	pub created_at: DateTime<Utc>,
}

/// Chunk duration profile. Closed set: the step size maths in the planner
/// assume these stay coarse-grained relative to the overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChunkProfile {
	/// 3-minute chunks, for short recordings or low-latency feedback
	Brief,
	/// 5-minute chunks
	#[default]
	Standard,
	/// 10-minute chunks, for multi-hour recordings
	Extended,
}

impl ChunkProfile {
	#[must_use]
	pub const fn chunk_secs(self) -> f64 {
		match self {
			Self::Brief => 180.0,
			Self::Standard => 300.0,
			Self::Extended => 600.0,
		}
	}
}

/// One time window of the source file, processed independently.
///
/// Windows are contiguous and monotonically increasing; every non-final
/// window shares `overlap_secs` of audio with its successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
	pub id: Uuid,
	pub file_id: Uuid,
	pub sequence: usize,
	pub start_secs: f64,
	pub end_secs: f64,
	/// Seconds shared with the next chunk; 0.0 for the final chunk
	pub overlap_secs: f64,
}

impl AudioChunk {
	#[must_use]
	pub fn duration_secs(&self) -> f64 {
		self.end_secs - self.start_secs
	}
}

/// One recognized span of speech, in whole-file time once merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
	pub start: f64,
	pub end: f64,
	pub text: String,
	pub confidence: f32,
}

/// Engine output for a single chunk. Written exactly once when the chunk
/// completes; segment times are chunk-relative until the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResult {
	pub chunk_id: Uuid,
	pub sequence: usize,
	pub text: String,
	pub segments: Vec<Segment>,
	pub processing: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMetadata {
	pub language: Option<String>,
	pub chunk_count: usize,
	pub processing_secs: f64,
}

/// The merged whole-file transcript: segment times are absolute and
/// strictly ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
	pub file_id: Uuid,
	pub text: String,
	pub segments: Vec<Segment>,
	pub duration_secs: f64,
	pub metadata: TranscriptMetadata,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chunk_profile_durations() {
		assert!((ChunkProfile::Brief.chunk_secs() - 180.0).abs() < f64::EPSILON);
		assert!((ChunkProfile::Standard.chunk_secs() - 300.0).abs() < f64::EPSILON);
		assert!((ChunkProfile::Extended.chunk_secs() - 600.0).abs() < f64::EPSILON);
	}

	#[test]
	fn chunk_profile_default_is_standard() {
		assert_eq!(ChunkProfile::default(), ChunkProfile::Standard);
	}

	#[test]
	fn segment_serializes_camel_case() {
		let seg = Segment {
			start: 1.5,
			end: 2.5,
			text: "hello".to_string(),
			confidence: 0.9,
		};
		let json = serde_json::to_value(&seg).unwrap();
		assert!(json.get("start").is_some());
		assert!(json.get("confidence").is_some());
	}

	#[test]
	fn file_info_path_is_not_serialized() {
		let info = FileInfo {
			id: Uuid::new_v4(),
			size_bytes: 42,
			duration_secs: 1.0,
			mime_type: "audio/wav".to_string(),
			path: PathBuf::from("/tmp/a.wav"),
			created_at: Utc::now(),
		};
		let json = serde_json::to_value(&info).unwrap();
		assert!(json.get("path").is_none());
		assert!(json.get("sizeBytes").is_some());
	}
}
