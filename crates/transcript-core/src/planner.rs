use crate::types::{AudioChunk, ChunkProfile};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
	#[error("audio duration must be positive, got {0}")]
	NonPositiveDuration(f64),
	#[error("overlap ({overlap}s) must be shorter than the chunk duration ({chunk}s)")]
	OverlapTooLarge { overlap: f64, chunk: f64 },
	#[error("overlap must be non-negative, got {0}")]
	NegativeOverlap(f64),
}

/// Split `duration_secs` of audio into overlapping windows.
///
/// Step size is `chunk - overlap`, and the chunk count is the CEILING of
/// `duration / step`. Truncating here would under-count the final partial
/// window and silently drop trailing audio, so the count is asserted the
/// long way: one extra window whenever a remainder exists.
///
/// Every window except the last carries exactly `overlap_secs` of audio
/// shared with its successor. A file no longer than one chunk yields a
/// single window with no overlap.
pub fn plan_chunks(file_id: Uuid, duration_secs: f64, profile: ChunkProfile, overlap_secs: f64) -> Result<Vec<AudioChunk>, PlanError> {
	if duration_secs <= 0.0 {
		return Err(PlanError::NonPositiveDuration(duration_secs));
	}
	if overlap_secs < 0.0 {
		return Err(PlanError::NegativeOverlap(overlap_secs));
	}

	let chunk_secs = profile.chunk_secs();
	if overlap_secs >= chunk_secs {
		return Err(PlanError::OverlapTooLarge {
			overlap: overlap_secs,
			chunk: chunk_secs,
		});
	}

	// Single-window fast path: no overlap to carry
	if duration_secs <= chunk_secs {
		return Ok(vec![AudioChunk {
			id: Uuid::new_v4(),
			file_id,
			sequence: 0,
			start_secs: 0.0,
			end_secs: duration_secs,
			overlap_secs: 0.0,
		}]);
	}

	let step = chunk_secs - overlap_secs;
	let count = div_ceil(duration_secs, step);

	let mut chunks = Vec::with_capacity(count);
	for i in 0..count {
		#[allow(clippy::cast_precision_loss)]
		let start = i as f64 * step;
		let end = (start + chunk_secs).min(duration_secs);
		let is_last = i == count - 1;

		chunks.push(AudioChunk {
			id: Uuid::new_v4(),
			file_id,
			sequence: i,
			start_secs: start,
			end_secs: end,
			overlap_secs: if is_last { 0.0 } else { overlap_secs },
		});
	}

	Ok(chunks)
}

/// Ceiling division for positive floats, guarding the exact-multiple case
/// so it never produces a trailing zero-length window. The tolerance is
/// loose enough to absorb float wobble on durations that divide evenly.
fn div_ceil(duration: f64, step: f64) -> usize {
	const TOLERANCE: f64 = 1e-9;

	let ratio = duration / step;
	let whole = ratio.floor();
	let count = if ratio - whole > TOLERANCE { whole + 1.0 } else { whole };

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	let count = count as usize;
	count.max(1)
}
