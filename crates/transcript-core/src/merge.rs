use crate::types::{AudioChunk, ChunkResult, Segment, Transcript, TranscriptMetadata};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
	#[error("no chunk results to merge")]
	Empty,
	#[error("result count ({results}) does not match chunk count ({chunks})")]
	CountMismatch { results: usize, chunks: usize },
	#[error("chunk {0} has no matching result")]
	MissingChunk(Uuid),
}

/// Merge per-chunk results into one whole-file transcript.
///
/// Chunks complete out of order under concurrency; ordering is
/// re-established here by sequence index before anything else happens.
/// Where two adjacent windows share audio, the EARLIER chunk's rendering
/// wins for the shared span: it saw that audio with full right-context,
/// while the later chunk had it only as left-context. The later chunk
/// contributes segments starting at or after the boundary.
///
/// Deterministic and idempotent: the same result set merges to identical
/// output every time, with strictly ordered, non-overlapping segments.
pub fn merge_results(file_id: Uuid, duration_secs: f64, chunks: &[AudioChunk], results: &[ChunkResult], language: Option<String>) -> Result<Transcript, MergeError> {
	if results.is_empty() {
		return Err(MergeError::Empty);
	}
	if results.len() != chunks.len() {
		return Err(MergeError::CountMismatch {
			results: results.len(),
			chunks: chunks.len(),
		});
	}

	let mut ordered: Vec<&ChunkResult> = results.iter().collect();
	ordered.sort_by_key(|r| r.sequence);

	let mut chunks_by_seq: Vec<&AudioChunk> = chunks.iter().collect();
	chunks_by_seq.sort_by_key(|c| c.sequence);

	let mut segments: Vec<Segment> = Vec::new();
	let mut processing_secs = 0.0;
	// End of the previous window in absolute time; segments of the current
	// chunk that start before it fall inside the shared span and are the
	// earlier chunk's to render.
	let mut boundary = 0.0_f64;

	for (chunk, result) in chunks_by_seq.iter().zip(ordered.iter()) {
		if chunk.id != result.chunk_id {
			return Err(MergeError::MissingChunk(chunk.id));
		}
		processing_secs += result.processing.as_secs_f64();

		for seg in &result.segments {
			let abs_start = chunk.start_secs + seg.start;
			let abs_end = chunk.start_secs + seg.end;

			if chunk.sequence > 0 && abs_start < boundary - TIME_TOLERANCE {
				continue;
			}

			// Clamp against the previous accepted segment so engine jitter at
			// the boundary cannot produce overlapping output
			let floor = segments.last().map_or(0.0, |prev: &Segment| prev.end);
			let start = abs_start.max(floor);
			let end = abs_end.min(duration_secs);
			if end - start <= TIME_TOLERANCE {
				continue;
			}

			segments.push(Segment {
				start,
				end,
				text: seg.text.clone(),
				confidence: seg.confidence,
			});
		}

		boundary = chunk.end_secs;
	}

	let text = segments.iter().map(|s| s.text.trim()).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ");

	Ok(Transcript {
		file_id,
		text,
		segments,
		duration_secs,
		metadata: TranscriptMetadata {
			language,
			chunk_count: chunks.len(),
			processing_secs,
		},
	})
}

const TIME_TOLERANCE: f64 = 1e-6;
