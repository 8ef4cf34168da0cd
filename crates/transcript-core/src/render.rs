use crate::types::Transcript;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
	#[error("unknown output format: {0}")]
	UnknownFormat(String),
	#[error("transcript serialization failed: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Closed set of transcript renderings. Selected per request; each variant
/// owns one `render` path so new formats are a compile-time concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
	#[default]
	Json,
	Txt,
	Srt,
	Vtt,
}

impl std::str::FromStr for OutputFormat {
	type Err = RenderError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"json" => Ok(Self::Json),
			"txt" => Ok(Self::Txt),
			"srt" => Ok(Self::Srt),
			"vtt" => Ok(Self::Vtt),
			other => Err(RenderError::UnknownFormat(other.to_string())),
		}
	}
}

impl OutputFormat {
	#[must_use]
	pub const fn content_type(self) -> &'static str {
		match self {
			Self::Json => "application/json",
			Self::Txt => "text/plain; charset=utf-8",
			Self::Srt => "application/x-subrip",
			Self::Vtt => "text/vtt",
		}
	}

	pub fn render(self, transcript: &Transcript) -> Result<Vec<u8>, RenderError> {
		match self {
			Self::Json => Ok(serde_json::to_vec_pretty(transcript)?),
			Self::Txt => Ok(render_txt(transcript).into_bytes()),
			Self::Srt => Ok(render_srt(transcript).into_bytes()),
			Self::Vtt => Ok(render_vtt(transcript).into_bytes()),
		}
	}
}

fn render_txt(transcript: &Transcript) -> String {
	let mut out = transcript.text.clone();
	out.push('\n');
	out
}

fn render_srt(transcript: &Transcript) -> String {
	let mut out = String::new();
	for (i, seg) in transcript.segments.iter().enumerate() {
		let _ = writeln!(out, "{}", i + 1);
		let _ = writeln!(out, "{} --> {}", format_timestamp(seg.start, ','), format_timestamp(seg.end, ','));
		let _ = writeln!(out, "{}", seg.text.trim());
		out.push('\n');
	}
	out
}

fn render_vtt(transcript: &Transcript) -> String {
	let mut out = String::from("WEBVTT\n\n");
	for seg in &transcript.segments {
		let _ = writeln!(out, "{} --> {}", format_timestamp(seg.start, '.'), format_timestamp(seg.end, '.'));
		let _ = writeln!(out, "{}", seg.text.trim());
		out.push('\n');
	}
	out
}

/// `HH:MM:SS<sep>mmm`, zero-padded. SRT wants a comma before the millis,
/// WebVTT wants a dot.
fn format_timestamp(secs: f64, sep: char) -> String {
	let clamped = secs.max(0.0);
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	let total_millis = (clamped * 1000.0).round() as u64;

	let hours = total_millis / 3_600_000;
	let minutes = (total_millis % 3_600_000) / 60_000;
	let seconds = (total_millis % 60_000) / 1000;
	let millis = total_millis % 1000;

	format!("{hours:02}:{minutes:02}:{seconds:02}{sep}{millis:03}")
}
