use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
	#[error("not a readable WAV stream: {0}")]
	Wav(#[from] hound::Error),

	#[error("unsupported sample format: {bits}-bit {format}")]
	UnsupportedSampleFormat { bits: u16, format: &'static str },

	#[error("audio stream contains no samples")]
	Empty,

	#[error("window [{start}, {end}) lies outside the audio ({duration}s)")]
	WindowOutOfRange { start: f64, end: f64, duration: f64 },

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
	pub duration_secs: f64,
	pub sample_rate: u32,
	pub channels: u16,
}

/// Probe WAV header and duration without materializing samples.
///
/// Only 16-bit integer PCM is accepted; everything else is a validation
/// failure at the upload boundary rather than a surprise mid-job.
pub fn probe_wav(bytes: &[u8]) -> Result<WavInfo, AudioError> {
	let reader = hound::WavReader::new(Cursor::new(bytes))?;
	let spec = reader.spec();

	if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
		return Err(AudioError::UnsupportedSampleFormat {
			bits: spec.bits_per_sample,
			format: match spec.sample_format {
				hound::SampleFormat::Int => "int",
				hound::SampleFormat::Float => "float",
			},
		});
	}

	let frames = reader.duration();
	if frames == 0 {
		return Err(AudioError::Empty);
	}

	Ok(WavInfo {
		duration_secs: f64::from(frames) / f64::from(spec.sample_rate),
		sample_rate: spec.sample_rate,
		channels: spec.channels,
	})
}

/// Cut one chunk window out of a WAV file, returning a self-contained WAV
/// byte stream with the same spec.
///
/// Blocking file I/O; callers on the async runtime wrap this in
/// `spawn_blocking`.
pub fn extract_window(path: &Path, start_secs: f64, end_secs: f64) -> Result<Vec<u8>, AudioError> {
	let mut reader = hound::WavReader::open(path)?;
	let spec = reader.spec();

	if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
		return Err(AudioError::UnsupportedSampleFormat {
			bits: spec.bits_per_sample,
			format: "non-pcm16",
		});
	}

	let total_frames = reader.duration();
	let duration = f64::from(total_frames) / f64::from(spec.sample_rate);
	if start_secs < 0.0 || end_secs <= start_secs || start_secs >= duration {
		return Err(AudioError::WindowOutOfRange {
			start: start_secs,
			end: end_secs,
			duration,
		});
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	let start_frame = (start_secs * f64::from(spec.sample_rate)).round() as u32;
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	let end_frame = ((end_secs.min(duration)) * f64::from(spec.sample_rate)).round() as u32;
	let frames = end_frame.saturating_sub(start_frame);

	reader.seek(start_frame)?;

	let mut out = Cursor::new(Vec::new());
	{
		let mut writer = hound::WavWriter::new(&mut out, spec)?;
		let wanted = frames as usize * spec.channels as usize;
		for sample in reader.samples::<i16>().take(wanted) {
			writer.write_sample(sample?)?;
		}
		writer.finalize()?;
	}

	Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Mono 16-bit PCM with a recognizable ramp so window boundaries can be
	/// asserted sample-exactly.
	pub fn ramp_wav(sample_rate: u32, seconds: u32) -> Vec<u8> {
		let spec = hound::WavSpec {
			channels: 1,
			sample_rate,
			bits_per_sample: 16,
			sample_format: hound::SampleFormat::Int,
		};
		let mut cursor = Cursor::new(Vec::new());
		{
			let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
			for i in 0..(sample_rate * seconds) {
				#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
				let sample = (i % 1000) as i16;
				writer.write_sample(sample).unwrap();
			}
			writer.finalize().unwrap();
		}
		cursor.into_inner()
	}

	#[test]
	fn probe_reads_duration_and_spec() {
		let bytes = ramp_wav(8000, 3);
		let info = probe_wav(&bytes).unwrap();
		assert!((info.duration_secs - 3.0).abs() < 1e-9);
		assert_eq!(info.sample_rate, 8000);
		assert_eq!(info.channels, 1);
	}

	#[test]
	fn probe_rejects_empty_stream() {
		let spec = hound::WavSpec {
			channels: 1,
			sample_rate: 8000,
			bits_per_sample: 16,
			sample_format: hound::SampleFormat::Int,
		};
		let mut cursor = Cursor::new(Vec::new());
		hound::WavWriter::new(&mut cursor, spec).unwrap().finalize().unwrap();
		assert!(matches!(probe_wav(&cursor.into_inner()), Err(AudioError::Empty)));
	}

	#[test]
	fn probe_rejects_garbage() {
		assert!(matches!(probe_wav(b"not audio at all"), Err(AudioError::Wav(_))));
	}

	#[test]
	fn extract_cuts_the_requested_window() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ramp.wav");
		std::fs::write(&path, ramp_wav(8000, 4)).unwrap();

		let window = extract_window(&path, 1.0, 3.0).unwrap();
		let info = probe_wav(&window).unwrap();
		assert!((info.duration_secs - 2.0).abs() < 1e-9);

		// first sample of the window is sample index 8000 of the ramp
		let mut reader = hound::WavReader::new(Cursor::new(&window[..])).unwrap();
		let first = reader.samples::<i16>().next().unwrap().unwrap();
		assert_eq!(first, 8000 % 1000);
	}

	#[test]
	fn extract_clamps_the_final_partial_window() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ramp.wav");
		std::fs::write(&path, ramp_wav(8000, 4)).unwrap();

		let window = extract_window(&path, 3.0, 10.0).unwrap();
		let info = probe_wav(&window).unwrap();
		assert!((info.duration_secs - 1.0).abs() < 1e-9);
	}

	#[test]
	fn extract_rejects_window_past_the_end() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ramp.wav");
		std::fs::write(&path, ramp_wav(8000, 2)).unwrap();

		assert!(matches!(extract_window(&path, 5.0, 6.0), Err(AudioError::WindowOutOfRange { .. })));
	}
}
