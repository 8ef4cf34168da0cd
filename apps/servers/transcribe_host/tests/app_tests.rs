use async_trait::async_trait;
use clap::Parser;
use engine_client::{EngineError, EngineRequest, EngineResponse, EngineResponseMetadata, EngineSegment, Transcriber};
use job_engine::JobOptions;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use stream_events::JobStatus;
use tokio_util::sync::CancellationToken;
use transcribe_host::{AppState, Config};
use transcript_core::OutputFormat;

struct EchoEngine;

#[async_trait]
impl Transcriber for EchoEngine {
	async fn transcribe(&self, _request: EngineRequest, _timeout: Duration) -> Result<EngineResponse, EngineError> {
		Ok(EngineResponse {
			text: "the whole point".to_string(),
			segments: vec![EngineSegment {
				start: 40.0,
				end: 42.0,
				text: "the whole point".to_string(),
				confidence: 0.95,
			}],
			language: Some("en".to_string()),
			metadata: EngineResponseMetadata { processing_time_ms: 3 },
		})
	}
}

fn wav_seconds(seconds: u32) -> Vec<u8> {
	let spec = hound::WavSpec {
		channels: 1,
		sample_rate: 1000,
		bits_per_sample: 16,
		sample_format: hound::SampleFormat::Int,
	};
	let mut cursor = Cursor::new(Vec::new());
	{
		let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
		for _ in 0..(1000 * seconds) {
			writer.write_sample(0i16).unwrap();
		}
		writer.finalize().unwrap();
	}
	cursor.into_inner()
}

fn test_state(tmp: &std::path::Path) -> AppState {
	let config = Config::try_parse_from([
		"transcribe_host",
		"--temp-dir",
		tmp.to_str().unwrap(),
		"--cleanup-grace-secs",
		"0",
		"--min-free-disk-bytes",
		"0",
		"--retry-base-delay-ms",
		"5",
	])
	.unwrap();
	config.validate().unwrap();

	AppState::build_with_engine(Arc::new(config), Arc::new(EchoEngine), CancellationToken::new()).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_transcribe_and_render_end_to_end() {
	let tmp = tempfile::tempdir().unwrap();
	let state = test_state(tmp.path());
	let scheduler = &state.jobs.scheduler;

	let info = scheduler.files().register(&wav_seconds(60), "audio/wav").await.unwrap();
	assert!((info.duration_secs - 60.0).abs() < 1e-9);

	let job_id = scheduler.submit_file(info.id, JobOptions::default()).unwrap();

	let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
	loop {
		let progress = scheduler.progress(job_id).unwrap();
		if progress.status.is_terminal() {
			assert_eq!(progress.status, JobStatus::Completed);
			assert_eq!(progress.progress, 100);
			assert_eq!(progress.total_chunks, 1);
			break;
		}
		assert!(tokio::time::Instant::now() < deadline, "job did not settle in time");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let transcript = scheduler.transcript(job_id).unwrap();
	assert_eq!(transcript.text, "the whole point");

	let srt = String::from_utf8(OutputFormat::Srt.render(&transcript).unwrap()).unwrap();
	assert!(srt.starts_with("1\n00:00:40,000 --> 00:00:42,000\nthe whole point\n"));

	let vtt = String::from_utf8(OutputFormat::Vtt.render(&transcript).unwrap()).unwrap();
	assert!(vtt.starts_with("WEBVTT\n\n00:00:40.000 --> 00:00:42.000\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_endpoint_path_reports_cancelled_status() {
	let tmp = tempfile::tempdir().unwrap();
	let state = test_state(tmp.path());
	let scheduler = &state.jobs.scheduler;

	// engine answers instantly, so cancel the job before it can start:
	// cancellation from queued is legal and must stick
	let info = scheduler.files().register(&wav_seconds(30), "audio/wav").await.unwrap();
	let job_id = scheduler.submit_file(info.id, JobOptions::default()).unwrap();

	if let Ok(progress) = scheduler.cancel(job_id) {
		assert_eq!(progress.status, JobStatus::Cancelled);
		assert_eq!(scheduler.progress(job_id).unwrap().status, JobStatus::Cancelled);
	} else {
		// lost the race to a fast completion; still terminal, never stuck
		assert!(scheduler.progress(job_id).unwrap().status.is_terminal());
	}
}
