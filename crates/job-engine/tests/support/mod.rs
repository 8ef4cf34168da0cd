#![allow(dead_code)]

use async_trait::async_trait;
use engine_client::{EngineError, EngineRequest, EngineResponse, EngineResponseMetadata, EngineSegment, Transcriber};
use job_engine::{CleanupService, DiskProbe, EventBus, FileStore, JobRegistry, JobScheduler, SchedulerConfig};
use rand::Rng;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type FailRule = Box<dyn Fn(&EngineRequest, usize) -> Option<EngineError> + Send + Sync>;

/// Scriptable engine stand-in. Tracks call and concurrency counters so
/// tests can assert pool behavior from the outside.
pub struct MockEngine {
	pub delay_ms: (u64, u64),
	pub calls: AtomicUsize,
	pub max_concurrent: AtomicUsize,
	concurrent: AtomicUsize,
	fail_rule: Option<FailRule>,
}

impl MockEngine {
	pub fn ok() -> Self {
		Self::with_delay(1, 5)
	}

	pub fn with_delay(lo_ms: u64, hi_ms: u64) -> Self {
		Self {
			delay_ms: (lo_ms, hi_ms),
			calls: AtomicUsize::new(0),
			max_concurrent: AtomicUsize::new(0),
			concurrent: AtomicUsize::new(0),
			fail_rule: None,
		}
	}

	pub fn failing(mut self, rule: FailRule) -> Self {
		self.fail_rule = Some(rule);
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn max_observed(&self) -> usize {
		self.max_concurrent.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Transcriber for MockEngine {
	async fn transcribe(&self, request: EngineRequest, _timeout: Duration) -> Result<EngineResponse, EngineError> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);
		let now_running = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_concurrent.fetch_max(now_running, Ordering::SeqCst);

		let delay = {
			let (lo, hi) = self.delay_ms;
			if hi > lo {
				rand::rng().random_range(lo..hi)
			} else {
				lo
			}
		};
		tokio::time::sleep(Duration::from_millis(delay)).await;

		self.concurrent.fetch_sub(1, Ordering::SeqCst);

		if let Some(rule) = &self.fail_rule {
			if let Some(error) = rule(&request, call) {
				return Err(error);
			}
		}

		let duration = audio_secs(&request);
		// segment parked late in the window so it survives overlap trimming
		let start = (duration * 0.6).max(0.0);
		Ok(EngineResponse {
			text: format!("speech {call}"),
			segments: vec![EngineSegment {
				start,
				end: duration.max(start + 0.1),
				text: format!("speech {call}"),
				confidence: 0.9,
			}],
			language: Some("en".to_string()),
			metadata: EngineResponseMetadata { processing_time_ms: delay },
		})
	}
}

/// Duration of the request's WAV payload, for duration-keyed fail rules.
pub fn audio_secs(request: &EngineRequest) -> f64 {
	job_engine::audio::probe_wav(&request.audio).map(|info| info.duration_secs).unwrap_or(0.0)
}

/// Mono 16-bit PCM at 1 kHz: cheap to generate, exact durations.
pub fn wav_seconds(seconds: u32) -> Vec<u8> {
	let spec = hound::WavSpec {
		channels: 1,
		sample_rate: 1000,
		bits_per_sample: 16,
		sample_format: hound::SampleFormat::Int,
	};
	let mut cursor = Cursor::new(Vec::new());
	{
		let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
		for i in 0..(1000 * seconds) {
			#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
			writer.write_sample((i % 100) as i16).unwrap();
		}
		writer.finalize().unwrap();
	}
	cursor.into_inner()
}

pub struct Harness {
	pub scheduler: Arc<JobScheduler>,
	pub registry: Arc<JobRegistry>,
	pub files: Arc<FileStore>,
	pub cleanup: Arc<CleanupService>,
	pub events: EventBus,
	pub engine: Arc<MockEngine>,
	_tmp: tempfile::TempDir,
}

pub fn build_harness(engine: MockEngine) -> Harness {
	build_harness_with(engine, |_| {}, Arc::new(|_| u64::MAX))
}

pub fn build_harness_with(engine: MockEngine, tweak: impl FnOnce(&mut SchedulerConfig), probe: DiskProbe) -> Harness {
	let tmp = tempfile::tempdir().unwrap();
	let mut config = SchedulerConfig::test(tmp.path().to_path_buf());
	tweak(&mut config);

	let registry = Arc::new(JobRegistry::new());
	let files = Arc::new(FileStore::new(config.temp_dir.join("uploads"), config.max_file_bytes).unwrap());
	let cleanup = Arc::new(CleanupService::new(
		Arc::clone(&registry),
		Arc::clone(&files),
		config.cleanup_grace(),
		Duration::from_secs(config.cleanup_interval_secs),
		config.min_free_disk_bytes,
		probe,
	));
	let events = EventBus::new(4096);
	let engine = Arc::new(engine);

	let scheduler = Arc::new(JobScheduler::new(
		config,
		Arc::clone(&registry),
		Arc::clone(&files),
		Arc::clone(&engine) as Arc<dyn Transcriber>,
		events.clone(),
		Arc::clone(&cleanup),
		CancellationToken::new(),
	));

	Harness {
		scheduler,
		registry,
		files,
		cleanup,
		events,
		engine,
		_tmp: tmp,
	}
}

pub async fn upload(harness: &Harness, seconds: u32) -> Uuid {
	harness.files.register(&wav_seconds(seconds), "audio/wav").await.unwrap().id
}

/// Poll until `condition` holds or the deadline passes.
pub async fn wait_until(what: &str, timeout: Duration, mut condition: impl FnMut() -> bool) {
	let deadline = tokio::time::Instant::now() + timeout;
	while !condition() {
		assert!(tokio::time::Instant::now() < deadline, "timed out waiting for: {what}");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

pub fn terminal_rule_for_duration(target_secs: f64) -> FailRule {
	Box::new(move |request, _| {
		if (audio_secs(request) - target_secs).abs() < 0.5 {
			Some(EngineError::Terminal("unsupported content".to_string()))
		} else {
			None
		}
	})
}
