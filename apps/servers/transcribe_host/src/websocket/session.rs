use crate::metrics::AppMetrics;
use dashmap::{DashMap, DashSet};
use engine_client::{EngineRequest, Transcriber};
use job_engine::EventBus;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use stream_events::{FinalMetadata, ServerEvent, SessionConfig, SessionStatus};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use transcript_core::Segment;
use uuid::Uuid;

const FRAME_INBOX_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SessionError {
	#[error("session {0} already exists")]
	AlreadyActive(Uuid),

	#[error("session id {0} was already used; ids are never reused")]
	IdReused(Uuid),

	#[error("session {0} not found")]
	NotFound(Uuid),

	#[error("unsupported audio format: {0} (expected pcm16)")]
	UnsupportedFormat(String),

	#[error("invalid session config: {0}")]
	InvalidConfig(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
	pub idle_timeout: Duration,
	pub window_secs: f64,
	pub engine_timeout: Duration,
}

/// Frame-sequencing rule: strictly increasing. Gaps are fine (networks
/// drop packets); going backwards or repeating is not.
#[derive(Debug, Default)]
pub struct SequenceGate {
	last: Option<u64>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SequenceViolation {
	pub last: u64,
	pub got: u64,
}

impl SequenceGate {
	pub fn accept(&mut self, sequence: u64) -> Result<(), SequenceViolation> {
		match self.last {
			Some(last) if sequence <= last => Err(SequenceViolation { last, got: sequence }),
			_ => {
				self.last = Some(sequence);
				Ok(())
			}
		}
	}

	#[must_use]
	pub const fn last(&self) -> Option<u64> {
		self.last
	}
}

enum SessionMsg {
	Frame { sequence: u64, data: Vec<u8> },
	Stop,
}

/// Live microphone sessions: one task and one inbox per session, strictly
/// sequential frame handling inside.
pub struct SessionManager {
	sessions: DashMap<Uuid, mpsc::Sender<SessionMsg>>,
	used_ids: DashSet<Uuid>,
	engine: Arc<dyn Transcriber>,
	events: EventBus,
	limits: SessionLimits,
	metrics: Arc<AppMetrics>,
	shutdown: CancellationToken,
}

impl SessionManager {
	#[must_use]
	pub fn new(engine: Arc<dyn Transcriber>, events: EventBus, limits: SessionLimits, metrics: Arc<AppMetrics>, shutdown: CancellationToken) -> Self {
		Self {
			sessions: DashMap::new(),
			used_ids: DashSet::new(),
			engine,
			events,
			limits,
			metrics,
			shutdown,
		}
	}

	/// `stream:start`: validate config, claim the id forever, spawn the
	/// session task, announce it.
	pub fn start(self: &Arc<Self>, id: Uuid, sample_rate: u32, channels: u16, format: &str) -> Result<SessionConfig, SessionError> {
		if !format.eq_ignore_ascii_case("pcm16") {
			return Err(SessionError::UnsupportedFormat(format.to_string()));
		}
		if !(1000..=48_000).contains(&sample_rate) {
			return Err(SessionError::InvalidConfig(format!("sample rate {sample_rate} out of range 1000..=48000")));
		}
		if !(1..=2).contains(&channels) {
			return Err(SessionError::InvalidConfig(format!("channel count {channels} out of range 1..=2")));
		}

		if self.sessions.contains_key(&id) {
			return Err(SessionError::AlreadyActive(id));
		}
		if !self.used_ids.insert(id) {
			return Err(SessionError::IdReused(id));
		}

		let config = SessionConfig { sample_rate, channels };
		let (tx, rx) = mpsc::channel(FRAME_INBOX_CAPACITY);
		self.sessions.insert(id, tx);

		self.metrics.sessions_started.inc();
		info!(session_id = %id, sample_rate, channels, "Streaming session started");
		self.events.publish(ServerEvent::StreamStarted { session_id: id, config });

		let manager = Arc::clone(self);
		let shutdown = self.shutdown.child_token();
		tokio::spawn(async move {
			let task = SessionTask::new(id, config, &manager);
			task.run(rx, shutdown).await;
			manager.sessions.remove(&id);
		});

		Ok(config)
	}

	/// `audio:chunk`: hand the frame to the session's inbox.
	pub async fn push_frame(&self, id: Uuid, sequence: u64, data: Vec<u8>) -> Result<(), SessionError> {
		let tx = self.sessions.get(&id).map(|entry| entry.clone()).ok_or(SessionError::NotFound(id))?;
		tx.send(SessionMsg::Frame { sequence, data }).await.map_err(|_| SessionError::NotFound(id))
	}

	/// `stream:stop`: ask the session to finalize; the task emits the
	/// final transcription on its way out.
	pub async fn stop(&self, id: Uuid) -> Result<(), SessionError> {
		let tx = self.sessions.get(&id).map(|entry| entry.clone()).ok_or(SessionError::NotFound(id))?;
		tx.send(SessionMsg::Stop).await.map_err(|_| SessionError::NotFound(id))
	}

	#[must_use]
	pub fn is_active(&self, id: Uuid) -> bool {
		self.sessions.contains_key(&id)
	}

	#[must_use]
	pub fn active_count(&self) -> usize {
		self.sessions.len()
	}
}

struct SessionTask {
	id: Uuid,
	config: SessionConfig,
	gate: SequenceGate,
	buffer: Vec<u8>,
	flushed_secs: f64,
	text: String,
	segments: Vec<Segment>,
	confidence_sum: f64,
	confidence_count: u64,
	frames_accepted: u64,
	frames_rejected: u64,
	engine: Arc<dyn Transcriber>,
	events: EventBus,
	limits: SessionLimits,
	metrics: Arc<AppMetrics>,
}

impl SessionTask {
	fn new(id: Uuid, config: SessionConfig, manager: &SessionManager) -> Self {
		Self {
			id,
			config,
			gate: SequenceGate::default(),
			buffer: Vec::new(),
			flushed_secs: 0.0,
			text: String::new(),
			segments: Vec::new(),
			confidence_sum: 0.0,
			confidence_count: 0,
			frames_accepted: 0,
			frames_rejected: 0,
			engine: Arc::clone(&manager.engine),
			events: manager.events.clone(),
			limits: manager.limits,
			metrics: Arc::clone(&manager.metrics),
		}
	}

	async fn run(mut self, mut rx: mpsc::Receiver<SessionMsg>, shutdown: CancellationToken) {
		let status = loop {
			tokio::select! {
				() = shutdown.cancelled() => break SessionStatus::Stopped,

				// no traffic at all within the window ends the session
				() = tokio::time::sleep(self.limits.idle_timeout) => {
					debug!(session_id = %self.id, idle_secs = self.limits.idle_timeout.as_secs(), "Session idle timeout");
					break SessionStatus::TimedOut;
				}

				received = rx.recv() => match received {
					None | Some(SessionMsg::Stop) => break SessionStatus::Stopped,
					Some(SessionMsg::Frame { sequence, data }) => self.handle_frame(sequence, data).await,
				}
			}
		};

		self.finalize(status).await;
	}

	async fn handle_frame(&mut self, sequence: u64, data: Vec<u8>) {
		match self.gate.accept(sequence) {
			Err(violation) => {
				self.frames_rejected += 1;
				self.metrics.frames_rejected.inc();
				debug!(session_id = %self.id, got = violation.got, last = violation.last, "Rejected out-of-order frame");
				// frame-level error; the session itself stays active
				self.events.publish(ServerEvent::StreamError {
					session_id: self.id,
					message: format!("frame {} rejected: sequence must increase past {}", violation.got, violation.last),
				});
			}
			Ok(()) => {
				self.frames_accepted += 1;
				self.buffer.extend_from_slice(&data);
				if self.buffered_secs() >= self.limits.window_secs {
					self.flush(sequence).await;
				}
			}
		}
	}

	fn buffered_secs(&self) -> f64 {
		let bytes_per_sec = f64::from(self.config.sample_rate) * f64::from(self.config.channels) * 2.0;
		self.buffer.len() as f64 / bytes_per_sec
	}

	fn cumulative_confidence(&self) -> f32 {
		if self.confidence_count == 0 {
			return 0.0;
		}
		#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
		let avg = (self.confidence_sum / self.confidence_count as f64) as f32;
		avg
	}

	/// Send the buffered window through the engine and emit a partial.
	async fn flush(&mut self, sequence: u64) {
		if self.buffer.is_empty() {
			return;
		}

		let pcm = std::mem::take(&mut self.buffer);
		let window_secs = pcm.len() as f64 / (f64::from(self.config.sample_rate) * f64::from(self.config.channels) * 2.0);
		let wav = pcm_to_wav(&pcm, self.config.sample_rate, self.config.channels);

		let request = EngineRequest {
			audio: wav.into(),
			format: "wav".to_string(),
			prompt: None,
			language: None,
		};

		match self.engine.transcribe(request, self.limits.engine_timeout).await {
			Ok(response) => {
				for segment in response.segments {
					self.confidence_sum += f64::from(segment.confidence);
					self.confidence_count += 1;
					self.segments.push(Segment {
						start: self.flushed_secs + segment.start,
						end: self.flushed_secs + segment.end,
						text: segment.text,
						confidence: segment.confidence,
					});
				}
				let trimmed = response.text.trim();
				if !trimmed.is_empty() {
					if !self.text.is_empty() {
						self.text.push(' ');
					}
					self.text.push_str(trimmed);
				}
				self.flushed_secs += window_secs;

				self.events.publish(ServerEvent::TranscriptionPartial {
					session_id: self.id,
					text: self.text.clone(),
					confidence: self.cumulative_confidence(),
					sequence_number: sequence,
				});
			}
			Err(e) => {
				// window is consumed either way; live audio cannot be replayed
				warn!(session_id = %self.id, error = %e, "Incremental transcription failed");
				self.flushed_secs += window_secs;
				self.events.publish(ServerEvent::StreamError {
					session_id: self.id,
					message: format!("incremental transcription failed: {e}"),
				});
			}
		}
	}

	async fn finalize(mut self, status: SessionStatus) {
		let last_sequence = self.gate.last().unwrap_or(0);
		self.flush(last_sequence).await;

		info!(
			session_id = %self.id,
			?status,
			frames_accepted = self.frames_accepted,
			frames_rejected = self.frames_rejected,
			audio_secs = self.flushed_secs,
			"Session finalized"
		);

		self.events.publish(ServerEvent::TranscriptionFinal {
			session_id: self.id,
			text: self.text,
			segments: self.segments,
			duration: self.flushed_secs,
			metadata: FinalMetadata {
				frames_accepted: self.frames_accepted,
				frames_rejected: self.frames_rejected,
				status,
			},
		});
	}
}

/// Wrap raw PCM16 into a WAV container the engine contract understands.
fn pcm_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
	let spec = hound::WavSpec {
		channels,
		sample_rate,
		bits_per_sample: 16,
		sample_format: hound::SampleFormat::Int,
	};
	let mut cursor = Cursor::new(Vec::new());
	{
		let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("in-memory wav writer");
		for sample in pcm.chunks_exact(2) {
			let value = i16::from_le_bytes([sample[0], sample[1]]);
			writer.write_sample(value).expect("in-memory wav write");
		}
		writer.finalize().expect("in-memory wav finalize");
	}
	cursor.into_inner()
}
