use engine_client::{HttpEngineClient, Transcriber};
use job_engine::{system_disk_probe, CleanupService, EventBus, FileStore, JobRegistry, JobScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod websocket;

pub use config::Config;
pub use error::ApiError;
pub use metrics::AppMetrics;
pub use websocket::{SessionLimits, SessionManager};

use axum::extract::FromRef;

/// Core: process-wide context that everything hangs off
#[derive(Clone)]
pub struct CoreContext {
	pub config: Arc<Config>,
	pub cancel_token: CancellationToken,
	pub metrics: Arc<AppMetrics>,
}

/// Jobs: the file-transcription pipeline
#[derive(Clone)]
pub struct JobContext {
	pub scheduler: Arc<JobScheduler>,
	pub cleanup: Arc<CleanupService>,
}

/// Realtime: streaming sessions and the progress fan-out
#[derive(Clone)]
pub struct RealtimeContext {
	pub events: EventBus,
	pub sessions: Arc<SessionManager>,
}

#[derive(Clone)]
pub struct AppState {
	pub core: CoreContext,
	pub jobs: JobContext,
	pub realtime: RealtimeContext,
}

impl AppState {
	/// Build the entire universe in one explicit place.
	pub fn build(config: Arc<Config>, cancel_token: CancellationToken) -> anyhow::Result<Self> {
		let engine: Arc<dyn Transcriber> = Arc::new(HttpEngineClient::new(&config.engine_url)?);
		Self::build_with_engine(config, engine, cancel_token)
	}

	/// Same wiring with an injected engine; tests hand in a scripted one.
	pub fn build_with_engine(config: Arc<Config>, engine: Arc<dyn Transcriber>, cancel_token: CancellationToken) -> anyhow::Result<Self> {
		let metrics = Arc::new(AppMetrics::new());
		let events = EventBus::new(config.events_capacity);

		let registry = Arc::new(JobRegistry::new());
		let files = Arc::new(FileStore::new(config.scheduler.temp_dir.join("uploads"), config.scheduler.max_file_bytes)?);
		let cleanup = Arc::new(CleanupService::new(
			Arc::clone(&registry),
			Arc::clone(&files),
			config.scheduler.cleanup_grace(),
			Duration::from_secs(config.scheduler.cleanup_interval_secs),
			config.scheduler.min_free_disk_bytes,
			system_disk_probe(),
		));

		let scheduler = Arc::new(JobScheduler::new(
			config.scheduler.clone(),
			registry,
			files,
			Arc::clone(&engine),
			events.clone(),
			Arc::clone(&cleanup),
			cancel_token.clone(),
		));

		let sessions = Arc::new(SessionManager::new(
			engine,
			events.clone(),
			SessionLimits {
				idle_timeout: config.session_idle_timeout(),
				window_secs: config.session_window_secs,
				engine_timeout: config.scheduler.chunk_timeout(),
			},
			Arc::clone(&metrics),
			cancel_token.clone(),
		));

		Ok(Self {
			core: CoreContext {
				config,
				cancel_token,
				metrics,
			},
			jobs: JobContext { scheduler, cleanup },
			realtime: RealtimeContext { events, sessions },
		})
	}
}

impl FromRef<AppState> for Arc<Config> {
	fn from_ref(state: &AppState) -> Self {
		state.core.config.clone()
	}
}

impl FromRef<AppState> for Arc<AppMetrics> {
	fn from_ref(state: &AppState) -> Self {
		state.core.metrics.clone()
	}
}

impl FromRef<AppState> for Arc<JobScheduler> {
	fn from_ref(state: &AppState) -> Self {
		state.jobs.scheduler.clone()
	}
}

impl FromRef<AppState> for Arc<SessionManager> {
	fn from_ref(state: &AppState) -> Self {
		state.realtime.sessions.clone()
	}
}

impl FromRef<AppState> for EventBus {
	fn from_ref(state: &AppState) -> Self {
		state.realtime.events.clone()
	}
}

impl FromRef<AppState> for CancellationToken {
	fn from_ref(state: &AppState) -> Self {
		state.core.cancel_token.clone()
	}
}
