use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Process-wide Prometheus surface, scraped at `/metrics`.
pub struct AppMetrics {
	registry: Registry,
	pub http_requests: IntCounter,
	pub ws_connections: IntGauge,
	pub jobs_submitted: IntCounter,
	pub sessions_started: IntCounter,
	pub frames_rejected: IntCounter,
}

impl AppMetrics {
	#[must_use]
	pub fn new() -> Self {
		let registry = Registry::new();
		let http_requests = IntCounter::new("http_requests_total", "Total HTTP requests received").unwrap();
		let ws_connections = IntGauge::new("ws_connections", "Currently open WebSocket connections").unwrap();
		let jobs_submitted = IntCounter::new("jobs_submitted_total", "File jobs admitted").unwrap();
		let sessions_started = IntCounter::new("sessions_started_total", "Streaming sessions started").unwrap();
		let frames_rejected = IntCounter::new("frames_rejected_total", "Session frames rejected for sequence violations").unwrap();

		registry.register(Box::new(http_requests.clone())).unwrap();
		registry.register(Box::new(ws_connections.clone())).unwrap();
		registry.register(Box::new(jobs_submitted.clone())).unwrap();
		registry.register(Box::new(sessions_started.clone())).unwrap();
		registry.register(Box::new(frames_rejected.clone())).unwrap();

		Self {
			registry,
			http_requests,
			ws_connections,
			jobs_submitted,
			sessions_started,
			frames_rejected,
		}
	}

	pub fn encode(&self) -> Result<String, prometheus::Error> {
		let mut buffer = Vec::new();
		TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
		Ok(String::from_utf8_lossy(&buffer).into_owned())
	}
}

impl Default for AppMetrics {
	fn default() -> Self {
		Self::new()
	}
}

pub async fn metrics_handler(State(metrics): State<Arc<AppMetrics>>) -> impl IntoResponse {
	match metrics.encode() {
		Ok(body) => (StatusCode::OK, [("Content-Type", "text/plain; version=0.0.4")], body).into_response(),
		Err(e) => {
			tracing::error!("Failed to gather metrics: {}", e);
			(StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics").into_response()
		}
	}
}
