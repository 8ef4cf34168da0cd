use anyhow::Result;
use axum::{error_handling::HandleErrorLayer, middleware, routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, time::Duration};
use tokio_util::sync::CancellationToken;
use tower::{limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use transcribe_host::routes::{files::post_files, health::get_health, jobs::job_routes, transcribe::post_transcribe};
use transcribe_host::{metrics, websocket, ApiError, AppState, Config};
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, util::SubscriberInitExt, Layer};

async fn handle_tower_error(error: BoxError) -> ApiError {
	if error.is::<tower::timeout::error::Elapsed>() {
		tracing::warn!("Request timeout: {}", error);
		ApiError::RequestTimeout
	} else if error.is::<tower::load_shed::error::Overloaded>() {
		tracing::warn!("Service overloaded: {}", error);
		ApiError::ServiceOverloaded
	} else {
		tracing::error!("Unhandled tower error: {}", error);
		ApiError::TowerError(error)
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();
	let config = Config::parse();
	config.validate().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

	let _ = init_tracing(&config);

	let config = Arc::new(config);
	let shutdown_token = CancellationToken::new();

	let app_state = AppState::build(config.clone(), shutdown_token.clone())?;

	// Background sweeper: periodic reclaim + disk-pressure refresh
	let sweeper = Arc::clone(&app_state.jobs.cleanup);
	tokio::spawn(sweeper.run(shutdown_token.child_token()));

	let api_routes = Router::new().merge(post_files()).merge(post_transcribe()).merge(job_routes()).merge(get_health());

	let public_routes = Router::new().route("/metrics", get(metrics::metrics_handler));

	let app = Router::new().merge(api_routes).merge(public_routes).merge(websocket::router()).with_state(app_state.clone());

	let app = app.layer(
		ServiceBuilder::new()
			.layer(middleware::from_fn_with_state(app_state.clone(), track_requests))
			.layer(HandleErrorLayer::new(|error: BoxError| async move { handle_tower_error(error).await }))
			.layer(RequestBodyLimitLayer::new(config.max_request_size * 1024 * 1024))
			.layer(ConcurrencyLimitLayer::new(config.max_concurrent_req))
			.layer(TimeoutLayer::new(config.request_timeout()))
			.layer(LoadShedLayer::new()),
	);

	let listener = TcpListener::bind(&config.bind_addr).await?;
	tracing::info!("listening on {}", listener.local_addr()?);

	// Signal handler flips the shared token; everything else follows it
	let signal_shutdown_token = shutdown_token.clone();
	tokio::spawn(async move {
		tokio::signal::ctrl_c().await.ok();
		tracing::info!("Received Ctrl+C, initiating shutdown...");
		signal_shutdown_token.cancel();
	});

	let server_token = shutdown_token.clone();
	let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).with_graceful_shutdown(async move {
		server_token.cancelled().await;
	});

	server.await?;
	tracing::info!("Server stopped");

	tracing::info!("Starting cleanup...");
	let cleanup = async {
		// one last sweep so terminal jobs leave nothing behind
		app_state.jobs.cleanup.sweep();
		tracing::info!("Final cleanup sweep complete");
	};

	match tokio::time::timeout(Duration::from_secs(5), cleanup).await {
		Ok(()) => tracing::info!("Graceful shutdown completed"),
		Err(_) => {
			tracing::error!("Shutdown timeout - forcing exit");
		}
	}

	tracing::info!("Shutdown complete");
	Ok(())
}

async fn track_requests(
	axum::extract::State(state): axum::extract::State<AppState>,
	request: axum::extract::Request,
	next: axum::middleware::Next,
) -> axum::response::Response {
	state.core.metrics.http_requests.inc();
	next.run(request).await
}

#[must_use]
pub fn init_tracing(config: &Config) -> Option<()> {
	use std::str::FromStr;
	use tracing_subscriber::layer::SubscriberExt;

	let filter = EnvFilter::from_str(config.rust_log.as_deref().unwrap_or("info")).ok()?;

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(
				tracing_subscriber::fmt::layer()
					.event_format(tracing_subscriber::fmt::format().pretty())
					.with_filter(filter),
			)
		})
		.init();
	None
}
