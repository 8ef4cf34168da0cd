use crate::handlers::jobs as handlers;
use crate::AppState;
use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;

pub fn job_routes<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new()
		.route("/job/:id/progress", get(handlers::job_progress))
		.route("/job/:id/cancel", post(handlers::cancel_job))
		.route("/job/:id/transcript", get(handlers::job_transcript))
		.route("/batch/:id/progress", get(handlers::batch_progress))
}
