use crate::handlers::transcribe as handlers;
use crate::AppState;
use axum::extract::FromRef;
use axum::routing::post;
use axum::Router;

pub fn post_transcribe<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new()
		.route("/transcribe/file", post(handlers::transcribe_file))
		.route("/transcribe/batch", post(handlers::transcribe_batch))
}
