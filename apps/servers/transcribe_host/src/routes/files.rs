use crate::handlers::files as handlers;
use crate::AppState;
use axum::extract::FromRef;
use axum::routing::post;
use axum::Router;

pub fn post_files<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new().route("/files", post(handlers::upload_audio))
}
