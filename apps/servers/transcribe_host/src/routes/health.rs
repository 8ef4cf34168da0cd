use crate::handlers::health as handlers;
use crate::AppState;
use axum::extract::FromRef;
use axum::routing::get;
use axum::Router;

pub fn get_health<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new().route("/health", get(handlers::health))
}
