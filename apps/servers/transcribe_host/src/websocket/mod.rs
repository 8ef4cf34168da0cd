use crate::AppState;
use axum::{
	extract::{
		ws::{WebSocket, WebSocketUpgrade},
		FromRef, State,
	},
	response::IntoResponse,
	routing::get,
	Router,
};
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

pub mod broadcast;
pub mod message;
pub mod session;
pub mod subscription;

pub use session::{SessionError, SessionLimits, SessionManager};
pub use subscription::SubscriptionSet;

use broadcast::spawn_event_forwarder;
use message::process_incoming_messages;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn router<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new().route("/ws", get(websocket_handler))
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
	ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection: a forwarder task pushing filtered bus events out, and
/// this task pulling client events in. No callbacks anywhere; both sides
/// are plain channel loops.
async fn handle_socket(socket: WebSocket, state: AppState) {
	let conn_id = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
	let (sender, receiver) = socket.split();

	state.core.metrics.ws_connections.inc();
	info!(conn_id, "WebSocket connection established");

	let subscriptions = Arc::new(Mutex::new(SubscriptionSet::new()));
	let events_rx = state.realtime.events.subscribe();
	let cancel = state.core.cancel_token.child_token();

	let forward_task = spawn_event_forwarder(sender, events_rx, Arc::clone(&subscriptions), conn_id, cancel.clone());

	let message_count = process_incoming_messages(receiver, &state, &subscriptions, conn_id, cancel).await;

	forward_task.abort();
	state.core.metrics.ws_connections.dec();
	info!(conn_id, messages_processed = message_count, "WebSocket connection closed");
}
