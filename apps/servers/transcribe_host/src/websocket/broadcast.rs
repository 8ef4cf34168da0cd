use super::subscription::SubscriptionSet;
use axum::extract::ws::{Message, WebSocket};
use futures::sink::SinkExt;
use futures::stream::SplitSink;
use std::sync::{Arc, Mutex};
use stream_events::ServerEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pump bus events into one connection, filtered by its subscription set.
///
/// Events are forwarded in bus order; a subscriber that falls behind loses
/// oldest events (logged) rather than stalling the bus for everyone else.
pub(crate) fn spawn_event_forwarder(
	mut sink: SplitSink<WebSocket, Message>,
	mut events: broadcast::Receiver<ServerEvent>,
	subscriptions: Arc<Mutex<SubscriptionSet>>,
	conn_id: u64,
	cancel: CancellationToken,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			tokio::select! {
				() = cancel.cancelled() => {
					debug!(conn_id, "Event forwarder cancelled");
					break;
				}

				received = events.recv() => match received {
					Ok(event) => {
						let wanted = subscriptions.lock().map(|subs| subs.contains(&event.topic())).unwrap_or(false);
						if !wanted {
							continue;
						}

						let frame = match serde_json::to_string(&event) {
							Ok(json) => json,
							Err(e) => {
								warn!(conn_id, error = %e, "Dropping unserializable event");
								continue;
							}
						};

						if sink.send(Message::Text(frame)).await.is_err() {
							debug!(conn_id, "Connection sink closed; forwarder exiting");
							break;
						}
					}
					Err(broadcast::error::RecvError::Lagged(missed)) => {
						warn!(conn_id, missed, "Subscriber lagged; events dropped");
					}
					Err(broadcast::error::RecvError::Closed) => {
						debug!(conn_id, "Event bus closed; forwarder exiting");
						break;
					}
				}
			}
		}
	})
}
