use super::subscription::SubscriptionSet;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitStream, StreamExt};
use std::sync::{Arc, Mutex};
use stream_events::{decode_audio_payload, ClientEvent, ServerEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Drain one connection's inbound frames until it closes or the server
/// shuts down. Returns the number of messages handled.
pub(crate) async fn process_incoming_messages(
	mut receiver: SplitStream<WebSocket>,
	state: &AppState,
	subscriptions: &Arc<Mutex<SubscriptionSet>>,
	conn_id: u64,
	cancel: CancellationToken,
) -> u64 {
	let mut message_count = 0u64;

	loop {
		tokio::select! {
			() = cancel.cancelled() => {
				info!(conn_id, messages_processed = message_count, "Connection processing cancelled - shutting down");
				break;
			}

			result = receiver.next() => {
				match result {
					Some(Ok(message)) => {
						message_count += 1;
						if handle_message(message, state, subscriptions, conn_id).await.is_err() {
							break;
						}
					}
					Some(Err(e)) => {
						warn!(conn_id, error = %e, "WebSocket error");
						break;
					}
					None => {
						debug!(conn_id, "WebSocket stream ended");
						break;
					}
				}
			}
		}
	}

	message_count
}

async fn handle_message(message: Message, state: &AppState, subscriptions: &Arc<Mutex<SubscriptionSet>>, conn_id: u64) -> Result<(), ()> {
	match message {
		Message::Text(text) => {
			match serde_json::from_str::<ClientEvent>(&text) {
				Ok(event) => dispatch_event(event, state, subscriptions, conn_id).await,
				Err(e) => {
					// protocol noise, not a session error: nothing to route it to
					warn!(conn_id, error = %e, "Ignoring unparseable client frame");
				}
			}
			Ok(())
		}

		Message::Ping(_) | Message::Pong(_) => Ok(()),

		Message::Binary(data) => {
			debug!(conn_id, size_bytes = data.len(), "Ignoring binary frame");
			Ok(())
		}

		Message::Close(reason) => {
			let reason = reason.map_or_else(|| "no reason provided".to_string(), |f| format!("{}: {}", f.code, f.reason));
			info!(conn_id, reason = %reason, "Client closed connection");
			Err(())
		}
	}
}

async fn dispatch_event(event: ClientEvent, state: &AppState, subscriptions: &Arc<Mutex<SubscriptionSet>>, conn_id: u64) {
	match event {
		ClientEvent::StreamStart {
			session_id,
			sample_rate,
			channels,
			format,
		} => {
			// subscribe before starting so the opener cannot miss its own
			// stream:started frame
			subscribe(subscriptions, session_id);
			if let Err(e) = state.realtime.sessions.start(session_id, sample_rate, channels, &format) {
				warn!(conn_id, %session_id, error = %e, "stream:start rejected");
				state.realtime.events.publish(ServerEvent::StreamError {
					session_id,
					message: e.to_string(),
				});
			}
		}

		ClientEvent::AudioChunk {
			session_id,
			data,
			sequence_number,
		} => match decode_audio_payload(&data) {
			Ok(bytes) => {
				if let Err(e) = state.realtime.sessions.push_frame(session_id, sequence_number, bytes).await {
					state.realtime.events.publish(ServerEvent::StreamError {
						session_id,
						message: e.to_string(),
					});
				}
			}
			Err(e) => {
				state.realtime.events.publish(ServerEvent::StreamError {
					session_id,
					message: format!("frame {sequence_number} payload: {e}"),
				});
			}
		},

		ClientEvent::StreamStop { session_id } => {
			if let Err(e) = state.realtime.sessions.stop(session_id).await {
				debug!(conn_id, %session_id, error = %e, "stream:stop for unknown session");
			}
		}

		ClientEvent::JobSubscribe { job_id } => {
			let newly = subscribe(subscriptions, job_id);
			debug!(conn_id, topic = %job_id, newly, "Subscribed");
		}

		ClientEvent::JobUnsubscribe { job_id } => {
			if let Ok(mut subs) = subscriptions.lock() {
				subs.unsubscribe(&job_id);
			}
			debug!(conn_id, topic = %job_id, "Unsubscribed");
		}
	}
}

fn subscribe(subscriptions: &Arc<Mutex<SubscriptionSet>>, topic: Uuid) -> bool {
	subscriptions.lock().map(|mut subs| subs.subscribe(topic)).unwrap_or(false)
}
