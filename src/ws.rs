//! WebSocket upgrade and per-connection handler.
//!
//! On connect a subscriber is registered with the broadcaster, receives its
//! one-time `vm-info` handshake, and from then on gets a `stats` +
//! `processes` frame pair for every published tick until it disconnects.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::aggregate::build_identity;
use crate::broadcast::Subscription;
use crate::source::MetricSource;
use crate::state::AppState;
use crate::types::Event;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    // Subscribe before the handshake so no tick published in the meantime
    // is missed.
    let sub = state.broadcaster.join();
    let (mut sink, stream) = socket.split();

    send_onboarding(&mut sink, state.source.as_ref(), sub.id()).await;
    forward_ticks(sink, stream, sub).await;
}

/// One-shot identity handshake. A failed identity query means no `vm-info`
/// frame for this connection; the subscriber keeps its periodic feed.
async fn send_onboarding(
    sink: &mut SplitSink<WebSocket, Message>,
    source: &dyn MetricSource,
    subscriber: u64,
) {
    let (os, interfaces) = tokio::join!(source.os_info(), source.network_interfaces());
    match (os, interfaces) {
        (Ok(os), Ok(interfaces)) => {
            let identity = build_identity(os, &interfaces);
            if send_event(sink, &Event::VmInfo(&identity)).await.is_err() {
                debug!(subscriber, "socket closed during onboarding");
            }
        }
        (Err(err), _) | (_, Err(err)) => {
            warn!(subscriber, %err, "identity query failed, skipping vm-info");
        }
    }
}

async fn forward_ticks(
    mut sink: SplitSink<WebSocket, Message>,
    mut stream: SplitStream<WebSocket>,
    mut sub: Subscription,
) {
    loop {
        tokio::select! {
            tick = sub.next_tick() => {
                let Some(tick) = tick else { break };
                if send_event(&mut sink, &Event::Stats(&tick.stats)).await.is_err() {
                    break;
                }
                if send_event(&mut sink, &Event::Processes(&tick.processes)).await.is_err() {
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames carry no commands; drain and ignore.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!(subscriber = sub.id(), "connection closed");
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &Event<'_>,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sink.send(Message::Text(json)).await,
        Err(err) => {
            warn!(%err, "event serialization failed");
            Ok(())
        }
    }
}
