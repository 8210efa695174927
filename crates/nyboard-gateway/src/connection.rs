use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::SinkExt;
use futures_util::stream::{SplitSink, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use nyboard_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

/// How often the server pings a gateway client and how many unanswered
/// pings in a row it tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub every: Duration,
    pub missed_limit: u8,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            every: Duration::from_secs(15),
            missed_limit: 2,
        }
    }
}

type Outbound = SplitSink<WebSocket, Message>;

/// Serve one gateway client until it disconnects or stops answering pings.
/// The gateway is read-only: anything the client sends besides pongs and
/// close frames is ignored.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, heartbeat: Heartbeat) {
    let (mut outbound, mut inbound) = socket.split();

    // Subscribe before Ready so no event between the two is lost.
    let events = dispatcher.subscribe();
    if !send_event(&mut outbound, &GatewayEvent::Ready).await {
        return;
    }

    info!("Gateway client connected ({} open)", dispatcher.connection_opened());

    let answered = Arc::new(AtomicBool::new(true));

    let mut push = tokio::spawn(push_events(outbound, events, answered.clone(), heartbeat));
    let mut listen = tokio::spawn(async move {
        while let Some(Ok(frame)) = inbound.next().await {
            match frame {
                Message::Pong(_) => answered.store(true, Ordering::Release),
                Message::Close(_) => break,
                other => debug!("Ignoring client frame: {:?}", other),
            }
        }
    });

    tokio::select! {
        _ = &mut push => listen.abort(),
        _ = &mut listen => push.abort(),
    }

    info!("Gateway client disconnected ({} open)", dispatcher.connection_closed());
}

/// Forward board events and keep the heartbeat going. Returns when the
/// socket fails, the dispatcher goes away, or the client stops answering.
async fn push_events(
    mut outbound: Outbound,
    mut events: broadcast::Receiver<GatewayEvent>,
    answered: Arc<AtomicBool>,
    heartbeat: Heartbeat,
) {
    let mut ping = tokio::time::interval(heartbeat.every);
    // The first tick fires immediately.
    ping.tick().await;
    let mut missed: u8 = 0;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if !send_event(&mut outbound, &event).await {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Gateway client fell {} events behind", skipped);
                }
                Err(RecvError::Closed) => return,
            },
            _ = ping.tick() => {
                if answered.swap(false, Ordering::Acquire) {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= heartbeat.missed_limit {
                        warn!("Gateway client missed {} pongs, dropping it", missed);
                        return;
                    }
                }
                if outbound.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// `false` once the socket is gone.
async fn send_event(outbound: &mut Outbound, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return true;
        }
    };
    outbound.send(Message::Text(text.into())).await.is_ok()
}
