//! WebSocket console feed.
//!
//! Every log entry a session appends is broadcast to connected clients, so a
//! browser front end can render the console without polling. Clients receive
//! a `connected` event carrying the full session snapshot first, followed by
//! `log` and `state` events as the game progresses.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the session snapshot
//! - `log` - A console entry was appended
//! - `state` - Level, score or phase changed

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::event_log::LogEntry;
use crate::session::{Phase, SessionSnapshot};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session as it is right now.
    pub state: SessionSnapshot,
}

/// Payload for the `log` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    /// The appended entry.
    pub entry: LogEntry,
}

/// Payload for the `state` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    /// Current level index.
    pub level: usize,
    /// Cumulative score.
    pub score: u32,
    /// Consecutive failed runs.
    pub failures: u32,
    /// Current phase.
    pub phase: Phase,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events streamed to console clients.
///
/// Serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum KitchenEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent for every appended log entry.
    Log(LogPayload),
    /// Sent after a command changed level, score, failures or phase.
    State(StatePayload),
}

impl KitchenEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(state: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { state })
    }

    /// Creates a `Log` event.
    #[must_use]
    pub const fn log(entry: LogEntry) -> Self {
        Self::Log(LogPayload { entry })
    }

    /// Creates a `State` event.
    #[must_use]
    pub const fn state(level: usize, score: u32, failures: u32, phase: Phase) -> Self {
        Self::State(StatePayload {
            level,
            score,
            failures,
            phase,
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Log(_) => "log",
            Self::State(_) => "state",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Events buffered per subscriber by [`EventBroadcaster::default`].
pub const CONSOLE_BUFFER: usize = 256;

/// Fans kitchen events out to every console subscriber.
///
/// Nothing is replayed: a client that connects late starts from the
/// `connected` snapshot.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<KitchenEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives `Lagged` and misses events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<KitchenEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event; returns how many subscribers will see it.
    pub fn send(&self, event: KitchenEvent) -> usize {
        // No subscribers is a normal state
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(CONSOLE_BUFFER)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between server pings.
const HEARTBEAT: Duration = Duration::from_secs(30);

/// Pings a client may leave unanswered before it is dropped.
const MAX_MISSED_PONGS: u8 = 3;

type Outgoing = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler for `GET /api/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("Console upgrade requested");
    ws.on_upgrade(move |socket| stream_console(socket, state))
}

/// Serializes `event` and sends it as a text frame.
///
/// Returns `false` once the client is gone.
async fn push(outgoing: &mut Outgoing, event: &KitchenEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => outgoing.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!(event = event.event_name(), error = %e, "Dropping unserializable event");
            true
        }
    }
}

/// Streams the console to one client until it leaves.
///
/// The snapshot goes out first; every broadcast event follows in order.
/// Frames from the client other than control frames are ignored, since
/// commands arrive over HTTP.
async fn stream_console(socket: WebSocket, state: Arc<AppState>) {
    let (mut outgoing, mut incoming) = socket.split();

    // Subscribe before taking the snapshot so no entry falls in between
    let mut feed = state.runtime.subscribe();
    let snapshot = state.runtime.snapshot().await;
    if !push(&mut outgoing, &KitchenEvent::connected(snapshot)).await {
        return;
    }
    info!("Console client attached");

    let mut heartbeat = interval(HEARTBEAT);
    let mut unanswered = 0u8;

    let reason = loop {
        tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(Message::Pong(_))) => unanswered = 0,
                Some(Ok(Message::Ping(payload))) => {
                    if outgoing.send(Message::Pong(payload)).await.is_err() {
                        break "send failed";
                    }
                }
                Some(Ok(Message::Close(_))) | None => break "client closed",
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Console socket error");
                    break "socket error";
                }
            },

            received = feed.recv() => match received {
                Ok(event) => {
                    if !push(&mut outgoing, &event).await {
                        break "send failed";
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Console client fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break "runtime stopped",
            },

            _ = heartbeat.tick() => {
                if unanswered >= MAX_MISSED_PONGS {
                    break "heartbeat timeout";
                }
                if outgoing.send(Message::Ping(Vec::new())).await.is_err() {
                    break "send failed";
                }
                unanswered += 1;
            }
        }
    };

    info!(reason, "Console client detached");
}

// ============================================================================
// Tests
// ============================================================================
