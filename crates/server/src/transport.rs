//! WebSocket transport.
//!
//! Each socket gets a connection id from the [`Hub`], a seat from the
//! coordinator and a writer task draining its outbound queue. Incoming text
//! frames go straight to [`Coordinator::handle_frame`] under the shared lock.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use rookery_rules::ChessEngine;
use rookery_wire::{ServerMessage, encode_server};
use tokio::sync::{Mutex, mpsc};

use crate::Coordinator;
use crate::channel::Hub;

/// The one game served by this process.
pub type SharedCoordinator = Arc<Mutex<Coordinator<ChessEngine, Hub>>>;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: SharedCoordinator,
}

impl AppState {
    pub fn new(coordinator: SharedCoordinator) -> Self {
        Self { coordinator }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut queue) = mpsc::unbounded_channel::<ServerMessage>();

    let connection = {
        let mut coordinator = state.coordinator.lock().await;
        let connection = coordinator.channel_mut().register(outbox);
        coordinator.connect(connection);
        connection
    };

    // Ends once the hub drops the sender or the socket stops accepting.
    let writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let text = match encode_server(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(connection, error = %e, "failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(connection, error = %e, "socket read failed");
                break;
            }
        };
        match frame {
            Message::Text(text) => {
                let mut coordinator = state.coordinator.lock().await;
                coordinator.handle_frame(connection, text.as_str());
            }
            Message::Binary(_) => {
                tracing::debug!(connection, "binary frame refused");
                state.coordinator.lock().await.reject_frame(connection);
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    {
        let mut coordinator = state.coordinator.lock().await;
        coordinator.channel_mut().unregister(connection);
        coordinator.disconnect(connection);
    }
    if let Err(e) = writer.await {
        tracing::warn!(connection, error = %e, "writer task failed");
    }
    tracing::debug!(connection, "connection closed");
}
