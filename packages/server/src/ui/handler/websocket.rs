//! WebSocket connection handlers.
//!
//! Both endpoints share one transport loop: frames from the socket drive the
//! session, strings queued on the session's channel are pushed back out. The
//! protocol itself lives entirely in the session types.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::ConnectionId,
    session::{ChatSession, MinigameControlSession, SessionHandler},
    ui::state::AppState,
};

pub async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let conn = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(
            conn.clone(),
            state.hub.clone(),
            state.chat_log.clone(),
            state.identity.clone(),
            state.online.clone(),
            state.clock.clone(),
            tx,
        );
        tracing::info!("Chat connection '{}' accepted", conn);
        run_session(socket, session, conn, rx).await;
    })
}

pub async fn ws_minigame_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let conn = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = MinigameControlSession::new(
            conn.clone(),
            state.hub.clone(),
            state.scheduler.clone(),
            tx,
        );
        tracing::info!("Minigame connection '{}' accepted", conn);
        run_session(socket, session, conn, rx).await;
    })
}

/// Spawns a task that receives messages from the rx channel and pushes them
/// to the WebSocket sender.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Drive a session until the socket closes, then run its disconnect hook.
///
/// The receive side runs inline so the session is dropped exactly once, with
/// `on_disconnect` guaranteed to have run first.
async fn run_session<S: SessionHandler>(
    socket: WebSocket,
    mut session: S,
    conn: ConnectionId,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();
    session.on_connect().await;
    let mut send_task = pusher_loop(rx, sender);

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("Received message from '{}': {}", conn, text.as_str());
                    session.on_message(text.as_str()).await;
                }
                Some(Ok(Message::Ping(_))) => {
                    tracing::debug!("Received ping from '{}'", conn);
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("Connection '{}' sent close", conn);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket error on '{}': {}", conn, e);
                    break;
                }
                None => break,
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    session.on_disconnect().await;
    tracing::info!("Connection '{}' disconnected", conn);
}
