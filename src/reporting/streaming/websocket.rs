//! `axum` WebSocket transport: the `websocket` reporter type.

use super::{build_init_frame, build_update_frame, SessionSet, SESSION_QUEUE_CAPACITY};
use crate::error::{MqguardError, Result};
use crate::reporting::Reporter;
use crate::supervisor::RegistryEvent;
use crate::track::DeviceReport;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionSet>,
    registry_events: mpsc::Sender<RegistryEvent>,
}

/// Streams JSON frames over `/feed` to any WebSocket client that connects.
pub struct WebsocketReporter {
    listen_address: String,
    sessions: Arc<SessionSet>,
    registry_events: mpsc::Sender<RegistryEvent>,
    shutdown: CancellationToken,
}

impl WebsocketReporter {
    pub fn new(listen_address: impl Into<String>, registry_events: mpsc::Sender<RegistryEvent>) -> Self {
        WebsocketReporter {
            listen_address: listen_address.into(),
            sessions: Arc::new(SessionSet::new()),
            registry_events,
            shutdown: CancellationToken::new(),
        }
    }

    async fn serve(listen_address: String, state: AppState, shutdown: CancellationToken) {
        let app = Router::new().route("/feed", get(upgrade)).with_state(state);
        let listener = match TcpListener::bind(&listen_address).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, address = %listen_address, "websocket reporter failed to bind, not starting");
                return;
            }
        };
        info!(address = %listen_address, "websocket reporter listening");
        let serve_result = axum::serve(listener, app).with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            debug!("websocket reporter shutting down");
        });
        if let Err(err) = serve_result.await {
            warn!(error = %err, "websocket reporter server exited with an error");
        }
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let tasks = state.sessions.clone();
    ws.on_upgrade(move |socket| tasks.track_future(handle_socket(socket, state)))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (reply_tx, reply_rx) = oneshot::channel();
    if state.registry_events.send(RegistryEvent::Snapshot(reply_tx)).await.is_err() {
        return;
    }
    let Ok(snapshot) = reply_rx.await else { return };
    let Ok(init_frame) = build_init_frame(&snapshot) else { return };

    let (mut sender, mut receiver) = socket.split();
    if sender.send(Message::Text(init_frame)).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
    let id = state.sessions.insert(tx);

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(frame) => {
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    state.sessions.remove(id);
}

#[async_trait]
impl Reporter for WebsocketReporter {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn report(&self, report: &DeviceReport) -> Result<()> {
        if let Some(frame) = build_update_frame(report) {
            let frame = frame.map_err(MqguardError::from)?;
            self.sessions.broadcast(frame);
        }
        Ok(())
    }

    fn start(&self) {
        let state = AppState {
            sessions: self.sessions.clone(),
            registry_events: self.registry_events.clone(),
        };
        tokio::spawn(Self::serve(self.listen_address.clone(), state, self.shutdown.clone()));
    }

    fn stop(&self) {
        self.shutdown.cancel();
        self.sessions.close_all();
    }

    async fn join(&self) {
        self.sessions.join().await;
    }
}
