//! Raw line-delimited JSON over TCP: the `socket` reporter type.

use super::{build_init_frame, build_update_frame, SessionSet, SESSION_QUEUE_CAPACITY};
use crate::error::{MqguardError, Result};
use crate::reporting::Reporter;
use crate::supervisor::RegistryEvent;
use crate::track::DeviceReport;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Streams newline-delimited JSON frames to any TCP client that connects.
pub struct SocketReporter {
    listen_address: String,
    sessions: Arc<SessionSet>,
    registry_events: mpsc::Sender<RegistryEvent>,
    shutdown: CancellationToken,
}

impl SocketReporter {
    pub fn new(listen_address: impl Into<String>, registry_events: mpsc::Sender<RegistryEvent>) -> Self {
        SocketReporter {
            listen_address: listen_address.into(),
            sessions: Arc::new(SessionSet::new()),
            registry_events,
            shutdown: CancellationToken::new(),
        }
    }

    async fn accept_loop(listen_address: String, sessions: Arc<SessionSet>, registry_events: mpsc::Sender<RegistryEvent>, shutdown: CancellationToken) {
        let listener = match TcpListener::bind(&listen_address).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, address = %listen_address, "socket reporter failed to bind, not starting");
                return;
            }
        };
        info!(address = %listen_address, "socket reporter listening");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("socket reporter acceptor stopping");
                    return;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "socket reporter session accepted");
                            sessions.spawn(run_session(stream, sessions.clone(), registry_events.clone()));
                        }
                        Err(err) => {
                            warn!(error = %err, "socket reporter accept failed");
                        }
                    }
                }
            }
        }
    }
}

async fn run_session(mut stream: tokio::net::TcpStream, sessions: Arc<SessionSet>, registry_events: mpsc::Sender<RegistryEvent>) {
    let (reply_tx, reply_rx) = oneshot::channel();
    if registry_events.send(RegistryEvent::Snapshot(reply_tx)).await.is_err() {
        return;
    }
    let Ok(snapshot) = reply_rx.await else { return };
    let Ok(init_frame) = build_init_frame(&snapshot) else { return };
    if stream.write_all(init_frame.as_bytes()).await.is_err() || stream.write_all(b"\n").await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
    let id = sessions.insert(tx);
    let mut discard = [0u8; 256];
    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(frame) => {
                        if stream.write_all(frame.as_bytes()).await.is_err() || stream.write_all(b"\n").await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            read = stream.read(&mut discard) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
    sessions.remove(id);
}

#[async_trait]
impl Reporter for SocketReporter {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn report(&self, report: &DeviceReport) -> Result<()> {
        if let Some(frame) = build_update_frame(report) {
            let frame = frame.map_err(MqguardError::from)?;
            self.sessions.broadcast(frame);
        }
        Ok(())
    }

    fn start(&self) {
        tokio::spawn(Self::accept_loop(
            self.listen_address.clone(),
            self.sessions.clone(),
            self.registry_events.clone(),
            self.shutdown.clone(),
        ));
    }

    fn stop(&self) {
        self.shutdown.cancel();
        self.sessions.close_all();
    }

    async fn join(&self) {
        self.sessions.join().await;
    }
}
