//! Per-broker MQTT client: turns `rumqttc` wire traffic into ingress events
//! for the registry mailbox, and reconnects with backoff on disconnect.

use crate::error::{MqguardError, Result};
use crate::identifier::{BrokerDescriptor, DataIdentifier};
use crate::supervisor::RegistryEvent;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reconnection backoff: doubles on every consecutive failure, capped, reset
/// on the first successful packet after a reconnect.
#[derive(Clone, Copy)]
struct Backoff {
    delay: Duration,
    max: Duration,
}

impl Backoff {
    fn new() -> Self {
        Backoff {
            delay: Duration::from_millis(500),
            max: Duration::from_secs(60),
        }
    }

    fn reset(&mut self) {
        self.delay = Duration::from_millis(500);
    }

    async fn wait_and_grow(&mut self) {
        tokio::time::sleep(self.delay).await;
        self.delay = (self.delay * 2).min(self.max);
    }
}

/// Runs a single broker's client loop until `shutdown` is cancelled.
///
/// Every decoded publish is forwarded as a `RegistryEvent::Message` on
/// `events`; the loop never returns on its own due to a broker-side error —
/// it logs and reconnects instead, matching the "never crash the process"
/// policy for transport errors.
pub async fn run_broker_client(
    broker: BrokerDescriptor,
    events: mpsc::Sender<RegistryEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut options = MqttOptions::new(format!("mqguard-{}", broker.name), broker.host.clone(), broker.port);
    options.set_keep_alive(Duration::from_secs(30));
    if let Some((user, password)) = &broker.credentials {
        options.set_credentials(user, password);
    }

    if broker.subscriptions.is_empty() {
        return Err(MqguardError::config(format!("broker '{}' has no subscriptions configured", broker.name)));
    }

    let (client, mut eventloop) = AsyncClient::new(options, 64);
    for pattern in &broker.subscriptions {
        client
            .subscribe(pattern, QoS::AtLeastOnce)
            .await
            .map_err(|err| MqguardError::Mqtt(format!("subscribe to '{}' on broker '{}': {}", pattern, broker.name, err)))?;
    }
    info!(broker = %broker.name, subscriptions = ?broker.subscriptions, "broker client starting");

    let mut backoff = Backoff::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(broker = %broker.name, "broker client shutting down");
                return Ok(());
            }
            poll = eventloop.poll() => {
                match poll {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        backoff.reset();
                        debug!(broker = %broker.name, topic = %publish.topic, bytes = publish.payload.len(), "message received");
                        let identifier = DataIdentifier::new(broker.name.clone(), publish.topic.as_str());
                        let event = RegistryEvent::Message {
                            identifier,
                            payload: publish.payload.to_vec(),
                        };
                        if events.send(event).await.is_err() {
                            warn!(broker = %broker.name, "registry mailbox closed, stopping broker client");
                            return Ok(());
                        }
                    }
                    Ok(_) => {
                        backoff.reset();
                    }
                    Err(err) => {
                        warn!(broker = %broker.name, error = %err, delay = ?backoff.delay, "broker connection error, reconnecting");
                        backoff.wait_and_grow().await;
                    }
                }
            }
        }
    }
}
