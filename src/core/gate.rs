use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::MqttConfig;
use crate::error::ActuationError;

const REQUEST_CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Something that can be told to open the gate. Sending the signal twice is
/// harmless; the actuator handles repeats.
pub trait GateActuator {
    fn open(&self) -> impl Future<Output = Result<(), ActuationError>>;
}

/// Publishes the open command over MQTT, fire-and-forget (QoS 0).
///
/// A signal is only handed to the client while the broker connection is up.
/// The client buffers requests across reconnects, so anything queued while
/// disconnected would open the gate long after the grant.
pub struct MqttGate {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    topic: String,
    payload: String,
}

impl std::fmt::Debug for MqttGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttGate")
            .field("topic", &self.topic)
            .field("payload", &self.payload)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl MqttGate {
    /// Create the client and spawn the task that drives its connection.
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &MqttConfig) -> (Self, JoinHandle<()>) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(drive_connection(eventloop, connected.clone()));

        let gate = Self {
            client,
            connected,
            topic: config.topic.clone(),
            payload: config.payload.clone(),
        };
        (gate, handle)
    }

    /// Whether the broker has acknowledged the current connection
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue a clean disconnect. The connection task exits once it has been
    /// sent, after flushing any publish queued before it.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "MQTT disconnect failed");
        }
    }
}

impl GateActuator for MqttGate {
    async fn open(&self) -> Result<(), ActuationError> {
        if !self.is_connected() {
            return Err(ActuationError::NotConnected {
                topic: self.topic.clone(),
            });
        }

        // try_publish never waits on a full request queue, so a slow broker
        // cannot stall the capture loop
        self.client
            .try_publish(&self.topic, QoS::AtMostOnce, false, self.payload.as_bytes().to_vec())
            .map_err(|source| ActuationError::Publish {
                topic: self.topic.clone(),
                source,
            })?;
        tracing::info!(topic = %self.topic, payload = %self.payload, "gate open command sent");
        Ok(())
    }
}

async fn drive_connection(mut eventloop: EventLoop, connected: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::SeqCst);
                tracing::info!("connected to MQTT broker");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                tracing::debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::SeqCst);
                tracing::warn!(error = %e, "MQTT connection error, retrying in {:?}", RECONNECT_DELAY);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
