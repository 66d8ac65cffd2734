//! MQTT bus sink.
//!
//! The rumqttc connection runs on its own thread. That thread only logs
//! lifecycle events (connect, inbound command, publish acknowledgment) and
//! keeps an atomic "connected" flag; it shares nothing else with the
//! receive loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rumqttc::{
    Client, Connection, ConnectionError, Event, MqttOptions, Outgoing, Packet, QoS,
    RecvTimeoutError,
};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::{BusConfig, QosLevel};
use crate::error::{Result, SinkError, StartupError};
use crate::sink::BusSink;

/// Pause between failed reconnect attempts.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Connected MQTT client with a background event loop.
pub struct MqttBus {
    client: Client,
    qos: QoS,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    force_stop: Arc<AtomicBool>,
    event_loop: Option<JoinHandle<()>>,
}

impl MqttBus {
    /// Connect to the broker, subscribe to the command topic and start the
    /// event loop thread.
    ///
    /// Fails if no `ConnAck` arrives within `connect_timeout`.
    pub fn connect(config: &BusConfig) -> std::result::Result<Self, StartupError> {
        let connect_err = |message: String| StartupError::BusConnectFailed {
            host: config.host.clone(),
            port: config.port,
            message,
        };

        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("telebridge-{}", Uuid::new_v4().simple()));
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);

        let (client, mut connection) = Client::new(options, config.request_capacity.max(1));

        wait_for_connack(&mut connection, config.connect_timeout).map_err(connect_err)?;
        info!(host = %config.host, port = config.port, "bus connected");

        let qos = to_qos(config.qos);
        let command_topic = config.command_topic();
        match client.try_subscribe(command_topic.clone(), qos) {
            Ok(()) => info!(topic = %command_topic, "subscribed to command topic"),
            Err(err) => warn!(topic = %command_topic, error = %err, "command subscription failed"),
        }

        let connected = Arc::new(AtomicBool::new(true));
        let stopping = Arc::new(AtomicBool::new(false));
        let force_stop = Arc::new(AtomicBool::new(false));

        let worker = EventLoopWorker {
            client: client.clone(),
            command_topic,
            qos,
            connected: connected.clone(),
            stopping: stopping.clone(),
            force_stop: force_stop.clone(),
        };
        let event_loop = thread::Builder::new()
            .name("telebridge-bus".to_string())
            .spawn(move || worker.run(connection))
            .map_err(|err| connect_err(format!("failed to start event loop: {err}")))?;

        Ok(Self {
            client,
            qos,
            connected,
            stopping,
            force_stop,
            event_loop: Some(event_loop),
        })
    }

    /// Whether the event loop currently holds a broker session.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Disconnect and stop the event loop thread. Returns once the thread
    /// has exited.
    ///
    /// If the disconnect request cannot be queued, the event loop is told to
    /// exit on its next event without a graceful disconnect.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.event_loop.take() else {
            return;
        };

        self.stopping.store(true, Ordering::Release);
        self.connected.store(false, Ordering::Release);

        if let Err(err) = self.client.try_disconnect() {
            warn!(error = %err, "bus disconnect request failed; closing connection");
            self.force_stop.store(true, Ordering::Release);
        }
        if handle.join().is_err() {
            warn!("bus event loop panicked");
        }
        info!("bus disconnected");
    }
}

impl BusSink for MqttBus {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        let bus_err = |message: String| SinkError::Bus {
            topic: topic.to_string(),
            message,
        };

        if !self.is_connected() {
            return Err(bus_err("bus not connected".to_string()));
        }

        self.client
            .try_publish(topic, self.qos, false, payload.to_vec())
            .map_err(|err| bus_err(err.to_string()))?;

        debug!(topic, size = payload.len(), "queued bus publish");
        Ok(())
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("qos", &self.qos)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn wait_for_connack(
    connection: &mut Connection,
    timeout: Duration,
) -> std::result::Result<(), String> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(format!("no ConnAck within {timeout:?}"));
        }

        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => return Ok(()),
            Ok(Ok(event)) => trace!(?event, "bus event before ConnAck"),
            Ok(Err(err)) => return Err(err.to_string()),
            Err(RecvTimeoutError::Timeout) => {
                return Err(format!("no ConnAck within {timeout:?}"));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err("event loop closed before ConnAck".to_string());
            }
        }
    }
}

struct EventLoopWorker {
    client: Client,
    command_topic: String,
    qos: QoS,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    force_stop: Arc<AtomicBool>,
}

impl EventLoopWorker {
    fn run(self, mut connection: Connection) {
        debug!("bus event loop started");

        for notification in connection.iter() {
            if self.should_stop(&notification) {
                break;
            }
            match notification {
                Ok(event) => self.handle_event(event),
                Err(err) => {
                    if self.connected.swap(false, Ordering::AcqRel) {
                        warn!(error = %err, "bus connection lost; reconnecting");
                    } else {
                        debug!(error = %err, "bus reconnect failed");
                    }
                    thread::sleep(RECONNECT_BACKOFF);
                }
            }
        }

        debug!("bus event loop stopped");
    }

    /// Once stopping, exit after the disconnect goes out or the connection
    /// fails. A forced stop exits on any notification.
    fn should_stop(&self, notification: &std::result::Result<Event, ConnectionError>) -> bool {
        if self.force_stop.load(Ordering::Acquire) {
            return true;
        }
        if !self.stopping.load(Ordering::Acquire) {
            return false;
        }
        matches!(notification, Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_))
    }

    fn handle_event(&self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                self.connected.store(true, Ordering::Release);
                info!("bus reconnected");
                if let Err(err) = self.client.try_subscribe(self.command_topic.clone(), self.qos) {
                    warn!(
                        topic = %self.command_topic,
                        error = %err,
                        "command resubscription failed"
                    );
                }
            }
            Event::Incoming(Packet::Publish(message)) => {
                info!(
                    topic = %message.topic,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "bus message received"
                );
            }
            Event::Incoming(Packet::PubAck(ack)) => {
                debug!(pkid = ack.pkid, "bus publish acknowledged");
            }
            Event::Incoming(Packet::PubComp(comp)) => {
                debug!(pkid = comp.pkid, "bus publish completed");
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                debug!(pkid = ack.pkid, "bus subscription acknowledged");
            }
            Event::Outgoing(Outgoing::Publish(pkid)) => {
                trace!(pkid, "bus publish sent");
            }
            other => trace!(event = ?other, "bus event"),
        }
    }
}

fn to_qos(level: QosLevel) -> QoS {
    match level {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}
