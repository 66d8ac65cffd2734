use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use telebridge_record::FieldNameProfile;
use telebridge_transport::{DEFAULT_ACK_PORT, DEFAULT_MAX_DATAGRAM, DEFAULT_PORT};

/// Default MQTT broker host.
pub const DEFAULT_BROKER_HOST: &str = "localhost";
/// Default MQTT broker port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;
/// Default MQTT keep-alive interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
/// Default publish topic prefix; the node id is appended.
pub const DEFAULT_TOPIC_PREFIX: &str = "nodes/info/";
/// Default command topic suffix, appended to the prefix.
pub const DEFAULT_COMMAND_SUFFIX: &str = "cmd";
/// Default CSV log file.
pub const DEFAULT_LOG_FILE: &str = "node_info.csv";

/// Everything the bridge needs, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub inbound: InboundConfig,
    pub ack: AckConfig,
    pub bus: BusConfig,
    pub storage: StorageConfig,
    /// Names bound to the four instrument slots.
    pub profile: FieldNameProfile,
    /// Log every rendered JSON document, pretty-printed.
    pub debug_json: bool,
}

/// Inbound telemetry socket.
#[derive(Debug, Clone)]
pub struct InboundConfig {
    /// Local address to bind. `::` accepts IPv4 and IPv6.
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Receive buffer size in bytes.
    pub max_datagram: usize,
    /// How often the receive loop wakes up to check for shutdown.
    pub poll_interval: Duration,
}

impl InboundConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_datagram: DEFAULT_MAX_DATAGRAM,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Acknowledgment datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckConfig {
    /// Port on the node that receives the greeting.
    pub port: u16,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_ACK_PORT,
        }
    }
}

/// MQTT delivery guarantee for published records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QosLevel {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl QosLevel {
    /// Map a numeric MQTT QoS level (0, 1, 2).
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(QosLevel::AtMostOnce),
            1 => Some(QosLevel::AtLeastOnce),
            2 => Some(QosLevel::ExactlyOnce),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

/// Message bus connection and topics.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    /// MQTT client id. Generated when `None`.
    pub client_id: Option<String>,
    /// Publish topic is `<topic_prefix><node_id>`.
    pub topic_prefix: String,
    /// Command topic is `<topic_prefix><command_suffix>`.
    pub command_suffix: String,
    pub qos: QosLevel,
    /// How long startup waits for the broker to accept the connection.
    pub connect_timeout: Duration,
    /// Outstanding requests buffered between the caller and the event loop.
    pub request_capacity: usize,
}

impl BusConfig {
    /// Topic a record from `node_id` is published to.
    pub fn publish_topic(&self, node_id: u8) -> String {
        format!("{}{}", self.topic_prefix, node_id)
    }

    /// Topic subscribed to for inbound commands.
    pub fn command_topic(&self) -> String {
        format!("{}{}", self.topic_prefix, self.command_suffix)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            keep_alive: DEFAULT_KEEP_ALIVE,
            client_id: None,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            command_suffix: DEFAULT_COMMAND_SUFFIX.to_string(),
            qos: QosLevel::default(),
            connect_timeout: Duration::from_secs(10),
            request_capacity: 64,
        }
    }
}

/// CSV log file.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}
